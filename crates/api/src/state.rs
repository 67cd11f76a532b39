use std::sync::Arc;

use sqlx::PgPool;
use tracing::info;

use crate::auth::JwtService;
use crate::booking::{BookingEngine, TicketSigner};
use crate::config::{AppConfig, GatewayConfig};
use crate::payment::{MockGateway, PaymentGateway, RazorpayGateway};
use crate::services::{DbNotifier, EmailService};
use infra::repos::{BookingRepo, PgDirectory};
use infra::store::BookingStore;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    store: Arc<dyn BookingStore>,
    engine: Arc<BookingEngine>,
    jwt_service: JwtService,
}

impl AppState {
    pub fn new(db: PgPool, config: &AppConfig) -> Self {
        let store: Arc<dyn BookingStore> = Arc::new(BookingRepo::new(db.clone()));

        let gateway: Arc<dyn PaymentGateway> = match &config.gateway {
            GatewayConfig::Razorpay(rzp) => {
                info!("Using Razorpay payment gateway");
                Arc::new(RazorpayGateway::new(rzp.clone()))
            }
            GatewayConfig::Mock { secret } => {
                info!("Using mock payment gateway");
                Arc::new(MockGateway::new(secret.clone()))
            }
        };

        let mut engine = BookingEngine::new(
            Arc::clone(&store),
            Arc::new(PgDirectory::new(db.clone())),
            gateway,
            Arc::new(DbNotifier::new(db.clone())),
            TicketSigner::new(config.ticket_secret.clone(), config.frontend_base_url.clone()),
        );

        match &config.email {
            Some(email) => engine = engine.with_mailer(Arc::new(EmailService::new(email.clone()))),
            None => info!("Email not configured; confirmation emails disabled"),
        }

        Self {
            db,
            store,
            engine: Arc::new(engine),
            jwt_service: JwtService::new(&config.auth),
        }
    }

    pub fn engine(&self) -> &BookingEngine {
        &self.engine
    }

    pub fn store(&self) -> Arc<dyn BookingStore> {
        Arc::clone(&self.store)
    }

    pub fn jwt_service(&self) -> &JwtService {
        &self.jwt_service
    }
}
