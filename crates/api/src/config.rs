use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::auth::AuthConfig;
use crate::payment::RazorpayConfig;
use crate::services::{EmailConfig, SweeperConfig};
use infra::db::ConnectSettings;

#[derive(Clone, Debug)]
pub enum GatewayConfig {
    Razorpay(RazorpayConfig),
    /// Local development; signatures are keyed by the given secret.
    Mock { secret: String },
}

/// Process configuration, read once at startup.
#[derive(Clone)]
pub struct AppConfig {
    pub database: ConnectSettings,
    pub skip_migrations: bool,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub auth: AuthConfig,
    pub ticket_secret: String,
    pub frontend_base_url: String,
    pub gateway: GatewayConfig,
    pub sweeper: SweeperConfig,
    pub email: Option<EmailConfig>,
}

fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let database = ConnectSettings {
            url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            max_connections: parse_or("DATABASE_MAX_CONNECTIONS", 30),
            max_attempts: parse_or("DB_CONNECT_MAX_ATTEMPTS", 15),
        };

        let allowed_origins = env::var("ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000,http://localhost:3001".to_string())
            .split(',')
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();

        let gateway = match env::var("PAYMENT_GATEWAY")
            .unwrap_or_else(|_| "mock".to_string())
            .to_lowercase()
            .as_str()
        {
            "razorpay" => GatewayConfig::Razorpay(RazorpayConfig::from_env().context(
                "PAYMENT_GATEWAY=razorpay requires RAZORPAY_KEY_ID and RAZORPAY_KEY_SECRET",
            )?),
            "mock" => GatewayConfig::Mock {
                secret: env::var("RAZORPAY_KEY_SECRET").unwrap_or_else(|_| "mock_secret".to_string()),
            },
            other => bail!("Unknown PAYMENT_GATEWAY: {}", other),
        };

        let purge_hours: i64 = parse_or("PURGE_CANCELED_AFTER_HOURS", 0);
        let sweeper = SweeperConfig {
            interval: Duration::from_secs(parse_or("SWEEP_INTERVAL_SECONDS", 60)),
            pending_ttl: chrono::Duration::minutes(parse_or("PENDING_EXPIRY_MINUTES", 10)),
            purge_canceled_after: (purge_hours > 0).then(|| chrono::Duration::hours(purge_hours)),
        };

        Ok(Self {
            database,
            skip_migrations: env::var("SKIP_MIGRATIONS")
                .map(|v| v.to_lowercase() == "true")
                .unwrap_or(false),
            port: parse_or("PORT", 8080),
            allowed_origins,
            auth: AuthConfig::from_env()?,
            ticket_secret: env::var("TICKET_SECRET_KEY").context("TICKET_SECRET_KEY must be set")?,
            frontend_base_url: env::var("FRONTEND_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            gateway,
            sweeper,
            email: EmailConfig::from_env(),
        })
    }
}
