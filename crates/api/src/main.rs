use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api::app::build_router;
use api::config::AppConfig;
use api::gql::build_schema;
use api::services::spawn_sweeper;
use api::state::AppState;
use infra::db::connect_with_retry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Settings come from the environment (.env in development)
    let config = AppConfig::from_env()?;

    // Connect with backoff; the database may still be starting in containers
    let pool = match connect_with_retry(&config.database).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("Could not connect to Postgres, exiting: {}", e);
            std::process::exit(1);
        }
    };

    // Run database migrations automatically on startup (can be disabled with SKIP_MIGRATIONS=true)
    if config.skip_migrations {
        tracing::info!("Skipping database migrations (SKIP_MIGRATIONS=true)");
    } else {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("../../migrations").run(&pool).await?;
        tracing::info!("Database migrations completed successfully");
    }

    // Engine, stores and payment gateway are wired into shared state
    let state = AppState::new(pool, &config);

    // Build GraphQL schema from the gql module
    let schema = build_schema(state.clone());

    // Start the background sweeper that expires unpaid bookings
    let _sweeper_handle = spawn_sweeper(state.store(), config.sweeper.clone());
    tracing::info!("Expiry sweeper started");

    // Router with CORS, auth middleware and the /graphql endpoints
    let app = build_router(state, schema, &config.allowed_origins);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
