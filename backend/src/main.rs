//! PharmaCare backend server

use sqlx::postgres::PgPoolOptions;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pharmacy_backend::{
    config::{Config, StorageBackend},
    create_app, seed_sample_data,
    store::{DynStore, MemoryStore, PgStore},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "pharmacy_server=debug,pharmacy_backend=debug,tower_http=debug,sqlx=warn".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    tracing::info!("Starting PharmaCare server");
    tracing::info!("Environment: {}", config.environment);

    let store = open_store(&config).await?;

    if config.storage.seed_sample_data {
        seed_sample_data(store.clone()).await?;
    }

    let state = AppState::new(store, config.clone());
    let app = create_app(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn open_store(config: &Config) -> anyhow::Result<DynStore> {
    match config.storage.backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory store; data is lost on shutdown");
            Ok(Arc::new(MemoryStore::new()))
        }
        StorageBackend::Postgres => {
            tracing::info!("Connecting to database...");
            let db_pool = PgPoolOptions::new()
                .max_connections(config.database.max_connections)
                .min_connections(config.database.min_connections)
                .acquire_timeout(Duration::from_secs(30))
                .connect(&config.database.url)
                .await?;
            tracing::info!("Database connection established");

            // Run migrations in development
            if config.is_development() {
                tracing::info!("Running database migrations...");
                sqlx::migrate!("./migrations").run(&db_pool).await?;
                tracing::info!("Migrations completed");
            }

            Ok(Arc::new(PgStore::new(db_pool)))
        }
    }
}
