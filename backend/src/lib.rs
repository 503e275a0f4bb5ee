//! PharmaCare pharmacy backend
//!
//! Medicine inventory, patient wallets, doctor prescriptions and the order
//! fulfillment flow that ties them together, served over an axum JSON API.

use axum::{routing::get, Router};
use rust_decimal::Decimal;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;

pub use config::Config;

use crate::error::AppResult;
use crate::services::inventory::MedicineInput;
use crate::services::{InventoryLedger, RetryPolicy};
use crate::store::DynStore;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: DynStore,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: DynStore, config: Config) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }

    /// Retry policy for ledger writes, from the fulfillment config
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from(&self.config.fulfillment)
    }
}

/// Create the application router with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .nest("/api/v1", routes::api_routes(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
        .with_state(state)
}

/// Root endpoint
async fn root() -> &'static str {
    "PharmaCare API v1"
}

/// Load the starter catalogue into an empty store. Returns how many
/// medicines were added.
pub async fn seed_sample_data(store: DynStore) -> AppResult<usize> {
    let ledger = InventoryLedger::new(store);
    if !ledger.list_medicines(None).await?.is_empty() {
        return Ok(0);
    }

    let samples = [
        ("Amoxicillin 500mg", "Antibiotic", "PharmaCorp", "AMX-2024-001", "2025-12-31", Decimal::new(1599, 2), 150),
        ("Ibuprofen 200mg", "Pain Relief", "MediGen", "IBU-2024-002", "2025-10-15", Decimal::new(850, 2), 8),
        ("Paracetamol 500mg", "Pain Relief", "HealthPlus", "PAR-2024-003", "2024-11-01", Decimal::new(699, 2), 200),
    ];

    for (name, category, manufacturer, batch, expiry, price, stock) in samples {
        ledger
            .create_medicine(MedicineInput {
                name: name.to_string(),
                category: category.to_string(),
                manufacturer: manufacturer.to_string(),
                batch_number: batch.to_string(),
                expiry_date: expiry.to_string(),
                price,
                stock,
                notes: None,
            })
            .await?;
    }

    tracing::info!(count = samples.len(), "Seeded sample medicines");
    Ok(samples.len())
}
