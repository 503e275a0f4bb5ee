//! Route definitions for the pharmacy API

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Auth routes (public)
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .merge(protected_routes(state))
}

/// Everything behind a bearer token
fn protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/auth/me", get(handlers::me))
        .route("/users", get(handlers::list_users))
        .nest("/medicines", medicine_routes())
        .nest("/prescriptions", prescription_routes())
        .nest("/orders", order_routes())
        .nest("/wallet", wallet_routes())
        .route("/stats/pharmacy", get(handlers::pharmacy_stats))
        .route("/stats/patient", get(handlers::patient_stats))
        .route("/reports/orders.csv", get(handlers::export_orders_csv))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Medicine catalogue routes
fn medicine_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_medicines).post(handlers::create_medicine),
        )
        .route("/alerts", get(handlers::medicine_alerts))
        .route(
            "/:medicine_id",
            get(handlers::get_medicine)
                .put(handlers::update_medicine)
                .delete(handlers::delete_medicine),
        )
}

/// Prescription routes
fn prescription_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_prescriptions).post(handlers::create_prescription),
        )
        .route("/:number", get(handlers::get_prescription))
}

/// Order routes
fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_orders).post(handlers::place_order))
        .route("/:order_id", get(handlers::get_order))
}

/// Wallet routes
fn wallet_routes() -> Router<AppState> {
    Router::new()
        .route("/deposit", post(handlers::deposit))
        .route("/balance", get(handlers::get_balance))
        .route("/transactions", get(handlers::list_transactions))
}
