//! Business logic services for the pharmacy backend

pub mod auth;
pub mod fulfillment;
pub mod inventory;
pub mod prescription;
pub mod reporting;
pub mod retry;
pub mod wallet;

pub use auth::AuthService;
pub use fulfillment::OrderFulfillmentService;
pub use inventory::InventoryLedger;
pub use prescription::PrescriptionRegistry;
pub use reporting::ReportingService;
pub use retry::{with_retries, RetryPolicy};
pub use wallet::WalletLedger;
