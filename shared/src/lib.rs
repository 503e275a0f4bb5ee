//! Shared types and models for the PharmaCare platform
//!
//! This crate contains the domain types and pure ledger arithmetic shared
//! between the backend, the browser (via WASM), and the test suites.

pub mod models;
pub mod money;
pub mod pricing;
pub mod stats;
pub mod types;
pub mod validation;

pub use models::*;
pub use money::*;
pub use pricing::*;
pub use stats::*;
pub use types::*;
pub use validation::*;
