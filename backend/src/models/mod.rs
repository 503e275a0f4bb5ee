//! Domain models used by the backend
//!
//! Re-exports models from the shared crate

pub use shared::models::*;
pub use shared::types::Role;
