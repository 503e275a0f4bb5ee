//! HTTP handlers

pub mod auth;
pub mod health;
pub mod inventory;
pub mod order;
pub mod prescription;
pub mod reporting;
pub mod wallet;

pub use auth::*;
pub use health::*;
pub use inventory::*;
pub use order::*;
pub use prescription::*;
pub use reporting::*;
pub use wallet::*;
