//! Domain models for the PharmaCare platform

mod medicine;
mod order;
mod prescription;
mod user;
mod wallet;

pub use medicine::*;
pub use order::*;
pub use prescription::*;
pub use user::*;
pub use wallet::*;
