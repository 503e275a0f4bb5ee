//! Transactional storage behind the ledgers
//!
//! Services never talk to a database directly. They open a [`UnitOfWork`]
//! from the [`Store`], perform their reads and conditional writes through
//! it, and commit. Dropping a unit of work without committing discards
//! every write made through it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{Medicine, Order, Prescription, PrescriptionStatus, User, WalletTransaction};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Shared handle used by services and application state
pub type DynStore = Arc<dyn Store>;

/// A user together with the stored password hash
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

/// Prescription listing filter. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct PrescriptionFilter {
    pub patient_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub status: Option<PrescriptionStatus>,
}

impl PrescriptionFilter {
    pub fn matches(&self, prescription: &Prescription) -> bool {
        self.patient_id.map_or(true, |id| prescription.patient_id == id)
            && self.doctor_id.map_or(true, |id| prescription.doctor_id == id)
            && self.status.map_or(true, |s| prescription.status == s)
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Open a new unit of work
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>>;

    /// Connectivity check for the health endpoint
    async fn ping(&self) -> bool;
}

/// One atomic batch of reads and writes.
///
/// `lock_*` reads claim the row for the rest of the unit of work: a row lock
/// on PostgreSQL, a tracked version on the in-memory store. Conditional
/// writes (`decrement_stock`, `adjust_wallet`, `mark_prescription_fulfilled`)
/// report whether their guard held instead of failing.
#[async_trait]
pub trait UnitOfWork: Send {
    // Users
    async fn insert_user(&mut self, user: &User, password_hash: &str) -> AppResult<()>;
    async fn email_exists(&mut self, email: &str) -> AppResult<bool>;
    async fn national_id_exists(&mut self, national_id: &str) -> AppResult<bool>;
    async fn find_credentials_by_email(&mut self, email: &str) -> AppResult<Option<UserCredentials>>;
    async fn find_user(&mut self, id: Uuid) -> AppResult<Option<User>>;
    async fn find_patient_by_national_id(&mut self, national_id: &str) -> AppResult<Option<User>>;
    async fn list_users(&mut self) -> AppResult<Vec<User>>;

    // Medicines
    async fn insert_medicine(&mut self, medicine: &Medicine) -> AppResult<()>;
    async fn update_medicine(&mut self, medicine: &Medicine) -> AppResult<bool>;
    async fn delete_medicine(&mut self, id: Uuid) -> AppResult<bool>;
    async fn get_medicine(&mut self, id: Uuid) -> AppResult<Option<Medicine>>;
    async fn lock_medicine(&mut self, id: Uuid) -> AppResult<Option<Medicine>>;
    /// Medicines newest first, optionally filtered by free text
    async fn list_medicines(&mut self, query: Option<&str>) -> AppResult<Vec<Medicine>>;
    /// Decrement when `stock >= quantity`; returns the new stock, or `None`
    /// when the guard failed or the medicine is missing
    async fn decrement_stock(&mut self, id: Uuid, quantity: i32) -> AppResult<Option<i32>>;

    // Wallets
    async fn create_wallet(&mut self, patient_id: Uuid) -> AppResult<()>;
    async fn wallet_balance(&mut self, patient_id: Uuid) -> AppResult<Option<Decimal>>;
    async fn lock_wallet(&mut self, patient_id: Uuid) -> AppResult<Option<Decimal>>;
    /// Apply `delta` when the result stays non-negative; returns the new
    /// balance, or `None` when the guard failed or the wallet is missing
    async fn adjust_wallet(&mut self, patient_id: Uuid, delta: Decimal) -> AppResult<Option<Decimal>>;
    async fn insert_wallet_transaction(&mut self, transaction: &WalletTransaction) -> AppResult<()>;
    /// Most recent first
    async fn list_wallet_transactions(&mut self, patient_id: Uuid) -> AppResult<Vec<WalletTransaction>>;

    // Prescriptions
    async fn insert_prescription(&mut self, prescription: &Prescription) -> AppResult<()>;
    async fn prescription_number_exists(&mut self, number: &str) -> AppResult<bool>;
    async fn find_prescription(&mut self, id: Uuid) -> AppResult<Option<Prescription>>;
    async fn find_prescription_by_number(&mut self, number: &str) -> AppResult<Option<Prescription>>;
    async fn lock_prescription(&mut self, number: &str) -> AppResult<Option<Prescription>>;
    /// Newest first
    async fn list_prescriptions(&mut self, filter: &PrescriptionFilter) -> AppResult<Vec<Prescription>>;
    /// Compare-and-set active -> fulfilled; false when it was not active
    async fn mark_prescription_fulfilled(&mut self, id: Uuid, at: DateTime<Utc>) -> AppResult<bool>;

    // Orders
    async fn insert_order(&mut self, order: &Order) -> AppResult<()>;
    async fn find_order(&mut self, id: Uuid) -> AppResult<Option<Order>>;
    /// Newest first; all patients when `patient_id` is `None`
    async fn list_orders(&mut self, patient_id: Option<Uuid>) -> AppResult<Vec<Order>>;

    async fn commit(self: Box<Self>) -> AppResult<()>;
}
