//! In-memory store for development and tests
//!
//! Each unit of work runs against a private snapshot of the tables and tracks
//! the version of every entity it touched. Commit re-checks those versions
//! under the store lock: if another unit of work committed a change to any of
//! them in the meantime, the commit is rejected with
//! [`AppError::TransactionConflict`] and nothing is applied. Versions are kept
//! per entity, so units of work over unrelated medicines or wallets never
//! conflict.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{PrescriptionFilter, Store, UnitOfWork, UserCredentials};
use crate::error::{AppError, AppResult};
use crate::models::{Medicine, Order, Prescription, PrescriptionStatus, User, WalletTransaction};

/// Versioned entity and unique-index keys
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Key {
    User(Uuid),
    Email(String),
    NationalId(String),
    Medicine(Uuid),
    Wallet(Uuid),
    Prescription(Uuid),
    RxNumber(String),
}

#[derive(Debug, Clone, Default)]
struct Tables {
    users: HashMap<Uuid, UserCredentials>,
    medicines: HashMap<Uuid, Medicine>,
    wallets: HashMap<Uuid, Decimal>,
    wallet_transactions: Vec<WalletTransaction>,
    prescriptions: HashMap<Uuid, Prescription>,
    orders: Vec<Order>,
}

#[derive(Debug, Default)]
struct Shared {
    tables: Tables,
    versions: HashMap<Key, u64>,
}

/// Process-local store. Clones share the same tables.
#[derive(Clone, Default)]
pub struct MemoryStore {
    shared: Arc<Mutex<Shared>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>> {
        let shared = self.shared.lock().await;
        Ok(Box::new(MemoryUnitOfWork {
            store: self.shared.clone(),
            snapshot: shared.tables.clone(),
            base_versions: shared.versions.clone(),
            touched: HashSet::new(),
            written: HashSet::new(),
            new_transactions: Vec::new(),
            new_orders: Vec::new(),
        }))
    }

    async fn ping(&self) -> bool {
        true
    }
}

struct MemoryUnitOfWork {
    store: Arc<Mutex<Shared>>,
    snapshot: Tables,
    base_versions: HashMap<Key, u64>,
    /// Keys read or written; validated at commit
    touched: HashSet<Key>,
    /// Keys whose snapshot state is copied back at commit
    written: HashSet<Key>,
    new_transactions: Vec<WalletTransaction>,
    new_orders: Vec<Order>,
}

impl MemoryUnitOfWork {
    fn read(&mut self, key: Key) {
        self.touched.insert(key);
    }

    fn write(&mut self, key: Key) {
        self.touched.insert(key.clone());
        self.written.insert(key);
    }

    fn user_index_keys(user: &User) -> Vec<Key> {
        let mut keys = vec![Key::Email(user.email.to_lowercase())];
        if let Some(national_id) = user.profile.national_id() {
            keys.push(Key::NationalId(national_id.to_string()));
        }
        keys
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn insert_user(&mut self, user: &User, password_hash: &str) -> AppResult<()> {
        let email = user.email.to_lowercase();
        if self
            .snapshot
            .users
            .values()
            .any(|c| c.user.email.to_lowercase() == email)
        {
            return Err(AppError::DuplicateEntry("email".to_string()));
        }
        if let Some(national_id) = user.profile.national_id() {
            if self
                .snapshot
                .users
                .values()
                .any(|c| c.user.profile.national_id() == Some(national_id))
            {
                return Err(AppError::DuplicateEntry("national_id".to_string()));
            }
        }

        for key in Self::user_index_keys(user) {
            self.write(key);
        }
        self.write(Key::User(user.id));
        self.snapshot.users.insert(
            user.id,
            UserCredentials {
                user: user.clone(),
                password_hash: password_hash.to_string(),
            },
        );
        Ok(())
    }

    async fn email_exists(&mut self, email: &str) -> AppResult<bool> {
        let email = email.to_lowercase();
        self.read(Key::Email(email.clone()));
        Ok(self
            .snapshot
            .users
            .values()
            .any(|c| c.user.email.to_lowercase() == email))
    }

    async fn national_id_exists(&mut self, national_id: &str) -> AppResult<bool> {
        self.read(Key::NationalId(national_id.to_string()));
        Ok(self
            .snapshot
            .users
            .values()
            .any(|c| c.user.profile.national_id() == Some(national_id)))
    }

    async fn find_credentials_by_email(&mut self, email: &str) -> AppResult<Option<UserCredentials>> {
        let email = email.to_lowercase();
        Ok(self
            .snapshot
            .users
            .values()
            .find(|c| c.user.email.to_lowercase() == email)
            .cloned())
    }

    async fn find_user(&mut self, id: Uuid) -> AppResult<Option<User>> {
        self.read(Key::User(id));
        Ok(self.snapshot.users.get(&id).map(|c| c.user.clone()))
    }

    async fn find_patient_by_national_id(&mut self, national_id: &str) -> AppResult<Option<User>> {
        Ok(self
            .snapshot
            .users
            .values()
            .find(|c| c.user.profile.national_id() == Some(national_id))
            .map(|c| c.user.clone()))
    }

    async fn list_users(&mut self) -> AppResult<Vec<User>> {
        let mut users: Vec<User> = self.snapshot.users.values().map(|c| c.user.clone()).collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.email.cmp(&b.email)));
        Ok(users)
    }

    async fn insert_medicine(&mut self, medicine: &Medicine) -> AppResult<()> {
        if self.snapshot.medicines.contains_key(&medicine.id) {
            return Err(AppError::DuplicateEntry("id".to_string()));
        }
        self.write(Key::Medicine(medicine.id));
        self.snapshot.medicines.insert(medicine.id, medicine.clone());
        Ok(())
    }

    async fn update_medicine(&mut self, medicine: &Medicine) -> AppResult<bool> {
        self.write(Key::Medicine(medicine.id));
        match self.snapshot.medicines.get_mut(&medicine.id) {
            Some(existing) => {
                *existing = medicine.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_medicine(&mut self, id: Uuid) -> AppResult<bool> {
        self.write(Key::Medicine(id));
        Ok(self.snapshot.medicines.remove(&id).is_some())
    }

    async fn get_medicine(&mut self, id: Uuid) -> AppResult<Option<Medicine>> {
        Ok(self.snapshot.medicines.get(&id).cloned())
    }

    async fn lock_medicine(&mut self, id: Uuid) -> AppResult<Option<Medicine>> {
        self.read(Key::Medicine(id));
        Ok(self.snapshot.medicines.get(&id).cloned())
    }

    async fn list_medicines(&mut self, query: Option<&str>) -> AppResult<Vec<Medicine>> {
        let mut medicines: Vec<Medicine> = self
            .snapshot
            .medicines
            .values()
            .filter(|m| query.map_or(true, |q| m.matches(q)))
            .cloned()
            .collect();
        medicines.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(medicines)
    }

    async fn decrement_stock(&mut self, id: Uuid, quantity: i32) -> AppResult<Option<i32>> {
        self.write(Key::Medicine(id));
        let Some(medicine) = self.snapshot.medicines.get_mut(&id) else {
            return Ok(None);
        };
        if medicine.stock < quantity {
            return Ok(None);
        }
        medicine.stock -= quantity;
        medicine.updated_at = Utc::now();
        Ok(Some(medicine.stock))
    }

    async fn create_wallet(&mut self, patient_id: Uuid) -> AppResult<()> {
        self.write(Key::Wallet(patient_id));
        self.snapshot
            .wallets
            .entry(patient_id)
            .or_insert(Decimal::ZERO);
        Ok(())
    }

    async fn wallet_balance(&mut self, patient_id: Uuid) -> AppResult<Option<Decimal>> {
        Ok(self.snapshot.wallets.get(&patient_id).copied())
    }

    async fn lock_wallet(&mut self, patient_id: Uuid) -> AppResult<Option<Decimal>> {
        self.read(Key::Wallet(patient_id));
        Ok(self.snapshot.wallets.get(&patient_id).copied())
    }

    async fn adjust_wallet(&mut self, patient_id: Uuid, delta: Decimal) -> AppResult<Option<Decimal>> {
        self.write(Key::Wallet(patient_id));
        let Some(balance) = self.snapshot.wallets.get_mut(&patient_id) else {
            return Ok(None);
        };
        let Some(next) = balance.checked_add(delta) else {
            return Ok(None);
        };
        if next < Decimal::ZERO {
            return Ok(None);
        }
        *balance = next;
        Ok(Some(next))
    }

    async fn insert_wallet_transaction(&mut self, transaction: &WalletTransaction) -> AppResult<()> {
        self.snapshot.wallet_transactions.push(transaction.clone());
        self.new_transactions.push(transaction.clone());
        Ok(())
    }

    async fn list_wallet_transactions(&mut self, patient_id: Uuid) -> AppResult<Vec<WalletTransaction>> {
        Ok(self
            .snapshot
            .wallet_transactions
            .iter()
            .rev()
            .filter(|t| t.patient_id == patient_id)
            .cloned()
            .collect())
    }

    async fn insert_prescription(&mut self, prescription: &Prescription) -> AppResult<()> {
        if self
            .snapshot
            .prescriptions
            .values()
            .any(|p| p.prescription_number == prescription.prescription_number)
        {
            return Err(AppError::DuplicateEntry("prescription_number".to_string()));
        }
        self.write(Key::RxNumber(prescription.prescription_number.clone()));
        self.write(Key::Prescription(prescription.id));
        self.snapshot
            .prescriptions
            .insert(prescription.id, prescription.clone());
        Ok(())
    }

    async fn prescription_number_exists(&mut self, number: &str) -> AppResult<bool> {
        self.read(Key::RxNumber(number.to_string()));
        Ok(self
            .snapshot
            .prescriptions
            .values()
            .any(|p| p.prescription_number == number))
    }

    async fn find_prescription(&mut self, id: Uuid) -> AppResult<Option<Prescription>> {
        Ok(self.snapshot.prescriptions.get(&id).cloned())
    }

    async fn find_prescription_by_number(&mut self, number: &str) -> AppResult<Option<Prescription>> {
        Ok(self
            .snapshot
            .prescriptions
            .values()
            .find(|p| p.prescription_number == number)
            .cloned())
    }

    async fn lock_prescription(&mut self, number: &str) -> AppResult<Option<Prescription>> {
        let found = self
            .snapshot
            .prescriptions
            .values()
            .find(|p| p.prescription_number == number)
            .cloned();
        if let Some(prescription) = &found {
            self.read(Key::Prescription(prescription.id));
        }
        Ok(found)
    }

    async fn list_prescriptions(&mut self, filter: &PrescriptionFilter) -> AppResult<Vec<Prescription>> {
        let mut prescriptions: Vec<Prescription> = self
            .snapshot
            .prescriptions
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        prescriptions.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then(b.prescription_number.cmp(&a.prescription_number))
        });
        Ok(prescriptions)
    }

    async fn mark_prescription_fulfilled(&mut self, id: Uuid, at: DateTime<Utc>) -> AppResult<bool> {
        self.write(Key::Prescription(id));
        match self.snapshot.prescriptions.get_mut(&id) {
            Some(p) if p.status == PrescriptionStatus::Active => {
                p.status = PrescriptionStatus::Fulfilled;
                p.fulfilled_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_order(&mut self, order: &Order) -> AppResult<()> {
        if self
            .snapshot
            .orders
            .iter()
            .any(|o| o.prescription_id == order.prescription_id)
        {
            return Err(AppError::DuplicateEntry("prescription_id".to_string()));
        }
        // One order per prescription: the order claims the prescription entity
        self.write(Key::Prescription(order.prescription_id));
        self.snapshot.orders.push(order.clone());
        self.new_orders.push(order.clone());
        Ok(())
    }

    async fn find_order(&mut self, id: Uuid) -> AppResult<Option<Order>> {
        Ok(self.snapshot.orders.iter().find(|o| o.id == id).cloned())
    }

    async fn list_orders(&mut self, patient_id: Option<Uuid>) -> AppResult<Vec<Order>> {
        Ok(self
            .snapshot
            .orders
            .iter()
            .rev()
            .filter(|o| patient_id.map_or(true, |id| o.patient_id == id))
            .cloned()
            .collect())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let this = *self;
        let mut shared = this.store.lock().await;

        for key in &this.touched {
            let base = this.base_versions.get(key).copied().unwrap_or(0);
            let current = shared.versions.get(key).copied().unwrap_or(0);
            if base != current {
                tracing::debug!(?key, base, current, "memory store version clash");
                return Err(AppError::TransactionConflict);
            }
        }

        for key in &this.written {
            match key {
                Key::User(id) => match this.snapshot.users.get(id) {
                    Some(c) => {
                        shared.tables.users.insert(*id, c.clone());
                    }
                    None => {
                        shared.tables.users.remove(id);
                    }
                },
                Key::Medicine(id) => match this.snapshot.medicines.get(id) {
                    Some(m) => {
                        shared.tables.medicines.insert(*id, m.clone());
                    }
                    None => {
                        shared.tables.medicines.remove(id);
                    }
                },
                Key::Wallet(id) => match this.snapshot.wallets.get(id) {
                    Some(balance) => {
                        shared.tables.wallets.insert(*id, *balance);
                    }
                    None => {
                        shared.tables.wallets.remove(id);
                    }
                },
                Key::Prescription(id) => match this.snapshot.prescriptions.get(id) {
                    Some(p) => {
                        shared.tables.prescriptions.insert(*id, p.clone());
                    }
                    None => {
                        shared.tables.prescriptions.remove(id);
                    }
                },
                // Index keys carry no data of their own
                Key::Email(_) | Key::NationalId(_) | Key::RxNumber(_) => {}
            }
            *shared.versions.entry(key.clone()).or_insert(0) += 1;
        }

        shared.tables.wallet_transactions.extend(this.new_transactions);
        shared.tables.orders.extend(this.new_orders);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserProfile;

    fn patient(email: &str, national_id: &str) -> User {
        User {
            id: Uuid::new_v4(),
            name: "Somchai".to_string(),
            email: email.to_string(),
            profile: UserProfile::Patient {
                national_id: national_id.to_string(),
            },
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_uncommitted_writes_are_discarded() {
        let store = MemoryStore::new();
        let user = patient("a@example.com", "0012345678");

        let mut uow = store.begin().await.unwrap();
        uow.insert_user(&user, "hash").await.unwrap();
        uow.create_wallet(user.id).await.unwrap();
        drop(uow);

        let mut uow = store.begin().await.unwrap();
        assert!(uow.find_user(user.id).await.unwrap().is_none());
        assert!(uow.wallet_balance(user.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_writes_to_same_wallet_conflict() {
        let store = MemoryStore::new();
        let user = patient("a@example.com", "0012345678");
        let mut setup = store.begin().await.unwrap();
        setup.insert_user(&user, "hash").await.unwrap();
        setup.create_wallet(user.id).await.unwrap();
        setup.commit().await.unwrap();

        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();
        first.lock_wallet(user.id).await.unwrap();
        second.lock_wallet(user.id).await.unwrap();
        first.adjust_wallet(user.id, Decimal::from(10)).await.unwrap();
        second.adjust_wallet(user.id, Decimal::from(5)).await.unwrap();

        first.commit().await.unwrap();
        assert!(matches!(
            second.commit().await,
            Err(AppError::TransactionConflict)
        ));

        let mut check = store.begin().await.unwrap();
        assert_eq!(
            check.wallet_balance(user.id).await.unwrap(),
            Some(Decimal::from(10))
        );
    }

    #[tokio::test]
    async fn test_unrelated_wallets_do_not_conflict() {
        let store = MemoryStore::new();
        let a = patient("a@example.com", "0000000001");
        let b = patient("b@example.com", "0000000002");
        let mut setup = store.begin().await.unwrap();
        for user in [&a, &b] {
            setup.insert_user(user, "hash").await.unwrap();
            setup.create_wallet(user.id).await.unwrap();
        }
        setup.commit().await.unwrap();

        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();
        first.adjust_wallet(a.id, Decimal::from(1)).await.unwrap();
        second.adjust_wallet(b.id, Decimal::from(2)).await.unwrap();
        first.commit().await.unwrap();
        second.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected_across_units() {
        let store = MemoryStore::new();
        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();
        first
            .insert_user(&patient("dup@example.com", "0000000001"), "h")
            .await
            .unwrap();
        second
            .insert_user(&patient("DUP@example.com", "0000000002"), "h")
            .await
            .unwrap();
        first.commit().await.unwrap();
        assert!(second.commit().await.is_err());
    }
}
