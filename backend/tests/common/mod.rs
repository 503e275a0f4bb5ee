//! Shared fixtures for the integration tests: an in-memory store, fast
//! password hashing and helpers that register users and stock the shelves.

#![allow(dead_code)]

use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use pharmacy_backend::config::Config;
use pharmacy_backend::models::{Medicine, Prescription, User};
use pharmacy_backend::services::auth::RegisterInput;
use pharmacy_backend::services::inventory::MedicineInput;
use pharmacy_backend::services::prescription::{CreatePrescriptionInput, PrescriptionLineInput};
use pharmacy_backend::services::{AuthService, InventoryLedger, PrescriptionRegistry, WalletLedger};
use pharmacy_backend::store::{DynStore, MemoryStore};

pub const PASSWORD: &str = "correct-horse";

// Helper to create Decimal from string
pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

/// Development config with the cheapest bcrypt cost and short retry backoff
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.password.bcrypt_cost = 4;
    config.fulfillment.retry_backoff_ms = 1;
    config.fulfillment.max_attempts = 10;
    config
}

pub fn memory_store() -> DynStore {
    Arc::new(MemoryStore::new())
}

pub async fn register(
    store: &DynStore,
    name: &str,
    email: &str,
    role: &str,
    identifier: &str,
) -> User {
    let auth = AuthService::new(store.clone(), &test_config());
    auth.register(RegisterInput {
        name: name.to_string(),
        email: email.to_string(),
        password: PASSWORD.to_string(),
        role: role.to_string(),
        national_id: None,
        practice_code: None,
        identifier: Some(identifier.to_string()),
    })
    .await
    .unwrap()
    .user
}

pub async fn register_patient(store: &DynStore, email: &str, national_id: &str) -> User {
    register(store, "Somsak Patient", email, "patient", national_id).await
}

pub async fn register_doctor(store: &DynStore, email: &str) -> User {
    register(store, "Dr. Malee", email, "doctor", "A-100200").await
}

pub async fn register_pharmacist(store: &DynStore, email: &str) -> User {
    register(store, "Niran Pharmacist", email, "pharmacist", "A-300400").await
}

pub fn medicine_input(name: &str, price: &str, stock: i64) -> MedicineInput {
    MedicineInput {
        name: name.to_string(),
        category: "General".to_string(),
        manufacturer: "MediGen".to_string(),
        batch_number: "BATCH-001".to_string(),
        expiry_date: "2030-12-31".to_string(),
        price: dec(price),
        stock,
        notes: None,
    }
}

pub async fn add_medicine(store: &DynStore, name: &str, price: &str, stock: i64) -> Medicine {
    InventoryLedger::new(store.clone())
        .create_medicine(medicine_input(name, price, stock))
        .await
        .unwrap()
}

pub async fn fund_wallet(store: &DynStore, patient_id: Uuid, amount: &str) {
    WalletLedger::new(store.clone())
        .deposit(patient_id, dec(amount))
        .await
        .unwrap();
}

pub fn line(medicine_id: Uuid, quantity: i64) -> PrescriptionLineInput {
    PrescriptionLineInput {
        medicine_id,
        dosage: "1 tablet".to_string(),
        duration: "7 days".to_string(),
        quantity,
    }
}

pub async fn prescribe(
    store: &DynStore,
    doctor_id: Uuid,
    national_id: &str,
    lines: Vec<PrescriptionLineInput>,
) -> Prescription {
    PrescriptionRegistry::new(store.clone())
        .create_prescription(
            doctor_id,
            CreatePrescriptionInput {
                patient_national_id: national_id.to_string(),
                items: lines,
                notes: None,
            },
        )
        .await
        .unwrap()
}

/// A doctor and a patient with an empty wallet
pub struct Clinic {
    pub store: DynStore,
    pub doctor: User,
    pub patient: User,
}

pub const PATIENT_NATIONAL_ID: &str = "1234567890";

pub async fn clinic() -> Clinic {
    let store = memory_store();
    let doctor = register_doctor(&store, "doctor@example.com").await;
    let patient = register_patient(&store, "patient@example.com", PATIENT_NATIONAL_ID).await;
    Clinic {
        store,
        doctor,
        patient,
    }
}
