//! Prescription registry tests
//!
//! Tests for doctor-issued prescriptions including:
//! - Who may issue and who may read a prescription
//! - Prescription number format and collision handling
//! - Line validation and the advisory stock check
//! - The active to fulfilled transition

mod common;

use chrono::Utc;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use common::{
    add_medicine, clinic, dec, line, prescribe, register_patient, register_pharmacist,
    PATIENT_NATIONAL_ID,
};
use pharmacy_backend::error::AppError;
use pharmacy_backend::models::{is_valid_prescription_number, PrescriptionStatus, Role};
use pharmacy_backend::services::prescription::{CreatePrescriptionInput, PrescriptionLineInput};
use pharmacy_backend::services::{InventoryLedger, PrescriptionRegistry};

fn input(lines: Vec<PrescriptionLineInput>) -> CreatePrescriptionInput {
    CreatePrescriptionInput {
        patient_national_id: PATIENT_NATIONAL_ID.to_string(),
        items: lines,
        notes: Some("Take after meals".to_string()),
    }
}

// ============================================================================
// Creation Tests
// ============================================================================

#[cfg(test)]
mod creation_tests {
    use super::*;

    #[tokio::test]
    async fn test_doctor_creates_active_prescription() {
        let clinic = clinic().await;
        let amoxicillin = add_medicine(&clinic.store, "Amoxicillin 500mg", "15.99", 150).await;
        let ibuprofen = add_medicine(&clinic.store, "Ibuprofen 200mg", "8.50", 8).await;
        let registry = PrescriptionRegistry::new(clinic.store.clone());

        let prescription = registry
            .create_prescription(
                clinic.doctor.id,
                input(vec![line(amoxicillin.id, 2), line(ibuprofen.id, 3)]),
            )
            .await
            .unwrap();

        assert!(is_valid_prescription_number(&prescription.prescription_number));
        let today = Utc::now().format("%Y%m%d").to_string();
        assert!(prescription.prescription_number.contains(&today));
        assert_eq!(prescription.status, PrescriptionStatus::Active);
        assert_eq!(prescription.doctor_id, clinic.doctor.id);
        assert_eq!(prescription.patient_id, clinic.patient.id);
        assert_eq!(prescription.patient_national_id, PATIENT_NATIONAL_ID);
        assert_eq!(prescription.items.len(), 2);
        assert_eq!(prescription.items[0].medicine_name, "Amoxicillin 500mg");
        assert_eq!(prescription.items[0].quoted_unit_price, dec("15.99"));
        assert_eq!(prescription.items[1].quantity, 3);
        assert_eq!(prescription.quoted_total().unwrap(), dec("57.48"));
        assert!(prescription.fulfilled_at.is_none());

        let fetched = registry
            .get_by_number(&prescription.prescription_number)
            .await
            .unwrap();
        assert_eq!(fetched, prescription);
    }

    #[tokio::test]
    async fn test_creation_does_not_reserve_stock() {
        let clinic = clinic().await;
        let medicine = add_medicine(&clinic.store, "Amoxicillin 500mg", "15.99", 150).await;

        prescribe(
            &clinic.store,
            clinic.doctor.id,
            PATIENT_NATIONAL_ID,
            vec![line(medicine.id, 20)],
        )
        .await;

        let ledger = InventoryLedger::new(clinic.store.clone());
        assert_eq!(ledger.get_medicine(medicine.id).await.unwrap().stock, 150);
    }

    #[tokio::test]
    async fn test_only_doctors_issue_prescriptions() {
        let clinic = clinic().await;
        let medicine = add_medicine(&clinic.store, "Aspirin", "2.00", 50).await;
        let pharmacist = register_pharmacist(&clinic.store, "pharm@example.com").await;
        let registry = PrescriptionRegistry::new(clinic.store.clone());

        for author in [clinic.patient.id, pharmacist.id] {
            assert!(matches!(
                registry
                    .create_prescription(author, input(vec![line(medicine.id, 1)]))
                    .await,
                Err(AppError::Forbidden(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_unknown_patient_and_medicine() {
        let clinic = clinic().await;
        let medicine = add_medicine(&clinic.store, "Aspirin", "2.00", 50).await;
        let registry = PrescriptionRegistry::new(clinic.store.clone());

        let mut stranger = input(vec![line(medicine.id, 1)]);
        stranger.patient_national_id = "0000000000".to_string();
        assert!(matches!(
            registry.create_prescription(clinic.doctor.id, stranger).await,
            Err(AppError::NotFound(resource)) if resource == "Patient"
        ));

        assert!(matches!(
            registry
                .create_prescription(clinic.doctor.id, input(vec![line(Uuid::new_v4(), 1)]))
                .await,
            Err(AppError::NotFound(resource)) if resource == "Medicine"
        ));
    }

    #[tokio::test]
    async fn test_invalid_lines_are_rejected() {
        let clinic = clinic().await;
        let medicine = add_medicine(&clinic.store, "Aspirin", "2.00", 50).await;
        let registry = PrescriptionRegistry::new(clinic.store.clone());

        assert!(matches!(
            registry.create_prescription(clinic.doctor.id, input(vec![])).await,
            Err(AppError::Validation { field, .. }) if field == "items"
        ));

        match registry
            .create_prescription(
                clinic.doctor.id,
                input(vec![line(medicine.id, 1), line(medicine.id, 0)]),
            )
            .await
        {
            Err(AppError::Validation { field, .. }) => assert_eq!(field, "items[1].quantity"),
            other => panic!("expected validation error, got {:?}", other),
        }

        let mut bad_id = input(vec![line(medicine.id, 1)]);
        bad_id.patient_national_id = "12345".to_string();
        assert!(matches!(
            registry.create_prescription(clinic.doctor.id, bad_id).await,
            Err(AppError::Validation { field, .. }) if field == "patient_national_id"
        ));
    }

    #[tokio::test]
    async fn test_quantity_over_stock_is_rejected() {
        let clinic = clinic().await;
        let ibuprofen = add_medicine(&clinic.store, "Ibuprofen 200mg", "8.50", 8).await;
        let registry = PrescriptionRegistry::new(clinic.store.clone());

        match registry
            .create_prescription(clinic.doctor.id, input(vec![line(ibuprofen.id, 10)]))
            .await
        {
            Err(AppError::InsufficientStock {
                requested,
                available,
                ..
            }) => {
                assert_eq!(requested, 10);
                assert_eq!(available, 8);
            }
            other => panic!("expected insufficient stock, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_repeated_medicine_is_checked_in_aggregate() {
        let clinic = clinic().await;
        let medicine = add_medicine(&clinic.store, "Aspirin", "2.00", 10).await;
        let registry = PrescriptionRegistry::new(clinic.store.clone());

        assert!(matches!(
            registry
                .create_prescription(
                    clinic.doctor.id,
                    input(vec![line(medicine.id, 6), line(medicine.id, 6)]),
                )
                .await,
            Err(AppError::InsufficientStock {
                requested: 12,
                available: 10,
                ..
            })
        ));
    }
}

// ============================================================================
// Number Allocation Tests
// ============================================================================

#[cfg(test)]
mod number_tests {
    use super::*;

    #[tokio::test]
    async fn test_colliding_suffix_is_regenerated() {
        let clinic = clinic().await;
        let medicine = add_medicine(&clinic.store, "Aspirin", "2.00", 50).await;

        // Suffixes 7, 7, 8: the second prescription must skip the taken 7
        let sequence = Arc::new(AtomicU16::new(0));
        let counter = sequence.clone();
        let registry = PrescriptionRegistry::new(clinic.store.clone()).with_suffix_source(
            move || match counter.fetch_add(1, Ordering::SeqCst) {
                0 | 1 => 7,
                _ => 8,
            },
        );

        let first = registry
            .create_prescription(clinic.doctor.id, input(vec![line(medicine.id, 1)]))
            .await
            .unwrap();
        let second = registry
            .create_prescription(clinic.doctor.id, input(vec![line(medicine.id, 1)]))
            .await
            .unwrap();

        assert!(first.prescription_number.ends_with("-007"));
        assert!(second.prescription_number.ends_with("-008"));
        assert_eq!(sequence.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_suffixes_surface_as_conflict() {
        let clinic = clinic().await;
        let medicine = add_medicine(&clinic.store, "Aspirin", "2.00", 50).await;
        let registry =
            PrescriptionRegistry::new(clinic.store.clone()).with_suffix_source(|| 42);

        registry
            .create_prescription(clinic.doctor.id, input(vec![line(medicine.id, 1)]))
            .await
            .unwrap();
        assert!(matches!(
            registry
                .create_prescription(clinic.doctor.id, input(vec![line(medicine.id, 1)]))
                .await,
            Err(AppError::Conflict { .. })
        ));
    }
}

// ============================================================================
// Lookup and Transition Tests
// ============================================================================

#[cfg(test)]
mod lookup_tests {
    use super::*;

    #[tokio::test]
    async fn test_visibility_by_role() {
        let clinic = clinic().await;
        let medicine = add_medicine(&clinic.store, "Aspirin", "2.00", 50).await;
        let other_patient = register_patient(&clinic.store, "other@example.com", "1111111111").await;
        let pharmacist = register_pharmacist(&clinic.store, "pharm@example.com").await;
        let prescription = prescribe(
            &clinic.store,
            clinic.doctor.id,
            PATIENT_NATIONAL_ID,
            vec![line(medicine.id, 1)],
        )
        .await;
        let number = prescription.prescription_number.as_str();
        let registry = PrescriptionRegistry::new(clinic.store.clone());

        assert!(registry
            .get_visible_to(number, clinic.patient.id, Role::Patient)
            .await
            .is_ok());
        assert!(registry
            .get_visible_to(number, clinic.doctor.id, Role::Doctor)
            .await
            .is_ok());
        assert!(registry
            .get_visible_to(number, pharmacist.id, Role::Pharmacist)
            .await
            .is_ok());
        assert!(matches!(
            registry
                .get_visible_to(number, other_patient.id, Role::Patient)
                .await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            registry
                .get_visible_to("RX-20240101-999", clinic.patient.id, Role::Patient)
                .await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_listing_filters_by_owner_and_status() {
        let clinic = clinic().await;
        let medicine = add_medicine(&clinic.store, "Aspirin", "2.00", 50).await;
        let other_patient = register_patient(&clinic.store, "other@example.com", "1111111111").await;

        let first = prescribe(&clinic.store, clinic.doctor.id, PATIENT_NATIONAL_ID, vec![line(medicine.id, 1)]).await;
        let second = prescribe(&clinic.store, clinic.doctor.id, PATIENT_NATIONAL_ID, vec![line(medicine.id, 2)]).await;
        prescribe(&clinic.store, clinic.doctor.id, "1111111111", vec![line(medicine.id, 3)]).await;

        let registry = PrescriptionRegistry::new(clinic.store.clone());
        registry.mark_fulfilled(first.id).await.unwrap();

        let mine = registry.get_for_patient(clinic.patient.id, None).await.unwrap();
        assert_eq!(mine.len(), 2);
        assert!(mine.iter().all(|p| p.patient_id == clinic.patient.id));

        let active = registry
            .get_for_patient(clinic.patient.id, Some(PrescriptionStatus::Active))
            .await
            .unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, second.id);

        let theirs = registry.get_for_patient(other_patient.id, None).await.unwrap();
        assert_eq!(theirs.len(), 1);

        assert_eq!(registry.list_for_doctor(clinic.doctor.id, None).await.unwrap().len(), 3);
        assert_eq!(
            registry
                .list_all(Some(PrescriptionStatus::Fulfilled))
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_fulfilled_exactly_once() {
        let clinic = clinic().await;
        let medicine = add_medicine(&clinic.store, "Aspirin", "2.00", 50).await;
        let prescription = prescribe(
            &clinic.store,
            clinic.doctor.id,
            PATIENT_NATIONAL_ID,
            vec![line(medicine.id, 1)],
        )
        .await;
        let registry = PrescriptionRegistry::new(clinic.store.clone());

        registry.mark_fulfilled(prescription.id).await.unwrap();
        let fulfilled = registry
            .get_by_number(&prescription.prescription_number)
            .await
            .unwrap();
        assert_eq!(fulfilled.status, PrescriptionStatus::Fulfilled);
        assert!(fulfilled.fulfilled_at.is_some());

        assert!(matches!(
            registry.mark_fulfilled(prescription.id).await,
            Err(AppError::AlreadyFulfilled(number)) if number == prescription.prescription_number
        ));
        assert!(matches!(
            registry.mark_fulfilled(Uuid::new_v4()).await,
            Err(AppError::NotFound(_))
        ));
    }
}
