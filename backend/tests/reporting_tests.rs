//! Reporting tests
//!
//! Dashboard figures and the order export, recomputed from the ledgers.

mod common;

use rust_decimal::Decimal;

use common::{
    add_medicine, clinic, dec, fund_wallet, line, prescribe, register_patient, PATIENT_NATIONAL_ID,
};
use pharmacy_backend::error::AppError;
use pharmacy_backend::services::{OrderFulfillmentService, ReportingService};

// ============================================================================
// Dashboard Tests
// ============================================================================

#[cfg(test)]
mod dashboard_tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_pharmacy_stats() {
        let clinic = clinic().await;
        let stats = ReportingService::new(clinic.store.clone())
            .pharmacy_stats()
            .await
            .unwrap();

        assert_eq!(stats.total_revenue, Decimal::ZERO);
        assert_eq!(stats.orders_count, 0);
        assert_eq!(stats.average_order_value, Decimal::ZERO);
        assert_eq!(stats.total_medicines, 0);
        assert_eq!(stats.low_stock_count, 0);
        assert_eq!(stats.active_prescriptions, 0);
    }

    #[tokio::test]
    async fn test_pharmacy_and_patient_stats_follow_the_ledgers() {
        let clinic = clinic().await;
        let amoxicillin = add_medicine(&clinic.store, "Amoxicillin 500mg", "15.99", 150).await;
        let ibuprofen = add_medicine(&clinic.store, "Ibuprofen 200mg", "8.50", 8).await;
        add_medicine(&clinic.store, "Paracetamol 500mg", "6.99", 200).await;
        fund_wallet(&clinic.store, clinic.patient.id, "100.00").await;

        let first = prescribe(
            &clinic.store,
            clinic.doctor.id,
            PATIENT_NATIONAL_ID,
            vec![line(amoxicillin.id, 2)],
        )
        .await;
        let second = prescribe(
            &clinic.store,
            clinic.doctor.id,
            PATIENT_NATIONAL_ID,
            vec![line(ibuprofen.id, 3)],
        )
        .await;
        prescribe(
            &clinic.store,
            clinic.doctor.id,
            PATIENT_NATIONAL_ID,
            vec![line(amoxicillin.id, 1)],
        )
        .await;

        let fulfillment = OrderFulfillmentService::new(clinic.store.clone());
        fulfillment
            .place_order(clinic.patient.id, &first.prescription_number, &[0])
            .await
            .unwrap();
        fulfillment
            .place_order(clinic.patient.id, &second.prescription_number, &[0])
            .await
            .unwrap();

        let reporting = ReportingService::new(clinic.store.clone());
        let pharmacy = reporting.pharmacy_stats().await.unwrap();
        // 31.98 + 25.50
        assert_eq!(pharmacy.total_revenue, dec("57.48"));
        assert_eq!(pharmacy.orders_count, 2);
        assert_eq!(pharmacy.average_order_value, dec("28.74"));
        assert_eq!(pharmacy.total_medicines, 3);
        // Ibuprofen went from 8 to 5
        assert_eq!(pharmacy.low_stock_count, 1);
        assert_eq!(pharmacy.active_prescriptions, 1);

        let patient = reporting.patient_stats(clinic.patient.id).await.unwrap();
        assert_eq!(patient.wallet_balance, dec("42.52"));
        assert_eq!(patient.active_prescriptions, 1);
        assert_eq!(patient.total_orders, 2);
        assert_eq!(patient.total_spent, dec("57.48"));
    }

    #[tokio::test]
    async fn test_patient_stats_are_per_patient() {
        let clinic = clinic().await;
        let other = register_patient(&clinic.store, "other@example.com", "4444444444").await;
        let amoxicillin = add_medicine(&clinic.store, "Amoxicillin 500mg", "15.99", 150).await;
        fund_wallet(&clinic.store, clinic.patient.id, "100.00").await;
        let prescription = prescribe(
            &clinic.store,
            clinic.doctor.id,
            PATIENT_NATIONAL_ID,
            vec![line(amoxicillin.id, 2)],
        )
        .await;
        OrderFulfillmentService::new(clinic.store.clone())
            .place_order(clinic.patient.id, &prescription.prescription_number, &[0])
            .await
            .unwrap();

        let stats = ReportingService::new(clinic.store.clone())
            .patient_stats(other.id)
            .await
            .unwrap();
        assert_eq!(stats.wallet_balance, Decimal::ZERO);
        assert_eq!(stats.active_prescriptions, 0);
        assert_eq!(stats.total_orders, 0);
        assert_eq!(stats.total_spent, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_patient_stats_need_a_wallet() {
        let clinic = clinic().await;
        assert!(matches!(
            ReportingService::new(clinic.store.clone())
                .patient_stats(clinic.doctor.id)
                .await,
            Err(AppError::NotFound(_))
        ));
    }
}

// ============================================================================
// Export Tests
// ============================================================================

#[cfg(test)]
mod export_tests {
    use super::*;

    #[tokio::test]
    async fn test_orders_csv_has_one_row_per_order() {
        let clinic = clinic().await;
        let ibuprofen = add_medicine(&clinic.store, "Ibuprofen 200mg", "8.50", 50).await;
        let paracetamol = add_medicine(&clinic.store, "Paracetamol 500mg", "6.99", 200).await;
        fund_wallet(&clinic.store, clinic.patient.id, "100.00").await;
        let prescription = prescribe(
            &clinic.store,
            clinic.doctor.id,
            PATIENT_NATIONAL_ID,
            vec![line(ibuprofen.id, 3), line(paracetamol.id, 2)],
        )
        .await;
        let order = OrderFulfillmentService::new(clinic.store.clone())
            .place_order(clinic.patient.id, &prescription.prescription_number, &[0, 1])
            .await
            .unwrap();

        let csv = ReportingService::new(clinic.store.clone())
            .orders_csv()
            .await
            .unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            "order_id,prescription_number,patient_id,line_count,units,total_amount,status,created_at"
        );
        assert!(lines[1].starts_with(&format!(
            "{},{},{},2,5,39.48,completed,",
            order.id, prescription.prescription_number, clinic.patient.id
        )));
    }
}
