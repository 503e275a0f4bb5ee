//! Read-side reporting: dashboard statistics and CSV exports
//!
//! All figures are recomputed from the ledgers on each request.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::PrescriptionStatus;
use crate::store::{DynStore, PrescriptionFilter};
use shared::{
    active_prescription_count, low_stock_count, revenue_summary, round_currency, total_spent,
};

/// Reporting service
#[derive(Clone)]
pub struct ReportingService {
    store: DynStore,
}

/// Pharmacist dashboard figures
#[derive(Debug, Clone, Serialize)]
pub struct PharmacyStats {
    pub total_revenue: Decimal,
    pub orders_count: i64,
    pub average_order_value: Decimal,
    pub total_medicines: i64,
    pub low_stock_count: i64,
    pub active_prescriptions: i64,
}

/// Patient dashboard figures
#[derive(Debug, Clone, Serialize)]
pub struct PatientStats {
    pub wallet_balance: Decimal,
    pub active_prescriptions: i64,
    pub total_orders: i64,
    pub total_spent: Decimal,
}

/// One row of the order export
#[derive(Debug, Serialize)]
pub struct OrderReportRow {
    pub order_id: Uuid,
    pub prescription_number: String,
    pub patient_id: Uuid,
    pub line_count: usize,
    pub units: i64,
    pub total_amount: Decimal,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl ReportingService {
    pub fn new(store: DynStore) -> Self {
        Self { store }
    }

    pub async fn pharmacy_stats(&self) -> AppResult<PharmacyStats> {
        let mut uow = self.store.begin().await?;
        let medicines = uow.list_medicines(None).await?;
        let orders = uow.list_orders(None).await?;
        let active = uow
            .list_prescriptions(&PrescriptionFilter {
                status: Some(PrescriptionStatus::Active),
                ..Default::default()
            })
            .await?;

        let revenue = revenue_summary(&orders);
        Ok(PharmacyStats {
            total_revenue: revenue.total_revenue,
            orders_count: revenue.orders_count,
            average_order_value: revenue.average_order_value,
            total_medicines: medicines.len() as i64,
            low_stock_count: low_stock_count(&medicines),
            active_prescriptions: active.len() as i64,
        })
    }

    pub async fn patient_stats(&self, patient_id: Uuid) -> AppResult<PatientStats> {
        let mut uow = self.store.begin().await?;
        let wallet_balance = uow
            .wallet_balance(patient_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Wallet".to_string()))?;
        let prescriptions = uow
            .list_prescriptions(&PrescriptionFilter {
                patient_id: Some(patient_id),
                ..Default::default()
            })
            .await?;
        let orders = uow.list_orders(Some(patient_id)).await?;

        Ok(PatientStats {
            wallet_balance: round_currency(wallet_balance),
            active_prescriptions: active_prescription_count(&prescriptions, patient_id),
            total_orders: orders.iter().filter(|o| o.is_completed()).count() as i64,
            total_spent: total_spent(&orders, patient_id),
        })
    }

    /// Every order as CSV, newest first
    pub async fn orders_csv(&self) -> AppResult<String> {
        let mut uow = self.store.begin().await?;
        let orders = uow.list_orders(None).await?;
        let rows: Vec<OrderReportRow> = orders
            .into_iter()
            .map(|order| OrderReportRow {
                order_id: order.id,
                line_count: order.items.len(),
                units: order.items.iter().map(|i| i64::from(i.quantity)).sum(),
                prescription_number: order.prescription_number,
                patient_id: order.patient_id,
                total_amount: order.total_amount,
                status: order.status.as_str().to_string(),
                created_at: order.created_at,
            })
            .collect();
        Self::export_to_csv(&rows)
    }

    /// Export data to CSV format
    pub fn export_to_csv<T: Serialize>(data: &[T]) -> AppResult<String> {
        let mut wtr = csv::Writer::from_writer(vec![]);
        for record in data {
            wtr.serialize(record)
                .map_err(|e| AppError::Internal(format!("CSV serialization error: {}", e)))?;
        }
        let csv_data = String::from_utf8(
            wtr.into_inner()
                .map_err(|e| AppError::Internal(format!("CSV writer error: {}", e)))?,
        )
        .map_err(|e| AppError::Internal(format!("UTF-8 conversion error: {}", e)))?;
        Ok(csv_data)
    }
}
