//! Read-side aggregations over ledger state
//!
//! Everything here is a pure function of the records passed in. Nothing is
//! cached, so figures always agree with the ledgers they were computed from.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    AlertKind, Medicine, MedicineAlert, Order, Prescription, EXPIRY_WARNING_DAYS,
    LOW_STOCK_THRESHOLD,
};
use crate::money::{round_currency, sum_amounts};

/// Revenue over a set of orders
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RevenueSummary {
    pub total_revenue: Decimal,
    pub orders_count: i64,
    pub average_order_value: Decimal,
}

/// Σ completed order totals, count and average (0 when there are no orders)
pub fn revenue_summary(orders: &[Order]) -> RevenueSummary {
    let completed: Vec<&Order> = orders.iter().filter(|o| o.is_completed()).collect();
    let total_revenue = sum_amounts(completed.iter().map(|o| o.total_amount));
    let orders_count = completed.len() as i64;
    let average_order_value = if orders_count == 0 {
        round_currency(Decimal::ZERO)
    } else {
        round_currency(total_revenue / Decimal::from(orders_count))
    };
    RevenueSummary {
        total_revenue,
        orders_count,
        average_order_value,
    }
}

pub fn low_stock_count(medicines: &[Medicine]) -> i64 {
    medicines.iter().filter(|m| m.stock < LOW_STOCK_THRESHOLD).count() as i64
}

pub fn active_prescription_count(prescriptions: &[Prescription], patient_id: Uuid) -> i64 {
    prescriptions
        .iter()
        .filter(|p| p.patient_id == patient_id && p.is_active())
        .count() as i64
}

/// Total a patient has paid for completed orders
pub fn total_spent(orders: &[Order], patient_id: Uuid) -> Decimal {
    sum_amounts(
        orders
            .iter()
            .filter(|o| o.patient_id == patient_id && o.is_completed())
            .map(|o| o.total_amount),
    )
}

/// Low-stock and expiry alerts for the current inventory.
///
/// A medicine can raise both a stock alert and an expiry alert.
pub fn inventory_alerts(medicines: &[Medicine], today: NaiveDate) -> Vec<MedicineAlert> {
    let mut alerts = Vec::new();
    for medicine in medicines {
        if medicine.is_low_stock() {
            alerts.push(MedicineAlert {
                medicine_id: medicine.id,
                medicine_name: medicine.name.clone(),
                kind: AlertKind::LowStock,
                message: format!("{} has only {} units left", medicine.name, medicine.stock),
            });
        }

        let days = medicine.days_until_expiry(today);
        if days < 0 {
            alerts.push(MedicineAlert {
                medicine_id: medicine.id,
                medicine_name: medicine.name.clone(),
                kind: AlertKind::Expired,
                message: format!("{} expired on {}", medicine.name, medicine.expiry_date),
            });
        } else if days <= EXPIRY_WARNING_DAYS {
            alerts.push(MedicineAlert {
                medicine_id: medicine.id,
                medicine_name: medicine.name.clone(),
                kind: AlertKind::Expiring,
                message: format!("{} expires in {} days", medicine.name, days),
            });
        }
    }
    alerts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OrderStatus, PrescriptionStatus};
    use chrono::Utc;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn order(patient_id: Uuid, total: &str) -> Order {
        Order {
            id: Uuid::new_v4(),
            prescription_id: Uuid::new_v4(),
            prescription_number: "RX-20240315-001".to_string(),
            patient_id,
            items: vec![],
            total_amount: dec(total),
            status: OrderStatus::Completed,
            created_at: Utc::now(),
        }
    }

    fn medicine(name: &str, stock: i32, expiry: NaiveDate) -> Medicine {
        Medicine {
            id: Uuid::new_v4(),
            name: name.to_string(),
            category: "General".to_string(),
            manufacturer: "PharmaCorp".to_string(),
            batch_number: "B-1".to_string(),
            expiry_date: expiry,
            price: dec("1.00"),
            stock,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_revenue_summary() {
        let patient = Uuid::new_v4();
        let summary = revenue_summary(&[order(patient, "31.98"), order(patient, "39.48")]);
        assert_eq!(summary.total_revenue, dec("71.46"));
        assert_eq!(summary.orders_count, 2);
        assert_eq!(summary.average_order_value, dec("35.73"));
    }

    #[test]
    fn test_revenue_summary_empty() {
        let summary = revenue_summary(&[]);
        assert_eq!(summary.total_revenue, Decimal::ZERO);
        assert_eq!(summary.orders_count, 0);
        assert_eq!(summary.average_order_value.to_string(), "0.00");
    }

    #[test]
    fn test_total_spent_filters_by_patient() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let orders = vec![order(a, "10.00"), order(b, "5.00"), order(a, "2.50")];
        assert_eq!(total_spent(&orders, a), dec("12.50"));
        assert_eq!(total_spent(&orders, Uuid::new_v4()), Decimal::ZERO);
    }

    #[test]
    fn test_active_prescription_count() {
        let patient = Uuid::new_v4();
        let rx = |status| Prescription {
            id: Uuid::new_v4(),
            prescription_number: "RX-20240315-001".to_string(),
            doctor_id: Uuid::new_v4(),
            patient_id: patient,
            patient_national_id: "0012345678".to_string(),
            items: vec![],
            notes: None,
            status,
            created_at: Utc::now(),
            fulfilled_at: None,
        };
        let list = vec![
            rx(PrescriptionStatus::Active),
            rx(PrescriptionStatus::Fulfilled),
            rx(PrescriptionStatus::Active),
        ];
        assert_eq!(active_prescription_count(&list, patient), 2);
    }

    #[test]
    fn test_inventory_alerts() {
        let today = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let far = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let medicines = vec![
            medicine("Amoxicillin 500mg", 150, far),
            medicine("Ibuprofen 200mg", 8, far),
            medicine("Paracetamol 500mg", 200, NaiveDate::from_ymd_opt(2025, 1, 20).unwrap()),
            medicine("Old Stock", 50, NaiveDate::from_ymd_opt(2024, 12, 1).unwrap()),
        ];

        assert_eq!(low_stock_count(&medicines), 1);

        let alerts = inventory_alerts(&medicines, today);
        let kinds: Vec<(String, AlertKind)> = alerts
            .iter()
            .map(|a| (a.medicine_name.clone(), a.kind))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("Ibuprofen 200mg".to_string(), AlertKind::LowStock),
                ("Paracetamol 500mg".to_string(), AlertKind::Expiring),
                ("Old Stock".to_string(), AlertKind::Expired),
            ]
        );
    }
}
