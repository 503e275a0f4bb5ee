//! Prescription models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::money::{checked_sum, line_total, AmountOverflow};

/// Lifecycle of a prescription. Moves from active to fulfilled once.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PrescriptionStatus {
    Active,
    Fulfilled,
}

impl PrescriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrescriptionStatus::Active => "active",
            PrescriptionStatus::Fulfilled => "fulfilled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(PrescriptionStatus::Active),
            "fulfilled" => Some(PrescriptionStatus::Fulfilled),
            _ => None,
        }
    }
}

/// One medicine line on a prescription
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrescriptionItem {
    pub medicine_id: Uuid,
    pub medicine_name: String,
    pub dosage: String,
    pub duration: String,
    pub quantity: i32,
    /// Price shown when the prescription was written. Orders are charged
    /// the price current at fulfillment time.
    pub quoted_unit_price: Decimal,
}

/// A doctor-issued prescription for a patient
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Prescription {
    pub id: Uuid,
    /// Human-readable number, e.g. "RX-20240315-042"
    pub prescription_number: String,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub patient_national_id: String,
    pub items: Vec<PrescriptionItem>,
    pub notes: Option<String>,
    pub status: PrescriptionStatus,
    pub created_at: DateTime<Utc>,
    pub fulfilled_at: Option<DateTime<Utc>>,
}

impl Prescription {
    pub fn is_active(&self) -> bool {
        self.status == PrescriptionStatus::Active
    }

    /// Total at the quoted (creation-time) prices
    pub fn quoted_total(&self) -> Result<Decimal, AmountOverflow> {
        let totals = self
            .items
            .iter()
            .map(|item| line_total(item.quantity, item.quoted_unit_price))
            .collect::<Result<Vec<_>, _>>()?;
        checked_sum(totals)
    }
}

/// Build a prescription number from its creation date and a 3-digit suffix
pub fn format_prescription_number(date: NaiveDate, suffix: u16) -> String {
    format!("RX-{}-{:03}", date.format("%Y%m%d"), suffix % 1000)
}

/// Check the `RX-YYYYMMDD-NNN` shape, including that the date is real
pub fn is_valid_prescription_number(number: &str) -> bool {
    let parts: Vec<&str> = number.split('-').collect();
    if parts.len() != 3 || parts[0] != "RX" {
        return false;
    }
    let (date, suffix) = (parts[1], parts[2]);
    date.len() == 8
        && suffix.len() == 3
        && suffix.chars().all(|c| c.is_ascii_digit())
        && NaiveDate::parse_from_str(date, "%Y%m%d").is_ok()
}
