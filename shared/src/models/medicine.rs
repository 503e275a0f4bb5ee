//! Medicine inventory models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stock level below which a medicine counts as low stock
pub const LOW_STOCK_THRESHOLD: i32 = 10;

/// Days before expiry at which a medicine starts raising an expiry alert
pub const EXPIRY_WARNING_DAYS: i64 = 30;

/// A medicine held in the pharmacy inventory
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Medicine {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub manufacturer: String,
    pub batch_number: String,
    pub expiry_date: NaiveDate,
    /// Unit price, two decimal places
    pub price: Decimal,
    pub stock: i32,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Medicine {
    pub fn is_low_stock(&self) -> bool {
        self.stock < LOW_STOCK_THRESHOLD
    }

    pub fn can_supply(&self, quantity: i32) -> bool {
        i64::from(self.stock) >= i64::from(quantity)
    }

    /// Case-insensitive substring match on name, manufacturer or category
    pub fn matches(&self, query: &str) -> bool {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        [&self.name, &self.manufacturer, &self.category]
            .iter()
            .any(|field| field.to_lowercase().contains(&needle))
    }

    pub fn days_until_expiry(&self, today: NaiveDate) -> i64 {
        (self.expiry_date - today).num_days()
    }
}

/// Kind of inventory alert
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    LowStock,
    Expiring,
    Expired,
}

/// Alert derived from the current inventory state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MedicineAlert {
    pub medicine_id: Uuid,
    pub medicine_name: String,
    pub kind: AlertKind,
    pub message: String,
}
