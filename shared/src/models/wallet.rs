//! Wallet ledger models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Direction of a wallet movement
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WalletTransactionType {
    Deposit,
    Payment,
}

impl WalletTransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletTransactionType::Deposit => "deposit",
            WalletTransactionType::Payment => "payment",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "deposit" => Some(WalletTransactionType::Deposit),
            "payment" => Some(WalletTransactionType::Payment),
            _ => None,
        }
    }

    /// Apply the type's sign to a (positive) amount
    pub fn signed(&self, amount: Decimal) -> Decimal {
        match self {
            WalletTransactionType::Deposit => amount,
            WalletTransactionType::Payment => -amount,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum WalletTransactionStatus {
    #[default]
    Completed,
}

impl WalletTransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletTransactionStatus::Completed => "completed",
        }
    }
}

/// Immutable wallet ledger entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WalletTransaction {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub transaction_type: WalletTransactionType,
    /// Always positive; the sign comes from `transaction_type`
    pub amount: Decimal,
    /// Wallet balance right after this entry was applied
    pub balance_after: Decimal,
    pub status: WalletTransactionStatus,
    pub reference: String,
    pub description: String,
    pub order_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl WalletTransaction {
    pub fn signed_amount(&self) -> Decimal {
        self.transaction_type.signed(self.amount)
    }
}

/// Balance implied by a transaction log
pub fn ledger_balance(transactions: &[WalletTransaction]) -> Decimal {
    transactions
        .iter()
        .fold(Decimal::ZERO, |acc, t| acc + t.signed_amount())
}
