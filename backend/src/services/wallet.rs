//! Wallet ledger: per-patient balance and its append-only transaction log
//!
//! The balance column is a cache of the signed sum of the log. It is only
//! ever changed together with a transaction append, inside one unit of work.

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{WalletTransaction, WalletTransactionStatus, WalletTransactionType};
use crate::services::retry::{with_retries, RetryPolicy};
use crate::store::{DynStore, UnitOfWork};
use shared::{bounded_amount, round_currency, validate_charge_amount, validate_deposit_amount};

/// Wallet ledger service
#[derive(Clone)]
pub struct WalletLedger {
    store: DynStore,
    retry: RetryPolicy,
}

/// What a charge pays for
#[derive(Debug, Clone)]
pub struct ChargeReference {
    pub reference: String,
    pub description: String,
    pub order_id: Option<Uuid>,
}

impl WalletLedger {
    pub fn new(store: DynStore) -> Self {
        Self {
            store,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub async fn get_balance(&self, patient_id: Uuid) -> AppResult<Decimal> {
        let mut uow = self.store.begin().await?;
        uow.wallet_balance(patient_id)
            .await?
            .map(round_currency)
            .ok_or_else(|| AppError::NotFound("Wallet".to_string()))
    }

    /// Credit the wallet and append a deposit transaction
    pub async fn deposit(&self, patient_id: Uuid, amount: Decimal) -> AppResult<WalletTransaction> {
        validate_deposit_amount(amount).map_err(|m| AppError::validation("amount", m))?;
        let amount = round_currency(amount);

        let transaction = with_retries(&self.retry, "deposit", move || async move {
            let mut uow = self.store.begin().await?;
            let balance = uow
                .lock_wallet(patient_id)
                .await?
                .ok_or_else(|| AppError::NotFound("Wallet".to_string()))?;
            bounded_amount(balance + amount).map_err(|_| {
                AppError::validation("amount", "Deposit would exceed the maximum wallet balance")
            })?;

            let balance_after = uow
                .adjust_wallet(patient_id, amount)
                .await?
                .ok_or_else(|| AppError::Internal("Deposit left wallet unchanged".to_string()))?;

            let now = Utc::now();
            let transaction = WalletTransaction {
                id: Uuid::new_v4(),
                patient_id,
                transaction_type: WalletTransactionType::Deposit,
                amount,
                balance_after: round_currency(balance_after),
                status: WalletTransactionStatus::Completed,
                reference: format!("DEP-{}", now.format("%Y%m%d%H%M%S%3f")),
                description: "Wallet deposit".to_string(),
                order_id: None,
                created_at: now,
            };
            uow.insert_wallet_transaction(&transaction).await?;
            uow.commit().await?;
            Ok(transaction)
        })
        .await?;

        tracing::info!(
            patient_id = %patient_id,
            amount = %transaction.amount,
            balance = %transaction.balance_after,
            "Wallet deposit recorded"
        );
        Ok(transaction)
    }

    /// Debit the wallet when it can cover `amount`, appending a payment
    pub async fn charge(
        &self,
        patient_id: Uuid,
        amount: Decimal,
        reference: ChargeReference,
    ) -> AppResult<WalletTransaction> {
        let reference = &reference;
        let transaction = with_retries(&self.retry, "charge", move || async move {
            let mut uow = self.store.begin().await?;
            let transaction =
                Self::charge_in(uow.as_mut(), patient_id, amount, reference.clone()).await?;
            uow.commit().await?;
            Ok(transaction)
        })
        .await?;

        tracing::info!(
            patient_id = %patient_id,
            amount = %transaction.amount,
            reference = %transaction.reference,
            "Wallet charged"
        );
        Ok(transaction)
    }

    /// Charge inside a caller-owned unit of work
    pub async fn charge_in(
        uow: &mut dyn UnitOfWork,
        patient_id: Uuid,
        amount: Decimal,
        reference: ChargeReference,
    ) -> AppResult<WalletTransaction> {
        validate_charge_amount(amount).map_err(|m| AppError::validation("amount", m))?;
        let amount = round_currency(amount);

        let available = uow
            .lock_wallet(patient_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Wallet".to_string()))?;

        let balance_after = uow
            .adjust_wallet(patient_id, -amount)
            .await?
            .ok_or_else(|| AppError::InsufficientFunds {
                required: amount,
                available: round_currency(available),
            })?;

        let transaction = WalletTransaction {
            id: Uuid::new_v4(),
            patient_id,
            transaction_type: WalletTransactionType::Payment,
            amount,
            balance_after: round_currency(balance_after),
            status: WalletTransactionStatus::Completed,
            reference: reference.reference,
            description: reference.description,
            order_id: reference.order_id,
            created_at: Utc::now(),
        };
        uow.insert_wallet_transaction(&transaction).await?;
        Ok(transaction)
    }

    /// Most recent first
    pub async fn list_transactions(&self, patient_id: Uuid) -> AppResult<Vec<WalletTransaction>> {
        let mut uow = self.store.begin().await?;
        if uow.wallet_balance(patient_id).await?.is_none() {
            return Err(AppError::NotFound("Wallet".to_string()));
        }
        uow.list_wallet_transactions(patient_id).await
    }
}
