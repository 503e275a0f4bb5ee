//! HTTP handlers for the patient wallet

use axum::{extract::State, Json};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::middleware::{require_role, CurrentUser};
use crate::models::{Role, WalletTransaction};
use crate::services::WalletLedger;
use crate::AppState;
use shared::CURRENCY;

#[derive(Debug, Deserialize)]
pub struct DepositRequest {
    pub amount: Decimal,
}

#[derive(Debug, Serialize)]
pub struct DepositResponse {
    pub balance: Decimal,
    pub transaction: WalletTransaction,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub balance: Decimal,
    pub currency: String,
}

fn ledger(state: &AppState) -> WalletLedger {
    WalletLedger::new(state.store.clone()).with_retry(state.retry_policy())
}

/// Add funds to the caller's wallet
pub async fn deposit(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(body): Json<DepositRequest>,
) -> AppResult<Json<DepositResponse>> {
    require_role(&current_user.0, &[Role::Patient])?;
    let transaction = ledger(&state)
        .deposit(current_user.0.user_id, body.amount)
        .await?;
    Ok(Json(DepositResponse {
        balance: transaction.balance_after,
        transaction,
    }))
}

pub async fn get_balance(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<BalanceResponse>> {
    require_role(&current_user.0, &[Role::Patient])?;
    let balance = ledger(&state).get_balance(current_user.0.user_id).await?;
    Ok(Json(BalanceResponse {
        balance,
        currency: CURRENCY.to_string(),
    }))
}

/// Wallet history, most recent first
pub async fn list_transactions(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<WalletTransaction>>> {
    require_role(&current_user.0, &[Role::Patient])?;
    let transactions = ledger(&state)
        .list_transactions(current_user.0.user_id)
        .await?;
    Ok(Json(transactions))
}
