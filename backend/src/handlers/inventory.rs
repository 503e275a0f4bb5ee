//! HTTP handlers for the medicine catalogue

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{require_role, CurrentUser};
use crate::models::{Medicine, MedicineAlert, Role};
use crate::services::inventory::{MedicineInput, MedicinePatch};
use crate::services::InventoryLedger;
use crate::AppState;

/// Query parameters for listing medicines
#[derive(Debug, Deserialize)]
pub struct ListMedicinesQuery {
    pub q: Option<String>,
}

fn ledger(state: &AppState) -> InventoryLedger {
    InventoryLedger::new(state.store.clone()).with_retry(state.retry_policy())
}

/// List medicines, optionally filtered by a search term
pub async fn list_medicines(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<ListMedicinesQuery>,
) -> AppResult<Json<Vec<Medicine>>> {
    let search = query.q.as_deref().map(str::trim).filter(|q| !q.is_empty());
    let medicines = ledger(&state).list_medicines(search).await?;
    Ok(Json(medicines))
}

/// Get a single medicine
pub async fn get_medicine(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(medicine_id): Path<Uuid>,
) -> AppResult<Json<Medicine>> {
    let medicine = ledger(&state).get_medicine(medicine_id).await?;
    Ok(Json(medicine))
}

/// Add a medicine to the catalogue
pub async fn create_medicine(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<MedicineInput>,
) -> AppResult<(StatusCode, Json<Medicine>)> {
    require_role(&current_user.0, &[Role::Pharmacist])?;
    let medicine = ledger(&state).create_medicine(input).await?;
    Ok((StatusCode::CREATED, Json(medicine)))
}

/// Update the given fields of a medicine
pub async fn update_medicine(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(medicine_id): Path<Uuid>,
    Json(input): Json<MedicinePatch>,
) -> AppResult<Json<Medicine>> {
    require_role(&current_user.0, &[Role::Pharmacist])?;
    let medicine = ledger(&state).update_medicine(medicine_id, input).await?;
    Ok(Json(medicine))
}

/// Remove a medicine from the catalogue
pub async fn delete_medicine(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(medicine_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    require_role(&current_user.0, &[Role::Pharmacist])?;
    ledger(&state).remove_medicine(medicine_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Low-stock and expiry alerts
pub async fn medicine_alerts(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<MedicineAlert>>> {
    require_role(&current_user.0, &[Role::Pharmacist])?;
    let alerts = ledger(&state).alerts(Utc::now().date_naive()).await?;
    Ok(Json(alerts))
}
