//! HTTP handlers for prescriptions

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::{require_role, CurrentUser};
use crate::models::{Prescription, PrescriptionStatus, Role};
use crate::services::prescription::CreatePrescriptionInput;
use crate::services::PrescriptionRegistry;
use crate::AppState;

/// Query parameters for listing prescriptions
#[derive(Debug, Deserialize)]
pub struct ListPrescriptionsQuery {
    pub patient: Option<Uuid>,
    pub status: Option<String>,
}

fn registry(state: &AppState) -> PrescriptionRegistry {
    PrescriptionRegistry::new(state.store.clone()).with_retry(state.retry_policy())
}

/// Issue a prescription (doctor only)
pub async fn create_prescription(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreatePrescriptionInput>,
) -> AppResult<(StatusCode, Json<Prescription>)> {
    require_role(&current_user.0, &[Role::Doctor])?;
    let prescription = registry(&state)
        .create_prescription(current_user.0.user_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(prescription)))
}

/// Patients see their own, doctors what they issued, pharmacists everything
pub async fn list_prescriptions(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ListPrescriptionsQuery>,
) -> AppResult<Json<Vec<Prescription>>> {
    let status = match query.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => Some(PrescriptionStatus::parse(raw).ok_or_else(|| {
            AppError::validation("status", "Status must be active or fulfilled")
        })?),
        None => None,
    };

    let user = &current_user.0;
    let registry = registry(&state);
    let prescriptions = match user.role {
        Role::Patient => registry.get_for_patient(user.user_id, status).await?,
        Role::Doctor => {
            let issued = registry.list_for_doctor(user.user_id, status).await?;
            match query.patient {
                Some(patient_id) => issued
                    .into_iter()
                    .filter(|p| p.patient_id == patient_id)
                    .collect(),
                None => issued,
            }
        }
        Role::Pharmacist => match query.patient {
            Some(patient_id) => registry.get_for_patient(patient_id, status).await?,
            None => registry.list_all(status).await?,
        },
    };
    Ok(Json(prescriptions))
}

/// Look up a prescription by its RX number
pub async fn get_prescription(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(number): Path<String>,
) -> AppResult<Json<Prescription>> {
    let prescription = registry(&state)
        .get_visible_to(&number, current_user.0.user_id, current_user.0.role)
        .await?;
    Ok(Json(prescription))
}
