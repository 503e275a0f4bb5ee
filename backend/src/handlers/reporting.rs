//! HTTP handlers for dashboards and exports

use axum::{extract::State, http::header, response::IntoResponse, Json};

use crate::error::AppResult;
use crate::middleware::{require_role, CurrentUser};
use crate::models::Role;
use crate::services::reporting::{PatientStats, PharmacyStats};
use crate::services::ReportingService;
use crate::AppState;

/// Pharmacist dashboard
pub async fn pharmacy_stats(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<PharmacyStats>> {
    require_role(&current_user.0, &[Role::Pharmacist])?;
    let stats = ReportingService::new(state.store.clone())
        .pharmacy_stats()
        .await?;
    Ok(Json(stats))
}

/// Patient dashboard
pub async fn patient_stats(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<PatientStats>> {
    require_role(&current_user.0, &[Role::Patient])?;
    let stats = ReportingService::new(state.store.clone())
        .patient_stats(current_user.0.user_id)
        .await?;
    Ok(Json(stats))
}

/// Every order as a CSV download
pub async fn export_orders_csv(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<impl IntoResponse> {
    require_role(&current_user.0, &[Role::Pharmacist])?;
    let csv = ReportingService::new(state.store.clone())
        .orders_csv()
        .await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"orders.csv\""),
        ],
        csv,
    ))
}
