//! HTTP handlers for orders

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{require_role, CurrentUser};
use crate::models::{Order, Role};
use crate::services::fulfillment::PlaceOrderInput;
use crate::services::OrderFulfillmentService;
use crate::AppState;

/// Query parameters for listing orders
#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    pub patient: Option<Uuid>,
}

fn fulfillment(state: &AppState) -> OrderFulfillmentService {
    OrderFulfillmentService::new(state.store.clone()).with_retry(state.retry_policy())
}

/// Fulfill the selected lines of a prescription (patient only)
pub async fn place_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<PlaceOrderInput>,
) -> AppResult<(StatusCode, Json<Order>)> {
    require_role(&current_user.0, &[Role::Patient])?;
    let order = fulfillment(&state)
        .place_order(
            current_user.0.user_id,
            &input.prescription_number,
            &input.selected_line_indices,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// Patients see their own orders; pharmacists see all or one patient's
pub async fn list_orders(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ListOrdersQuery>,
) -> AppResult<Json<Vec<Order>>> {
    let user = &current_user.0;
    require_role(user, &[Role::Patient, Role::Pharmacist])?;

    let service = fulfillment(&state);
    let orders = match (user.role, query.patient) {
        (Role::Pharmacist, Some(patient_id)) => service.list_orders(patient_id).await?,
        (Role::Pharmacist, None) => service.list_all_orders().await?,
        _ => service.list_orders(user.user_id).await?,
    };
    Ok(Json(orders))
}

/// Get a single order
pub async fn get_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<Order>> {
    let order = fulfillment(&state)
        .get_order(order_id, current_user.0.user_id, current_user.0.role)
        .await?;
    Ok(Json(order))
}
