//! Authentication handlers

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;

use crate::error::AppResult;
use crate::middleware::{require_role, CurrentUser};
use crate::models::{Role, User};
use crate::services::auth::{AuthSession, RegisterInput};
use crate::services::AuthService;
use crate::AppState;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Login endpoint handler
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> AppResult<Json<AuthSession>> {
    let auth_service = AuthService::new(state.store.clone(), &state.config);
    let session = auth_service.login(&body.email, &body.password).await?;
    Ok(Json(session))
}

/// Register endpoint handler
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterInput>,
) -> AppResult<(StatusCode, Json<AuthSession>)> {
    let auth_service = AuthService::new(state.store.clone(), &state.config);
    let session = auth_service.register(body).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// The authenticated user's own record
pub async fn me(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<User>> {
    let auth_service = AuthService::new(state.store.clone(), &state.config);
    let user = auth_service.current_user(current_user.0.user_id).await?;
    Ok(Json(user))
}

/// All registered users (pharmacist only)
pub async fn list_users(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<User>>> {
    require_role(&current_user.0, &[Role::Pharmacist])?;
    let auth_service = AuthService::new(state.store.clone(), &state.config);
    let users = auth_service.list_users().await?;
    Ok(Json(users))
}
