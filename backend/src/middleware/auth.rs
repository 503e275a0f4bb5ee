//! Authentication middleware
//!
//! JWT authentication and role-based access control

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::Role;
use crate::services::AuthService;
use crate::AppState;

/// Authenticated user information extracted from JWT
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: Role,
    pub email: String,
}

impl AuthUser {
    pub fn has_role(&self, role: Role) -> bool {
        self.role == role
    }

    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        roles.iter().any(|role| self.has_role(*role))
    }
}

/// Authentication middleware that validates JWT tokens
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match auth_header.and_then(|h| h.strip_prefix("Bearer ")) {
        Some(token) => token.trim(),
        None => return unauthorized_response("Missing or invalid Authorization header"),
    };

    let claims = match AuthService::decode_claims(token, &state.config.jwt.secret) {
        Ok(claims) => claims,
        Err(err) => return err.into_response(),
    };

    let user_id = match Uuid::parse_str(&claims.sub) {
        Ok(id) => id,
        Err(_) => return unauthorized_response("Invalid user ID in token"),
    };

    request.extensions_mut().insert(AuthUser {
        user_id,
        role: claims.role,
        email: claims.email,
    });

    next.run(request).await
}

fn unauthorized_response(message: &str) -> Response {
    AppError::Unauthorized {
        message: message.to_string(),
    }
    .into_response()
}

/// Extractor for authenticated user
/// Use this in handlers to get the current user
#[derive(Clone, Debug)]
pub struct CurrentUser(pub AuthUser);

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| AppError::Unauthorized {
                message: "Authentication required".to_string(),
            })
    }
}

/// Role guard for use in handlers
pub fn require_role(user: &AuthUser, roles: &[Role]) -> AppResult<()> {
    if user.has_any_role(roles) {
        Ok(())
    } else {
        let allowed: Vec<&str> = roles.iter().map(Role::as_str).collect();
        Err(AppError::Forbidden(format!(
            "Requires role: {}",
            allowed.join(" or ")
        )))
    }
}
