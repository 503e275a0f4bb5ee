//! Authentication service for user registration, login, and token management

use bcrypt::{hash, verify};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::{Role, User, UserProfile};
use crate::store::DynStore;
use shared::{validate_national_id, validate_password, validate_practice_code};

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    store: DynStore,
    jwt_secret: String,
    access_token_expiry: i64,
    bcrypt_cost: u32,
}

/// Input for registering a new account
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterInput {
    #[validate(length(min = 1, max = 100, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    pub role: String,
    /// Patients: 10-digit national ID
    pub national_id: Option<String>,
    /// Doctors and pharmacists: practice code A-NNNNNN
    pub practice_code: Option<String>,
    /// Fills whichever of the two above applies to the role
    pub identifier: Option<String>,
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // User ID
    pub role: Role,
    pub email: String,
    pub exp: i64,
    pub iat: i64,
}

/// Issued token plus the user it belongs to
#[derive(Debug, Serialize)]
pub struct AuthSession {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: User,
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl AuthService {
    /// Create a new AuthService instance
    pub fn new(store: DynStore, config: &Config) -> Self {
        Self {
            store,
            jwt_secret: config.jwt.secret.clone(),
            access_token_expiry: config.jwt.access_token_expiry,
            bcrypt_cost: config.password.bcrypt_cost,
        }
    }

    /// Register a new account. Patients get an empty wallet.
    pub async fn register(&self, input: RegisterInput) -> AppResult<AuthSession> {
        let input = RegisterInput {
            name: input.name.trim().to_string(),
            email: input.email.trim().to_lowercase(),
            ..input
        };
        input.validate()?;
        validate_password(&input.password).map_err(|m| AppError::validation("password", m))?;

        let role = Role::parse(&input.role).ok_or_else(|| {
            AppError::validation("role", "Role must be pharmacist, doctor or patient")
        })?;

        let identifier = non_empty(input.identifier.as_ref());
        let profile = match role {
            Role::Patient => {
                let national_id = non_empty(input.national_id.as_ref())
                    .or(identifier)
                    .ok_or_else(|| {
                        AppError::validation("national_id", "National ID is required for patients")
                    })?;
                validate_national_id(&national_id)
                    .map_err(|m| AppError::validation("national_id", m))?;
                UserProfile::Patient { national_id }
            }
            Role::Doctor | Role::Pharmacist => {
                let practice_code = non_empty(input.practice_code.as_ref())
                    .or(identifier)
                    .map(|c| c.to_uppercase())
                    .ok_or_else(|| {
                        AppError::validation(
                            "practice_code",
                            "Practice code is required for doctors and pharmacists",
                        )
                    })?;
                validate_practice_code(&practice_code)
                    .map_err(|m| AppError::validation("practice_code", m))?;
                if role == Role::Doctor {
                    UserProfile::Doctor { practice_code }
                } else {
                    UserProfile::Pharmacist { practice_code }
                }
            }
        };

        // Hash password
        let password_hash = hash(&input.password, self.bcrypt_cost)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?;

        let user = User {
            id: Uuid::new_v4(),
            name: input.name,
            email: input.email,
            profile,
            created_at: Utc::now(),
        };

        let mut uow = self.store.begin().await?;
        if uow.email_exists(&user.email).await? {
            return Err(AppError::DuplicateEntry("email".to_string()));
        }
        if let Some(national_id) = user.profile.national_id() {
            if uow.national_id_exists(national_id).await? {
                return Err(AppError::DuplicateEntry("national_id".to_string()));
            }
        }
        uow.insert_user(&user, &password_hash).await?;
        if role == Role::Patient {
            uow.create_wallet(user.id).await?;
        }
        uow.commit().await.map_err(|e| match e {
            // A concurrent signup claimed the same email or national ID
            AppError::TransactionConflict => AppError::DuplicateEntry("email".to_string()),
            other => other,
        })?;

        tracing::info!(user_id = %user.id, role = %role, "User registered");
        self.session_for(user)
    }

    /// Authenticate user with email and password
    pub async fn login(&self, email: &str, password: &str) -> AppResult<AuthSession> {
        let mut uow = self.store.begin().await?;
        let credentials = uow
            .find_credentials_by_email(email.trim())
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        // Verify password
        let valid = verify(password, &credentials.password_hash)
            .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))?;
        if !valid {
            return Err(AppError::InvalidCredentials);
        }

        tracing::info!(user_id = %credentials.user.id, "User logged in");
        self.session_for(credentials.user)
    }

    pub async fn current_user(&self, user_id: Uuid) -> AppResult<User> {
        let mut uow = self.store.begin().await?;
        uow.find_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User".to_string()))
    }

    pub async fn list_users(&self) -> AppResult<Vec<User>> {
        let mut uow = self.store.begin().await?;
        uow.list_users().await
    }

    /// Validate access token and return claims
    pub fn validate_token(&self, token: &str) -> AppResult<Claims> {
        Self::decode_claims(token, &self.jwt_secret)
    }

    pub fn decode_claims(token: &str, secret: &str) -> AppResult<Claims> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| AppError::Unauthorized {
            message: format!("Invalid token: {}", e),
        })?;

        Ok(token_data.claims)
    }

    fn session_for(&self, user: User) -> AppResult<AuthSession> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.to_string(),
            role: user.role(),
            email: user.email.clone(),
            exp: (now + Duration::seconds(self.access_token_expiry)).timestamp(),
            iat: now.timestamp(),
        };

        let access_token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))?;

        Ok(AuthSession {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.access_token_expiry,
            user,
        })
    }
}
