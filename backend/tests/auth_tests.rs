//! Authentication and authorization tests
//!
//! Property-based and unit tests for:
//! - Signup validation per role
//! - Login and token round trips
//! - Identifier formats

mod common;

use proptest::prelude::*;

use common::{memory_store, register_patient, test_config, PASSWORD};
use pharmacy_backend::error::AppError;
use pharmacy_backend::models::{Role, UserProfile};
use pharmacy_backend::services::auth::RegisterInput;
use pharmacy_backend::services::{AuthService, WalletLedger};
use shared::{validate_national_id, validate_practice_code};

fn signup(email: &str, role: &str) -> RegisterInput {
    RegisterInput {
        name: "Test User".to_string(),
        email: email.to_string(),
        password: PASSWORD.to_string(),
        role: role.to_string(),
        national_id: None,
        practice_code: None,
        identifier: None,
    }
}

// ============================================================================
// Property Test Strategies
// ============================================================================

fn national_id_strategy() -> impl Strategy<Value = String> {
    "[0-9]{10}"
}

fn practice_code_strategy() -> impl Strategy<Value = String> {
    "A-[0-9]{6}"
}

// ============================================================================
// Property-Based Tests
// ============================================================================

proptest! {
    #[test]
    fn test_generated_national_ids_are_valid(id in national_id_strategy()) {
        prop_assert!(validate_national_id(&id).is_ok());
    }

    #[test]
    fn test_wrong_length_national_ids_are_rejected(id in "[0-9]{1,9}|[0-9]{11,14}") {
        prop_assert!(validate_national_id(&id).is_err());
    }

    #[test]
    fn test_generated_practice_codes_are_valid(code in practice_code_strategy()) {
        prop_assert!(validate_practice_code(&code).is_ok());
    }

    #[test]
    fn test_practice_codes_need_the_prefix(code in "[B-Z]-[0-9]{6}|[0-9]{6}") {
        prop_assert!(validate_practice_code(&code).is_err());
    }
}

// ============================================================================
// Registration Tests
// ============================================================================

#[cfg(test)]
mod registration_tests {
    use super::*;

    #[tokio::test]
    async fn test_patient_signup_creates_wallet() {
        let store = memory_store();
        let auth = AuthService::new(store.clone(), &test_config());

        let mut input = signup("  New.Patient@Example.com ", "patient");
        input.national_id = Some("1234567890".to_string());
        let session = auth.register(input).await.unwrap();

        assert_eq!(session.user.email, "new.patient@example.com");
        assert_eq!(session.user.role(), Role::Patient);
        assert_eq!(session.token_type, "Bearer");
        assert!(!session.access_token.is_empty());
        assert_eq!(
            WalletLedger::new(store)
                .get_balance(session.user.id)
                .await
                .unwrap(),
            rust_decimal::Decimal::ZERO
        );
    }

    #[tokio::test]
    async fn test_identifier_fills_role_specific_field() {
        let store = memory_store();
        let auth = AuthService::new(store, &test_config());

        let mut doctor = signup("doc@example.com", "Doctor");
        doctor.identifier = Some("a-654321".to_string());
        let session = auth.register(doctor).await.unwrap();
        assert_eq!(
            session.user.profile,
            UserProfile::Doctor {
                practice_code: "A-654321".to_string()
            }
        );

        let mut patient = signup("pat@example.com", "patient");
        patient.identifier = Some("0987654321".to_string());
        let session = auth.register(patient).await.unwrap();
        assert_eq!(session.user.profile.national_id(), Some("0987654321"));
    }

    #[tokio::test]
    async fn test_signup_validation() {
        let auth = AuthService::new(memory_store(), &test_config());

        let mut short_password = signup("a@example.com", "patient");
        short_password.national_id = Some("1234567890".to_string());
        short_password.password = "short".to_string();

        let mut bad_email = signup("not-an-email", "patient");
        bad_email.national_id = Some("1234567890".to_string());

        let mut bad_national_id = signup("b@example.com", "patient");
        bad_national_id.national_id = Some("12345".to_string());

        let missing_national_id = signup("c@example.com", "patient");

        let mut bad_code = signup("d@example.com", "pharmacist");
        bad_code.practice_code = Some("123456".to_string());

        let mut bad_role = signup("e@example.com", "admin");
        bad_role.identifier = Some("A-123456".to_string());

        let cases = [
            (short_password, "password"),
            (bad_email, "email"),
            (bad_national_id, "national_id"),
            (missing_national_id, "national_id"),
            (bad_code, "practice_code"),
            (bad_role, "role"),
        ];
        for (input, expected) in cases {
            match auth.register(input).await {
                Err(AppError::Validation { field, .. }) => assert_eq!(field, expected),
                other => panic!("expected validation error on {}, got {:?}", expected, other),
            }
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_and_national_id() {
        let store = memory_store();
        register_patient(&store, "taken@example.com", "1234567890").await;
        let auth = AuthService::new(store, &test_config());

        let mut same_email = signup("TAKEN@example.com", "patient");
        same_email.national_id = Some("1111111111".to_string());
        assert!(matches!(
            auth.register(same_email).await,
            Err(AppError::DuplicateEntry(field)) if field == "email"
        ));

        let mut same_id = signup("fresh@example.com", "patient");
        same_id.national_id = Some("1234567890".to_string());
        assert!(matches!(
            auth.register(same_id).await,
            Err(AppError::DuplicateEntry(field)) if field == "national_id"
        ));
    }
}

// ============================================================================
// Login Tests
// ============================================================================

#[cfg(test)]
mod login_tests {
    use super::*;

    #[tokio::test]
    async fn test_login_issues_token_with_role() {
        let store = memory_store();
        let patient = register_patient(&store, "login@example.com", "1234567890").await;
        let auth = AuthService::new(store, &test_config());

        let session = auth.login("login@example.com", PASSWORD).await.unwrap();
        assert_eq!(session.user.id, patient.id);

        let claims = auth.validate_token(&session.access_token).unwrap();
        assert_eq!(claims.sub, patient.id.to_string());
        assert_eq!(claims.role, Role::Patient);
        assert_eq!(claims.email, "login@example.com");
        assert!(claims.exp > claims.iat);
    }

    #[tokio::test]
    async fn test_login_is_case_insensitive_on_email() {
        let store = memory_store();
        register_patient(&store, "case@example.com", "1234567890").await;
        let auth = AuthService::new(store, &test_config());

        assert!(auth.login("CASE@Example.com", PASSWORD).await.is_ok());
    }

    #[tokio::test]
    async fn test_bad_credentials_look_the_same() {
        let store = memory_store();
        register_patient(&store, "who@example.com", "1234567890").await;
        let auth = AuthService::new(store, &test_config());

        assert!(matches!(
            auth.login("who@example.com", "wrong-password").await,
            Err(AppError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.login("nobody@example.com", PASSWORD).await,
            Err(AppError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_tokens_from_another_secret_are_rejected() {
        let store = memory_store();
        register_patient(&store, "sig@example.com", "1234567890").await;
        let auth = AuthService::new(store.clone(), &test_config());
        let session = auth.login("sig@example.com", PASSWORD).await.unwrap();

        let mut other_config = test_config();
        other_config.jwt.secret = "a-different-secret".to_string();
        let other = AuthService::new(store, &other_config);

        assert!(matches!(
            other.validate_token(&session.access_token),
            Err(AppError::Unauthorized { .. })
        ));
        assert!(matches!(
            auth.validate_token("not.a.token"),
            Err(AppError::Unauthorized { .. })
        ));
    }

    #[tokio::test]
    async fn test_current_user_and_listing() {
        let store = memory_store();
        let patient = register_patient(&store, "me@example.com", "1234567890").await;
        common::register_doctor(&store, "doc@example.com").await;
        let auth = AuthService::new(store, &test_config());

        assert_eq!(auth.current_user(patient.id).await.unwrap(), patient);
        assert_eq!(auth.list_users().await.unwrap().len(), 2);
        assert!(matches!(
            auth.current_user(uuid::Uuid::new_v4()).await,
            Err(AppError::NotFound(_))
        ));
    }
}
