//! User and role-specific profile models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::Role;

/// A user account on the platform
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(flatten)]
    pub profile: UserProfile,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn role(&self) -> Role {
        self.profile.role()
    }
}

/// Role-specific identity. Each role carries the identifier it was
/// registered with, so callers never check for optional fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum UserProfile {
    Pharmacist { practice_code: String },
    Doctor { practice_code: String },
    Patient { national_id: String },
}

impl UserProfile {
    pub fn role(&self) -> Role {
        match self {
            UserProfile::Pharmacist { .. } => Role::Pharmacist,
            UserProfile::Doctor { .. } => Role::Doctor,
            UserProfile::Patient { .. } => Role::Patient,
        }
    }

    pub fn national_id(&self) -> Option<&str> {
        match self {
            UserProfile::Patient { national_id } => Some(national_id),
            _ => None,
        }
    }

    pub fn practice_code(&self) -> Option<&str> {
        match self {
            UserProfile::Pharmacist { practice_code } | UserProfile::Doctor { practice_code } => {
                Some(practice_code)
            }
            UserProfile::Patient { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_role() {
        let profile = UserProfile::Patient {
            national_id: "0012345678".to_string(),
        };
        assert_eq!(profile.role(), Role::Patient);
        assert_eq!(profile.national_id(), Some("0012345678"));
        assert_eq!(profile.practice_code(), None);
    }

    #[test]
    fn test_user_serializes_role_tag_inline() {
        let user = User {
            id: Uuid::nil(),
            name: "Dr. Sara".to_string(),
            email: "sara@clinic.com".to_string(),
            profile: UserProfile::Doctor {
                practice_code: "A-123456".to_string(),
            },
            created_at: Utc::now(),
        };
        let value = serde_json::to_value(&user).unwrap();
        assert_eq!(value["role"], "doctor");
        assert_eq!(value["practice_code"], "A-123456");
    }
}
