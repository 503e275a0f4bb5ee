//! Common types used across the platform

use serde::{Deserialize, Serialize};

/// Currency every wallet and price is denominated in
pub const CURRENCY: &str = "USD";

/// Platform roles. A user's role is fixed at signup.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Pharmacist,
    Doctor,
    Patient,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Pharmacist => "pharmacist",
            Role::Doctor => "doctor",
            Role::Patient => "patient",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pharmacist" => Some(Role::Pharmacist),
            "doctor" => Some(Role::Doctor),
            "patient" => Some(Role::Patient),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
