//! Validation utilities for the PharmaCare platform
//!
//! Field-level checks shared by the backend request handlers and the
//! browser (via WASM). Each returns a short message suitable for display.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::money::{has_currency_precision, max_amount};

/// Largest single wallet deposit accepted (10 000.00)
pub fn max_deposit() -> Decimal {
    Decimal::new(1_000_000, 2)
}

/// Date formats accepted for medicine expiry dates
pub const ACCEPTED_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%d/%m/%Y"];

// ============================================================================
// Account Validations
// ============================================================================

/// Validate email format (basic check)
pub fn validate_email(email: &str) -> Result<(), &'static str> {
    let email = email.trim();
    let Some((local, domain)) = email.split_once('@') else {
        return Err("Invalid email format");
    };
    if local.is_empty() || domain.contains('@') || !domain.contains('.') {
        return Err("Invalid email format");
    }
    if domain.starts_with('.') || domain.ends_with('.') || email.contains(char::is_whitespace) {
        return Err("Invalid email format");
    }
    Ok(())
}

/// Validate password strength
pub fn validate_password(password: &str) -> Result<(), &'static str> {
    if password.chars().count() < 8 {
        return Err("Password must be at least 8 characters");
    }
    Ok(())
}

/// Validate a patient national ID: exactly 10 digits
pub fn validate_national_id(id: &str) -> Result<(), &'static str> {
    if id.len() != 10 || !id.chars().all(|c| c.is_ascii_digit()) {
        return Err("National ID must be exactly 10 digits");
    }
    Ok(())
}

/// Validate a doctor/pharmacist practice code
/// Format: A-NNNNNN (e.g., A-123456)
pub fn validate_practice_code(code: &str) -> Result<(), &'static str> {
    match code.strip_prefix("A-") {
        Some(digits) if digits.len() == 6 && digits.chars().all(|c| c.is_ascii_digit()) => Ok(()),
        _ => Err("Practice code must be in format A-NNNNNN"),
    }
}

// ============================================================================
// Inventory Validations
// ============================================================================

/// Validate a medicine name is present
pub fn validate_medicine_name(name: &str) -> Result<(), &'static str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("Medicine name is required");
    }
    if trimmed.chars().count() > 200 {
        return Err("Medicine name must be at most 200 characters");
    }
    Ok(())
}

/// Validate a unit price: non-negative, at most two decimal places, within
/// the ledger range
pub fn validate_price(price: Decimal) -> Result<(), &'static str> {
    if price < Decimal::ZERO {
        return Err("Price cannot be negative");
    }
    if price > max_amount() {
        return Err("Price exceeds the maximum of 9999999999.99");
    }
    if !has_currency_precision(price) {
        return Err("Price must have at most 2 decimal places");
    }
    Ok(())
}

/// Validate a stock count
pub fn validate_stock(stock: i64) -> Result<i32, &'static str> {
    if stock < 0 {
        return Err("Stock cannot be negative");
    }
    i32::try_from(stock).map_err(|_| "Stock is too large")
}

/// Validate a requested quantity (prescription line or reservation)
pub fn validate_quantity(quantity: i64) -> Result<i32, &'static str> {
    if quantity <= 0 {
        return Err("Quantity must be greater than zero");
    }
    i32::try_from(quantity).map_err(|_| "Quantity is too large")
}

// ============================================================================
// Wallet Validations
// ============================================================================

/// Validate a deposit amount
pub fn validate_deposit_amount(amount: Decimal) -> Result<(), &'static str> {
    if amount <= Decimal::ZERO {
        return Err("Amount must be greater than zero");
    }
    if !has_currency_precision(amount) {
        return Err("Amount must have at most 2 decimal places");
    }
    if amount > max_deposit() {
        return Err("Amount exceeds the maximum deposit of 10000.00");
    }
    Ok(())
}

/// Validate a charge amount
pub fn validate_charge_amount(amount: Decimal) -> Result<(), &'static str> {
    if amount <= Decimal::ZERO {
        return Err("Amount must be greater than zero");
    }
    if !has_currency_precision(amount) {
        return Err("Amount must have at most 2 decimal places");
    }
    Ok(())
}

// ============================================================================
// Dates
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{input}' is not a valid date (expected YYYY-MM-DD, MM/DD/YYYY or DD/MM/YYYY)")]
pub struct ParseDateError {
    pub input: String,
}

/// Parse a calendar date in any of the accepted formats.
///
/// Ambiguous slash dates such as `03/04/2025` resolve as month/day first.
pub fn parse_calendar_date(input: &str) -> Result<NaiveDate, ParseDateError> {
    let trimmed = input.trim();
    ACCEPTED_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
        .ok_or_else(|| ParseDateError {
            input: trimmed.to_string(),
        })
}
