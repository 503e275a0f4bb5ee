//! WebAssembly module for the PharmaCare web client
//!
//! Provides client-side previews for:
//! - Order totals before checkout
//! - Signup identifier checks
//! - Low-stock and expiry badges

use rust_decimal::Decimal;
use std::str::FromStr;
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::types::*;
pub use shared::validation::*;

use shared::{order_total, PricedLine};

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    web_sys::console::log_1(&JsValue::from_str("PharmaCare client helpers loaded"));
}

fn order_total_from_json(lines_json: &str) -> Result<String, String> {
    let lines: Vec<PricedLine> =
        serde_json::from_str(lines_json).map_err(|e| format!("Invalid lines JSON: {}", e))?;
    if let Some(line) = lines.iter().find(|l| l.quantity <= 0) {
        return Err(format!("Quantity must be positive for {}", line.medicine_id));
    }
    order_total(&lines)
        .map(|total| total.to_string())
        .map_err(|e| e.to_string())
}

/// Total for `[{medicine_id, quantity, unit_price}]`, as a 2 dp string
#[wasm_bindgen]
pub fn calculate_order_total(lines_json: &str) -> Result<String, JsValue> {
    order_total_from_json(lines_json).map_err(|e| JsValue::from_str(&e))
}

#[wasm_bindgen]
pub fn is_low_stock(stock: i32) -> bool {
    stock < LOW_STOCK_THRESHOLD
}

#[wasm_bindgen]
pub fn is_valid_national_id(id: &str) -> bool {
    validate_national_id(id.trim()).is_ok()
}

#[wasm_bindgen]
pub fn is_valid_practice_code(code: &str) -> bool {
    validate_practice_code(&code.trim().to_uppercase()).is_ok()
}

#[wasm_bindgen]
pub fn is_valid_rx_number(number: &str) -> bool {
    is_valid_prescription_number(number.trim())
}

/// Error message for a deposit amount, or `None` when it would be accepted
#[wasm_bindgen]
pub fn deposit_amount_error(amount: &str) -> Option<String> {
    match Decimal::from_str(amount.trim()) {
        Ok(value) => validate_deposit_amount(value).err().map(str::to_string),
        Err(_) => Some("Amount must be a number".to_string()),
    }
}

/// "expired", "expiring" or "ok" for a medicine's expiry date as of `today`
#[wasm_bindgen]
pub fn expiry_status(expiry_date: &str, today: &str) -> Result<String, JsValue> {
    expiry_label(expiry_date, today).map_err(|e| JsValue::from_str(&e))
}

fn expiry_label(expiry_date: &str, today: &str) -> Result<String, String> {
    let expiry = parse_calendar_date(expiry_date).map_err(|e| e.to_string())?;
    let today = parse_calendar_date(today).map_err(|e| e.to_string())?;
    let days = (expiry - today).num_days();
    let label = if days < 0 {
        "expired"
    } else if days <= EXPIRY_WARNING_DAYS {
        "expiring"
    } else {
        "ok"
    };
    Ok(label.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_total_from_json() {
        let lines = r#"[
            {"medicine_id": "6f1c3a52-8d4e-4f7b-9a0c-2b5d7e8f9a10", "quantity": 3, "unit_price": "8.50"},
            {"medicine_id": "0b9e2d41-7c3f-4e6a-8b1d-9f0a1b2c3d4e", "quantity": 2, "unit_price": "6.99"}
        ]"#;
        assert_eq!(order_total_from_json(lines).unwrap(), "39.48");
        assert!(order_total_from_json("not json").is_err());
        let huge = r#"[{"medicine_id":"00000000-0000-0000-0000-000000000001","quantity":2,"unit_price":"79228162514264337593543950335"}]"#;
        assert!(order_total_from_json(huge).is_err());
    }

    #[test]
    fn test_order_total_rejects_zero_quantity() {
        let lines = r#"[{"medicine_id": "6f1c3a52-8d4e-4f7b-9a0c-2b5d7e8f9a10", "quantity": 0, "unit_price": "1.00"}]"#;
        assert!(order_total_from_json(lines).is_err());
    }

    #[test]
    fn test_identifier_checks() {
        assert!(is_valid_national_id(" 1234567890 "));
        assert!(!is_valid_national_id("12345"));
        assert!(is_valid_practice_code("a-123456"));
        assert!(!is_valid_practice_code("123456"));
        assert!(is_valid_rx_number("RX-20241120-007"));
        assert!(!is_valid_rx_number("RX-2024-7"));
    }

    #[test]
    fn test_low_stock_and_deposit() {
        assert!(is_low_stock(9));
        assert!(!is_low_stock(10));
        assert_eq!(deposit_amount_error("50.00"), None);
        assert!(deposit_amount_error("0").is_some());
        assert!(deposit_amount_error("abc").is_some());
    }

    #[test]
    fn test_expiry_label() {
        assert_eq!(expiry_label("2024-11-01", "2024-11-20").unwrap(), "expired");
        assert_eq!(expiry_label("2024-12-15", "2024-11-20").unwrap(), "expiring");
        assert_eq!(expiry_label("2025-12-31", "2024-11-20").unwrap(), "ok");
        assert!(expiry_label("soon", "2024-11-20").is_err());
    }
}
