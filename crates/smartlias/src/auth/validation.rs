//! Username and PIN format checks.
//!
//! Checks run in a fixed order and the first failure is reported, so the
//! login form always shows a single, most basic problem first.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Error, Result};

/// Shortest accepted username.
pub const USERNAME_MIN_LEN: usize = 3;

/// Longest accepted username.
pub const USERNAME_MAX_LEN: usize = 32;

/// Every PIN has exactly this many digits.
pub const PIN_LENGTH: usize = 6;

fn username_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9._-]+$").expect("Invalid regex pattern"))
}

/// Validate a username as typed on the login form.
///
/// Returns the trimmed username.
///
/// # Errors
///
/// Returns [`Error::Validation`] naming the first rule that fails.
pub fn validate_username(username: &str) -> Result<&str> {
    let username = username.trim();
    if username.is_empty() {
        return Err(Error::validation("username", "Username is required"));
    }
    let len = username.chars().count();
    if len < USERNAME_MIN_LEN {
        return Err(Error::validation(
            "username",
            format!("Username must be at least {USERNAME_MIN_LEN} characters"),
        ));
    }
    if len > USERNAME_MAX_LEN {
        return Err(Error::validation(
            "username",
            format!("Username must be at most {USERNAME_MAX_LEN} characters"),
        ));
    }
    if !username_pattern().is_match(username) {
        return Err(Error::validation(
            "username",
            "Username can only contain letters, numbers, dots, underscores, and hyphens",
        ));
    }
    Ok(username)
}

/// Validate a PIN.
///
/// # Errors
///
/// Returns [`Error::Validation`] naming the first rule that fails.
pub fn validate_pin(pin: &str) -> Result<()> {
    validate_pin_field("pin", pin)
}

/// Validate a PIN, reporting failures against `field`.
pub(crate) fn validate_pin_field(field: &'static str, pin: &str) -> Result<()> {
    if pin.is_empty() {
        return Err(Error::validation(field, "PIN is required"));
    }
    if pin.chars().count() != PIN_LENGTH {
        return Err(Error::validation(
            field,
            format!("PIN must be exactly {PIN_LENGTH} digits"),
        ));
    }
    if !pin.chars().all(|c| c.is_ascii_digit()) {
        return Err(Error::validation(field, "PIN must contain only numbers"));
    }
    Ok(())
}

/// Validate both login fields, username first.
///
/// # Errors
///
/// Returns the first [`Error::Validation`] encountered.
pub fn validate_login(username: &str, pin: &str) -> Result<String> {
    let username = validate_username(username)?;
    validate_pin(pin)?;
    Ok(username.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(result: Result<impl std::fmt::Debug>) -> String {
        result.unwrap_err().to_string()
    }

    #[test]
    fn test_valid_username_is_trimmed() {
        assert_eq!(validate_username("  juan.dela-cruz_2 ").unwrap(), "juan.dela-cruz_2");
    }

    #[test]
    fn test_username_rules_in_order() {
        assert_eq!(message(validate_username("   ")), "Username is required");
        assert_eq!(
            message(validate_username("ab")),
            "Username must be at least 3 characters"
        );
        assert_eq!(
            message(validate_username(&"a".repeat(33))),
            "Username must be at most 32 characters"
        );
        assert_eq!(
            message(validate_username("juan cruz")),
            "Username can only contain letters, numbers, dots, underscores, and hyphens"
        );
        // Too short wins over bad characters.
        assert_eq!(
            message(validate_username("a!")),
            "Username must be at least 3 characters"
        );
    }

    #[test]
    fn test_username_boundaries() {
        assert!(validate_username("abc").is_ok());
        assert!(validate_username(&"a".repeat(32)).is_ok());
    }

    #[test]
    fn test_pin_rules_in_order() {
        assert!(validate_pin("031590").is_ok());
        assert_eq!(message(validate_pin("")), "PIN is required");
        assert_eq!(message(validate_pin("12345")), "PIN must be exactly 6 digits");
        assert_eq!(message(validate_pin("1234567")), "PIN must be exactly 6 digits");
        assert_eq!(message(validate_pin("12a456")), "PIN must contain only numbers");
    }

    #[test]
    fn test_pin_rejects_non_ascii_digits() {
        // Arabic-Indic digits are numeric but not ASCII.
        assert_eq!(
            message(validate_pin("١٢٣٤٥٦")),
            "PIN must contain only numbers"
        );
    }

    #[test]
    fn test_login_reports_username_before_pin() {
        let err = validate_login("", "").unwrap_err();
        assert_eq!(err.to_string(), "Username is required");
        if let Error::Validation { field, .. } = validate_login("juan", "1").unwrap_err() {
            assert_eq!(field, "pin");
        } else {
            panic!("expected validation error");
        }
    }
}
