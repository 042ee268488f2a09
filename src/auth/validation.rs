use std::sync::OnceLock;

use regex::Regex;

use crate::error::{AppError, Field};

pub const MIN_PASSWORD_LEN: usize = 6;

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email pattern"))
}

/// Trim, check shape and lowercase an email address.
pub fn validate_email(email: &str) -> Result<String, AppError> {
    let trimmed = email.trim();

    if trimmed.is_empty() {
        return Err(AppError::validation(Field::Email, "This field is required"));
    }
    if !email_regex().is_match(trimmed) {
        return Err(AppError::validation(
            Field::Email,
            "Please enter a valid email address",
        ));
    }

    Ok(trimmed.to_lowercase())
}

pub fn validate_password(password: &str) -> Result<(), AppError> {
    if password.is_empty() {
        return Err(AppError::validation(Field::Password, "This field is required"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(
            Field::Password,
            format!("Must be at least {} characters", MIN_PASSWORD_LEN),
        ));
    }
    Ok(())
}

pub fn validate_password_match(password: &str, confirm: &str) -> Result<(), AppError> {
    if confirm != password {
        return Err(AppError::validation(
            Field::ConfirmPassword,
            "Passwords do not match",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_shapes() {
        assert_eq!(validate_email("  Ada@Example.COM ").unwrap(), "ada@example.com");
        for bad in ["", "plain", "no@tld", "two words@x.io", "@x.io"] {
            assert!(
                matches!(
                    validate_email(bad),
                    Err(AppError::Validation { field: Field::Email, .. })
                ),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_password_length_counts_characters() {
        assert!(validate_password("123456").is_ok());
        assert!(validate_password("12345").is_err());
        assert!(validate_password("ééééé").is_err());
        assert!(validate_password("éééééé").is_ok());
    }

    #[test]
    fn test_password_mismatch() {
        assert!(validate_password_match("secret1", "secret1").is_ok());
        let err = validate_password_match("secret1", "secret2").unwrap_err();
        assert_eq!(err.notice().message(), "Passwords do not match");
    }
}
