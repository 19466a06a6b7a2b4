//! Shared input validation helpers.
//!
//! Centralizes account-credential rules used by registration and settings
//! updates so the constraints are defined in one place.

use once_cell::sync::Lazy;
use regex::Regex;
use zxcvbn::Score;

use crate::error::{AppError, Result};

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid username regex"));

pub const USERNAME_MIN: usize = 3;
pub const USERNAME_MAX: usize = 20;
pub const PASSWORD_MIN: usize = 8;

/// Validate the full registration triple.
pub fn validate_registration(email: &str, username: &str, password: &str) -> Result<()> {
    validate_email(email)?;
    validate_username(username)?;
    validate_password(password, &[email, username])?;
    Ok(())
}

pub fn validate_email(email: &str) -> Result<()> {
    if email.len() > 255 || !EMAIL_RE.is_match(email) {
        return Err(AppError::Validation("Invalid email address".to_string()));
    }
    Ok(())
}

pub fn validate_username(username: &str) -> Result<()> {
    let len = username.chars().count();
    if !(USERNAME_MIN..=USERNAME_MAX).contains(&len) {
        return Err(AppError::Validation(format!(
            "username must be {}-{} characters",
            USERNAME_MIN, USERNAME_MAX
        )));
    }
    if !USERNAME_RE.is_match(username) {
        return Err(AppError::Validation(
            "username may only contain letters, digits, '_' and '-'".to_string(),
        ));
    }
    Ok(())
}

/// Length floor plus a zxcvbn strength estimate. `user_inputs` (email,
/// username) are penalized so nobody uses their own handle as a password.
pub fn validate_password(password: &str, user_inputs: &[&str]) -> Result<()> {
    if password.chars().count() < PASSWORD_MIN {
        return Err(AppError::Validation(format!(
            "password must be at least {} characters",
            PASSWORD_MIN
        )));
    }
    let estimate = zxcvbn::zxcvbn(password, user_inputs);
    if estimate.score() < Score::Three {
        return Err(AppError::Validation(
            "password is too weak; use a longer or less predictable one".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // Email
    // -----------------------------------------------------------------------

    #[test]
    fn test_accepts_plain_email() {
        assert!(validate_email("user@example.com").is_ok());
    }

    #[test]
    fn test_accepts_plus_tag_email() {
        assert!(validate_email("user+tag@mail.example.co.uk").is_ok());
    }

    #[test]
    fn test_rejects_missing_at() {
        assert!(validate_email("user.example.com").is_err());
    }

    #[test]
    fn test_rejects_missing_domain_dot() {
        assert!(validate_email("user@localhost").is_err());
    }

    #[test]
    fn test_rejects_whitespace() {
        assert!(validate_email("us er@example.com").is_err());
    }

    #[test]
    fn test_rejects_empty_email() {
        assert!(validate_email("").is_err());
    }

    // -----------------------------------------------------------------------
    // Username
    // -----------------------------------------------------------------------

    #[test]
    fn test_accepts_simple_username() {
        assert!(validate_username("johndoe").is_ok());
        assert!(validate_username("john_doe-42").is_ok());
    }

    #[test]
    fn test_rejects_short_username() {
        assert!(validate_username("ab").is_err());
    }

    #[test]
    fn test_rejects_long_username() {
        assert!(validate_username(&"a".repeat(21)).is_err());
    }

    #[test]
    fn test_accepts_boundary_lengths() {
        assert!(validate_username("abc").is_ok());
        assert!(validate_username(&"a".repeat(20)).is_ok());
    }

    #[test]
    fn test_rejects_special_characters() {
        assert!(validate_username("john doe").is_err());
        assert!(validate_username("john@doe").is_err());
        assert!(validate_username("jöhn").is_err());
    }

    // -----------------------------------------------------------------------
    // Password
    // -----------------------------------------------------------------------

    #[test]
    fn test_rejects_short_password() {
        assert!(validate_password("Ab1!", &[]).is_err());
    }

    #[test]
    fn test_rejects_common_password() {
        assert!(validate_password("password1", &[]).is_err());
    }

    #[test]
    fn test_rejects_password_matching_username() {
        assert!(validate_password("johndoe-johndoe", &["johndoe"]).is_err());
    }

    #[test]
    fn test_accepts_strong_password() {
        assert!(validate_password("correct horse battery staple", &[]).is_ok());
    }

    #[test]
    fn test_full_registration_validation() {
        assert!(validate_registration(
            "user@example.com",
            "johndoe",
            "correct horse battery staple"
        )
        .is_ok());
        assert!(validate_registration("bad-email", "johndoe", "correct horse battery staple")
            .is_err());
    }
}
