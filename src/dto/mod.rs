pub mod auth;
pub mod customers;
pub mod orders;
pub mod products;
pub mod users;

use serde::{Deserialize, Deserializer};

use crate::error::{AppError, AppResult};

pub(crate) const PASSWORD_MIN_LEN: usize = 8;
pub(crate) const PASSWORD_MAX_LEN: usize = 40;

pub(crate) fn validate_email(email: &str) -> AppResult<()> {
    let email = email.trim();
    let valid = email.len() <= 255
        && match email.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty()
                    && domain.contains('.')
                    && !domain.starts_with('.')
                    && !domain.ends_with('.')
                    && !email.contains(char::is_whitespace)
            }
            None => false,
        };
    if valid {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!("Invalid email address: {email}")))
    }
}

pub(crate) fn validate_password(field: &str, password: &str) -> AppResult<()> {
    let len = password.chars().count();
    if !(PASSWORD_MIN_LEN..=PASSWORD_MAX_LEN).contains(&len) {
        return Err(AppError::BadRequest(format!(
            "{field} must be between {PASSWORD_MIN_LEN} and {PASSWORD_MAX_LEN} characters"
        )));
    }
    Ok(())
}

pub(crate) fn require_non_blank(field: &str, value: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::BadRequest(format!("{field} must not be empty")));
    }
    Ok(())
}

/// For `Option<Option<T>>` fields with `#[serde(default)]`: a missing key
/// stays `None`, an explicit `null` becomes `Some(None)`.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_addresses() {
        assert!(validate_email("maria@example.com").is_ok());
        assert!(validate_email("a.b+tag@sub.example.com.br").is_ok());
    }

    #[test]
    fn rejects_malformed_addresses() {
        for bad in ["", "no-at-sign", "@example.com", "x@localhost", "x@.com", "a b@c.com"] {
            assert!(validate_email(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn password_length_bounds() {
        assert!(validate_password("password", "1234567").is_err());
        assert!(validate_password("password", "12345678").is_ok());
        assert!(validate_password("password", &"x".repeat(40)).is_ok());
        assert!(validate_password("password", &"x".repeat(41)).is_err());
    }
}
