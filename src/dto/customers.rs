use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    dto::{nullable, require_non_blank, validate_email},
    error::{AppError, AppResult},
    models::Customer,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateCustomerRequest {
    pub name: String,
    pub email: String,
    /// Eleven digits; `.` and `-` separators are accepted and stripped.
    pub cpf: String,
    pub phone: Option<String>,
}

impl CreateCustomerRequest {
    /// Validates the payload and returns the normalized CPF.
    pub fn validate(&self) -> AppResult<String> {
        require_non_blank("name", &self.name)?;
        validate_email(&self.email)?;
        normalize_cpf(&self.cpf)
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateCustomerRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub cpf: Option<String>,
    /// `null` removes the phone number.
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub phone: Option<Option<String>>,
}

impl UpdateCustomerRequest {
    /// Validates the supplied fields and returns the normalized CPF, if any.
    pub fn validate(&self) -> AppResult<Option<String>> {
        if let Some(name) = &self.name {
            require_non_blank("name", name)?;
        }
        if let Some(email) = &self.email {
            validate_email(email)?;
        }
        self.cpf.as_deref().map(normalize_cpf).transpose()
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct CustomerList {
    #[schema(value_type = Vec<Customer>)]
    pub items: Vec<Customer>,
}

pub fn normalize_cpf(raw: &str) -> AppResult<String> {
    let digits: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, '.' | '-' | ' '))
        .collect();
    if digits.len() != 11 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::BadRequest("CPF must contain exactly 11 digits".into()));
    }
    Ok(digits)
}
