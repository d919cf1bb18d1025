use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    dto::{validate_email, validate_password},
    error::{AppError, AppResult},
    models::User,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateMeRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
}

impl UpdateMeRequest {
    pub fn validate(&self) -> AppResult<()> {
        if let Some(email) = &self.email {
            validate_email(email)?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdatePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

impl UpdatePasswordRequest {
    pub fn validate(&self) -> AppResult<()> {
        validate_password("new_password", &self.new_password)?;
        if self.current_password == self.new_password {
            return Err(AppError::BadRequest(
                "New password cannot be the same as the current one".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetActiveRequest {
    pub is_active: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct UserList {
    #[schema(value_type = Vec<User>)]
    pub items: Vec<User>,
}
