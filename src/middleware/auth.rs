use axum::{extract::FromRequestParts, http::header};
use sea_orm::EntityTrait;
use uuid::Uuid;

use crate::{
    dto::auth::TokenKind,
    entity::Users,
    error::AppError,
    models::UserRole,
    security::decode_token,
    state::AppState,
};

/// The caller behind a valid access token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: UserRole,
}

pub fn ensure_role(user: &AuthUser, role: UserRole) -> Result<(), AppError> {
    if user.role != role {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

pub fn ensure_admin(user: &AuthUser) -> Result<(), AppError> {
    ensure_role(user, UserRole::Admin)
}

pub(crate) fn bearer_token(value: &str) -> Result<&str, AppError> {
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .ok_or_else(|| AppError::Unauthorized("Invalid Authorization scheme".into()))?
        .trim();
    if token.is_empty() {
        return Err(AppError::Unauthorized("Missing bearer token".into()));
    }
    Ok(token)
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".into()))?;

        let auth_str = auth_header
            .to_str()
            .map_err(|_| AppError::Unauthorized("Invalid Authorization header".into()))?;
        let token = bearer_token(auth_str)?;

        let claims = decode_token(&state.jwt, token, TokenKind::Access)?;

        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AppError::Unauthorized("Invalid user id in token".into()))?;
        let role = claims
            .role
            .parse::<UserRole>()
            .map_err(|_| AppError::Unauthorized("Invalid role in token".into()))?;

        let user = Users::find_by_id(user_id)
            .one(&state.orm)
            .await?
            .ok_or_else(|| AppError::Unauthorized("User no longer exists".into()))?;
        if !user.is_active {
            return Err(AppError::BadRequest("Inactive user".into()));
        }

        Ok(AuthUser { user_id, role })
    }
}
