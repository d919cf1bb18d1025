use sea_orm::{ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use crate::{
    audit,
    dto::auth::{AccessToken, LoginRequest, RefreshRequest, RegisterRequest, TokenKind, TokenPair},
    entity::users::{ActiveModel as UserActive, Column as UserCol, Entity as Users},
    error::{AppError, AppResult},
    models::{User, UserRole},
    response::ApiResponse,
    security::{decode_token, hash_password, issue_token, verify_password},
    services::user_service::{normalize_email, user_from_entity},
    state::AppState,
};

const TOKEN_TYPE: &str = "bearer";

pub async fn register_user(
    state: &AppState,
    payload: RegisterRequest,
) -> AppResult<ApiResponse<User>> {
    payload.validate()?;
    let RegisterRequest {
        email,
        password,
        full_name,
    } = payload;
    let email = normalize_email(&email);

    let exist = Users::find()
        .filter(UserCol::Email.eq(email.as_str()))
        .one(&state.orm)
        .await?;
    if exist.is_some() {
        return Err(AppError::Conflict(
            "The user with this email already exists in the system".into(),
        ));
    }

    let password_hash = hash_password(&password)?;
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        email: Set(email),
        full_name: Set(full_name),
        password_hash: Set(password_hash),
        role: Set(UserRole::User.as_str().to_string()),
        is_active: Set(true),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    audit::record(
        &state.orm,
        Some(user.id),
        "user_register",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;

    Ok(ApiResponse::single("User created", user_from_entity(user)))
}

pub async fn login_user(
    state: &AppState,
    payload: LoginRequest,
) -> AppResult<ApiResponse<TokenPair>> {
    let LoginRequest { email, password } = payload;
    let user = Users::find()
        .filter(UserCol::Email.eq(normalize_email(&email)))
        .one(&state.orm)
        .await?;

    let user = match user {
        Some(u) => u,
        None => return Err(AppError::Unauthorized("Incorrect email or password".into())),
    };

    if !verify_password(&password, &user.password_hash)? {
        return Err(AppError::Unauthorized("Incorrect email or password".into()));
    }
    if !user.is_active {
        return Err(AppError::BadRequest("Inactive user".into()));
    }

    let role = user_from_entity(user.clone()).role;
    let tokens = TokenPair {
        access_token: issue_token(&state.jwt, user.id, role, TokenKind::Access)?,
        refresh_token: issue_token(&state.jwt, user.id, role, TokenKind::Refresh)?,
        token_type: TOKEN_TYPE.into(),
    };

    audit::record(
        &state.orm,
        Some(user.id),
        "user_login",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;

    Ok(ApiResponse::single("Logged in", tokens))
}

/// Exchange a refresh token for a new access token. The role is re-read from
/// the database so promotions and demotions take effect on refresh.
pub async fn refresh_token(
    state: &AppState,
    payload: RefreshRequest,
) -> AppResult<ApiResponse<AccessToken>> {
    let claims = decode_token(&state.jwt, payload.refresh_token.trim(), TokenKind::Refresh)?;
    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| AppError::Unauthorized("Invalid user id in token".into()))?;

    let user = Users::find_by_id(user_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User no longer exists".into()))?;
    if !user.is_active {
        return Err(AppError::Unauthorized("Inactive user".into()));
    }

    let role = user_from_entity(user).role;
    let token = AccessToken {
        access_token: issue_token(&state.jwt, user_id, role, TokenKind::Access)?,
        token_type: TOKEN_TYPE.into(),
    };
    Ok(ApiResponse::single("Token refreshed", token))
}
