use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::users::{SetActiveRequest, UpdateMeRequest, UpdatePasswordRequest, UserList},
    entity::users::{ActiveModel as UserActive, Column as UserCol, Entity as Users, Model as UserModel},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{User, UserRole},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    security::{hash_password, verify_password},
    state::AppState,
};

pub async fn get_me(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<User>> {
    let model = find_user(state, user.user_id).await?;
    Ok(ApiResponse::single("Current user", user_from_entity(model)))
}

pub async fn update_me(
    state: &AppState,
    user: &AuthUser,
    payload: UpdateMeRequest,
) -> AppResult<ApiResponse<User>> {
    payload.validate()?;
    let existing = find_user(state, user.user_id).await?;

    let mut active: UserActive = existing.into();
    if let Some(email) = payload.email {
        let email = normalize_email(&email);
        let taken = Users::find()
            .filter(UserCol::Email.eq(email.as_str()))
            .filter(UserCol::Id.ne(user.user_id))
            .one(&state.orm)
            .await?;
        if taken.is_some() {
            return Err(AppError::Conflict("User with this email already exists".into()));
        }
        active.email = Set(email);
    }
    if let Some(full_name) = payload.full_name {
        active.full_name = Set(Some(full_name));
    }
    active.updated_at = Set(Utc::now().into());
    let updated = active.update(&state.orm).await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "user_update",
        "users",
        serde_json::json!({ "user_id": updated.id }),
    )
    .await;

    Ok(ApiResponse::single("Updated", user_from_entity(updated)))
}

pub async fn change_password(
    state: &AppState,
    user: &AuthUser,
    payload: UpdatePasswordRequest,
) -> AppResult<ApiResponse<serde_json::Value>> {
    payload.validate()?;
    let existing = find_user(state, user.user_id).await?;

    if !verify_password(&payload.current_password, &existing.password_hash)? {
        return Err(AppError::BadRequest("Incorrect password".into()));
    }

    let mut active: UserActive = existing.into();
    active.password_hash = Set(hash_password(&payload.new_password)?);
    active.updated_at = Set(Utc::now().into());
    active.update(&state.orm).await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "password_change",
        "users",
        serde_json::json!({ "user_id": user.user_id }),
    )
    .await;

    Ok(ApiResponse::single(
        "Password updated successfully",
        serde_json::json!({}),
    ))
}

/// Accounts are never removed; the caller is deactivated instead.
pub async fn deactivate_me(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<User>> {
    let updated = write_active_flag(state, user.user_id, false).await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "user_deactivate",
        "users",
        serde_json::json!({ "user_id": user.user_id }),
    )
    .await;

    Ok(ApiResponse::single("User deactivated", user_from_entity(updated)))
}

pub async fn list_users(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<UserList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = pagination.normalize();

    let finder = Users::find().order_by_asc(UserCol::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(user_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::paged("Users", UserList { items }, meta))
}

pub async fn get_user(state: &AppState, user: &AuthUser, id: Uuid) -> AppResult<ApiResponse<User>> {
    ensure_admin(user)?;
    let model = find_user(state, id).await?;
    Ok(ApiResponse::single("User", user_from_entity(model)))
}

pub async fn set_active(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: SetActiveRequest,
) -> AppResult<ApiResponse<User>> {
    ensure_admin(user)?;
    if id == user.user_id && !payload.is_active {
        return Err(AppError::BadRequest("Admins cannot deactivate themselves".into()));
    }
    let updated = write_active_flag(state, id, payload.is_active).await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "user_set_active",
        "users",
        serde_json::json!({ "user_id": id, "is_active": payload.is_active }),
    )
    .await;

    Ok(ApiResponse::single("Updated", user_from_entity(updated)))
}

/// Make sure an admin account exists for `email`, creating or promoting it.
/// An existing account keeps its password.
pub async fn ensure_admin_account(state: &AppState, email: &str, password: &str) -> AppResult<Uuid> {
    let email = normalize_email(email);
    let existing = Users::find()
        .filter(UserCol::Email.eq(email.as_str()))
        .one(&state.orm)
        .await?;

    let id = match existing {
        Some(model) if model.role == UserRole::Admin.as_str() && model.is_active => model.id,
        Some(model) => {
            let mut active: UserActive = model.into();
            active.role = Set(UserRole::Admin.as_str().to_string());
            active.is_active = Set(true);
            active.updated_at = Set(Utc::now().into());
            active.update(&state.orm).await?.id
        }
        None => {
            UserActive {
                id: Set(Uuid::new_v4()),
                email: Set(email.clone()),
                full_name: Set(None),
                password_hash: Set(hash_password(password)?),
                role: Set(UserRole::Admin.as_str().to_string()),
                is_active: Set(true),
                created_at: NotSet,
                updated_at: NotSet,
            }
            .insert(&state.orm)
            .await?
            .id
        }
    };

    tracing::info!(%email, "admin account ensured");
    Ok(id)
}

async fn find_user(state: &AppState, id: Uuid) -> AppResult<UserModel> {
    Users::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("User"))
}

async fn write_active_flag(state: &AppState, id: Uuid, is_active: bool) -> AppResult<UserModel> {
    let existing = find_user(state, id).await?;
    let mut active: UserActive = existing.into();
    active.is_active = Set(is_active);
    active.updated_at = Set(Utc::now().into());
    Ok(active.update(&state.orm).await?)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub(crate) fn user_from_entity(model: UserModel) -> User {
    User {
        id: model.id,
        email: model.email,
        full_name: model.full_name,
        role: model.role.parse().unwrap_or(UserRole::User),
        is_active: model.is_active,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}
