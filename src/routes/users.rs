use axum::{
    Json, Router,
    extract::State,
    routing::{get, patch},
};
use uuid::Uuid;

use crate::{
    dto::users::{SetActiveRequest, UpdateMeRequest, UpdatePasswordRequest, UserList},
    error::AppResult,
    extract::{AppJson, AppPath, AppQuery},
    middleware::auth::AuthUser,
    models::User,
    response::ApiResponse,
    routes::params::UserListQuery,
    services::user_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users))
        .route("/me", get(read_me).patch(update_me).delete(deactivate_me))
        .route("/me/password", patch(update_password))
        .route("/{id}", get(get_user))
        .route("/{id}/active", patch(set_active))
}

#[utoipa::path(
    get,
    path = "/api/users/me",
    responses(
        (status = 200, description = "Current user", body = ApiResponse<User>),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn read_me(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<User>>> {
    Ok(Json(user_service::get_me(&state, &user).await?))
}

#[utoipa::path(
    patch,
    path = "/api/users/me",
    request_body = UpdateMeRequest,
    responses(
        (status = 200, description = "Updated profile", body = ApiResponse<User>),
        (status = 409, description = "Email already in use")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn update_me(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(payload): AppJson<UpdateMeRequest>,
) -> AppResult<Json<ApiResponse<User>>> {
    Ok(Json(user_service::update_me(&state, &user, payload).await?))
}

#[utoipa::path(
    delete,
    path = "/api/users/me",
    responses(
        (status = 200, description = "Account deactivated", body = ApiResponse<User>)
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn deactivate_me(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<User>>> {
    Ok(Json(user_service::deactivate_me(&state, &user).await?))
}

#[utoipa::path(
    patch,
    path = "/api/users/me/password",
    request_body = UpdatePasswordRequest,
    responses(
        (status = 200, description = "Password changed"),
        (status = 400, description = "Incorrect password")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn update_password(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(payload): AppJson<UpdatePasswordRequest>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    Ok(Json(user_service::change_password(&state, &user, payload).await?))
}

#[utoipa::path(
    get,
    path = "/api/users",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20")
    ),
    responses(
        (status = 200, description = "All users (admin only)", body = ApiResponse<UserList>),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn list_users(
    State(state): State<AppState>,
    user: AuthUser,
    AppQuery(query): AppQuery<UserListQuery>,
) -> AppResult<Json<ApiResponse<UserList>>> {
    Ok(Json(
        user_service::list_users(&state, &user, query.pagination()).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User (admin only)", body = ApiResponse<User>),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn get_user(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<User>>> {
    Ok(Json(user_service::get_user(&state, &user, id).await?))
}

#[utoipa::path(
    patch,
    path = "/api/users/{id}/active",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = SetActiveRequest,
    responses(
        (status = 200, description = "Activation flag updated (admin only)", body = ApiResponse<User>),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn set_active(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<SetActiveRequest>,
) -> AppResult<Json<ApiResponse<User>>> {
    Ok(Json(user_service::set_active(&state, &user, id, payload).await?))
}
