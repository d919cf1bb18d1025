use axum::{Json, Router, extract::State, http::StatusCode, routing::post};

use crate::{
    dto::auth::{AccessToken, LoginRequest, RefreshRequest, RegisterRequest, TokenPair},
    error::AppResult,
    extract::AppJson,
    models::User,
    response::ApiResponse,
    services::auth_service::{login_user, refresh_token, register_user},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Register user", body = ApiResponse<User>),
        (status = 400, description = "Invalid email or password"),
        (status = 409, description = "Email already registered"),
        (status = 422, description = "Malformed body")
    ),
    security(()),
    tag = "Auth"
)]
pub async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<User>>)> {
    let resp = register_user(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Access and refresh tokens", body = ApiResponse<TokenPair>),
        (status = 400, description = "Inactive user"),
        (status = 401, description = "Incorrect email or password")
    ),
    security(()),
    tag = "Auth"
)]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> AppResult<Json<ApiResponse<TokenPair>>> {
    let resp = login_user(&state, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New access token", body = ApiResponse<AccessToken>),
        (status = 401, description = "Invalid or expired refresh token")
    ),
    security(()),
    tag = "Auth"
)]
pub async fn refresh(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RefreshRequest>,
) -> AppResult<Json<ApiResponse<AccessToken>>> {
    let resp = refresh_token(&state, payload).await?;
    Ok(Json(resp))
}
