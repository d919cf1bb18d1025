mod common;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use retail_api::{app::build_app, entity::Users, services::user_service};
use sea_orm::EntityTrait;
use serde_json::Value;
use tower::ServiceExt;

fn app() -> Router {
    build_app(common::lazy_state(), &["*".to_string()])
}

async fn send(request: Request<Body>) -> (StatusCode, Value) {
    send_to(app(), request).await
}

async fn send_to(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let (status, body) = send(Request::get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "ok");
}

#[tokio::test]
async fn readiness_reports_unreachable_database() {
    let (status, body) = send(Request::get("/health/ready").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["data"]["status"], "unavailable");
}

#[tokio::test]
async fn openapi_document_lists_resources() {
    let (status, body) = send(Request::get("/openapi.json").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    let paths = body["paths"].as_object().expect("paths");
    for path in ["/api/auth/login", "/api/customers", "/api/products/{id}", "/api/orders"] {
        assert!(paths.contains_key(path), "missing {path}");
    }
}

#[tokio::test]
async fn protected_route_without_token_is_unauthorized() {
    let (status, body) = send(Request::get("/api/customers").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["data"]["error"].is_string());
}

#[tokio::test]
async fn protected_route_with_garbage_token_is_unauthorized() {
    let request = Request::get("/api/orders")
        .header(header::AUTHORIZATION, "Bearer not-a-jwt")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn non_bearer_scheme_is_unauthorized() {
    let request = Request::get("/api/products")
        .header(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn register_with_wrong_field_types_is_unprocessable() {
    let (status, body) = send(post_json("/api/auth/register", r#"{"email": 42}"#)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn register_with_malformed_json_is_bad_request() {
    let (status, _) = send(post_json("/api/auth/register", "{not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn register_with_short_password_is_rejected_before_the_database() {
    let (status, _) = send(post_json(
        "/api/auth/register",
        r#"{"email": "a@example.com", "password": "short"}"#,
    ))
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn refresh_with_invalid_token_is_unauthorized() {
    let (status, _) = send(post_json(
        "/api/auth/refresh",
        r#"{"refresh_token": "nope"}"#,
    ))
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_route_answers_with_envelope() {
    let (status, body) = send(Request::get("/api/nope").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Not Found");
    assert_eq!(body["data"]["path"], "/api/nope");
}

#[tokio::test]
async fn responses_carry_a_request_id() {
    let response = app()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert!(response.headers().contains_key("x-request-id"));
}

fn me_request(access_token: &str) -> Request<Body> {
    Request::get("/api/users/me")
        .header(header::AUTHORIZATION, format!("Bearer {access_token}"))
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn login_token_is_accepted_until_the_account_goes_away() {
    let Some(state) = common::db_state().await else {
        common::skip_notice();
        return;
    };
    let router = build_app(state.clone(), &["*".to_string()]);
    let (user, tokens) = common::signed_in_user(&state).await;

    let (status, body) = send_to(router.clone(), me_request(&tokens.access_token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], user.id.to_string());
    assert_eq!(body["data"]["email"], user.email);

    // refresh tokens are not access tokens
    let (status, _) = send_to(router.clone(), me_request(&tokens.refresh_token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    user_service::deactivate_me(&state, &common::as_auth(&user))
        .await
        .unwrap();
    let (status, body) = send_to(router.clone(), me_request(&tokens.access_token)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Inactive user");

    Users::delete_by_id(user.id).exec(&state.orm).await.unwrap();
    let (status, _) = send_to(router, me_request(&tokens.access_token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
