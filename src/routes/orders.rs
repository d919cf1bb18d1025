use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::get,
};
use uuid::Uuid;

use crate::{
    dto::orders::{CreateOrderRequest, OrderList, UpdateOrderRequest},
    error::AppResult,
    extract::{AppJson, AppPath, AppQuery},
    middleware::auth::AuthUser,
    models::Order,
    response::ApiResponse,
    routes::params::OrderListQuery,
    services::order_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders).post(create_order))
        .route("/{id}", get(get_order).put(update_order).delete(delete_order))
}

#[utoipa::path(
    get,
    path = "/api/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("start_date" = Option<String>, Query, description = "First order day, YYYY-MM-DD"),
        ("end_date" = Option<String>, Query, description = "Last order day, YYYY-MM-DD"),
        ("section" = Option<String>, Query, description = "Orders with at least one item from this section"),
        ("order_id" = Option<Uuid>, Query, description = "Exact order ID"),
        ("status" = Option<String>, Query, description = "pending, processing, shipped, delivered or cancelled"),
        ("customer_id" = Option<Uuid>, Query, description = "Orders of one customer")
    ),
    responses(
        (status = 200, description = "List orders", body = ApiResponse<OrderList>),
        (status = 400, description = "Invalid filter")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    _user: AuthUser,
    AppQuery(query): AppQuery<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    Ok(Json(order_service::list_orders(&state, query).await?))
}

#[utoipa::path(
    post,
    path = "/api/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created", body = ApiResponse<Order>),
        (status = 400, description = "Empty order or insufficient stock"),
        (status = 404, description = "Customer or product not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(payload): AppJson<CreateOrderRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Order>>)> {
    let resp = order_service::create_order(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order with items", body = ApiResponse<Order>),
        (status = 404, description = "Order not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    _user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<Order>>> {
    Ok(Json(order_service::get_order(&state, id).await?))
}

#[utoipa::path(
    put,
    path = "/api/orders/{id}",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = UpdateOrderRequest,
    responses(
        (status = 200, description = "Status updated", body = ApiResponse<Order>),
        (status = 400, description = "Cancelled orders cannot be reopened"),
        (status = 404, description = "Order not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn update_order(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<UpdateOrderRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    Ok(Json(
        order_service::update_order(&state, &user, id, payload).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/api/orders/{id}",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order deleted (admin only)"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Order not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn delete_order(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    Ok(Json(order_service::delete_order(&state, &user, id).await?))
}
