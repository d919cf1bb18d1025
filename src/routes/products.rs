use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::get,
};
use uuid::Uuid;

use crate::{
    dto::products::{CreateProductRequest, ProductList, UpdateProductRequest},
    error::AppResult,
    extract::{AppJson, AppPath, AppQuery},
    middleware::auth::AuthUser,
    models::Product,
    response::ApiResponse,
    routes::params::ProductQuery,
    services::product_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route(
            "/{id}",
            get(get_product).put(update_product).delete(delete_product),
        )
}

#[utoipa::path(
    get,
    path = "/api/products",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("category" = Option<String>, Query, description = "Exact category"),
        ("section" = Option<String>, Query, description = "Exact section"),
        ("min_price" = Option<i64>, Query, description = "Minimum sale price in cents"),
        ("max_price" = Option<i64>, Query, description = "Maximum sale price in cents"),
        ("available" = Option<bool>, Query, description = "Only products with (or without) stock")
    ),
    responses(
        (status = 200, description = "List products", body = ApiResponse<ProductList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    _user: AuthUser,
    AppQuery(query): AppQuery<ProductQuery>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    Ok(Json(product_service::list_products(&state, query).await?))
}

#[utoipa::path(
    post,
    path = "/api/products",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Product created (admin only)", body = ApiResponse<Product>),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Barcode already in use")
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(payload): AppJson<CreateProductRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Product>>)> {
    let resp = product_service::create_product(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    get,
    path = "/api/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product detail", body = ApiResponse<Product>),
        (status = 404, description = "Product not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    _user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<Product>>> {
    Ok(Json(product_service::get_product(&state, id).await?))
}

#[utoipa::path(
    put,
    path = "/api/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Product updated (admin only)", body = ApiResponse<Product>),
        (status = 404, description = "Product not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn update_product(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<UpdateProductRequest>,
) -> AppResult<Json<ApiResponse<Product>>> {
    Ok(Json(
        product_service::update_product(&state, &user, id, payload).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/api/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product deleted (admin only)"),
        (status = 404, description = "Product not found"),
        (status = 409, description = "Product referenced by an order")
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    Ok(Json(product_service::delete_product(&state, &user, id).await?))
}
