use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::get,
};
use uuid::Uuid;

use crate::{
    dto::customers::{CreateCustomerRequest, CustomerList, UpdateCustomerRequest},
    error::AppResult,
    extract::{AppJson, AppPath, AppQuery},
    middleware::auth::AuthUser,
    models::Customer,
    response::ApiResponse,
    routes::params::CustomerQuery,
    services::customer_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_customers).post(create_customer))
        .route(
            "/{id}",
            get(get_customer).put(update_customer).delete(delete_customer),
        )
}

#[utoipa::path(
    get,
    path = "/api/customers",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("name" = Option<String>, Query, description = "Partial, case-insensitive name match"),
        ("email" = Option<String>, Query, description = "Partial, case-insensitive email match")
    ),
    responses(
        (status = 200, description = "List customers", body = ApiResponse<CustomerList>),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Customers"
)]
pub async fn list_customers(
    State(state): State<AppState>,
    _user: AuthUser,
    AppQuery(query): AppQuery<CustomerQuery>,
) -> AppResult<Json<ApiResponse<CustomerList>>> {
    Ok(Json(customer_service::list_customers(&state, query).await?))
}

#[utoipa::path(
    post,
    path = "/api/customers",
    request_body = CreateCustomerRequest,
    responses(
        (status = 201, description = "Customer created", body = ApiResponse<Customer>),
        (status = 400, description = "Invalid email or CPF"),
        (status = 409, description = "Email or CPF already registered")
    ),
    security(("bearer_auth" = [])),
    tag = "Customers"
)]
pub async fn create_customer(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(payload): AppJson<CreateCustomerRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Customer>>)> {
    let resp = customer_service::create_customer(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    get,
    path = "/api/customers/{id}",
    params(("id" = Uuid, Path, description = "Customer ID")),
    responses(
        (status = 200, description = "Customer", body = ApiResponse<Customer>),
        (status = 404, description = "Customer not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Customers"
)]
pub async fn get_customer(
    State(state): State<AppState>,
    _user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<Customer>>> {
    Ok(Json(customer_service::get_customer(&state, id).await?))
}

#[utoipa::path(
    put,
    path = "/api/customers/{id}",
    params(("id" = Uuid, Path, description = "Customer ID")),
    request_body = UpdateCustomerRequest,
    responses(
        (status = 200, description = "Customer updated", body = ApiResponse<Customer>),
        (status = 404, description = "Customer not found"),
        (status = 409, description = "Email or CPF already registered")
    ),
    security(("bearer_auth" = [])),
    tag = "Customers"
)]
pub async fn update_customer(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<UpdateCustomerRequest>,
) -> AppResult<Json<ApiResponse<Customer>>> {
    Ok(Json(
        customer_service::update_customer(&state, &user, id, payload).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/api/customers/{id}",
    params(("id" = Uuid, Path, description = "Customer ID")),
    responses(
        (status = 200, description = "Customer deleted (admin only)"),
        (status = 404, description = "Customer not found"),
        (status = 409, description = "Customer has orders")
    ),
    security(("bearer_auth" = [])),
    tag = "Customers"
)]
pub async fn delete_customer(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    Ok(Json(customer_service::delete_customer(&state, &user, id).await?))
}
