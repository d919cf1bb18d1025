use axum::{Json, Router, routing::get};
use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{AccessToken, LoginRequest, RefreshRequest, RegisterRequest, TokenPair},
        customers::{CreateCustomerRequest, CustomerList, UpdateCustomerRequest},
        orders::{CreateOrderRequest, OrderItemRequest, OrderList, UpdateOrderRequest},
        products::{CreateProductRequest, ProductList, UpdateProductRequest},
        users::{SetActiveRequest, UpdateMeRequest, UpdatePasswordRequest, UserList},
    },
    models::{Customer, Order, OrderItem, OrderStatus, Product, User, UserRole},
    response::{ApiResponse, Meta},
    routes::{auth, customers, health, orders, params, products, users},
    state::AppState,
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        health::readiness,
        auth::register,
        auth::login,
        auth::refresh,
        users::read_me,
        users::update_me,
        users::deactivate_me,
        users::update_password,
        users::list_users,
        users::get_user,
        users::set_active,
        customers::list_customers,
        customers::create_customer,
        customers::get_customer,
        customers::update_customer,
        customers::delete_customer,
        products::list_products,
        products::create_product,
        products::get_product,
        products::update_product,
        products::delete_product,
        orders::list_orders,
        orders::create_order,
        orders::get_order,
        orders::update_order,
        orders::delete_order
    ),
    components(
        schemas(
            User,
            UserRole,
            Customer,
            Product,
            Order,
            OrderItem,
            OrderStatus,
            RegisterRequest,
            LoginRequest,
            RefreshRequest,
            TokenPair,
            AccessToken,
            UpdateMeRequest,
            UpdatePasswordRequest,
            SetActiveRequest,
            CreateCustomerRequest,
            UpdateCustomerRequest,
            CreateProductRequest,
            UpdateProductRequest,
            CreateOrderRequest,
            OrderItemRequest,
            UpdateOrderRequest,
            UserList,
            CustomerList,
            ProductList,
            OrderList,
            params::Pagination,
            params::CustomerQuery,
            params::ProductQuery,
            params::OrderListQuery,
            health::HealthData,
            Meta,
            ApiResponse<User>,
            ApiResponse<Customer>,
            ApiResponse<Product>,
            ApiResponse<Order>,
            ApiResponse<TokenPair>,
            ApiResponse<UserList>,
            ApiResponse<CustomerList>,
            ApiResponse<ProductList>,
            ApiResponse<OrderList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Registration, login and token refresh"),
        (name = "Users", description = "Current user and user administration"),
        (name = "Customers", description = "Customer endpoints"),
        (name = "Products", description = "Product endpoints"),
        (name = "Orders", description = "Order endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}

/// Serves the raw document next to the Scalar UI.
pub fn openapi_router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
}
