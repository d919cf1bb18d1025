use axum::Router;

use crate::state::AppState;

pub mod auth;
pub mod customers;
pub mod doc;
pub mod health;
pub mod orders;
pub mod params;
pub mod products;
pub mod users;

// Build the API router without binding state; it will be provided at the top level.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/users", users::router())
        .nest("/customers", customers::router())
        .nest("/products", products::router())
        .nest("/orders", orders::router())
}
