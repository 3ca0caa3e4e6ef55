use axum::Router;

use crate::state::AppState;

pub mod admin;
pub mod auth;
pub mod basket;
pub mod doc;
pub mod health;
pub mod orders;
pub mod params;
pub mod payment;
pub mod products;

// Build the API router without binding state; it will be provided at the top level.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .nest("/products", products::router())
        .nest("/auth", auth::router())
        .nest("/basket", basket::router())
        .nest("/orders", orders::router())
        .nest("/payment", payment::router())
        .nest("/admin", admin::router())
}
