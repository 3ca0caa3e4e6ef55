pub mod admin_service;
pub mod auth_service;
pub mod basket_service;
pub mod inventory;
pub mod order_service;
pub mod product_service;
pub mod profile_service;
