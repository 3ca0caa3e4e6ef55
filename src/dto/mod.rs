pub mod auth;
pub mod basket;
pub mod orders;
pub mod products;
