use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::Product;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateProductRequest {
    pub name: String,
    pub description: String,
    pub category: String,
    #[schema(value_type = String)]
    pub price: Decimal,
    pub stock: i32,
}

/// Descriptive fields and price only. Stock moves through the inventory
/// endpoints so every adjustment is checked and audited.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    #[schema(value_type = Option<String>)]
    pub price: Option<Decimal>,
}

#[derive(Serialize, ToSchema)]
#[serde(transparent)]
pub struct ProductList {
    #[schema(value_type = Vec<Product>)]
    pub items: Vec<Product>,
}

/// Live price lookup payload; price is 0 when the product does not exist.
#[derive(Debug, Serialize, ToSchema)]
pub struct PriceLookup {
    #[schema(value_type = String)]
    pub price: Decimal,
}
