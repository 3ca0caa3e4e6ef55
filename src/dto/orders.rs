use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Order, OrderItem};

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
    #[schema(value_type = String)]
    pub total_cost: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}

/// Full replacement of a forming order's item list, absolute quantities.
/// A quantity of 0 is the same as omitting the product.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderItemsRequest {
    pub items: Vec<OrderItemInput>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct OrderItemInput {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// Gateway callback query. The status string is free-form; anything other
/// than "success"/"fail" parks the order as pending.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PaymentNotification {
    pub order_id: Uuid,
    pub status: String,
}
