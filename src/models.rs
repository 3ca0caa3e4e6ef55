use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, FromRow, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: Option<String>,
    pub role: String,
    pub gender: Option<String>,
    pub about_me: Option<String>,
    pub age: Option<i32>,
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    #[schema(value_type = String)]
    pub price: Decimal,
    pub stock: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BasketItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
}

/// Order lifecycle. `Forming` orders are still editable; the three payment
/// outcomes are set only by the gateway callback and overwrite each other
/// (last notification wins).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "order_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Forming,
    SentToProceed,
    Paid,
    Unpaid,
    Pending,
}

impl OrderStatus {
    /// Maps a raw gateway status string. Anything unrecognized is `Pending`.
    pub fn from_payment_signal(signal: &str) -> Self {
        match signal {
            "success" => OrderStatus::Paid,
            "fail" => OrderStatus::Unpaid,
            _ => OrderStatus::Pending,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, FromRow, ToSchema)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    /// Price at the time the item entered the order, never re-read from the
    /// product.
    #[schema(value_type = String)]
    pub price: Decimal,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_signal_maps_success_and_fail() {
        assert_eq!(OrderStatus::from_payment_signal("success"), OrderStatus::Paid);
        assert_eq!(OrderStatus::from_payment_signal("fail"), OrderStatus::Unpaid);
    }

    #[test]
    fn payment_signal_defaults_to_pending() {
        assert_eq!(OrderStatus::from_payment_signal("canceled"), OrderStatus::Pending);
        assert_eq!(OrderStatus::from_payment_signal(""), OrderStatus::Pending);
    }
}
