use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::Product;

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddToBasketRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// Absolute target quantity; 0 removes the item.
#[derive(Debug, Deserialize, ToSchema)]
pub struct EditBasketItemRequest {
    pub quantity: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BasketItemView {
    pub id: Uuid,
    pub product: Product,
    pub quantity: i32,
    /// price × quantity for this row.
    #[schema(value_type = String)]
    pub cost: Decimal,
}

/// Read-only snapshot of a user's basket. Totals are computed once when the
/// view is built, so a widget and a detail list rendered from the same view
/// agree even if rows change underneath.
#[derive(Debug, Serialize, ToSchema)]
pub struct BasketView {
    pub items: Vec<BasketItemView>,
    pub total_quantity: i64,
    #[schema(value_type = String)]
    pub total_cost: Decimal,
}

impl BasketView {
    pub fn build(items: Vec<BasketItemView>) -> Self {
        let total_quantity = items.iter().map(|i| i.quantity as i64).sum();
        let total_cost = items.iter().map(|i| i.cost).sum();
        Self {
            items,
            total_quantity,
            total_cost,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn item(name: &str, price: Decimal, quantity: i32) -> BasketItemView {
        let product = Product {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: None,
            category: "misc".to_string(),
            price,
            stock: 100,
            created_at: Utc::now(),
        };
        BasketItemView {
            id: Uuid::new_v4(),
            cost: price * Decimal::from(quantity),
            product,
            quantity,
        }
    }

    #[test]
    fn view_totals_sum_over_items() {
        let view = BasketView::build(vec![
            item("widget", dec!(10.00), 2),
            item("gadget", dec!(5.00), 1),
        ]);
        assert_eq!(view.total_quantity, 3);
        assert_eq!(view.total_cost, dec!(25.00));
    }

    #[test]
    fn empty_view_is_zeroed() {
        let view = BasketView::build(vec![]);
        assert_eq!(view.total_quantity, 0);
        assert_eq!(view.total_cost, Decimal::ZERO);
    }
}
