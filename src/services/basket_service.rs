use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    audit::log_audit,
    db::DbPool,
    dto::basket::{AddToBasketRequest, BasketItemView, BasketView, EditBasketItemRequest},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{BasketItem, Product},
    response::{ApiResponse, Meta},
    services::inventory,
};

#[derive(FromRow)]
struct BasketWithProductRow {
    item_id: Uuid,
    quantity: i32,
    product_id: Uuid,
    name: String,
    description: Option<String>,
    category: String,
    price: Decimal,
    stock: i32,
    created_at: DateTime<Utc>,
}

pub async fn list_basket(pool: &DbPool, user: &AuthUser) -> AppResult<ApiResponse<BasketView>> {
    let rows = sqlx::query_as::<_, BasketWithProductRow>(
        r#"
        SELECT bi.id AS item_id, bi.quantity,
               p.id AS product_id, p.name, p.description, p.category, p.price, p.stock,
               p.created_at
        FROM basket_items bi
        JOIN products p ON p.id = bi.product_id
        WHERE bi.user_id = $1
        ORDER BY p.category, p.name
        "#,
    )
    .bind(user.user_id)
    .fetch_all(pool)
    .await?;

    let items = rows
        .into_iter()
        .map(|row| BasketItemView {
            id: row.item_id,
            cost: row.price * Decimal::from(row.quantity),
            quantity: row.quantity,
            product: Product {
                id: row.product_id,
                name: row.name,
                description: row.description,
                category: row.category,
                price: row.price,
                stock: row.stock,
                created_at: row.created_at,
            },
        })
        .collect();

    let view = BasketView::build(items);
    Ok(ApiResponse::success("OK", view, Some(Meta::empty())))
}

pub async fn add_to_basket(
    pool: &DbPool,
    user: &AuthUser,
    payload: AddToBasketRequest,
) -> AppResult<ApiResponse<BasketItem>> {
    if payload.quantity <= 0 {
        return Err(AppError::BadRequest(
            "quantity must be greater than 0".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;

    // Locks the product row and fails before any basket write if the
    // requested amount is not available.
    inventory::reserve(&mut *tx, payload.product_id, payload.quantity).await?;

    let exist: Option<BasketItem> =
        sqlx::query_as("SELECT * FROM basket_items WHERE user_id = $1 AND product_id = $2")
            .bind(user.user_id)
            .bind(payload.product_id)
            .fetch_optional(&mut *tx)
            .await?;

    let basket_item = if let Some(item) = exist {
        sqlx::query_as::<_, BasketItem>(
            r#"
            UPDATE basket_items
            SET quantity = quantity + $3
            WHERE id = $1 AND user_id = $2
            RETURNING *
            "#,
        )
        .bind(item.id)
        .bind(user.user_id)
        .bind(payload.quantity)
        .fetch_one(&mut *tx)
        .await?
    } else {
        sqlx::query_as(
            "INSERT INTO basket_items (id, user_id, product_id, quantity) VALUES ($1, $2, $3, $4) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(user.user_id)
        .bind(payload.product_id)
        .bind(payload.quantity)
        .fetch_one(&mut *tx)
        .await?
    };

    tx.commit().await?;

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "basket_add",
        Some("basket_items"),
        Some(serde_json::json!({ "product_id": payload.product_id, "quantity": payload.quantity })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success("OK", basket_item, None))
}

/// Sets an absolute quantity; 0 deletes the item and releases its full
/// reservation, anything else adjusts the reservation by the difference.
pub async fn edit_basket_item(
    pool: &DbPool,
    user: &AuthUser,
    item_id: Uuid,
    payload: EditBasketItemRequest,
) -> AppResult<ApiResponse<serde_json::Value>> {
    if payload.quantity < 0 {
        return Err(AppError::BadRequest(
            "quantity must not be negative".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;

    let item: Option<BasketItem> =
        sqlx::query_as("SELECT * FROM basket_items WHERE id = $1 AND user_id = $2 FOR UPDATE")
            .bind(item_id)
            .bind(user.user_id)
            .fetch_optional(&mut *tx)
            .await?;
    let item = match item {
        Some(i) => i,
        None => return Err(AppError::NotFound),
    };

    let (message, data) = if payload.quantity == 0 {
        inventory::release(&mut *tx, item.product_id, item.quantity).await?;
        sqlx::query("DELETE FROM basket_items WHERE id = $1")
            .bind(item.id)
            .execute(&mut *tx)
            .await?;
        ("Item removed", serde_json::json!({}))
    } else {
        inventory::adjust_reservation(&mut *tx, item.product_id, payload.quantity - item.quantity)
            .await?;
        let updated: BasketItem = sqlx::query_as(
            "UPDATE basket_items SET quantity = $2 WHERE id = $1 RETURNING *",
        )
        .bind(item.id)
        .bind(payload.quantity)
        .fetch_one(&mut *tx)
        .await?;
        ("OK", serde_json::to_value(updated).map_err(anyhow::Error::from)?)
    };

    tx.commit().await?;

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "basket_edit",
        Some("basket_items"),
        Some(serde_json::json!({ "item_id": item_id, "quantity": payload.quantity })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(message, data, Some(Meta::empty())))
}

pub async fn remove_from_basket(
    pool: &DbPool,
    user: &AuthUser,
    item_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let mut tx = pool.begin().await?;

    let item: Option<BasketItem> =
        sqlx::query_as("SELECT * FROM basket_items WHERE id = $1 AND user_id = $2 FOR UPDATE")
            .bind(item_id)
            .bind(user.user_id)
            .fetch_optional(&mut *tx)
            .await?;
    let item = match item {
        Some(i) => i,
        None => return Err(AppError::NotFound),
    };

    inventory::release(&mut *tx, item.product_id, item.quantity).await?;
    sqlx::query("DELETE FROM basket_items WHERE id = $1")
        .bind(item.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "basket_remove",
        Some("basket_items"),
        Some(serde_json::json!({ "item_id": item_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Removed from basket",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

/// Deletes every item, releasing per row. A single unreconciled mass delete
/// would leave the released stock unaccounted for.
pub async fn clear_basket(
    pool: &DbPool,
    user: &AuthUser,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let mut tx = pool.begin().await?;

    let items: Vec<BasketItem> =
        sqlx::query_as("SELECT * FROM basket_items WHERE user_id = $1 FOR UPDATE")
            .bind(user.user_id)
            .fetch_all(&mut *tx)
            .await?;

    for item in &items {
        inventory::release(&mut *tx, item.product_id, item.quantity).await?;
        sqlx::query("DELETE FROM basket_items WHERE id = $1")
            .bind(item.id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "basket_clear",
        Some("basket_items"),
        Some(serde_json::json!({ "removed": items.len() })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Basket cleared",
        serde_json::json!({ "removed": items.len() }),
        Some(Meta::empty()),
    ))
}
