use std::collections::HashMap;

use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    db::DbPool,
    dto::orders::{OrderList, OrderWithItems, PaymentNotification, UpdateOrderItemsRequest},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Order, OrderItem, OrderStatus},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::inventory,
};

#[derive(FromRow)]
struct BasketPriceRow {
    product_id: Uuid,
    quantity: i32,
    price: Decimal,
}

/// Converts the basket into a forming order in one transaction. The basket
/// rows already hold the stock reservation, and the new order items take it
/// over unchanged, so stock is never touched here and no intermediate state
/// is observable.
pub async fn checkout(pool: &DbPool, user: &AuthUser) -> AppResult<ApiResponse<OrderWithItems>> {
    let mut tx = pool.begin().await?;

    let rows: Vec<BasketPriceRow> = sqlx::query_as(
        r#"
        SELECT bi.product_id, bi.quantity, p.price
        FROM basket_items bi
        JOIN products p ON p.id = bi.product_id
        WHERE bi.user_id = $1
        ORDER BY p.category, p.name
        FOR UPDATE
        "#,
    )
    .bind(user.user_id)
    .fetch_all(&mut *tx)
    .await?;

    if rows.is_empty() {
        return Err(AppError::BadRequest("Basket is empty".into()));
    }

    let order: Order =
        sqlx::query_as("INSERT INTO orders (id, user_id, status) VALUES ($1, $2, $3) RETURNING *")
            .bind(Uuid::new_v4())
            .bind(user.user_id)
            .bind(OrderStatus::Forming)
            .fetch_one(&mut *tx)
            .await?;

    let mut items: Vec<OrderItem> = Vec::with_capacity(rows.len());
    let mut total = Decimal::ZERO;
    for row in &rows {
        // Price snapshot: whatever the product costs at this instant stays
        // on the item for the life of the order.
        let item: OrderItem = sqlx::query_as(
            r#"
            INSERT INTO order_items (id, order_id, product_id, quantity, price)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(order.id)
        .bind(row.product_id)
        .bind(row.quantity)
        .bind(row.price)
        .fetch_one(&mut *tx)
        .await?;

        total += item.price * Decimal::from(item.quantity);
        items.push(item);
    }

    sqlx::query("DELETE FROM basket_items WHERE user_id = $1")
        .bind(user.user_id)
        .execute(&mut *tx)
        .await?;

    if total.is_zero() {
        discard_order(&mut *tx, order.id).await?;
        tx.commit().await?;
        return Err(AppError::BadRequest(
            "Order total is 0, order discarded".into(),
        ));
    }

    tx.commit().await?;

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "checkout",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Checkout complete",
        OrderWithItems {
            order,
            items,
            total_cost: total,
        },
        Some(Meta::empty()),
    ))
}

/// Replaces a forming order's item list with absolute quantities. Surviving
/// items keep their price snapshot; new items snapshot the current price.
pub async fn update_order_items(
    pool: &DbPool,
    user: &AuthUser,
    order_id: Uuid,
    payload: UpdateOrderItemsRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let mut seen = std::collections::HashSet::new();
    for input in &payload.items {
        if input.quantity < 0 {
            return Err(AppError::BadRequest(
                "quantity must not be negative".into(),
            ));
        }
        if !seen.insert(input.product_id) {
            return Err(AppError::BadRequest(format!(
                "duplicate product {} in items",
                input.product_id
            )));
        }
    }

    let mut tx = pool.begin().await?;

    let order = lock_order(&mut *tx, user, order_id).await?;
    if order.status != OrderStatus::Forming {
        return Err(AppError::BadRequest(
            "Only forming orders can be edited".into(),
        ));
    }

    let existing: Vec<OrderItem> =
        sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 FOR UPDATE")
            .bind(order.id)
            .fetch_all(&mut *tx)
            .await?;
    let mut by_product: HashMap<Uuid, OrderItem> = existing
        .into_iter()
        .map(|item| (item.product_id, item))
        .collect();

    let mut total = Decimal::ZERO;
    for input in &payload.items {
        match by_product.remove(&input.product_id) {
            Some(item) if input.quantity == 0 => {
                inventory::release(&mut *tx, item.product_id, item.quantity).await?;
                sqlx::query("DELETE FROM order_items WHERE id = $1")
                    .bind(item.id)
                    .execute(&mut *tx)
                    .await?;
            }
            Some(item) => {
                inventory::adjust_reservation(
                    &mut *tx,
                    item.product_id,
                    input.quantity - item.quantity,
                )
                .await?;
                sqlx::query("UPDATE order_items SET quantity = $2 WHERE id = $1")
                    .bind(item.id)
                    .bind(input.quantity)
                    .execute(&mut *tx)
                    .await?;
                total += item.price * Decimal::from(input.quantity);
            }
            None if input.quantity > 0 => {
                inventory::reserve(&mut *tx, input.product_id, input.quantity).await?;
                let (price,): (Decimal,) =
                    sqlx::query_as("SELECT price FROM products WHERE id = $1")
                        .bind(input.product_id)
                        .fetch_one(&mut *tx)
                        .await?;
                sqlx::query(
                    r#"
                    INSERT INTO order_items (id, order_id, product_id, quantity, price)
                    VALUES ($1, $2, $3, $4, $5)
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(order.id)
                .bind(input.product_id)
                .bind(input.quantity)
                .bind(price)
                .execute(&mut *tx)
                .await?;
                total += price * Decimal::from(input.quantity);
            }
            None => {}
        }
    }

    // Anything not mentioned in the request is removed.
    for item in by_product.into_values() {
        inventory::release(&mut *tx, item.product_id, item.quantity).await?;
        sqlx::query("DELETE FROM order_items WHERE id = $1")
            .bind(item.id)
            .execute(&mut *tx)
            .await?;
    }

    if total.is_zero() {
        discard_order(&mut *tx, order.id).await?;
        tx.commit().await?;
        return Err(AppError::BadRequest(
            "Order total is 0, order deleted".into(),
        ));
    }

    let order: Order =
        sqlx::query_as("UPDATE orders SET updated_at = now() WHERE id = $1 RETURNING *")
            .bind(order.id)
            .fetch_one(&mut *tx)
            .await?;
    let items: Vec<OrderItem> =
        sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY created_at")
            .bind(order.id)
            .fetch_all(&mut *tx)
            .await?;

    tx.commit().await?;

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "order_items_update",
        Some("order_items"),
        Some(serde_json::json!({ "order_id": order.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order updated",
        OrderWithItems {
            total_cost: total,
            order,
            items,
        },
        Some(Meta::empty()),
    ))
}

pub async fn submit_order(
    pool: &DbPool,
    user: &AuthUser,
    order_id: Uuid,
) -> AppResult<ApiResponse<Order>> {
    let mut tx = pool.begin().await?;

    let order = lock_order(&mut *tx, user, order_id).await?;
    if order.status != OrderStatus::Forming {
        return Err(AppError::BadRequest("Order is not forming".into()));
    }

    let order: Order = sqlx::query_as(
        "UPDATE orders SET status = $2, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(order.id)
    .bind(OrderStatus::SentToProceed)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "order_submit",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success("Order submitted", order, Some(Meta::empty())))
}

/// Deletes an order, returning every item's reservation to stock first.
pub async fn delete_order(
    pool: &DbPool,
    user: &AuthUser,
    order_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let mut tx = pool.begin().await?;

    let order = lock_order(&mut *tx, user, order_id).await?;
    discard_order(&mut *tx, order.id).await?;

    tx.commit().await?;

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "order_delete",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn list_orders(
    pool: &DbPool,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination.normalize();
    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);

    let mut count_qb = sqlx::QueryBuilder::new("SELECT COUNT(*) FROM orders WHERE user_id = ");
    count_qb.push_bind(user.user_id);
    if let Some(status) = query.status {
        count_qb.push(" AND status = ").push_bind(status);
    }
    let total: (i64,) = count_qb.build_query_as().fetch_one(pool).await?;

    let mut qb = sqlx::QueryBuilder::new("SELECT * FROM orders WHERE user_id = ");
    qb.push_bind(user.user_id);
    if let Some(status) = query.status {
        qb.push(" AND status = ").push_bind(status);
    }
    qb.push(" ORDER BY created_at ")
        .push(sort_order.as_sql())
        .push(" LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);
    let orders: Vec<Order> = qb.build_query_as().fetch_all(pool).await?;

    let meta = Meta::new(page, limit, total.0);
    Ok(ApiResponse::success(
        "Ok",
        OrderList { items: orders },
        Some(meta),
    ))
}

pub async fn get_order(
    pool: &DbPool,
    user: &AuthUser,
    order_id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order: Option<Order> =
        sqlx::query_as("SELECT * FROM orders WHERE id = $1 AND user_id = $2")
            .bind(order_id)
            .bind(user.user_id)
            .fetch_optional(pool)
            .await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    let items: Vec<OrderItem> =
        sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY created_at")
            .bind(order.id)
            .fetch_all(pool)
            .await?;

    let total_cost = items
        .iter()
        .map(|item| item.price * Decimal::from(item.quantity))
        .sum();

    Ok(ApiResponse::success(
        "OK",
        OrderWithItems {
            order,
            items,
            total_cost,
        },
        Some(Meta::empty()),
    ))
}

/// Applies a gateway notification. The raw status string maps through
/// `OrderStatus::from_payment_signal`; repeated notifications overwrite the
/// status, so identical signals are idempotent.
pub async fn apply_payment_notification(
    pool: &DbPool,
    note: &PaymentNotification,
) -> AppResult<()> {
    let status = OrderStatus::from_payment_signal(&note.status);

    let updated: Option<(Uuid,)> = sqlx::query_as(
        "UPDATE orders SET status = $2, updated_at = now() WHERE id = $1 RETURNING id",
    )
    .bind(note.order_id)
    .bind(status)
    .fetch_optional(pool)
    .await?;

    if updated.is_none() {
        return Err(AppError::NotFound);
    }

    if let Err(err) = log_audit(
        pool,
        None,
        "payment_notification",
        Some("orders"),
        Some(serde_json::json!({ "order_id": note.order_id, "signal": note.status, "status": status })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(())
}

async fn lock_order(
    conn: &mut PgConnection,
    user: &AuthUser,
    order_id: Uuid,
) -> AppResult<Order> {
    let order: Option<Order> =
        sqlx::query_as("SELECT * FROM orders WHERE id = $1 AND user_id = $2 FOR UPDATE")
            .bind(order_id)
            .bind(user.user_id)
            .fetch_optional(conn)
            .await?;

    match order {
        Some(o) => Ok(o),
        None => Err(AppError::NotFound),
    }
}

/// Releases every item reservation, then deletes the order; the cascade
/// removes the items.
async fn discard_order(conn: &mut PgConnection, order_id: Uuid) -> AppResult<()> {
    let items: Vec<OrderItem> = sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1")
        .bind(order_id)
        .fetch_all(&mut *conn)
        .await?;

    for item in &items {
        inventory::release(&mut *conn, item.product_id, item.quantity).await?;
    }

    sqlx::query("DELETE FROM orders WHERE id = $1")
        .bind(order_id)
        .execute(conn)
        .await?;

    Ok(())
}
