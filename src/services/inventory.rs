//! Stock reconciliation primitives.
//!
//! Every mutation of `products.stock` in this crate goes through these
//! functions. Callers pass the connection of their own transaction, so the
//! stock adjustment commits or rolls back together with the row write that
//! caused it. Each primitive locks the product row with `FOR UPDATE` and
//! refuses to drive stock negative.

use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::Product,
};

/// Reserve `quantity` units: stock -= quantity.
pub async fn reserve(conn: &mut PgConnection, product_id: Uuid, quantity: i32) -> AppResult<()> {
    adjust_reservation(conn, product_id, quantity).await
}

/// Release `quantity` previously reserved units: stock += quantity.
pub async fn release(conn: &mut PgConnection, product_id: Uuid, quantity: i32) -> AppResult<()> {
    adjust_reservation(conn, product_id, -quantity).await
}

/// Move the reservation against a product by `delta` units. For an item
/// whose quantity changes from `q_old` to `q_new`, delta is `q_new - q_old`;
/// stock decreases by delta. Fails with `InsufficientStock` when the product
/// does not hold enough stock, leaving it untouched.
pub async fn adjust_reservation(
    conn: &mut PgConnection,
    product_id: Uuid,
    delta: i32,
) -> AppResult<()> {
    if delta == 0 {
        return Ok(());
    }

    let stock = lock_stock(conn, product_id).await?;
    if delta > 0 && stock < delta {
        return Err(AppError::InsufficientStock {
            product_id,
            requested: delta,
            available: stock,
        });
    }

    sqlx::query("UPDATE products SET stock = stock - $2 WHERE id = $1")
        .bind(product_id)
        .bind(delta)
        .execute(conn)
        .await?;

    Ok(())
}

/// Signed stock correction outside the reservation flow (restock, shrinkage).
/// Same lock-and-check discipline; returns the updated product.
pub async fn restock(
    conn: &mut PgConnection,
    product_id: Uuid,
    delta: i32,
) -> AppResult<Product> {
    let stock = lock_stock(conn, product_id).await?;
    if stock + delta < 0 {
        return Err(AppError::BadRequest("stock cannot be negative".into()));
    }

    let product = sqlx::query_as::<_, Product>(
        "UPDATE products SET stock = stock + $2 WHERE id = $1 RETURNING *",
    )
    .bind(product_id)
    .bind(delta)
    .fetch_one(conn)
    .await?;

    Ok(product)
}

async fn lock_stock(conn: &mut PgConnection, product_id: Uuid) -> AppResult<i32> {
    let row: Option<(i32,)> = sqlx::query_as("SELECT stock FROM products WHERE id = $1 FOR UPDATE")
        .bind(product_id)
        .fetch_optional(conn)
        .await?;

    match row {
        Some((stock,)) => Ok(stock),
        None => Err(AppError::NotFound),
    }
}
