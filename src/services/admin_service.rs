use uuid::Uuid;

use crate::{
    audit::log_audit,
    db::DbPool,
    dto::orders::OrderList,
    dto::products::ProductList,
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Order, Product},
    response::{ApiResponse, Meta},
    routes::params::{LowStockQuery, OrderListQuery, RestockRequest, SortOrder},
    services::inventory,
};

pub async fn list_all_orders(
    pool: &DbPool,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = query.pagination.normalize();
    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);

    let mut count_qb = sqlx::QueryBuilder::new("SELECT COUNT(*) FROM orders WHERE 1=1");
    if let Some(status) = query.status {
        count_qb.push(" AND status = ").push_bind(status);
    }
    let total: (i64,) = count_qb.build_query_as().fetch_one(pool).await?;

    let mut qb = sqlx::QueryBuilder::new("SELECT * FROM orders WHERE 1=1");
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
        "Orders",
        OrderList { items: orders },
        Some(meta),
    ))
}

pub async fn list_low_stock(
    pool: &DbPool,
    user: &AuthUser,
    query: LowStockQuery,
) -> AppResult<ApiResponse<ProductList>> {
    ensure_admin(user)?;
    let threshold = query.threshold.unwrap_or(5);
    let (page, limit, offset) = query.pagination.normalize();

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products WHERE stock <= $1")
        .bind(threshold)
        .fetch_one(pool)
        .await?;

    let items: Vec<Product> = sqlx::query_as(
        r#"
        SELECT * FROM products
        WHERE stock <= $1
        ORDER BY stock ASC, created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(threshold)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let meta = Meta::new(page, limit, total.0);
    Ok(ApiResponse::success(
        "Low stock",
        ProductList { items },
        Some(meta),
    ))
}

/// Signed stock correction, delegated to the inventory primitives so the
/// same lock-and-check discipline applies as on the reservation path.
pub async fn restock_product(
    pool: &DbPool,
    user: &AuthUser,
    id: Uuid,
    payload: RestockRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    if payload.delta == 0 {
        return Err(AppError::BadRequest("delta must not be 0".into()));
    }

    let mut tx = pool.begin().await?;
    let product = inventory::restock(&mut *tx, id, payload.delta).await?;
    tx.commit().await?;

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "inventory_restock",
        Some("products"),
        Some(serde_json::json!({ "product_id": product.id, "delta": payload.delta })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Inventory updated",
        product,
        Some(Meta::empty()),
    ))
}
