use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    audit::log_audit,
    db::DbPool,
    dto::products::{CreateProductRequest, PriceLookup, ProductList, UpdateProductRequest},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::Product,
    response::{ApiResponse, Meta},
    routes::params::{ProductQuery, ProductSortBy, SortOrder},
};

pub async fn list_products(
    pool: &DbPool,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination.normalize();
    let sort_by = query.sort_by.unwrap_or(ProductSortBy::CreatedAt);
    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);

    let mut count_qb = sqlx::QueryBuilder::new("SELECT COUNT(*) FROM products WHERE 1=1");
    push_filters(&mut count_qb, &query);
    let total: (i64,) = count_qb.build_query_as().fetch_one(pool).await?;

    let mut qb = sqlx::QueryBuilder::new("SELECT * FROM products WHERE 1=1");
    push_filters(&mut qb, &query);
    qb.push(" ORDER BY ")
        .push(sort_by.as_sql())
        .push(" ")
        .push(sort_order.as_sql())
        .push(" LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);
    let items: Vec<Product> = qb.build_query_as().fetch_all(pool).await?;

    let meta = Meta::new(page, limit, total.0);
    Ok(ApiResponse::success(
        "Products",
        ProductList { items },
        Some(meta),
    ))
}

fn push_filters<'a>(
    qb: &mut sqlx::QueryBuilder<'a, sqlx::Postgres>,
    query: &'a ProductQuery,
) {
    if let Some(search) = query.q.as_ref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{search}%");
        qb.push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(category) = query.category.as_ref().filter(|s| !s.is_empty()) {
        qb.push(" AND category = ").push_bind(category.clone());
    }
    if let Some(min_price) = query.min_price {
        qb.push(" AND price >= ").push_bind(min_price);
    }
    if let Some(max_price) = query.max_price {
        qb.push(" AND price <= ").push_bind(max_price);
    }
}

pub async fn get_product(pool: &DbPool, id: Uuid) -> AppResult<ApiResponse<Product>> {
    let product: Option<Product> = sqlx::query_as("SELECT * FROM products WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    let product = match product {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };
    Ok(ApiResponse::success("Product", product, None))
}

/// Live price for display widgets. Unknown products report a zero price
/// instead of failing; order pricing never goes through here.
pub async fn get_price(pool: &DbPool, id: Uuid) -> AppResult<ApiResponse<PriceLookup>> {
    let row: Option<(Decimal,)> = sqlx::query_as("SELECT price FROM products WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    let price = row.map(|(p,)| p).unwrap_or(Decimal::ZERO);
    Ok(ApiResponse::success("Price", PriceLookup { price }, None))
}

pub async fn create_product(
    pool: &DbPool,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    if payload.price < Decimal::ZERO {
        return Err(AppError::BadRequest("price must not be negative".into()));
    }
    if payload.stock < 0 {
        return Err(AppError::BadRequest("stock must not be negative".into()));
    }

    let product: Product = sqlx::query_as(
        r#"
        INSERT INTO products (id, name, description, category, price, stock)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(payload.name)
    .bind(payload.description)
    .bind(payload.category)
    .bind(payload.price)
    .bind(payload.stock)
    .fetch_one(pool)
    .await?;

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "product_create",
        Some("products"),
        Some(serde_json::json!({ "product_id": product.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Product created",
        product,
        Some(Meta::empty()),
    ))
}

/// Updates descriptive fields and price. Stock is deliberately not
/// updatable here; it only moves through the inventory primitives.
pub async fn update_product(
    pool: &DbPool,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    if payload.price.is_some_and(|p| p < Decimal::ZERO) {
        return Err(AppError::BadRequest("price must not be negative".into()));
    }

    let product: Option<Product> = sqlx::query_as(
        r#"
        UPDATE products
        SET name = COALESCE($2, name),
            description = COALESCE($3, description),
            category = COALESCE($4, category),
            price = COALESCE($5, price)
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(payload.name)
    .bind(payload.description)
    .bind(payload.category)
    .bind(payload.price)
    .fetch_optional(pool)
    .await?;
    let product = match product {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "product_update",
        Some("products"),
        Some(serde_json::json!({ "product_id": product.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Updated",
        product,
        Some(Meta::empty()),
    ))
}

pub async fn delete_product(
    pool: &DbPool,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    let result = sqlx::query("DELETE FROM products WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "product_delete",
        Some("products"),
        Some(serde_json::json!({ "product_id": id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}
