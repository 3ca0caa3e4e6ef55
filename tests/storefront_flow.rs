use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use storefront_api::{
    config::AppConfig,
    db::{DbPool, create_pool},
    dto::basket::{AddToBasketRequest, EditBasketItemRequest},
    dto::orders::{OrderItemInput, PaymentNotification, UpdateOrderItemsRequest},
    error::AppError,
    middleware::auth::AuthUser,
    models::OrderStatus,
    routes::params::RestockRequest,
    services::{admin_service, auth_service, basket_service, order_service},
    state::AppState,
};
use uuid::Uuid;

// Integration flow over a real database: basket mutations reconcile stock,
// checkout snapshots prices and transfers the reservation, the payment
// callback drives the status machine. Skipped when no database is
// configured, as in the other integration tests.
#[tokio::test]
async fn basket_checkout_and_payment_flow() -> anyhow::Result<()> {
    let database_url =
        match std::env::var("TEST_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL")) {
            Ok(url) => url,
            Err(_) => {
                eprintln!(
                    "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
                );
                return Ok(());
            }
        };

    // JWT minting needs a secret even in tests.
    if std::env::var("JWT_SECRET").is_err() {
        unsafe { std::env::set_var("JWT_SECRET", "test-secret") };
    }

    let pool = create_pool(&database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    // Clean tables between runs
    sqlx::query(
        "TRUNCATE TABLE order_items, orders, basket_items, audit_logs, products, users RESTART IDENTITY CASCADE",
    )
    .execute(&pool)
    .await?;

    let user_id = create_user(&pool, "user", "user@example.com").await?;
    let admin_id = create_user(&pool, "admin", "admin@example.com").await?;
    let user = AuthUser {
        user_id,
        role: "user".into(),
    };
    let admin = AuthUser {
        user_id: admin_id,
        role: "admin".into(),
    };

    let lamp = create_product(&pool, "Desk Lamp", "home", dec!(10.00), 10).await?;
    let bottle = create_product(&pool, "Thermos Bottle", "outdoor", dec!(5.00), 8).await?;
    let sample = create_product(&pool, "Free Sample", "promo", dec!(0.00), 5).await?;

    // --- basket mutations reconcile stock ------------------------------

    let added = basket_service::add_to_basket(
        &pool,
        &user,
        AddToBasketRequest {
            product_id: lamp,
            quantity: 2,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(stock(&pool, lamp).await?, 8);

    // Adding the same product increments the row.
    basket_service::add_to_basket(
        &pool,
        &user,
        AddToBasketRequest {
            product_id: lamp,
            quantity: 1,
        },
    )
    .await?;
    assert_eq!(stock(&pool, lamp).await?, 7);

    // Over-reserving is rejected and leaves stock untouched.
    let err = basket_service::add_to_basket(
        &pool,
        &user,
        AddToBasketRequest {
            product_id: bottle,
            quantity: 99,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::InsufficientStock { .. }));
    assert_eq!(stock(&pool, bottle).await?, 8);

    // Editing to 0 deletes the item and restores the full 3 units.
    basket_service::edit_basket_item(
        &pool,
        &user,
        added.id,
        EditBasketItemRequest { quantity: 0 },
    )
    .await?;
    assert_eq!(stock(&pool, lamp).await?, 10);

    // --- basket view ----------------------------------------------------

    basket_service::add_to_basket(
        &pool,
        &user,
        AddToBasketRequest {
            product_id: lamp,
            quantity: 2,
        },
    )
    .await?;
    basket_service::add_to_basket(
        &pool,
        &user,
        AddToBasketRequest {
            product_id: bottle,
            quantity: 1,
        },
    )
    .await?;

    let view = basket_service::list_basket(&pool, &user).await?.data.unwrap();
    assert_eq!(view.total_quantity, 3);
    assert_eq!(view.total_cost, dec!(25.00));
    // Ordered by product category: home before outdoor.
    assert_eq!(view.items[0].product.id, lamp);
    assert_eq!(view.items[1].product.id, bottle);

    // --- checkout -------------------------------------------------------

    let lamp_stock_before = stock(&pool, lamp).await?;
    let bottle_stock_before = stock(&pool, bottle).await?;

    let checkout = order_service::checkout(&pool, &user).await?.data.unwrap();
    assert_eq!(checkout.total_cost, dec!(25.00));
    assert_eq!(checkout.items.len(), 2);
    assert_eq!(checkout.order.status, OrderStatus::Forming);
    let prices: Vec<Decimal> = checkout.items.iter().map(|i| i.price).collect();
    assert!(prices.contains(&dec!(10.00)));
    assert!(prices.contains(&dec!(5.00)));

    // Basket is empty, and the reservation transferred without touching stock.
    let view = basket_service::list_basket(&pool, &user).await?.data.unwrap();
    assert!(view.items.is_empty());
    assert_eq!(stock(&pool, lamp).await?, lamp_stock_before);
    assert_eq!(stock(&pool, bottle).await?, bottle_stock_before);

    // Checking out an empty basket produces no order.
    let err = order_service::checkout(&pool, &user).await.unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    // --- payment notifications ------------------------------------------

    let order_id = checkout.order.id;
    order_service::submit_order(&pool, &user, order_id).await?;
    assert_eq!(status(&pool, order_id).await?, OrderStatus::SentToProceed);

    // Submitting twice is rejected.
    let err = order_service::submit_order(&pool, &user, order_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    for (signal, expected) in [
        ("success", OrderStatus::Paid),
        ("success", OrderStatus::Paid), // idempotent
        ("fail", OrderStatus::Unpaid),
        ("whatever", OrderStatus::Pending),
    ] {
        order_service::apply_payment_notification(
            &pool,
            &PaymentNotification {
                order_id,
                status: signal.into(),
            },
        )
        .await?;
        assert_eq!(status(&pool, order_id).await?, expected);
    }

    let err = order_service::apply_payment_notification(
        &pool,
        &PaymentNotification {
            order_id: Uuid::new_v4(),
            status: "success".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    // --- editing a forming order ----------------------------------------

    basket_service::add_to_basket(
        &pool,
        &user,
        AddToBasketRequest {
            product_id: lamp,
            quantity: 1,
        },
    )
    .await?;
    let order2 = order_service::checkout(&pool, &user).await?.data.unwrap();
    let stock_after_checkout = stock(&pool, lamp).await?;

    // Raising the quantity reserves the difference.
    order_service::update_order_items(
        &pool,
        &user,
        order2.order.id,
        UpdateOrderItemsRequest {
            items: vec![OrderItemInput {
                product_id: lamp,
                quantity: 3,
            }],
        },
    )
    .await?;
    assert_eq!(stock(&pool, lamp).await?, stock_after_checkout - 2);

    // Removing everything drives the total to 0: the order is deleted and
    // the reservation returns.
    let err = order_service::update_order_items(
        &pool,
        &user,
        order2.order.id,
        UpdateOrderItemsRequest { items: vec![] },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    assert_eq!(stock(&pool, lamp).await?, stock_after_checkout + 1);
    let err = order_service::get_order(&pool, &user, order2.order.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    // --- deleting an order restores stock -------------------------------

    basket_service::add_to_basket(
        &pool,
        &user,
        AddToBasketRequest {
            product_id: bottle,
            quantity: 2,
        },
    )
    .await?;
    let order3 = order_service::checkout(&pool, &user).await?.data.unwrap();
    let before_delete = stock(&pool, bottle).await?;
    order_service::delete_order(&pool, &user, order3.order.id).await?;
    assert_eq!(stock(&pool, bottle).await?, before_delete + 2);

    // --- zero-total checkout --------------------------------------------

    basket_service::add_to_basket(
        &pool,
        &user,
        AddToBasketRequest {
            product_id: sample,
            quantity: 2,
        },
    )
    .await?;
    assert_eq!(stock(&pool, sample).await?, 3);

    let err = order_service::checkout(&pool, &user).await.unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    // Basket stays cleared, no order persisted, reservation released.
    let view = basket_service::list_basket(&pool, &user).await?.data.unwrap();
    assert!(view.items.is_empty());
    assert_eq!(stock(&pool, sample).await?, 5);

    // --- admin restock goes through the same guarded path ---------------

    let restocked = admin_service::restock_product(
        &pool,
        &admin,
        bottle,
        RestockRequest { delta: 5 },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(restocked.stock, before_delete + 2 + 5);

    let err = admin_service::restock_product(
        &pool,
        &admin,
        bottle,
        RestockRequest { delta: -999 },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    // Non-admins are rejected.
    let err = admin_service::restock_product(&pool, &user, bottle, RestockRequest { delta: 1 })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    // --- OAuth registration degrades without a provider ------------------

    let state = AppState {
        pool: pool.clone(),
        http: reqwest::Client::new(),
        config: AppConfig {
            database_url: database_url.clone(),
            host: "127.0.0.1".into(),
            port: 0,
            // Nothing listens here; enrichment must be skipped, not fatal.
            oauth_profile_api: "http://127.0.0.1:1/users.get".into(),
            media_root: "target/test-media".into(),
        },
    };
    let resp = auth_service::register_oauth(
        &state,
        storefront_api::dto::auth::OAuthRegisterRequest {
            email: "oauth@example.com".into(),
            access_token: "token".into(),
        },
    )
    .await?;
    assert!(resp.data.unwrap().token.starts_with("Bearer "));
    let (gender, age): (Option<String>, Option<i32>) =
        sqlx::query_as("SELECT gender, age FROM users WHERE email = $1")
            .bind("oauth@example.com")
            .fetch_one(&pool)
            .await?;
    assert!(gender.is_none());
    assert!(age.is_none());

    Ok(())
}

async fn create_user(pool: &DbPool, role: &str, email: &str) -> anyhow::Result<Uuid> {
    let (id,): (Uuid,) = sqlx::query_as(
        "INSERT INTO users (id, email, password_hash, role) VALUES ($1, $2, 'dummy', $3) RETURNING id",
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(role)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

async fn create_product(
    pool: &DbPool,
    name: &str,
    category: &str,
    price: Decimal,
    stock: i32,
) -> anyhow::Result<Uuid> {
    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO products (id, name, category, price, stock)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(category)
    .bind(price)
    .bind(stock)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

async fn stock(pool: &DbPool, product_id: Uuid) -> anyhow::Result<i32> {
    let (stock,): (i32,) = sqlx::query_as("SELECT stock FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_one(pool)
        .await?;
    Ok(stock)
}

async fn status(pool: &DbPool, order_id: Uuid) -> anyhow::Result<OrderStatus> {
    let (status,): (OrderStatus,) = sqlx::query_as("SELECT status FROM orders WHERE id = $1")
        .bind(order_id)
        .fetch_one(pool)
        .await?;
    Ok(status)
}
