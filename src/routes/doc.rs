use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        basket::{BasketItemView, BasketView},
        orders::{OrderItemInput, OrderList, OrderWithItems, UpdateOrderItemsRequest},
        products::{PriceLookup, ProductList},
    },
    models::{BasketItem, Order, OrderItem, OrderStatus, Product, User},
    response::{ApiResponse, Meta},
    routes::{admin, auth, basket, health, orders, params, payment, products},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::login,
        auth::oauth_register,
        products::list_products,
        products::get_product,
        products::get_price,
        products::create_product,
        products::update_product,
        products::delete_product,
        basket::basket_view,
        basket::add_to_basket,
        basket::edit_basket_item,
        basket::remove_from_basket,
        basket::clear_basket,
        orders::list_orders,
        orders::checkout,
        orders::get_order,
        orders::update_order_items,
        orders::submit_order,
        orders::delete_order,
        payment::payment_result,
        admin::list_all_orders,
        admin::list_low_stock,
        admin::restock_product
    ),
    components(
        schemas(
            User,
            Product,
            BasketItem,
            Order,
            OrderItem,
            OrderStatus,
            BasketItemView,
            BasketView,
            OrderList,
            OrderWithItems,
            UpdateOrderItemsRequest,
            OrderItemInput,
            PriceLookup,
            ProductList,
            params::Pagination,
            params::ProductQuery,
            params::OrderListQuery,
            params::LowStockQuery,
            params::RestockRequest,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<BasketView>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Products", description = "Catalog endpoints"),
        (name = "Basket", description = "Basket endpoints"),
        (name = "Orders", description = "Order endpoints"),
        (name = "Payment", description = "Payment gateway callback"),
        (name = "Admin", description = "Admin endpoints"),
        (name = "Auth", description = "Authentication endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
