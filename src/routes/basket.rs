use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, patch},
};
use uuid::Uuid;

use crate::{
    dto::basket::{AddToBasketRequest, BasketView, EditBasketItemRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    models::BasketItem,
    response::ApiResponse,
    services::basket_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(basket_view).post(add_to_basket).delete(clear_basket))
        .route(
            "/items/{item_id}",
            patch(edit_basket_item).delete(remove_from_basket),
        )
}

#[utoipa::path(
    get,
    path = "/api/basket",
    responses(
        (status = 200, description = "Basket with per-request totals, ordered by product category", body = ApiResponse<BasketView>)
    ),
    security(("bearer_auth" = [])),
    tag = "Basket"
)]
pub async fn basket_view(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<BasketView>>> {
    let resp = basket_service::list_basket(&state.pool, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/basket",
    request_body = AddToBasketRequest,
    responses(
        (status = 200, description = "Add to basket or increment an existing item", body = ApiResponse<BasketItem>),
        (status = 400, description = "Bad request"),
        (status = 409, description = "Insufficient stock"),
    ),
    security(("bearer_auth" = [])),
    tag = "Basket"
)]
pub async fn add_to_basket(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<AddToBasketRequest>,
) -> AppResult<Json<ApiResponse<BasketItem>>> {
    let resp = basket_service::add_to_basket(&state.pool, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/api/basket/items/{item_id}",
    params(
        ("item_id" = Uuid, Path, description = "Basket item ID")
    ),
    request_body = EditBasketItemRequest,
    responses(
        (status = 200, description = "Set absolute quantity; 0 removes the item", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Basket item not found"),
        (status = 409, description = "Insufficient stock"),
    ),
    security(("bearer_auth" = [])),
    tag = "Basket"
)]
pub async fn edit_basket_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(item_id): Path<Uuid>,
    Json(payload): Json<EditBasketItemRequest>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = basket_service::edit_basket_item(&state.pool, &user, item_id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/basket/items/{item_id}",
    params(
        ("item_id" = Uuid, Path, description = "Basket item ID")
    ),
    responses(
        (status = 200, description = "OK", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Basket item not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Basket"
)]
pub async fn remove_from_basket(
    State(state): State<AppState>,
    user: AuthUser,
    Path(item_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = basket_service::remove_from_basket(&state.pool, &user, item_id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/basket",
    responses(
        (status = 200, description = "Remove every item, releasing reserved stock", body = ApiResponse<serde_json::Value>)
    ),
    security(("bearer_auth" = [])),
    tag = "Basket"
)]
pub async fn clear_basket(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = basket_service::clear_basket(&state.pool, &user).await?;
    Ok(Json(resp))
}
