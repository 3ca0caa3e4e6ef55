use axum::{
    Router,
    extract::{Query, State},
    response::Redirect,
    routing::get,
};

use crate::{
    dto::orders::PaymentNotification, error::AppResult, services::order_service, state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/result", get(payment_result))
}

/// Gateway-facing callback. No bearer auth: the gateway redirects the
/// user's browser here with the result in the query string.
#[utoipa::path(
    get,
    path = "/api/payment/result",
    params(
        ("order_id" = Uuid, Query, description = "Order ID"),
        ("status" = String, Query, description = "Gateway status: success, fail, or anything else (pending)")
    ),
    responses(
        (status = 303, description = "Status applied; redirect to the order list"),
        (status = 404, description = "Unknown order"),
    ),
    tag = "Payment"
)]
pub async fn payment_result(
    State(state): State<AppState>,
    Query(note): Query<PaymentNotification>,
) -> AppResult<Redirect> {
    order_service::apply_payment_notification(&state.pool, &note).await?;
    Ok(Redirect::to("/api/orders"))
}
