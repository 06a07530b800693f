use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use loyalty_core::entities::OrderStatus;
use loyalty_core::entities::orders::Order;
use loyalty_core::services::SubmitOrderOutcome;
use loyalty_sdk::objects::OrderResponse;

use crate::api::extractors::AuthUser;
use crate::state::AppState;

use super::UserApiError;

fn to_response(order: &Order) -> OrderResponse {
    OrderResponse {
        number: order.number.to_string(),
        status: order.status.into(),
        accrual: (order.status == OrderStatus::Processed).then_some(order.accrual),
        uploaded_at: order.uploaded_at,
    }
}

/// `POST /orders`: submit an order number as a `text/plain` body.
///
/// `202` for a new order, `200` if the caller already submitted it.
pub async fn submit_order(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    headers: HeaderMap,
    body: String,
) -> Result<StatusCode, UserApiError> {
    let is_text = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim_start().starts_with("text/plain"));
    if !is_text {
        return Err(UserApiError::BadRequest("expected a text/plain body"));
    }

    match state.accounts.submit_order(user_id, &body).await? {
        SubmitOrderOutcome::Accepted => Ok(StatusCode::ACCEPTED),
        SubmitOrderOutcome::AlreadySubmittedBySelf => Ok(StatusCode::OK),
        SubmitOrderOutcome::ConflictOtherUser => Err(UserApiError::OrderOwnedByAnotherUser),
        SubmitOrderOutcome::InvalidNumber => Err(UserApiError::InvalidOrderNumber),
    }
}

/// `GET /orders`: newest first, `204` when there are none.
pub async fn list_orders(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Response, UserApiError> {
    let orders = state.accounts.list_orders(user_id).await?;
    if orders.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    let body: Vec<OrderResponse> = orders.iter().map(to_response).collect();
    Ok(Json(body).into_response())
}
