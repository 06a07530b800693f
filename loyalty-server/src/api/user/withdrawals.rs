use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use loyalty_sdk::objects::WithdrawalResponse;

use crate::api::extractors::AuthUser;
use crate::state::AppState;

use super::UserApiError;

/// `GET /withdrawals`: newest first, `204` when there are none.
pub async fn list_withdrawals(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Response, UserApiError> {
    let withdrawals = state.accounts.list_withdrawals(user_id).await?;
    if withdrawals.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    let body: Vec<WithdrawalResponse> = withdrawals
        .iter()
        .map(|w| WithdrawalResponse {
            order: w.order_number.to_string(),
            sum: w.amount,
            processed_at: w.processed_at,
        })
        .collect();
    Ok(Json(body).into_response())
}
