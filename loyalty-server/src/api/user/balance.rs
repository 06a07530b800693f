use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use loyalty_core::services::WithdrawalOutcome;
use loyalty_sdk::objects::{BalanceResponse, WithdrawRequest};

use crate::api::extractors::AuthUser;
use crate::state::AppState;

use super::UserApiError;

/// `GET /balance`
pub async fn get_balance(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<BalanceResponse>, UserApiError> {
    let balance = state.accounts.get_balance(user_id).await?;
    Ok(Json(BalanceResponse {
        current: balance.current,
        withdrawn: balance.withdrawn,
    }))
}

/// `POST /balance/withdraw`: `402` if the balance does not cover `sum`.
pub async fn withdraw(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    payload: Result<Json<WithdrawRequest>, JsonRejection>,
) -> Result<StatusCode, UserApiError> {
    let Json(request) =
        payload.map_err(|_| UserApiError::BadRequest("expected JSON {order, sum}"))?;

    match state
        .accounts
        .request_withdrawal(user_id, &request.order, request.sum)
        .await?
    {
        WithdrawalOutcome::Ok => Ok(StatusCode::OK),
        WithdrawalOutcome::InsufficientBalance => Err(UserApiError::InsufficientBalance),
        WithdrawalOutcome::InvalidNumber => Err(UserApiError::InvalidOrderNumber),
        WithdrawalOutcome::InvalidAmount => Err(UserApiError::InvalidAmount),
    }
}
