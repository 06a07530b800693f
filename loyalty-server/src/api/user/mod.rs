//! User API handlers.
//!
//! # Endpoints
//!
//! - `POST /register`          – create an account, sets the session cookie
//! - `POST /login`             – authenticate, sets the session cookie
//! - `POST /orders`            – submit an order number (`text/plain` body)
//! - `GET  /orders`            – list submitted orders
//! - `GET  /balance`           – current and withdrawn points
//! - `POST /balance/withdraw`  – spend points on an order
//! - `GET  /withdrawals`       – list withdrawals
//!
//! Everything except registration and login requires the session cookie.

use axum::{
    Router,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use loyalty_core::services::AccountError;
use loyalty_sdk::signature::session_set_cookie;
use uuid::Uuid;

use crate::state::AppState;

mod auth;
mod balance;
mod orders;
mod withdrawals;

#[cfg(test)]
mod tests;

/// Build the User API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/orders", post(orders::submit_order).get(orders::list_orders))
        .route("/balance", get(balance::get_balance))
        .route("/balance/withdraw", post(balance::withdraw))
        .route("/withdrawals", get(withdrawals::list_withdrawals))
}

// ---------------------------------------------------------------------------
// Shared error type
// ---------------------------------------------------------------------------

/// Errors that can occur in User API handlers.
#[derive(Debug)]
pub(crate) enum UserApiError {
    BadRequest(&'static str),
    WrongCredentials,
    LoginTaken,
    OrderOwnedByAnotherUser,
    InvalidOrderNumber,
    InvalidAmount,
    InsufficientBalance,
    Internal(AccountError),
}

impl From<AccountError> for UserApiError {
    fn from(e: AccountError) -> Self {
        match e {
            AccountError::InvalidCredentials => {
                UserApiError::BadRequest("login and password must not be empty")
            }
            AccountError::LoginTaken => UserApiError::LoginTaken,
            AccountError::WrongCredentials => UserApiError::WrongCredentials,
            other => UserApiError::Internal(other),
        }
    }
}

impl IntoResponse for UserApiError {
    fn into_response(self) -> Response {
        match self {
            UserApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, message).into_response()
            }
            UserApiError::WrongCredentials => {
                (StatusCode::UNAUTHORIZED, "wrong login or password").into_response()
            }
            UserApiError::LoginTaken => {
                (StatusCode::CONFLICT, "login is already taken").into_response()
            }
            UserApiError::OrderOwnedByAnotherUser => (
                StatusCode::CONFLICT,
                "order number was submitted by another user",
            )
                .into_response(),
            UserApiError::InvalidOrderNumber => {
                (StatusCode::UNPROCESSABLE_ENTITY, "invalid order number").into_response()
            }
            UserApiError::InvalidAmount => {
                (StatusCode::UNPROCESSABLE_ENTITY, "invalid amount").into_response()
            }
            UserApiError::InsufficientBalance => {
                (StatusCode::PAYMENT_REQUIRED, "insufficient balance").into_response()
            }
            UserApiError::Internal(e) => {
                tracing::error!(error = %e, "User API internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `200 OK` carrying a fresh session cookie for `user_id`.
fn with_session(state: &AppState, user_id: Uuid) -> Response {
    (
        StatusCode::OK,
        [(header::SET_COOKIE, session_set_cookie(user_id, &state.session_key))],
    )
        .into_response()
}
