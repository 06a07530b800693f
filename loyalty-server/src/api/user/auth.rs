use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    response::Response,
};
use loyalty_sdk::objects::Credentials;

use crate::state::AppState;

use super::{UserApiError, with_session};

/// `POST /register`: create an account and log it in.
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<Response, UserApiError> {
    let Json(credentials) =
        payload.map_err(|_| UserApiError::BadRequest("expected JSON {login, password}"))?;

    let user = state
        .accounts
        .register(&credentials.login, &credentials.password)
        .await?;
    Ok(with_session(&state, user.id))
}

/// `POST /login`
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<Response, UserApiError> {
    let Json(credentials) =
        payload.map_err(|_| UserApiError::BadRequest("expected JSON {login, password}"))?;

    let user = state
        .accounts
        .login(&credentials.login, &credentials.password)
        .await?;
    Ok(with_session(&state, user.id))
}
