//! Custom Axum extractors for request authentication.
//!
//! Provides `AuthUser`, which verifies the `gophermart` session cookie and
//! yields the user id it carries. All cryptographic operations are delegated
//! to [`loyalty_sdk::signature`].

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, header, request::Parts},
    response::{IntoResponse, Response},
};
use loyalty_sdk::signature::{self, SessionError};
use uuid::Uuid;

use crate::state::AppState;

/// Id of the user authenticated by the session cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser(pub Uuid);

/// Errors returned by the [`AuthUser`] extractor.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing session cookie")]
    MissingCookie,
    #[error("invalid session cookie: {0}")]
    Invalid(#[from] SessionError),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        tracing::debug!(error = %self, "Rejected unauthenticated request");
        (StatusCode::UNAUTHORIZED, "unauthorized").into_response()
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|h| h.to_str().ok())
            .find_map(signature::find_session_cookie)
            .ok_or(AuthError::MissingCookie)?;

        let user_id = signature::verify_session(value, &state.session_key)?;
        Ok(AuthUser(user_id))
    }
}
