//! Session cookie signing.
//!
//! The session cookie carries the user id in clear text behind an
//! HMAC-SHA256 tag:
//!
//! ```text
//! gophermart=base64(HMAC-SHA256("{cookie_name}{user_id}", key) || user_id)
//! ```
//!
//! The tag binds the value to the cookie name so a value lifted from another
//! cookie signed with the same key is rejected.

use uuid::Uuid;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "gophermart";

/// Lifetime of the session cookie (in seconds).
pub const SESSION_MAX_AGE: i64 = 60 * 60;

/// Length of an HMAC-SHA256 tag.
const TAG_LEN: usize = 32;

/// Errors produced when verifying a session cookie.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("invalid base64 encoding")]
    InvalidBase64,
    #[error("session value is too short")]
    Truncated,
    #[error("invalid signature")]
    SignatureMismatch,
    #[error("session does not carry a user id")]
    InvalidUserId,
}

impl From<ring::error::Unspecified> for SessionError {
    fn from(_: ring::error::Unspecified) -> Self {
        Self::SignatureMismatch
    }
}

fn signing_input(value: &[u8]) -> Vec<u8> {
    let mut data = Vec::with_capacity(SESSION_COOKIE.len() + value.len());
    data.extend_from_slice(SESSION_COOKIE.as_bytes());
    data.extend_from_slice(value);
    data
}

/// Sign a user id into a session cookie value.
pub fn sign_session(user_id: Uuid, key: &[u8]) -> String {
    let value = user_id.to_string();
    let tag = ring::hmac::sign(
        &ring::hmac::Key::new(ring::hmac::HMAC_SHA256, key),
        &signing_input(value.as_bytes()),
    );
    let mut signed = Vec::with_capacity(TAG_LEN + value.len());
    signed.extend_from_slice(tag.as_ref());
    signed.extend_from_slice(value.as_bytes());
    fast32::base64::RFC4648_NOPAD.encode(&signed)
}

/// Verify a session cookie value and return the user id it carries.
pub fn verify_session(cookie_value: &str, key: &[u8]) -> Result<Uuid, SessionError> {
    let signed = fast32::base64::RFC4648_NOPAD
        .decode_str(cookie_value)
        .map_err(|_| SessionError::InvalidBase64)?;
    if signed.len() <= TAG_LEN {
        return Err(SessionError::Truncated);
    }
    let (tag, value) = signed.split_at(TAG_LEN);
    ring::hmac::verify(
        &ring::hmac::Key::new(ring::hmac::HMAC_SHA256, key),
        &signing_input(value),
        tag,
    )?;
    let value = std::str::from_utf8(value).map_err(|_| SessionError::InvalidUserId)?;
    Uuid::parse_str(value).map_err(|_| SessionError::InvalidUserId)
}

/// Format a complete `Set-Cookie` header value for the given user.
pub fn session_set_cookie(user_id: Uuid, key: &[u8]) -> String {
    format!(
        "{SESSION_COOKIE}={}; Path=/; Max-Age={SESSION_MAX_AGE}; HttpOnly",
        sign_session(user_id, key)
    )
}

/// Find the session cookie value in a raw `Cookie` request header.
pub fn find_session_cookie(cookie_header: &str) -> Option<&str> {
    cookie_header.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE).then_some(value)
    })
}
