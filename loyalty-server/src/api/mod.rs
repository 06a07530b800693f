//! HTTP API.
//!
//! - `extractors`: session-cookie authentication
//! - `user`: the user API mounted under `/api/user`

pub mod extractors;
pub mod user;
