//! Accrual oracle: the external service that decides how many points an
//! order earns.

mod client;

pub use client::AccrualClient;

use crate::entities::OrderNumber;
use async_trait::async_trait;
use loyalty_sdk::objects::AccrualStatus;
use rust_decimal::Decimal;
use thiserror::Error;

/// Classified failure of a single oracle query.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
    /// The oracle asked us to slow down (HTTP 429).
    #[error("accrual service is overloaded")]
    Overloaded,

    /// The oracle has no data for the order yet (HTTP 204).
    #[error("accrual service does not know the order yet")]
    NotYetKnown,

    /// Network failure, timeout, unexpected status or malformed body.
    #[error("accrual service transport error: {0}")]
    Transport(String),
}

/// Verdict reported by the oracle for one order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub number: OrderNumber,
    pub status: AccrualStatus,
    /// Earned points, only present for `PROCESSED`.
    pub accrual: Option<Decimal>,
}

/// Single-attempt query of the accrual oracle.
///
/// Implementations never retry; retries and backoff belong to the caller.
#[async_trait]
pub trait AccrualOracle: Send + Sync + 'static {
    async fn query(&self, number: OrderNumber) -> Result<Verdict, OracleError>;
}
