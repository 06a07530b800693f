//! Payloads returned by the external accrual service.
//!
//! `GET /api/orders/{number}` answers with
//!
//! ```json
//! { "order": "3536137811022331", "status": "PROCESSED", "accrual": 500 }
//! ```
//!
//! `accrual` is only present for `PROCESSED` orders.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Verdict status as reported by the accrual service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccrualStatus {
    /// The order is known but calculation has not started.
    Registered,
    /// Calculation is in progress.
    Processing,
    /// The order will never earn points.
    Invalid,
    /// Calculation finished, `accrual` holds the earned points.
    Processed,
}

impl std::fmt::Display for AccrualStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccrualStatus::Registered => write!(f, "REGISTERED"),
            AccrualStatus::Processing => write!(f, "PROCESSING"),
            AccrualStatus::Invalid => write!(f, "INVALID"),
            AccrualStatus::Processed => write!(f, "PROCESSED"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccrualResponse {
    pub order: String,
    pub status: AccrualStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accrual: Option<Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processed_with_float_accrual() {
        let json = r#"{"order":"3536137811022331","status":"PROCESSED","accrual":729.98}"#;
        let response: AccrualResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.status, AccrualStatus::Processed);
        assert_eq!(response.accrual, Some(Decimal::new(72998, 2)));
    }

    #[test]
    fn test_registered_without_accrual() {
        let json = r#"{"order":"4539088167512356","status":"REGISTERED"}"#;
        let response: AccrualResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.status, AccrualStatus::Registered);
        assert_eq!(response.accrual, None);
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let json = r#"{"order":"4539088167512356","status":"DONE"}"#;
        assert!(serde_json::from_str::<AccrualResponse>(json).is_err());
    }
}
