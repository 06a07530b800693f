use super::{AccrualOracle, OracleError, Verdict};
use crate::entities::{AMOUNT_SCALE, OrderNumber};
use async_trait::async_trait;
use loyalty_sdk::objects::AccrualResponse;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use tracing::debug;
use url::Url;

impl From<reqwest::Error> for OracleError {
    fn from(e: reqwest::Error) -> Self {
        OracleError::Transport(e.to_string())
    }
}

/// HTTP client for the accrual service's `GET /api/orders/{number}`.
#[derive(Debug, Clone)]
pub struct AccrualClient {
    base_url: String,
    http_client: reqwest::Client,
}

impl AccrualClient {
    pub fn new(base_url: &Url) -> Self {
        Self::with_client(base_url, reqwest::Client::new())
    }

    pub fn with_client(base_url: &Url, http_client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.as_str().trim_end_matches('/').to_owned(),
            http_client,
        }
    }

    fn order_url(&self, number: OrderNumber) -> String {
        format!("{}/api/orders/{}", self.base_url, number)
    }
}

#[async_trait]
impl AccrualOracle for AccrualClient {
    async fn query(&self, number: OrderNumber) -> Result<Verdict, OracleError> {
        let response = self.http_client.get(self.order_url(number)).send().await?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => return Err(OracleError::Overloaded),
            StatusCode::NO_CONTENT => return Err(OracleError::NotYetKnown),
            StatusCode::OK => {}
            status => {
                return Err(OracleError::Transport(format!(
                    "unexpected status {status}"
                )));
            }
        }

        let body: AccrualResponse = response.json().await?;
        debug!(order = %number, status = %body.status, "Accrual service answered");

        if body.order.trim() != number.to_string() {
            return Err(OracleError::Transport(format!(
                "answer for order {} while asking for {}",
                body.order, number
            )));
        }
        let accrual = match body.accrual {
            Some(a) if a < Decimal::ZERO => {
                return Err(OracleError::Transport(format!("negative accrual {a}")));
            }
            Some(a) => Some(a.round_dp(AMOUNT_SCALE)),
            None => None,
        };

        Ok(Verdict {
            number,
            status: body.status,
            accrual,
        })
    }
}
