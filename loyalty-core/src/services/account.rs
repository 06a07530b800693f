//! Account lifecycle, order submission and withdrawals.
//!
//! Validation (credentials, Luhn check, amounts) happens here, before the
//! ledger is touched. Ledger faults are passed up as `AccountError::Ledger`
//! and must never reach end users verbatim.

use crate::entities::orders::Order;
use crate::entities::users::User;
use crate::entities::withdrawals::Withdrawal;
use crate::entities::{AMOUNT_SCALE, OrderNumber};
use crate::ledger::{
    Balance, CreateUserOutcome, Ledger, LedgerError, RegisterOrderOutcome, WithdrawOutcome,
};
use crate::utils::password::{PasswordError, hash_password, verify_password};
use rust_decimal::Decimal;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AccountError {
    /// Empty login or password
    #[error("login and password must not be empty")]
    InvalidCredentials,

    #[error("login is already taken")]
    LoginTaken,

    /// Unknown login or wrong password
    #[error("wrong login or password")]
    WrongCredentials,

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error("password task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOrderOutcome {
    Accepted,
    AlreadySubmittedBySelf,
    ConflictOtherUser,
    /// Not a Luhn-valid positive number
    InvalidNumber,
}

impl From<RegisterOrderOutcome> for SubmitOrderOutcome {
    fn from(value: RegisterOrderOutcome) -> Self {
        match value {
            RegisterOrderOutcome::Accepted => SubmitOrderOutcome::Accepted,
            RegisterOrderOutcome::AlreadySubmittedBySelf => {
                SubmitOrderOutcome::AlreadySubmittedBySelf
            }
            RegisterOrderOutcome::ConflictOtherUser => SubmitOrderOutcome::ConflictOtherUser,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WithdrawalOutcome {
    Ok,
    InsufficientBalance,
    InvalidNumber,
    /// Not positive, or finer than the ledger's precision
    InvalidAmount,
}

pub struct AccountService {
    ledger: Arc<dyn Ledger>,
}

impl AccountService {
    pub fn new(ledger: Arc<dyn Ledger>) -> Self {
        Self { ledger }
    }

    pub async fn register(&self, login: &str, password: &str) -> Result<User, AccountError> {
        let (login, password) = normalize_credentials(login, password)?;

        let hash = tokio::task::spawn_blocking(move || hash_password(&password)).await??;
        match self.ledger.create_user(&login, &hash).await? {
            CreateUserOutcome::Created(user) => {
                info!(user_id = %user.id, "User registered");
                Ok(user)
            }
            CreateUserOutcome::LoginTaken => Err(AccountError::LoginTaken),
        }
    }

    pub async fn login(&self, login: &str, password: &str) -> Result<User, AccountError> {
        let (login, password) = normalize_credentials(login, password)?;

        let Some(user) = self.ledger.find_user_by_login(&login).await? else {
            debug!("Login attempt for unknown user");
            return Err(AccountError::WrongCredentials);
        };
        let stored = user.password_hash.clone();
        let matches =
            tokio::task::spawn_blocking(move || verify_password(&password, &stored)).await??;
        if matches {
            Ok(user)
        } else {
            Err(AccountError::WrongCredentials)
        }
    }

    pub async fn submit_order(
        &self,
        user_id: Uuid,
        raw_number: &str,
    ) -> Result<SubmitOrderOutcome, AccountError> {
        let Some(number) = OrderNumber::parse(raw_number) else {
            return Ok(SubmitOrderOutcome::InvalidNumber);
        };
        let outcome = self.ledger.register_order(user_id, number).await?;
        Ok(outcome.into())
    }

    pub async fn request_withdrawal(
        &self,
        user_id: Uuid,
        raw_number: &str,
        amount: Decimal,
    ) -> Result<WithdrawalOutcome, AccountError> {
        let Some(number) = OrderNumber::parse(raw_number) else {
            return Ok(WithdrawalOutcome::InvalidNumber);
        };
        if amount <= Decimal::ZERO || amount.normalize().scale() > AMOUNT_SCALE {
            return Ok(WithdrawalOutcome::InvalidAmount);
        }
        let amount = amount.round_dp(AMOUNT_SCALE);
        match self.ledger.withdraw(user_id, number, amount).await? {
            WithdrawOutcome::Completed(_) => Ok(WithdrawalOutcome::Ok),
            WithdrawOutcome::InsufficientBalance => Ok(WithdrawalOutcome::InsufficientBalance),
        }
    }

    pub async fn get_balance(&self, user_id: Uuid) -> Result<Balance, AccountError> {
        Ok(self.ledger.balance(user_id).await?)
    }

    pub async fn list_orders(&self, user_id: Uuid) -> Result<Vec<Order>, AccountError> {
        Ok(self.ledger.list_orders(user_id).await?)
    }

    pub async fn list_withdrawals(&self, user_id: Uuid) -> Result<Vec<Withdrawal>, AccountError> {
        Ok(self.ledger.list_withdrawals(user_id).await?)
    }
}

fn normalize_credentials(login: &str, password: &str) -> Result<(String, String), AccountError> {
    let login = login.trim();
    // Only the login is normalized; the password is hashed as given.
    if login.is_empty() || password.trim().is_empty() {
        return Err(AccountError::InvalidCredentials);
    }
    Ok((login.to_owned(), password.to_owned()))
}
