//! Request-path services used by the HTTP layer.

mod account;

pub use account::{AccountError, AccountService, SubmitOrderOutcome, WithdrawalOutcome};
