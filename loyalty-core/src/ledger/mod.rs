//! Balance ledger.
//!
//! The ledger is the only shared mutable resource of the system. Every
//! operation that touches more than one row (verdict application, order
//! registration, withdrawal) is atomic inside the implementation, so callers
//! never coordinate with each other to keep balances consistent.
//!
//! Two implementations are provided:
//!
//! - [`PgLedger`]: Postgres-backed, one transaction per operation.
//! - [`MemoryLedger`]: in-process, one mutex over all state. Used by tests
//!   and as a fake for the reconciliation engine.

mod memory;
mod postgres;

pub use memory::MemoryLedger;
pub use postgres::PgLedger;

use crate::entities::orders::{Order, PendingCursor, PendingOrder};
use crate::entities::users::User;
use crate::entities::withdrawals::Withdrawal;
use crate::entities::{OrderNumber, OrderStatus};
use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur in ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The referenced user does not exist
    #[error("user not found: {0}")]
    UserNotFound(Uuid),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateUserOutcome {
    Created(User),
    LoginTaken,
}

/// Result of registering an order number for a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOrderOutcome {
    /// The number was free and is now a `NEW` order of the user.
    Accepted,
    /// The same user registered this number before.
    AlreadySubmittedBySelf,
    /// Another user owns this number.
    ConflictOtherUser,
}

/// Result of applying an oracle verdict to an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerdictOutcome {
    /// The order was non-terminal and now carries the verdict. A `PROCESSED`
    /// verdict credited the owner in the same atomic unit.
    Applied,
    /// The order was already `INVALID` or `PROCESSED`; nothing changed.
    AlreadyTerminal,
    /// No order with this number exists.
    UnknownOrder,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WithdrawOutcome {
    Completed(Withdrawal),
    /// The balance does not cover the amount; nothing changed.
    InsufficientBalance,
}

/// Current balance and total withdrawn amount of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Balance {
    pub current: Decimal,
    pub withdrawn: Decimal,
}

/// Accrual a verdict writes to its order, and credits to the owner.
///
/// `None` for every status but `PROCESSED`, whose missing accrual counts
/// as zero.
pub(crate) fn verdict_accrual(status: OrderStatus, accrual: Option<Decimal>) -> Option<Decimal> {
    (status == OrderStatus::Processed).then(|| accrual.unwrap_or(Decimal::ZERO))
}

/// Durable store of users, orders and withdrawals.
///
/// Amounts handed to the ledger are expected to be rounded to
/// [`AMOUNT_SCALE`](crate::entities::AMOUNT_SCALE) fractional digits.
#[async_trait]
pub trait Ledger: Send + Sync + 'static {
    async fn create_user(
        &self,
        login: &str,
        password_hash: &str,
    ) -> Result<CreateUserOutcome, LedgerError>;

    async fn find_user_by_login(&self, login: &str) -> Result<Option<User>, LedgerError>;

    /// Register `number` for `user_id`. Race-free: of two concurrent
    /// registrations of the same number exactly one is `Accepted`.
    async fn register_order(
        &self,
        user_id: Uuid,
        number: OrderNumber,
    ) -> Result<RegisterOrderOutcome, LedgerError>;

    /// Orders of a user, newest first.
    async fn list_orders(&self, user_id: Uuid) -> Result<Vec<Order>, LedgerError>;

    /// Orders still awaiting a final verdict (`NEW` or `PROCESSING`) in
    /// `(uploaded_at, id)` order, starting strictly after `after`, at most
    /// `limit` of them. Passing the cursor of the last order of a page
    /// returns the next page.
    async fn pending_orders(
        &self,
        after: Option<PendingCursor>,
        limit: usize,
    ) -> Result<Vec<PendingOrder>, LedgerError>;

    /// Move a non-terminal order to `status`.
    ///
    /// Only `PROCESSED` writes an accrual: the order records `accrual` (zero
    /// when absent) and the owner's balance is credited with the same amount
    /// in the same atomic unit. Any other status updates the status alone. Applying a verdict to a terminal order is a no-op,
    /// which makes replays from the discovery cycle harmless.
    async fn apply_order_verdict(
        &self,
        number: OrderNumber,
        status: OrderStatus,
        accrual: Option<Decimal>,
    ) -> Result<VerdictOutcome, LedgerError>;

    /// Debit `amount` from the user's balance and record the withdrawal.
    ///
    /// The balance check and the debit are atomic with respect to other
    /// withdrawals and credits of the same user.
    async fn withdraw(
        &self,
        user_id: Uuid,
        number: OrderNumber,
        amount: Decimal,
    ) -> Result<WithdrawOutcome, LedgerError>;

    /// Withdrawals of a user, newest first.
    async fn list_withdrawals(&self, user_id: Uuid) -> Result<Vec<Withdrawal>, LedgerError>;

    async fn balance(&self, user_id: Uuid) -> Result<Balance, LedgerError>;
}
