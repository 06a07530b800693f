//! In-process ledger.

use super::{
    Balance, CreateUserOutcome, Ledger, LedgerError, RegisterOrderOutcome, VerdictOutcome,
    WithdrawOutcome, verdict_accrual,
};
use crate::entities::orders::{Order, PendingCursor, PendingOrder};
use crate::entities::users::User;
use crate::entities::withdrawals::Withdrawal;
use crate::entities::{OrderNumber, OrderStatus};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct State {
    users: HashMap<Uuid, User>,
    logins: HashMap<String, Uuid>,
    orders: HashMap<OrderNumber, Order>,
    withdrawals: Vec<Withdrawal>,
}

/// Ledger kept in memory behind a single mutex.
///
/// Each operation runs as one critical section, which gives the same
/// atomicity as a Postgres transaction. Nothing is persisted.
#[derive(Default)]
pub struct MemoryLedger {
    state: Mutex<State>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Status and accrual of an order, if it exists.
    pub async fn order(&self, number: OrderNumber) -> Option<(OrderStatus, Decimal)> {
        let state = self.state.lock().await;
        state.orders.get(&number).map(|o| (o.status, o.accrual))
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn create_user(
        &self,
        login: &str,
        password_hash: &str,
    ) -> Result<CreateUserOutcome, LedgerError> {
        let mut state = self.state.lock().await;
        if state.logins.contains_key(login) {
            return Ok(CreateUserOutcome::LoginTaken);
        }
        let user = User {
            id: Uuid::now_v7(),
            login: login.to_owned(),
            password_hash: password_hash.to_owned(),
            balance: Decimal::ZERO,
            withdrawn: Decimal::ZERO,
            created_at: OffsetDateTime::now_utc(),
        };
        state.logins.insert(user.login.clone(), user.id);
        state.users.insert(user.id, user.clone());
        Ok(CreateUserOutcome::Created(user))
    }

    async fn find_user_by_login(&self, login: &str) -> Result<Option<User>, LedgerError> {
        let state = self.state.lock().await;
        Ok(state
            .logins
            .get(login)
            .and_then(|id| state.users.get(id))
            .cloned())
    }

    async fn register_order(
        &self,
        user_id: Uuid,
        number: OrderNumber,
    ) -> Result<RegisterOrderOutcome, LedgerError> {
        let mut state = self.state.lock().await;
        if !state.users.contains_key(&user_id) {
            return Err(LedgerError::UserNotFound(user_id));
        }
        if let Some(existing) = state.orders.get(&number) {
            return Ok(if existing.user_id == user_id {
                RegisterOrderOutcome::AlreadySubmittedBySelf
            } else {
                RegisterOrderOutcome::ConflictOtherUser
            });
        }
        state.orders.insert(
            number,
            Order {
                id: Uuid::now_v7(),
                user_id,
                number,
                status: OrderStatus::New,
                accrual: Decimal::ZERO,
                uploaded_at: OffsetDateTime::now_utc(),
            },
        );
        Ok(RegisterOrderOutcome::Accepted)
    }

    async fn list_orders(&self, user_id: Uuid) -> Result<Vec<Order>, LedgerError> {
        let state = self.state.lock().await;
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        // v7 ids are time-ordered and break ties between equal timestamps.
        orders.sort_by(|a, b| (b.uploaded_at, b.id).cmp(&(a.uploaded_at, a.id)));
        Ok(orders)
    }

    async fn pending_orders(
        &self,
        after: Option<PendingCursor>,
        limit: usize,
    ) -> Result<Vec<PendingOrder>, LedgerError> {
        let state = self.state.lock().await;
        let mut pending: Vec<PendingOrder> = state
            .orders
            .values()
            .filter(|o| !o.status.is_terminal())
            .map(|o| PendingOrder {
                id: o.id,
                number: o.number,
                uploaded_at: o.uploaded_at,
            })
            .filter(|o| after.is_none_or(|after| o.cursor() > after))
            .collect();
        pending.sort_by_key(PendingOrder::cursor);
        pending.truncate(limit);
        Ok(pending)
    }

    async fn apply_order_verdict(
        &self,
        number: OrderNumber,
        status: OrderStatus,
        accrual: Option<Decimal>,
    ) -> Result<VerdictOutcome, LedgerError> {
        let mut state = self.state.lock().await;
        let Some(order) = state.orders.get(&number) else {
            return Ok(VerdictOutcome::UnknownOrder);
        };
        if order.status.is_terminal() {
            return Ok(VerdictOutcome::AlreadyTerminal);
        }
        let owner = order.user_id;
        let accrual = verdict_accrual(status, accrual);
        // Check the owner before mutating so a failure leaves nothing applied.
        if !state.users.contains_key(&owner) {
            return Err(LedgerError::UserNotFound(owner));
        }
        if let Some(order) = state.orders.get_mut(&number) {
            order.status = status;
            if let Some(accrual) = accrual {
                order.accrual = accrual;
            }
        }
        if let (Some(accrual), Some(user)) = (accrual, state.users.get_mut(&owner)) {
            user.balance += accrual;
        }
        Ok(VerdictOutcome::Applied)
    }

    async fn withdraw(
        &self,
        user_id: Uuid,
        number: OrderNumber,
        amount: Decimal,
    ) -> Result<WithdrawOutcome, LedgerError> {
        let mut state = self.state.lock().await;
        let Some(user) = state.users.get_mut(&user_id) else {
            return Err(LedgerError::UserNotFound(user_id));
        };
        if amount > user.balance {
            return Ok(WithdrawOutcome::InsufficientBalance);
        }
        user.balance -= amount;
        user.withdrawn += amount;
        let withdrawal = Withdrawal {
            id: Uuid::now_v7(),
            user_id,
            order_number: number,
            amount,
            processed_at: OffsetDateTime::now_utc(),
        };
        state.withdrawals.push(withdrawal.clone());
        Ok(WithdrawOutcome::Completed(withdrawal))
    }

    async fn list_withdrawals(&self, user_id: Uuid) -> Result<Vec<Withdrawal>, LedgerError> {
        let state = self.state.lock().await;
        Ok(state
            .withdrawals
            .iter()
            .rev()
            .filter(|w| w.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn balance(&self, user_id: Uuid) -> Result<Balance, LedgerError> {
        let state = self.state.lock().await;
        let user = state
            .users
            .get(&user_id)
            .ok_or(LedgerError::UserNotFound(user_id))?;
        Ok(Balance {
            current: user.balance,
            withdrawn: user.withdrawn,
        })
    }
}
