//! Postgres-backed ledger.

use super::{
    Balance, CreateUserOutcome, Ledger, LedgerError, RegisterOrderOutcome, VerdictOutcome,
    WithdrawOutcome, verdict_accrual,
};
use crate::entities::orders::{
    GetOrderOwner, InsertOrder, ListOrdersByUser, ListPendingOrders, Order, PendingCursor,
    PendingOrder,
};
use crate::entities::users::{GetUserBalance, GetUserByLogin, InsertUser, User};
use crate::entities::withdrawals::{ListWithdrawalsByUser, Withdrawal};
use crate::entities::{OrderNumber, OrderStatus};
use crate::framework::DatabaseProcessor;
use async_trait::async_trait;
use kanau::processor::Processor;
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{debug, info};
use uuid::Uuid;

/// Ledger stored in Postgres.
///
/// Uniqueness of order numbers and logins is enforced by constraints, and
/// every multi-row operation runs in a single transaction whose conditional
/// `UPDATE` re-checks its predicate under the row lock.
#[derive(Clone)]
pub struct PgLedger {
    db: DatabaseProcessor,
}

impl PgLedger {
    pub fn new(pool: PgPool) -> Self {
        Self {
            db: DatabaseProcessor::new(pool),
        }
    }
}

#[async_trait]
impl Ledger for PgLedger {
    async fn create_user(
        &self,
        login: &str,
        password_hash: &str,
    ) -> Result<CreateUserOutcome, LedgerError> {
        let inserted = self
            .db
            .process(InsertUser {
                id: Uuid::now_v7(),
                login: login.to_owned(),
                password_hash: password_hash.to_owned(),
            })
            .await?;
        Ok(match inserted {
            Some(user) => CreateUserOutcome::Created(user),
            None => CreateUserOutcome::LoginTaken,
        })
    }

    async fn find_user_by_login(&self, login: &str) -> Result<Option<User>, LedgerError> {
        let user = self
            .db
            .process(GetUserByLogin {
                login: login.to_owned(),
            })
            .await?;
        Ok(user)
    }

    async fn register_order(
        &self,
        user_id: Uuid,
        number: OrderNumber,
    ) -> Result<RegisterOrderOutcome, LedgerError> {
        let inserted = match self
            .db
            .process(InsertOrder {
                id: Uuid::now_v7(),
                user_id,
                number,
            })
            .await
        {
            Ok(inserted) => inserted,
            Err(sqlx::Error::Database(e)) if e.is_foreign_key_violation() => {
                return Err(LedgerError::UserNotFound(user_id));
            }
            Err(e) => return Err(e.into()),
        };
        if inserted {
            info!(order = %number, user_id = %user_id, "Order registered");
            return Ok(RegisterOrderOutcome::Accepted);
        }

        // Rows are never deleted, so the conflicting row is still there.
        let owner = self
            .db
            .process(GetOrderOwner { number })
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;
        if owner == user_id {
            Ok(RegisterOrderOutcome::AlreadySubmittedBySelf)
        } else {
            Ok(RegisterOrderOutcome::ConflictOtherUser)
        }
    }

    async fn list_orders(&self, user_id: Uuid) -> Result<Vec<Order>, LedgerError> {
        Ok(self.db.process(ListOrdersByUser { user_id }).await?)
    }

    async fn pending_orders(
        &self,
        after: Option<PendingCursor>,
        limit: usize,
    ) -> Result<Vec<PendingOrder>, LedgerError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        Ok(self.db.process(ListPendingOrders { after, limit }).await?)
    }

    async fn apply_order_verdict(
        &self,
        number: OrderNumber,
        status: OrderStatus,
        accrual: Option<Decimal>,
    ) -> Result<VerdictOutcome, LedgerError> {
        let accrual = verdict_accrual(status, accrual);
        let mut tx = self.db.begin().await?;

        let Some(owner) = Order::apply_verdict_tx(&mut tx, number, status, accrual).await? else {
            let outcome = match Order::get_status_tx(&mut tx, number).await? {
                Some(_) => VerdictOutcome::AlreadyTerminal,
                None => VerdictOutcome::UnknownOrder,
            };
            tx.rollback().await?;
            return Ok(outcome);
        };

        match accrual {
            Some(amount) if amount > Decimal::ZERO => {
                User::credit_tx(&mut tx, owner, amount).await?;
            }
            _ => {}
        }

        tx.commit().await?;
        debug!(order = %number, status = %status, "Verdict applied");
        Ok(VerdictOutcome::Applied)
    }

    async fn withdraw(
        &self,
        user_id: Uuid,
        number: OrderNumber,
        amount: Decimal,
    ) -> Result<WithdrawOutcome, LedgerError> {
        let mut tx = self.db.begin().await?;

        if User::debit_tx(&mut tx, user_id, amount).await?.is_none() {
            let exists = User::exists_tx(&mut tx, user_id).await?;
            tx.rollback().await?;
            return if exists {
                Ok(WithdrawOutcome::InsufficientBalance)
            } else {
                Err(LedgerError::UserNotFound(user_id))
            };
        }

        let withdrawal = Withdrawal::insert_tx(&mut tx, Uuid::now_v7(), user_id, number, amount).await?;
        tx.commit().await?;
        info!(order = %number, user_id = %user_id, amount = %amount, "Withdrawal completed");
        Ok(WithdrawOutcome::Completed(withdrawal))
    }

    async fn list_withdrawals(&self, user_id: Uuid) -> Result<Vec<Withdrawal>, LedgerError> {
        Ok(self.db.process(ListWithdrawalsByUser { user_id }).await?)
    }

    async fn balance(&self, user_id: Uuid) -> Result<Balance, LedgerError> {
        let balance = self
            .db
            .process(GetUserBalance { user_id })
            .await?
            .ok_or(LedgerError::UserNotFound(user_id))?;
        Ok(Balance {
            current: balance.balance,
            withdrawn: balance.withdrawn,
        })
    }
}
