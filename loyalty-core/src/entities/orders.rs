use crate::entities::{OrderNumber, OrderStatus};
use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use rust_decimal::Decimal;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub number: OrderNumber,
    pub status: OrderStatus,
    pub accrual: Decimal,
    pub uploaded_at: time::OffsetDateTime,
}

/// Insert a new `NEW` order.
///
/// Relies on the unique constraint on `number`: returns `false` when the
/// number is already registered by anyone, leaving the existing row intact.
#[derive(Debug, Clone)]
pub struct InsertOrder {
    pub id: Uuid,
    pub user_id: Uuid,
    pub number: OrderNumber,
}

impl Processor<InsertOrder> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:InsertOrder")]
    async fn process(&self, insert: InsertOrder) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, number, status)
            VALUES ($1, $2, $3, 'NEW')
            ON CONFLICT (number) DO NOTHING
            "#,
        )
        .bind(insert.id)
        .bind(insert.user_id)
        .bind(insert.number)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

/// Find who owns an order number.
#[derive(Debug, Clone)]
pub struct GetOrderOwner {
    pub number: OrderNumber,
}

impl Processor<GetOrderOwner> for DatabaseProcessor {
    type Output = Option<Uuid>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetOrderOwner")]
    async fn process(&self, query: GetOrderOwner) -> Result<Option<Uuid>, sqlx::Error> {
        let owner = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT user_id FROM orders WHERE number = $1
            "#,
        )
        .bind(query.number)
        .fetch_optional(&self.pool)
        .await?;
        Ok(owner)
    }
}

/// List a user's orders, newest first.
#[derive(Debug, Clone)]
pub struct ListOrdersByUser {
    pub user_id: Uuid,
}

impl Processor<ListOrdersByUser> for DatabaseProcessor {
    type Output = Vec<Order>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListOrdersByUser")]
    async fn process(&self, query: ListOrdersByUser) -> Result<Vec<Order>, sqlx::Error> {
        let orders = sqlx::query_as::<_, Order>(
            r#"
            SELECT id, user_id, number, status, accrual, uploaded_at
            FROM orders
            WHERE user_id = $1
            ORDER BY uploaded_at DESC, id DESC
            "#,
        )
        .bind(query.user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(orders)
    }
}

/// Position in the scan over pending orders, which runs in
/// `(uploaded_at, id)` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PendingCursor {
    pub uploaded_at: time::OffsetDateTime,
    pub id: Uuid,
}

/// An order still waiting for a final verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct PendingOrder {
    pub id: Uuid,
    pub number: OrderNumber,
    pub uploaded_at: time::OffsetDateTime,
}

impl PendingOrder {
    /// Cursor that resumes the scan right after this order.
    pub fn cursor(&self) -> PendingCursor {
        PendingCursor {
            uploaded_at: self.uploaded_at,
            id: self.id,
        }
    }
}

/// One page of orders in `NEW` or `PROCESSING`, oldest first, starting
/// strictly after `after`.
#[derive(Debug, Clone)]
pub struct ListPendingOrders {
    pub after: Option<PendingCursor>,
    pub limit: i64,
}

impl Processor<ListPendingOrders> for DatabaseProcessor {
    type Output = Vec<PendingOrder>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListPendingOrders")]
    async fn process(&self, query: ListPendingOrders) -> Result<Vec<PendingOrder>, sqlx::Error> {
        let orders = sqlx::query_as::<_, PendingOrder>(
            r#"
            SELECT id, number, uploaded_at
            FROM orders
            WHERE status IN ('NEW', 'PROCESSING')
              AND ($1::timestamptz IS NULL OR (uploaded_at, id) > ($1, $2))
            ORDER BY uploaded_at ASC, id ASC
            LIMIT $3
            "#,
        )
        .bind(query.after.map(|c| c.uploaded_at))
        .bind(query.after.map(|c| c.id))
        .bind(query.limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(orders)
    }
}

impl Order {
    /// Write a verdict to a non-terminal order within a transaction.
    ///
    /// `accrual` is only written when given, which callers limit to
    /// `PROCESSED` verdicts. Returns the owner's id when the
    /// row was updated, `None` when the order is unknown or already terminal.
    /// The status predicate is re-checked after the row lock is acquired, so
    /// two concurrent writers cannot both move the same order out of a
    /// non-terminal state.
    pub async fn apply_verdict_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        number: OrderNumber,
        status: OrderStatus,
        accrual: Option<Decimal>,
    ) -> Result<Option<Uuid>, sqlx::Error> {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE orders
            SET status = $2, accrual = COALESCE($3, accrual)
            WHERE number = $1 AND status IN ('NEW', 'PROCESSING')
            RETURNING user_id
            "#,
        )
        .bind(number)
        .bind(status)
        .bind(accrual)
        .fetch_optional(&mut **tx)
        .await
    }

    /// Read an order's status within a transaction.
    pub async fn get_status_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        number: OrderNumber,
    ) -> Result<Option<OrderStatus>, sqlx::Error> {
        sqlx::query_scalar::<_, OrderStatus>(
            r#"
            SELECT status FROM orders WHERE number = $1
            "#,
        )
        .bind(number)
        .fetch_optional(&mut **tx)
        .await
    }
}
