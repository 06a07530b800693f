use crate::entities::OrderNumber;
use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use rust_decimal::Decimal;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Withdrawal {
    pub id: Uuid,
    pub user_id: Uuid,
    pub order_number: OrderNumber,
    pub amount: Decimal,
    pub processed_at: time::OffsetDateTime,
}

#[derive(Debug, Clone)]
/// List a user's withdrawals, newest first.
pub struct ListWithdrawalsByUser {
    pub user_id: Uuid,
}

impl Processor<ListWithdrawalsByUser> for DatabaseProcessor {
    type Output = Vec<Withdrawal>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListWithdrawalsByUser")]
    async fn process(&self, query: ListWithdrawalsByUser) -> Result<Vec<Withdrawal>, sqlx::Error> {
        let withdrawals = sqlx::query_as::<_, Withdrawal>(
            r#"
            SELECT id, user_id, order_number, amount, processed_at
            FROM withdrawals
            WHERE user_id = $1
            ORDER BY processed_at DESC
            "#,
        )
        .bind(query.user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(withdrawals)
    }
}

impl Withdrawal {
    /// Record a withdrawal within a transaction.
    pub async fn insert_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        id: Uuid,
        user_id: Uuid,
        order_number: OrderNumber,
        amount: Decimal,
    ) -> Result<Withdrawal, sqlx::Error> {
        sqlx::query_as::<_, Withdrawal>(
            r#"
            INSERT INTO withdrawals (id, user_id, order_number, amount)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, order_number, amount, processed_at
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(order_number)
        .bind(amount)
        .fetch_one(&mut **tx)
        .await
    }
}
