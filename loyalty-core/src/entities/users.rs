use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use rust_decimal::Decimal;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub login: String,
    pub password_hash: String,
    pub balance: Decimal,
    pub withdrawn: Decimal,
    pub created_at: time::OffsetDateTime,
}

/// Current and total-withdrawn amounts of one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct UserBalance {
    pub balance: Decimal,
    pub withdrawn: Decimal,
}

/// Insert a new user unless the login is already taken.
///
/// Returns `None` when another user holds the login.
#[derive(Debug, Clone)]
pub struct InsertUser {
    pub id: Uuid,
    pub login: String,
    pub password_hash: String,
}

impl Processor<InsertUser> for DatabaseProcessor {
    type Output = Option<User>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:InsertUser")]
    async fn process(&self, insert: InsertUser) -> Result<Option<User>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, login, password_hash)
            VALUES ($1, $2, $3)
            ON CONFLICT (login) DO NOTHING
            RETURNING id, login, password_hash, balance, withdrawn, created_at
            "#,
        )
        .bind(insert.id)
        .bind(insert.login)
        .bind(insert.password_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }
}

#[derive(Debug, Clone)]
pub struct GetUserByLogin {
    pub login: String,
}

impl Processor<GetUserByLogin> for DatabaseProcessor {
    type Output = Option<User>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetUserByLogin")]
    async fn process(&self, query: GetUserByLogin) -> Result<Option<User>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, login, password_hash, balance, withdrawn, created_at
            FROM users
            WHERE login = $1
            "#,
        )
        .bind(query.login)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }
}

#[derive(Debug, Clone)]
pub struct GetUserBalance {
    pub user_id: Uuid,
}

impl Processor<GetUserBalance> for DatabaseProcessor {
    type Output = Option<UserBalance>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetUserBalance")]
    async fn process(&self, query: GetUserBalance) -> Result<Option<UserBalance>, sqlx::Error> {
        let balance = sqlx::query_as::<_, UserBalance>(
            r#"
            SELECT balance, withdrawn
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(query.user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(balance)
    }
}

impl User {
    /// Add `amount` to the user's balance within a transaction.
    pub async fn credit_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        user_id: Uuid,
        amount: Decimal,
    ) -> Result<(), sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET balance = balance + $2
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(amount)
        .execute(&mut **tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }
        Ok(())
    }

    /// Move `amount` from the balance to the withdrawn total, within a
    /// transaction, only if the balance covers it.
    ///
    /// The check and the update are one statement, so the row lock taken by
    /// the update serializes concurrent debits and credits of the same user.
    /// Returns `None` when the balance is insufficient or the user is absent.
    pub async fn debit_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        user_id: Uuid,
        amount: Decimal,
    ) -> Result<Option<UserBalance>, sqlx::Error> {
        sqlx::query_as::<_, UserBalance>(
            r#"
            UPDATE users
            SET balance = balance - $2, withdrawn = withdrawn + $2
            WHERE id = $1 AND balance >= $2
            RETURNING balance, withdrawn
            "#,
        )
        .bind(user_id)
        .bind(amount)
        .fetch_optional(&mut **tx)
        .await
    }

    /// Check whether a user exists, within a transaction.
    pub async fn exists_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        user_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)
            "#,
        )
        .bind(user_id)
        .fetch_one(&mut **tx)
        .await?;
        Ok(exists)
    }
}
