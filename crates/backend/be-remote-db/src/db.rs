use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{
    migrate::MigrateDatabase,
    postgres::{PgPool, PgPoolOptions},
    types::Json,
};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use crate::{
    converters::{CardRow, TransactionRow, cards_from_rows},
    error::{DbError, DbResult},
    store::Store,
    types::{Card, NewCard, NewTransaction, NewUser, Role, Transaction, User},
};

const USER_COLUMNS: &str = "id, name, email, role, password_hash, outstanding_amount, is_active, \
     failed_login_attempts, last_login, created_at, updated_at";

const CARD_COLUMNS: &str = "id, user_id, card_number, card_holder_name, kind, expiry_date, cvv, \
     max_limit, current_balance, is_active, is_used, transactions, version, created_at, updated_at";

const TRANSACTION_COLUMNS: &str = "id, transaction_id, amount, card_id, card_number, \
     card_holder_name, merchant_id, merchant_name, customer_id, customer_name, status, \
     description, timestamp, metadata, created_at";

/// Postgres-backed [`Store`].
#[derive(Debug)]
pub struct DatabaseManager {
    pub pool: PgPool,
}

impl DatabaseManager {
    pub async fn new(database_url: &str) -> DbResult<Self> {
        if !sqlx::Postgres::database_exists(database_url).await? {
            info!("Database does not exist, creating it");
            sqlx::Postgres::create_database(database_url).await?;
        }

        let pool = PgPoolOptions::new()
            .max_connections(50)
            .min_connections(3)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await?;

        let db_manager = DatabaseManager { pool };

        Self::run_migrations(&db_manager.pool).await?;

        Ok(db_manager)
    }

    async fn run_migrations(pool: &PgPool) -> DbResult<()> {
        let migrator = sqlx::migrate!("./src/migrations");
        migrator.run(pool).await?;
        Ok(())
    }
}

#[async_trait]
impl Store for DatabaseManager {
    async fn create_user(&self, new_user: NewUser) -> DbResult<User> {
        let now = Utc::now();

        let query = format!(
            r#"
            INSERT INTO users (id, name, email, role, password_hash, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {USER_COLUMNS}
            "#
        );

        let user = sqlx::query_as::<_, User>(&query)
            .bind(Uuid::now_v7())
            .bind(&new_user.name)
            .bind(new_user.email.to_lowercase())
            .bind(new_user.role)
            .bind(&new_user.password_hash)
            .bind(now)
            .bind(now)
            .fetch_one(&self.pool)
            .await?;

        Ok(user)
    }

    async fn get_user(&self, id: Uuid) -> DbResult<User> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");

        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found_with_id("user", id.to_string()))
    }

    async fn get_user_by_email(&self, email: &str) -> DbResult<User> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");

        sqlx::query_as::<_, User>(&query)
            .bind(email.to_lowercase())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("user"))
    }

    async fn get_users(&self, ids: &[Uuid]) -> DbResult<Vec<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ANY($1)");

        let users = sqlx::query_as::<_, User>(&query)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;

        Ok(users)
    }

    async fn list_users_by_role(&self, role: Role) -> DbResult<Vec<User>> {
        let query =
            format!("SELECT {USER_COLUMNS} FROM users WHERE role = $1 ORDER BY created_at ASC");

        let users = sqlx::query_as::<_, User>(&query)
            .bind(role)
            .fetch_all(&self.pool)
            .await?;

        Ok(users)
    }

    async fn record_failed_login(&self, id: Uuid) -> DbResult<i32> {
        let attempts: Option<(i32,)> = sqlx::query_as(
            r#"
            UPDATE users
            SET failed_login_attempts = failed_login_attempts + 1, updated_at = $2
            WHERE id = $1
            RETURNING failed_login_attempts
            "#,
        )
        .bind(id)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        attempts
            .map(|(count,)| count)
            .ok_or_else(|| DbError::not_found_with_id("user", id.to_string()))
    }

    async fn record_successful_login(&self, id: Uuid, at: DateTime<Utc>) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET failed_login_attempts = 0, last_login = $2, updated_at = $2
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found_with_id("user", id.to_string()));
        }
        Ok(())
    }

    async fn adjust_outstanding_amount(&self, id: Uuid, delta: Decimal) -> DbResult<User> {
        let query = format!(
            r#"
            UPDATE users
            SET outstanding_amount = outstanding_amount + $2, updated_at = $3
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );

        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(delta)
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found_with_id("user", id.to_string()))
    }

    async fn create_card(&self, new_card: NewCard) -> DbResult<Card> {
        let now = Utc::now();

        let query = format!(
            r#"
            INSERT INTO cards (id, user_id, card_number, card_holder_name, expiry_date, cvv,
                               max_limit, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {CARD_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, CardRow>(&query)
            .bind(Uuid::now_v7())
            .bind(new_card.user_id)
            .bind(&new_card.card_number)
            .bind(&new_card.card_holder_name)
            .bind(new_card.expiry_date.to_string())
            .bind(&new_card.cvv)
            .bind(new_card.max_limit)
            .bind(now)
            .bind(now)
            .fetch_one(&self.pool)
            .await?;

        row.try_into()
    }

    async fn get_card(&self, id: Uuid) -> DbResult<Card> {
        let query = format!("SELECT {CARD_COLUMNS} FROM cards WHERE id = $1");

        sqlx::query_as::<_, CardRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found_with_id("card", id.to_string()))?
            .try_into()
    }

    async fn get_card_by_number(&self, card_number: &str) -> DbResult<Card> {
        let query = format!("SELECT {CARD_COLUMNS} FROM cards WHERE card_number = $1");

        sqlx::query_as::<_, CardRow>(&query)
            .bind(card_number)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("card"))?
            .try_into()
    }

    async fn card_number_exists(&self, card_number: &str) -> DbResult<bool> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM cards WHERE card_number = $1)")
                .bind(card_number)
                .fetch_one(&self.pool)
                .await?;

        Ok(exists)
    }

    async fn count_open_cards(&self, user_id: Uuid) -> DbResult<i64> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM cards
            WHERE user_id = $1 AND is_active = true AND is_used = false
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn list_cards_for_user(&self, user_id: Uuid) -> DbResult<Vec<Card>> {
        let query = format!(
            "SELECT {CARD_COLUMNS} FROM cards WHERE user_id = $1 ORDER BY created_at ASC"
        );

        let rows = sqlx::query_as::<_, CardRow>(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        cards_from_rows(rows)
    }

    async fn list_cards(&self) -> DbResult<Vec<Card>> {
        let query = format!("SELECT {CARD_COLUMNS} FROM cards ORDER BY created_at ASC");

        let rows = sqlx::query_as::<_, CardRow>(&query)
            .fetch_all(&self.pool)
            .await?;

        cards_from_rows(rows)
    }

    async fn update_card(&self, card: &Card) -> DbResult<Card> {
        let query = format!(
            r#"
            UPDATE cards
            SET current_balance = $3,
                is_active = $4,
                is_used = $5,
                transactions = $6,
                version = version + 1,
                updated_at = $7
            WHERE id = $1 AND version = $2
            RETURNING {CARD_COLUMNS}
            "#
        );

        sqlx::query_as::<_, CardRow>(&query)
            .bind(card.id)
            .bind(card.version)
            .bind(card.current_balance)
            .bind(card.is_active)
            .bind(card.is_used)
            .bind(Json(&card.transactions))
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::conflict("card", card.id.to_string()))?
            .try_into()
    }

    async fn create_transaction(&self, new_transaction: NewTransaction) -> DbResult<Transaction> {
        let query = format!(
            r#"
            INSERT INTO transactions (
                id, transaction_id, amount, card_id, card_number, card_holder_name,
                merchant_id, merchant_name, customer_id, customer_name, status,
                description, timestamp, metadata, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING {TRANSACTION_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, TransactionRow>(&query)
            .bind(Uuid::now_v7())
            .bind(&new_transaction.transaction_id)
            .bind(new_transaction.amount)
            .bind(new_transaction.card_id)
            .bind(&new_transaction.card_number)
            .bind(&new_transaction.card_holder_name)
            .bind(new_transaction.merchant_id)
            .bind(&new_transaction.merchant_name)
            .bind(new_transaction.customer_id)
            .bind(&new_transaction.customer_name)
            .bind(new_transaction.status)
            .bind(&new_transaction.description)
            .bind(new_transaction.timestamp)
            .bind(Json(&new_transaction.metadata))
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await?;

        Ok(row.into())
    }

    async fn delete_transaction(&self, id: Uuid) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM transactions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found_with_id("transaction", id.to_string()));
        }
        Ok(())
    }

    async fn get_transaction(&self, transaction_id: &str) -> DbResult<Transaction> {
        let query =
            format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE transaction_id = $1");

        sqlx::query_as::<_, TransactionRow>(&query)
            .bind(transaction_id)
            .fetch_optional(&self.pool)
            .await?
            .map(Transaction::from)
            .ok_or_else(|| DbError::not_found_with_id("transaction", transaction_id))
    }

    async fn list_transactions_for_merchant(
        &self,
        merchant_id: Uuid,
    ) -> DbResult<Vec<Transaction>> {
        let query = format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE merchant_id = $1 ORDER BY timestamp DESC"
        );

        let rows = sqlx::query_as::<_, TransactionRow>(&query)
            .bind(merchant_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Transaction::from).collect())
    }

    async fn list_transactions(&self) -> DbResult<Vec<Transaction>> {
        let query =
            format!("SELECT {TRANSACTION_COLUMNS} FROM transactions ORDER BY timestamp DESC");

        let rows = sqlx::query_as::<_, TransactionRow>(&query)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Transaction::from).collect())
    }
}
