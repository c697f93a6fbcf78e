//! Storage trait shared by the Postgres and in-memory backends.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::DbResult;
use crate::types::{Card, NewCard, NewTransaction, NewUser, Role, Transaction, User};

/// Record store for users, cards and transactions.
///
/// Every method is a single independent write or read; callers that need
/// several writes to succeed together must compensate on their own.
#[async_trait]
pub trait Store: Send + Sync {
    async fn create_user(&self, new_user: NewUser) -> DbResult<User>;

    async fn get_user(&self, id: Uuid) -> DbResult<User>;

    /// Looks up a user by email, case-insensitively.
    async fn get_user_by_email(&self, email: &str) -> DbResult<User>;

    /// Users among `ids`; unknown ids are skipped.
    async fn get_users(&self, ids: &[Uuid]) -> DbResult<Vec<User>>;

    async fn list_users_by_role(&self, role: Role) -> DbResult<Vec<User>>;

    /// Increments the failed-login counter and returns its new value.
    async fn record_failed_login(&self, id: Uuid) -> DbResult<i32>;

    /// Resets the failed-login counter and stamps `last_login`.
    async fn record_successful_login(&self, id: Uuid, at: DateTime<Utc>) -> DbResult<()>;

    /// Adds `delta` (which may be negative) to the user's outstanding amount.
    async fn adjust_outstanding_amount(&self, id: Uuid, delta: Decimal) -> DbResult<User>;

    async fn create_card(&self, new_card: NewCard) -> DbResult<Card>;

    async fn get_card(&self, id: Uuid) -> DbResult<Card>;

    async fn get_card_by_number(&self, card_number: &str) -> DbResult<Card>;

    async fn card_number_exists(&self, card_number: &str) -> DbResult<bool>;

    /// Number of the user's cards that are active and unused.
    async fn count_open_cards(&self, user_id: Uuid) -> DbResult<i64>;

    async fn list_cards_for_user(&self, user_id: Uuid) -> DbResult<Vec<Card>>;

    async fn list_cards(&self) -> DbResult<Vec<Card>>;

    /// Writes the mutable fields of `card` (balance, flags, embedded
    /// transactions) if the stored version still equals `card.version`.
    /// Returns the stored card with its version bumped, or
    /// [`DbError::Conflict`](crate::DbError::Conflict) on a version mismatch.
    async fn update_card(&self, card: &Card) -> DbResult<Card>;

    async fn create_transaction(&self, new_transaction: NewTransaction) -> DbResult<Transaction>;

    async fn delete_transaction(&self, id: Uuid) -> DbResult<()>;

    /// Looks up a transaction by its public `TXN…` identifier.
    async fn get_transaction(&self, transaction_id: &str) -> DbResult<Transaction>;

    /// Newest first.
    async fn list_transactions_for_merchant(&self, merchant_id: Uuid)
    -> DbResult<Vec<Transaction>>;

    /// Newest first.
    async fn list_transactions(&self) -> DbResult<Vec<Transaction>>;
}

pub type SharedStore = Arc<dyn Store>;
