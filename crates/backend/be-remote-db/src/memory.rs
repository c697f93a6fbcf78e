//! In-process [`Store`] used in local mode and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::store::Store;
use crate::types::{
    Card, CardKind, NewCard, NewTransaction, NewUser, Role, Transaction, User,
};

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    cards: HashMap<Uuid, Card>,
    transactions: HashMap<Uuid, Transaction>,
}

/// Keeps every record in memory behind a single lock. Enforces the same
/// uniqueness and card-version rules as the Postgres schema.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first(mut transactions: Vec<Transaction>) -> Vec<Transaction> {
    transactions.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    transactions
}

fn oldest_first(mut cards: Vec<Card>) -> Vec<Card> {
    cards.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    cards
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, new_user: NewUser) -> DbResult<User> {
        let email = new_user.email.to_lowercase();
        let mut tables = self.tables.write();

        if tables.users.values().any(|u| u.email == email) {
            return Err(DbError::duplicate("email", email));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::now_v7(),
            name: new_user.name,
            email,
            role: new_user.role,
            password_hash: new_user.password_hash,
            outstanding_amount: Decimal::ZERO,
            is_active: true,
            failed_login_attempts: 0,
            last_login: None,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: Uuid) -> DbResult<User> {
        self.tables
            .read()
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| DbError::not_found_with_id("user", id.to_string()))
    }

    async fn get_user_by_email(&self, email: &str) -> DbResult<User> {
        let email = email.to_lowercase();
        self.tables
            .read()
            .users
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or_else(|| DbError::not_found("user"))
    }

    async fn get_users(&self, ids: &[Uuid]) -> DbResult<Vec<User>> {
        let tables = self.tables.read();
        Ok(ids
            .iter()
            .filter_map(|id| tables.users.get(id).cloned())
            .collect())
    }

    async fn list_users_by_role(&self, role: Role) -> DbResult<Vec<User>> {
        let mut users: Vec<User> = self
            .tables
            .read()
            .users
            .values()
            .filter(|u| u.role == role)
            .cloned()
            .collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(users)
    }

    async fn record_failed_login(&self, id: Uuid) -> DbResult<i32> {
        let mut tables = self.tables.write();
        let user = tables
            .users
            .get_mut(&id)
            .ok_or_else(|| DbError::not_found_with_id("user", id.to_string()))?;
        user.failed_login_attempts += 1;
        user.updated_at = Utc::now();
        Ok(user.failed_login_attempts)
    }

    async fn record_successful_login(&self, id: Uuid, at: DateTime<Utc>) -> DbResult<()> {
        let mut tables = self.tables.write();
        let user = tables
            .users
            .get_mut(&id)
            .ok_or_else(|| DbError::not_found_with_id("user", id.to_string()))?;
        user.failed_login_attempts = 0;
        user.last_login = Some(at);
        user.updated_at = at;
        Ok(())
    }

    async fn adjust_outstanding_amount(&self, id: Uuid, delta: Decimal) -> DbResult<User> {
        let mut tables = self.tables.write();
        let user = tables
            .users
            .get_mut(&id)
            .ok_or_else(|| DbError::not_found_with_id("user", id.to_string()))?;
        user.outstanding_amount += delta;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn create_card(&self, new_card: NewCard) -> DbResult<Card> {
        let mut tables = self.tables.write();

        if !tables.users.contains_key(&new_card.user_id) {
            return Err(DbError::not_found_with_id(
                "user",
                new_card.user_id.to_string(),
            ));
        }
        if tables
            .cards
            .values()
            .any(|c| c.card_number == new_card.card_number)
        {
            return Err(DbError::duplicate("card_number", new_card.card_number));
        }

        let now = Utc::now();
        let card = Card {
            id: Uuid::now_v7(),
            user_id: new_card.user_id,
            card_number: new_card.card_number,
            card_holder_name: new_card.card_holder_name,
            kind: CardKind::Virtual,
            expiry_date: new_card.expiry_date,
            cvv: new_card.cvv,
            max_limit: new_card.max_limit,
            current_balance: Decimal::ZERO,
            is_active: true,
            is_used: false,
            transactions: Vec::new(),
            version: 0,
            created_at: now,
            updated_at: now,
        };
        tables.cards.insert(card.id, card.clone());
        Ok(card)
    }

    async fn get_card(&self, id: Uuid) -> DbResult<Card> {
        self.tables
            .read()
            .cards
            .get(&id)
            .cloned()
            .ok_or_else(|| DbError::not_found_with_id("card", id.to_string()))
    }

    async fn get_card_by_number(&self, card_number: &str) -> DbResult<Card> {
        self.tables
            .read()
            .cards
            .values()
            .find(|c| c.card_number == card_number)
            .cloned()
            .ok_or_else(|| DbError::not_found("card"))
    }

    async fn card_number_exists(&self, card_number: &str) -> DbResult<bool> {
        Ok(self
            .tables
            .read()
            .cards
            .values()
            .any(|c| c.card_number == card_number))
    }

    async fn count_open_cards(&self, user_id: Uuid) -> DbResult<i64> {
        let count = self
            .tables
            .read()
            .cards
            .values()
            .filter(|c| c.user_id == user_id && c.is_open())
            .count();
        Ok(count as i64)
    }

    async fn list_cards_for_user(&self, user_id: Uuid) -> DbResult<Vec<Card>> {
        let cards = self
            .tables
            .read()
            .cards
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        Ok(oldest_first(cards))
    }

    async fn list_cards(&self) -> DbResult<Vec<Card>> {
        let cards = self.tables.read().cards.values().cloned().collect();
        Ok(oldest_first(cards))
    }

    async fn update_card(&self, card: &Card) -> DbResult<Card> {
        let mut tables = self.tables.write();
        let stored = tables
            .cards
            .get_mut(&card.id)
            .ok_or_else(|| DbError::conflict("card", card.id.to_string()))?;

        if stored.version != card.version {
            return Err(DbError::conflict("card", card.id.to_string()));
        }

        stored.current_balance = card.current_balance;
        stored.is_active = card.is_active;
        stored.is_used = card.is_used;
        stored.transactions = card.transactions.clone();
        stored.version += 1;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn create_transaction(&self, new_transaction: NewTransaction) -> DbResult<Transaction> {
        let mut tables = self.tables.write();

        if tables
            .transactions
            .values()
            .any(|t| t.transaction_id == new_transaction.transaction_id)
        {
            return Err(DbError::duplicate(
                "transaction_id",
                new_transaction.transaction_id,
            ));
        }

        let transaction = Transaction {
            id: Uuid::now_v7(),
            transaction_id: new_transaction.transaction_id,
            amount: new_transaction.amount,
            card_id: new_transaction.card_id,
            card_number: new_transaction.card_number,
            card_holder_name: new_transaction.card_holder_name,
            merchant_id: new_transaction.merchant_id,
            merchant_name: new_transaction.merchant_name,
            customer_id: new_transaction.customer_id,
            customer_name: new_transaction.customer_name,
            status: new_transaction.status,
            description: new_transaction.description,
            timestamp: new_transaction.timestamp,
            metadata: new_transaction.metadata,
            created_at: Utc::now(),
        };
        tables
            .transactions
            .insert(transaction.id, transaction.clone());
        Ok(transaction)
    }

    async fn delete_transaction(&self, id: Uuid) -> DbResult<()> {
        self.tables
            .write()
            .transactions
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| DbError::not_found_with_id("transaction", id.to_string()))
    }

    async fn get_transaction(&self, transaction_id: &str) -> DbResult<Transaction> {
        self.tables
            .read()
            .transactions
            .values()
            .find(|t| t.transaction_id == transaction_id)
            .cloned()
            .ok_or_else(|| DbError::not_found_with_id("transaction", transaction_id))
    }

    async fn list_transactions_for_merchant(
        &self,
        merchant_id: Uuid,
    ) -> DbResult<Vec<Transaction>> {
        let transactions = self
            .tables
            .read()
            .transactions
            .values()
            .filter(|t| t.merchant_id == merchant_id)
            .cloned()
            .collect();
        Ok(newest_first(transactions))
    }

    async fn list_transactions(&self) -> DbResult<Vec<Transaction>> {
        let transactions = self.tables.read().transactions.values().cloned().collect();
        Ok(newest_first(transactions))
    }
}
