use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;
use sqlx::types::Json;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::types::{
    Card, CardKind, CardTransaction, Transaction, TransactionMetadata, TransactionStatus,
};

#[derive(Debug, FromRow)]
pub(crate) struct CardRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub card_number: String,
    pub card_holder_name: String,
    pub kind: CardKind,
    pub expiry_date: String,
    pub cvv: String,
    pub max_limit: Decimal,
    pub current_balance: Decimal,
    pub is_active: bool,
    pub is_used: bool,
    pub transactions: Json<Vec<CardTransaction>>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<CardRow> for Card {
    type Error = DbError;

    fn try_from(row: CardRow) -> DbResult<Self> {
        let expiry_date = row
            .expiry_date
            .parse()
            .map_err(|e| DbError::encoding(format!("card {}: {e}", row.id)))?;

        Ok(Card {
            id: row.id,
            user_id: row.user_id,
            card_number: row.card_number,
            card_holder_name: row.card_holder_name,
            kind: row.kind,
            expiry_date,
            cvv: row.cvv,
            max_limit: row.max_limit,
            current_balance: row.current_balance,
            is_active: row.is_active,
            is_used: row.is_used,
            transactions: row.transactions.0,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct TransactionRow {
    pub id: Uuid,
    pub transaction_id: String,
    pub amount: Decimal,
    pub card_id: Uuid,
    pub card_number: String,
    pub card_holder_name: String,
    pub merchant_id: Uuid,
    pub merchant_name: String,
    pub customer_id: Uuid,
    pub customer_name: String,
    pub status: TransactionStatus,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub metadata: Json<TransactionMetadata>,
    pub created_at: DateTime<Utc>,
}

impl From<TransactionRow> for Transaction {
    fn from(row: TransactionRow) -> Self {
        Transaction {
            id: row.id,
            transaction_id: row.transaction_id,
            amount: row.amount,
            card_id: row.card_id,
            card_number: row.card_number,
            card_holder_name: row.card_holder_name,
            merchant_id: row.merchant_id,
            merchant_name: row.merchant_name,
            customer_id: row.customer_id,
            customer_name: row.customer_name,
            status: row.status,
            description: row.description,
            timestamp: row.timestamp,
            metadata: row.metadata.0,
            created_at: row.created_at,
        }
    }
}

pub(crate) fn cards_from_rows(rows: Vec<CardRow>) -> DbResult<Vec<Card>> {
    rows.into_iter().map(Card::try_from).collect()
}
