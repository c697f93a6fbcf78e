use be_remote_db::{Transaction, TransactionStatus};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Body of `POST /charges`. Every field is optional so that missing ones
/// can be reported together.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargeRequest {
    pub card_number: Option<String>,
    pub cvv: Option<String>,
    pub expiry_date: Option<String>,
    pub amount: Option<Decimal>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargeReceipt {
    /// Public `TXN…` identifier.
    pub id: String,
    pub amount: Decimal,
    pub status: TransactionStatus,
    pub timestamp: DateTime<Utc>,
    pub description: String,
    pub card_number: String,
    pub card_holder_name: String,
    pub merchant_name: String,
    pub customer_name: String,
}

impl From<Transaction> for ChargeReceipt {
    fn from(txn: Transaction) -> Self {
        Self {
            id: txn.transaction_id,
            amount: txn.amount,
            status: txn.status,
            timestamp: txn.timestamp,
            description: txn.description,
            card_number: txn.card_number,
            card_holder_name: txn.card_holder_name,
            merchant_name: txn.merchant_name,
            customer_name: txn.customer_name,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChargeResponse {
    pub message: String,
    pub transaction: ChargeReceipt,
}
