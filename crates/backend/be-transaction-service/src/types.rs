use be_remote_db::{Transaction, TransactionMetadata, TransactionStatus, User};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analytics::{AdminAnalytics, MerchantAnalytics};

/// How much of a transaction the caller may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewer {
    Admin,
    Merchant,
    Customer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Party {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Party {
    /// Falls back to the name recorded on the transaction when the account
    /// no longer exists.
    pub fn resolve(id: Uuid, recorded_name: &str, accounts: &[User]) -> Self {
        match accounts.iter().find(|u| u.id == id) {
            Some(user) => Self {
                id,
                name: user.name.clone(),
                email: Some(user.email.clone()),
            },
            None => Self {
                id,
                name: recorded_name.to_string(),
                email: None,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardRef {
    pub id: Uuid,
    pub card_number: String,
    pub card_holder_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionView {
    pub id: String,
    pub amount: Decimal,
    pub status: TransactionStatus,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub metadata: TransactionMetadata,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card: Option<CardRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant: Option<Party>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<Party>,
}

impl TransactionView {
    /// Admins see the card and both parties. Merchants see the customer and
    /// customers see the merchant.
    pub fn new(txn: Transaction, viewer: Viewer, accounts: &[User]) -> Self {
        let merchant = Party::resolve(txn.merchant_id, &txn.merchant_name, accounts);
        let customer = Party::resolve(txn.customer_id, &txn.customer_name, accounts);
        let card = CardRef {
            id: txn.card_id,
            card_number: txn.card_number,
            card_holder_name: txn.card_holder_name,
        };

        let (card, merchant, customer) = match viewer {
            Viewer::Admin => (Some(card), Some(merchant), Some(customer)),
            Viewer::Merchant => (None, None, Some(customer)),
            Viewer::Customer => (None, Some(merchant), None),
        };

        Self {
            id: txn.transaction_id,
            amount: txn.amount,
            status: txn.status,
            description: txn.description,
            timestamp: txn.timestamp,
            metadata: txn.metadata,
            created_at: txn.created_at,
            card,
            merchant,
            customer,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchantAnalyticsQuery {
    pub merchant_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TransactionResponse {
    pub message: String,
    pub transaction: TransactionView,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MerchantAnalyticsResponse {
    pub message: String,
    #[serde(flatten)]
    pub analytics: MerchantAnalytics,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AdminAnalyticsResponse {
    pub message: String,
    #[serde(flatten)]
    pub analytics: AdminAnalytics,
}
