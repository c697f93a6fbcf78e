use be_remote_db::{Card, CardKind, CardTransaction, ExpiryDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analytics::CardsOverview;

/// Card as returned right after issuance, CVV included.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedCard {
    pub id: Uuid,
    pub card_number: String,
    pub card_holder_name: String,
    #[serde(rename = "type")]
    pub kind: CardKind,
    pub expiry_date: ExpiryDate,
    pub cvv: String,
    pub max_limit: Decimal,
    pub is_active: bool,
}

impl From<Card> for IssuedCard {
    fn from(card: Card) -> Self {
        Self {
            id: card.id,
            card_number: card.card_number,
            card_holder_name: card.card_holder_name,
            kind: card.kind,
            expiry_date: card.expiry_date,
            cvv: card.cvv,
            max_limit: card.max_limit,
            is_active: card.is_active,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardDetails {
    pub id: Uuid,
    pub card_number: String,
    pub card_holder_name: String,
    #[serde(rename = "type")]
    pub kind: CardKind,
    pub expiry_date: ExpiryDate,
    pub max_limit: Decimal,
    pub current_balance: Decimal,
    pub is_active: bool,
    pub is_used: bool,
    pub transactions: Vec<CardTransaction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cvv: Option<String>,
}

impl CardDetails {
    /// `reveal_cvv` is honoured only while the card is unused.
    pub fn new(card: Card, reveal_cvv: bool) -> Self {
        let cvv = (reveal_cvv && !card.is_used).then_some(card.cvv);
        Self {
            id: card.id,
            card_number: card.card_number,
            card_holder_name: card.card_holder_name,
            kind: card.kind,
            expiry_date: card.expiry_date,
            max_limit: card.max_limit,
            current_balance: card.current_balance,
            is_active: card.is_active,
            is_used: card.is_used,
            transactions: card.transactions,
            cvv,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IssueCardResponse {
    pub message: String,
    pub card: IssuedCard,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CardResponse {
    pub message: String,
    pub card: CardDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OverviewResponse {
    pub message: String,
    #[serde(flatten)]
    pub analytics: CardsOverview,
}
