use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Utc};
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

pub use auth_core::Role;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub outstanding_amount: Decimal,
    pub is_active: bool,
    pub failed_login_attempts: i32,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, bon::Builder)]
pub struct NewUser {
    #[builder(into)]
    pub name: String,
    #[builder(into)]
    pub email: String,
    pub role: Role,
    #[builder(into)]
    pub password_hash: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "transaction_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionStatus::Pending => write!(f, "pending"),
            TransactionStatus::Completed => write!(f, "completed"),
            TransactionStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Type)]
#[sqlx(type_name = "card_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CardKind {
    #[default]
    Virtual,
}

static EXPIRY_FORMAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(0[1-9]|1[0-2])/(\d{4})$").expect("expiry pattern is a valid regex")
});

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Expiry date '{0}' is not in MM/YYYY format")]
pub struct InvalidExpiryDate(pub String);

/// Card expiry in `MM/YYYY` form. A card is usable through the month before
/// its expiry month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExpiryDate {
    month: u32,
    year: i32,
}

impl ExpiryDate {
    pub fn new(month: u32, year: i32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { month, year })
    }

    /// Same calendar month, `years` later.
    pub fn years_after(at: DateTime<Utc>, years: i32) -> Self {
        Self {
            month: at.month(),
            year: at.year() + years,
        }
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        (self.year, self.month) <= (now.year(), now.month())
    }
}

impl FromStr for ExpiryDate {
    type Err = InvalidExpiryDate;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let captures = EXPIRY_FORMAT
            .captures(s)
            .ok_or_else(|| InvalidExpiryDate(s.to_string()))?;
        let month = captures[1]
            .parse()
            .map_err(|_| InvalidExpiryDate(s.to_string()))?;
        let year = captures[2]
            .parse()
            .map_err(|_| InvalidExpiryDate(s.to_string()))?;
        Ok(Self { month, year })
    }
}

impl TryFrom<String> for ExpiryDate {
    type Error = InvalidExpiryDate;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ExpiryDate> for String {
    fn from(value: ExpiryDate) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ExpiryDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}/{:04}", self.month, self.year)
    }
}

/// Charge summary embedded in its card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardTransaction {
    pub transaction_id: String,
    pub amount: Decimal,
    pub merchant_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub status: TransactionStatus,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    pub id: Uuid,
    pub user_id: Uuid,
    pub card_number: String,
    pub card_holder_name: String,
    pub kind: CardKind,
    pub expiry_date: ExpiryDate,
    pub cvv: String,
    pub max_limit: Decimal,
    pub current_balance: Decimal,
    pub is_active: bool,
    pub is_used: bool,
    pub transactions: Vec<CardTransaction>,
    /// Bumped on every write; updates must present the version they read.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Card {
    /// Active and not yet charged. Counts toward the per-user card cap.
    pub fn is_open(&self) -> bool {
        self.is_active && !self.is_used
    }
}

#[derive(Debug, Clone, bon::Builder)]
pub struct NewCard {
    pub user_id: Uuid,
    #[builder(into)]
    pub card_number: String,
    #[builder(into)]
    pub card_holder_name: String,
    pub expiry_date: ExpiryDate,
    #[builder(into)]
    pub cvv: String,
    pub max_limit: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_info: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
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
    pub metadata: TransactionMetadata,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, bon::Builder)]
pub struct NewTransaction {
    #[builder(into)]
    pub transaction_id: String,
    pub amount: Decimal,
    pub card_id: Uuid,
    #[builder(into)]
    pub card_number: String,
    #[builder(into)]
    pub card_holder_name: String,
    pub merchant_id: Uuid,
    #[builder(into)]
    pub merchant_name: String,
    pub customer_id: Uuid,
    #[builder(into)]
    pub customer_name: String,
    pub status: TransactionStatus,
    #[builder(into)]
    pub description: String,
    pub timestamp: DateTime<Utc>,
    #[builder(default)]
    pub metadata: TransactionMetadata,
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn expiry_parses_and_formats() {
        let expiry: ExpiryDate = "03/2031".parse().unwrap();
        assert_eq!(expiry.month(), 3);
        assert_eq!(expiry.year(), 2031);
        assert_eq!(expiry.to_string(), "03/2031");
    }

    #[test]
    fn expiry_rejects_bad_formats() {
        for input in ["3/2031", "13/2031", "00/2031", "03/31", "03-2031", "03/2031 ", ""] {
            assert!(input.parse::<ExpiryDate>().is_err(), "{input} should fail");
        }
    }

    #[test]
    fn expiry_month_itself_counts_as_expired() {
        let now = Utc.with_ymd_and_hms(2026, 10, 17, 12, 0, 0).unwrap();
        assert!(ExpiryDate::new(10, 2026).unwrap().is_expired_at(now));
        assert!(ExpiryDate::new(9, 2026).unwrap().is_expired_at(now));
        assert!(!ExpiryDate::new(11, 2026).unwrap().is_expired_at(now));
        assert!(!ExpiryDate::new(1, 2027).unwrap().is_expired_at(now));
    }

    #[test]
    fn years_after_keeps_month() {
        let now = Utc.with_ymd_and_hms(2026, 2, 28, 0, 0, 0).unwrap();
        assert_eq!(ExpiryDate::years_after(now, 1).to_string(), "02/2027");
    }

    #[test]
    fn expiry_serializes_as_string() {
        let expiry = ExpiryDate::new(7, 2030).unwrap();
        assert_eq!(serde_json::to_string(&expiry).unwrap(), "\"07/2030\"");
        let back: ExpiryDate = serde_json::from_str("\"07/2030\"").unwrap();
        assert_eq!(back, expiry);
    }
}
