//! Spending overview over one user's cards.

use std::collections::{BTreeMap, HashMap, HashSet};

use be_remote_db::{Card, TransactionStatus};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const UNKNOWN_MERCHANT: &str = "Unknown Merchant";
const TOP_MERCHANTS_PER_CARD: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardsOverview {
    pub overview: OverviewTotals,
    pub spending: Spending,
    pub cards: Vec<CardAnalytics>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewTotals {
    pub total_cards: usize,
    pub active_cards: usize,
    pub used_cards: usize,
    pub total_spent: Decimal,
    pub total_outstanding: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Spending {
    pub monthly: Vec<MonthlySpend>,
    pub by_merchant: Vec<MerchantSpend>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlySpend {
    /// `YYYY-MM`
    pub month: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchantSpend {
    pub merchant_id: Uuid,
    pub merchant_name: String,
    pub count: usize,
    pub total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardAnalytics {
    pub card_id: Uuid,
    pub card_number: String,
    pub card_holder_name: String,
    pub current_balance: Decimal,
    pub max_limit: Decimal,
    pub is_active: bool,
    pub is_used: bool,
    pub total_transactions: usize,
    pub total_spent: Decimal,
    pub last_transaction_date: Option<DateTime<Utc>>,
    pub top_merchants: Vec<MerchantSpend>,
    pub transactions: Vec<CardTransactionView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardTransactionView {
    pub id: String,
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
    pub status: TransactionStatus,
    pub description: String,
}

#[derive(Default)]
struct Tally {
    count: usize,
    total: Decimal,
}

impl Tally {
    fn add(&mut self, amount: Decimal) {
        self.count += 1;
        self.total += amount;
    }
}

/// Merchants referenced by completed charges on `cards`.
pub fn merchant_ids(cards: &[Card]) -> Vec<Uuid> {
    let ids: HashSet<Uuid> = cards
        .iter()
        .flat_map(|c| &c.transactions)
        .filter(|t| t.status == TransactionStatus::Completed)
        .map(|t| t.merchant_id)
        .collect();
    ids.into_iter().collect()
}

fn ranked(tallies: BTreeMap<Uuid, Tally>, names: &HashMap<Uuid, String>) -> Vec<MerchantSpend> {
    let mut ranked: Vec<MerchantSpend> = tallies
        .into_iter()
        .map(|(merchant_id, tally)| MerchantSpend {
            merchant_id,
            merchant_name: names
                .get(&merchant_id)
                .cloned()
                .unwrap_or_else(|| UNKNOWN_MERCHANT.to_string()),
            count: tally.count,
            total: tally.total,
        })
        .collect();
    ranked.sort_by(|a, b| b.total.cmp(&a.total));
    ranked
}

/// Only completed charges count toward spend; every embedded charge is
/// still listed under its card.
pub fn user_overview(
    cards: &[Card],
    total_outstanding: Decimal,
    merchant_names: &HashMap<Uuid, String>,
) -> CardsOverview {
    let mut by_merchant: BTreeMap<Uuid, Tally> = BTreeMap::new();
    let mut monthly: BTreeMap<String, Decimal> = BTreeMap::new();
    let mut total_spent = Decimal::ZERO;

    let card_analytics = cards
        .iter()
        .map(|card| {
            let mut card_merchants: BTreeMap<Uuid, Tally> = BTreeMap::new();
            let mut card_spent = Decimal::ZERO;
            let mut last_transaction_date: Option<DateTime<Utc>> = None;

            for txn in card
                .transactions
                .iter()
                .filter(|t| t.status == TransactionStatus::Completed)
            {
                card_spent += txn.amount;
                last_transaction_date = last_transaction_date.max(Some(txn.timestamp));
                card_merchants.entry(txn.merchant_id).or_default().add(txn.amount);
                by_merchant.entry(txn.merchant_id).or_default().add(txn.amount);
                *monthly
                    .entry(txn.timestamp.format("%Y-%m").to_string())
                    .or_default() += txn.amount;
            }
            total_spent += card_spent;

            let mut top_merchants = ranked(card_merchants, merchant_names);
            top_merchants.truncate(TOP_MERCHANTS_PER_CARD);

            CardAnalytics {
                card_id: card.id,
                card_number: card.card_number.clone(),
                card_holder_name: card.card_holder_name.clone(),
                current_balance: card.current_balance,
                max_limit: card.max_limit,
                is_active: card.is_active,
                is_used: card.is_used,
                total_transactions: card.transactions.len(),
                total_spent: card_spent,
                last_transaction_date,
                top_merchants,
                transactions: card
                    .transactions
                    .iter()
                    .map(|t| CardTransactionView {
                        id: t.transaction_id.clone(),
                        amount: t.amount,
                        timestamp: t.timestamp,
                        status: t.status,
                        description: t.description.clone(),
                    })
                    .collect(),
            }
        })
        .collect();

    CardsOverview {
        overview: OverviewTotals {
            total_cards: cards.len(),
            active_cards: cards.iter().filter(|c| c.is_open()).count(),
            used_cards: cards.iter().filter(|c| c.is_used).count(),
            total_spent,
            total_outstanding,
        },
        spending: Spending {
            monthly: monthly
                .into_iter()
                .map(|(month, amount)| MonthlySpend { month, amount })
                .collect(),
            by_merchant: ranked(by_merchant, merchant_names),
        },
        cards: card_analytics,
    }
}

#[cfg(test)]
mod tests {
    use be_remote_db::{CardKind, CardTransaction, ExpiryDate};
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    use super::*;

    fn summary(
        id: &str,
        merchant: Uuid,
        amount: Decimal,
        at: DateTime<Utc>,
        status: TransactionStatus,
    ) -> CardTransaction {
        CardTransaction {
            transaction_id: id.to_string(),
            amount,
            merchant_id: merchant,
            timestamp: at,
            status,
            description: "test".to_string(),
        }
    }

    fn card(transactions: Vec<CardTransaction>, is_used: bool) -> Card {
        let now = Utc::now();
        Card {
            id: Uuid::now_v7(),
            user_id: Uuid::nil(),
            card_number: "123456789012".to_string(),
            card_holder_name: "Ada".to_string(),
            kind: CardKind::Virtual,
            expiry_date: ExpiryDate::new(1, 2099).unwrap(),
            cvv: "123".to_string(),
            max_limit: dec!(10000),
            current_balance: transactions.iter().map(|t| t.amount).sum(),
            is_active: !is_used,
            is_used,
            transactions,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn empty_overview() {
        let overview = user_overview(&[], dec!(0), &HashMap::new());
        assert_eq!(overview.overview.total_cards, 0);
        assert_eq!(overview.overview.total_spent, Decimal::ZERO);
        assert!(overview.spending.monthly.is_empty());
        assert!(overview.cards.is_empty());
    }

    #[test]
    fn totals_only_count_completed_charges() {
        let shop = Uuid::now_v7();
        let cafe = Uuid::now_v7();
        let jan = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
        let feb = Utc.with_ymd_and_hms(2026, 2, 3, 10, 0, 0).unwrap();

        let cards = vec![
            card(
                vec![summary("TXN1", shop, dec!(120.50), feb, TransactionStatus::Completed)],
                true,
            ),
            card(
                vec![
                    summary("TXN2", cafe, dec!(4.50), jan, TransactionStatus::Completed),
                    summary("TXN3", cafe, dec!(99), jan, TransactionStatus::Failed),
                ],
                false,
            ),
            card(Vec::new(), false),
        ];
        let names = HashMap::from([(shop, "Shop".to_string())]);

        let result = user_overview(&cards, dec!(125), &names);

        assert_eq!(result.overview.total_cards, 3);
        assert_eq!(result.overview.active_cards, 2);
        assert_eq!(result.overview.used_cards, 1);
        assert_eq!(result.overview.total_spent, dec!(125.00));
        assert_eq!(result.overview.total_outstanding, dec!(125));

        let months: Vec<&str> = result
            .spending
            .monthly
            .iter()
            .map(|m| m.month.as_str())
            .collect();
        assert_eq!(months, ["2026-01", "2026-02"]);

        assert_eq!(result.spending.by_merchant[0].merchant_name, "Shop");
        assert_eq!(result.spending.by_merchant[1].merchant_name, UNKNOWN_MERCHANT);
        assert_eq!(result.spending.by_merchant[1].count, 1);

        let second = &result.cards[1];
        assert_eq!(second.total_transactions, 2);
        assert_eq!(second.total_spent, dec!(4.50));
        assert_eq!(second.transactions.len(), 2);
        assert_eq!(second.last_transaction_date, Some(jan));
    }

    #[test]
    fn merchant_ids_skip_failed_charges() {
        let shop = Uuid::now_v7();
        let other = Uuid::now_v7();
        let now = Utc::now();
        let cards = vec![card(
            vec![
                summary("TXN1", shop, dec!(1), now, TransactionStatus::Completed),
                summary("TXN2", other, dec!(1), now, TransactionStatus::Failed),
            ],
            false,
        )];
        assert_eq!(merchant_ids(&cards), vec![shop]);
    }
}
