//! Merchant and platform analytics, recomputed from full record sets.

use std::collections::{BTreeMap, HashMap, HashSet};

use be_remote_db::{Card, Transaction, TransactionStatus, User};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const RECENT_TRANSACTIONS: usize = 10;

fn per(count: usize) -> Decimal {
    Decimal::from(count.max(1))
}

fn ratio(part: usize, whole: usize) -> f64 {
    part as f64 / whole.max(1) as f64
}

fn percentage(part: usize, whole: usize) -> f64 {
    ratio(part, whole) * 100.0
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusBreakdown {
    pub completed: usize,
    pub failed: usize,
    pub pending: usize,
}

impl StatusBreakdown {
    fn record(&mut self, status: TransactionStatus) {
        match status {
            TransactionStatus::Completed => self.completed += 1,
            TransactionStatus::Failed => self.failed += 1,
            TransactionStatus::Pending => self.pending += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyAmount {
    pub date: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyAmount {
    pub month: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearlyAmount {
    pub year: String,
    pub amount: Decimal,
}

/// Amount totals per UTC day, month and year, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeAnalysis {
    pub daily: Vec<DailyAmount>,
    pub monthly: Vec<MonthlyAmount>,
    pub yearly: Vec<YearlyAmount>,
}

impl TimeAnalysis {
    pub fn from_transactions<'a>(transactions: impl IntoIterator<Item = &'a Transaction>) -> Self {
        let mut daily: BTreeMap<String, Decimal> = BTreeMap::new();
        let mut monthly: BTreeMap<String, Decimal> = BTreeMap::new();
        let mut yearly: BTreeMap<String, Decimal> = BTreeMap::new();

        for txn in transactions {
            let at = txn.timestamp;
            *daily.entry(at.format("%Y-%m-%d").to_string()).or_default() += txn.amount;
            *monthly.entry(at.format("%Y-%m").to_string()).or_default() += txn.amount;
            *yearly.entry(at.format("%Y").to_string()).or_default() += txn.amount;
        }

        Self {
            daily: daily
                .into_iter()
                .map(|(date, amount)| DailyAmount { date, amount })
                .collect(),
            monthly: monthly
                .into_iter()
                .map(|(month, amount)| MonthlyAmount { month, amount })
                .collect(),
            yearly: yearly
                .into_iter()
                .map(|(year, amount)| YearlyAmount { year, amount })
                .collect(),
        }
    }
}

fn newest_first(transactions: &[Transaction]) -> Vec<&Transaction> {
    let mut sorted: Vec<&Transaction> = transactions.iter().collect();
    sorted.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    sorted
}

// ---------------------------------------------------------------------------
// Merchant analytics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchantSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchantOverview {
    pub total_transactions: usize,
    pub total_amount: Decimal,
    pub average_amount: Decimal,
    pub success_rate: f64,
    pub total_customers: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionSummary {
    pub id: String,
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
    pub status: TransactionStatus,
    pub description: String,
}

impl From<&Transaction> for TransactionSummary {
    fn from(txn: &Transaction) -> Self {
        Self {
            id: txn.transaction_id.clone(),
            amount: txn.amount,
            timestamp: txn.timestamp,
            status: txn.status,
            description: txn.description.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerActivity {
    pub customer_id: Uuid,
    pub customer_name: String,
    pub total_transactions: usize,
    pub total_amount: Decimal,
    pub last_transaction: DateTime<Utc>,
    pub transactions: Vec<TransactionSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchantRecentTransaction {
    #[serde(flatten)]
    pub summary: TransactionSummary,
    pub customer_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchantAnalytics {
    pub merchant: MerchantSummary,
    pub overview: MerchantOverview,
    pub time_analysis: TimeAnalysis,
    pub customer_analysis: Vec<CustomerActivity>,
    pub status_breakdown: StatusBreakdown,
    pub recent_transactions: Vec<MerchantRecentTransaction>,
}

/// Analytics over every transaction of `merchant`, in any order.
pub fn merchant_analytics(merchant: &User, transactions: &[Transaction]) -> MerchantAnalytics {
    let transactions = newest_first(transactions);

    let mut status_breakdown = StatusBreakdown::default();
    let mut total_amount = Decimal::ZERO;
    let mut customers: HashMap<Uuid, CustomerActivity> = HashMap::new();

    for txn in &transactions {
        total_amount += txn.amount;
        status_breakdown.record(txn.status);

        let activity = customers
            .entry(txn.customer_id)
            .or_insert_with(|| CustomerActivity {
                customer_id: txn.customer_id,
                customer_name: txn.customer_name.clone(),
                total_transactions: 0,
                total_amount: Decimal::ZERO,
                last_transaction: txn.timestamp,
                transactions: Vec::new(),
            });
        activity.total_transactions += 1;
        activity.total_amount += txn.amount;
        activity.last_transaction = activity.last_transaction.max(txn.timestamp);
        activity.transactions.push(TransactionSummary::from(*txn));
    }

    let count = transactions.len();
    let mut customer_analysis: Vec<CustomerActivity> = customers.into_values().collect();
    customer_analysis.sort_by(|a, b| {
        b.total_amount
            .cmp(&a.total_amount)
            .then_with(|| a.customer_id.cmp(&b.customer_id))
    });

    MerchantAnalytics {
        merchant: MerchantSummary {
            id: merchant.id,
            name: merchant.name.clone(),
            email: merchant.email.clone(),
        },
        overview: MerchantOverview {
            total_transactions: count,
            total_amount,
            average_amount: total_amount / per(count),
            success_rate: percentage(status_breakdown.completed, count),
            total_customers: customer_analysis.len(),
        },
        time_analysis: TimeAnalysis::from_transactions(transactions.iter().copied()),
        customer_analysis,
        status_breakdown,
        recent_transactions: transactions
            .iter()
            .take(RECENT_TRANSACTIONS)
            .map(|txn| MerchantRecentTransaction {
                summary: TransactionSummary::from(*txn),
                customer_name: txn.customer_name.clone(),
            })
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// Admin analytics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformOverview {
    pub total_users: usize,
    pub total_merchants: usize,
    pub total_transactions: usize,
    pub total_amount: Decimal,
    pub average_amount: Decimal,
    pub success_rate: f64,
    pub total_outstanding: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAnalysis {
    pub total_active_users: usize,
    pub total_inactive_users: usize,
    pub users_with_cards: usize,
    pub users_with_transactions: usize,
    pub user_outstanding_amount: Decimal,
    pub average_outstanding_per_user: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchantRanking {
    pub merchant_id: Uuid,
    pub merchant_name: String,
    pub total_transactions: usize,
    pub total_amount: Decimal,
    pub success_rate: f64,
    pub unique_customers: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchantAnalysis {
    pub total_active_merchants: usize,
    pub total_inactive_merchants: usize,
    pub merchants_with_transactions: usize,
    pub top_merchants: Vec<MerchantRanking>,
    pub average_transactions_per_merchant: f64,
    pub average_amount_per_merchant: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformRecentTransaction {
    #[serde(flatten)]
    pub summary: TransactionSummary,
    pub merchant_name: String,
    pub customer_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionAnalysis {
    pub status_breakdown: StatusBreakdown,
    pub time_analysis: TimeAnalysis,
    pub recent_transactions: Vec<PlatformRecentTransaction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardAnalysis {
    pub total_cards: usize,
    pub active_cards: usize,
    pub used_cards: usize,
    pub average_cards_per_user: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminAnalytics {
    pub overview: PlatformOverview,
    pub user_analysis: UserAnalysis,
    pub merchant_analysis: MerchantAnalysis,
    pub transaction_analysis: TransactionAnalysis,
    pub card_analysis: CardAnalysis,
}

#[derive(Default)]
struct MerchantTally {
    total_transactions: usize,
    completed: usize,
    total_amount: Decimal,
    customers: HashSet<Uuid>,
}

/// Platform-wide analytics. `users` and `merchants` are the accounts with
/// the respective roles.
pub fn admin_analytics(
    users: &[User],
    merchants: &[User],
    transactions: &[Transaction],
    cards: &[Card],
) -> AdminAnalytics {
    let transactions = newest_first(transactions);
    let count = transactions.len();

    let mut status_breakdown = StatusBreakdown::default();
    let mut total_amount = Decimal::ZERO;
    let mut tallies: HashMap<Uuid, MerchantTally> = HashMap::new();
    let mut customers_with_transactions: HashSet<Uuid> = HashSet::new();

    for txn in &transactions {
        total_amount += txn.amount;
        status_breakdown.record(txn.status);
        customers_with_transactions.insert(txn.customer_id);

        let tally = tallies.entry(txn.merchant_id).or_default();
        tally.total_transactions += 1;
        tally.total_amount += txn.amount;
        if txn.status == TransactionStatus::Completed {
            tally.completed += 1;
        }
        tally.customers.insert(txn.customer_id);
    }

    let user_outstanding_amount: Decimal = users.iter().map(|u| u.outstanding_amount).sum();
    let user_ids: HashSet<Uuid> = users.iter().map(|u| u.id).collect();
    let card_owners: HashSet<Uuid> = cards.iter().map(|c| c.user_id).collect();

    let merchants_with_transactions = tallies.len();
    let mut top_merchants: Vec<MerchantRanking> = merchants
        .iter()
        .filter_map(|merchant| {
            tallies.remove(&merchant.id).map(|tally| MerchantRanking {
                merchant_id: merchant.id,
                merchant_name: merchant.name.clone(),
                total_transactions: tally.total_transactions,
                total_amount: tally.total_amount,
                success_rate: percentage(tally.completed, tally.total_transactions),
                unique_customers: tally.customers.len(),
            })
        })
        .collect();
    top_merchants.sort_by(|a, b| {
        b.total_amount
            .cmp(&a.total_amount)
            .then_with(|| a.merchant_id.cmp(&b.merchant_id))
    });

    AdminAnalytics {
        overview: PlatformOverview {
            total_users: users.len(),
            total_merchants: merchants.len(),
            total_transactions: count,
            total_amount,
            average_amount: total_amount / per(count),
            success_rate: percentage(status_breakdown.completed, count),
            total_outstanding: user_outstanding_amount,
        },
        user_analysis: UserAnalysis {
            total_active_users: users.iter().filter(|u| u.is_active).count(),
            total_inactive_users: users.iter().filter(|u| !u.is_active).count(),
            users_with_cards: user_ids.intersection(&card_owners).count(),
            users_with_transactions: user_ids
                .intersection(&customers_with_transactions)
                .count(),
            user_outstanding_amount,
            average_outstanding_per_user: user_outstanding_amount / per(users.len()),
        },
        merchant_analysis: MerchantAnalysis {
            total_active_merchants: merchants.iter().filter(|m| m.is_active).count(),
            total_inactive_merchants: merchants.iter().filter(|m| !m.is_active).count(),
            merchants_with_transactions,
            top_merchants,
            average_transactions_per_merchant: ratio(count, merchants.len()),
            average_amount_per_merchant: total_amount / per(merchants.len()),
        },
        transaction_analysis: TransactionAnalysis {
            status_breakdown,
            time_analysis: TimeAnalysis::from_transactions(transactions.iter().copied()),
            recent_transactions: transactions
                .iter()
                .take(RECENT_TRANSACTIONS)
                .map(|txn| PlatformRecentTransaction {
                    summary: TransactionSummary::from(*txn),
                    merchant_name: txn.merchant_name.clone(),
                    customer_name: txn.customer_name.clone(),
                })
                .collect(),
        },
        card_analysis: CardAnalysis {
            total_cards: cards.len(),
            active_cards: cards.iter().filter(|c| c.is_open()).count(),
            used_cards: cards.iter().filter(|c| c.is_used).count(),
            average_cards_per_user: ratio(cards.len(), users.len()),
        },
    }
}
