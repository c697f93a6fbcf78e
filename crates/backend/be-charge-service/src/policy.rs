use std::fmt;
use std::str::FromStr;

use be_remote_db::{Card, CardTransaction};
use chrono::Utc;
use rust_decimal::Decimal;

/// How a card may be charged after its first successful charge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChargePolicy {
    /// One charge, after which the card is used and inactive.
    #[default]
    SingleUse,
    /// Any number of charges while the running balance stays within the limit.
    Reusable,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown charge policy '{0}', expected 'single-use' or 'reusable'")]
pub struct UnknownChargePolicy(pub String);

impl ChargePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChargePolicy::SingleUse => "single-use",
            ChargePolicy::Reusable => "reusable",
        }
    }

    pub fn is_chargeable(&self, card: &Card) -> bool {
        match self {
            ChargePolicy::SingleUse => card.is_active && !card.is_used,
            ChargePolicy::Reusable => card.is_active,
        }
    }

    /// Largest amount a single charge may take from `card`.
    pub fn remaining_authorization(&self, card: &Card) -> Decimal {
        match self {
            ChargePolicy::SingleUse => card.max_limit,
            ChargePolicy::Reusable => card.max_limit - card.current_balance,
        }
    }

    /// The card as it should be stored once `summary` has been charged.
    pub fn settle(&self, card: &Card, summary: CardTransaction) -> Card {
        let mut settled = card.clone();
        match self {
            ChargePolicy::SingleUse => {
                settled.current_balance = summary.amount;
                settled.is_used = true;
                settled.is_active = false;
            }
            ChargePolicy::Reusable => {
                settled.current_balance += summary.amount;
            }
        }
        settled.transactions.push(summary);
        settled.updated_at = Utc::now();
        settled
    }
}

impl fmt::Display for ChargePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChargePolicy {
    type Err = UnknownChargePolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single-use" | "single_use" => Ok(ChargePolicy::SingleUse),
            "reusable" => Ok(ChargePolicy::Reusable),
            _ => Err(UnknownChargePolicy(s.to_string())),
        }
    }
}
