//! Random card credentials.

use rand::Rng;
use rust_decimal::Decimal;

pub const CARD_NUMBER_RANGE: std::ops::RangeInclusive<u64> = 100_000_000_000..=999_999_999_999;
pub const CVV_RANGE: std::ops::RangeInclusive<u16> = 100..=999;

/// Attempts before card issuance gives up on finding an unused number.
pub const MAX_CARD_NUMBER_ATTEMPTS: usize = 10;

/// Active and unused cards a single user may hold.
pub const MAX_ACTIVE_CARDS: i64 = 5;

pub const CARD_MAX_LIMIT: Decimal = Decimal::from_parts(10_000, 0, 0, false, 0);

/// Twelve digit number, never starting with zero.
pub fn random_card_number<R: Rng + ?Sized>(rng: &mut R) -> String {
    rng.random_range(CARD_NUMBER_RANGE).to_string()
}

pub fn random_cvv<R: Rng + ?Sized>(rng: &mut R) -> String {
    rng.random_range(CVV_RANGE).to_string()
}
