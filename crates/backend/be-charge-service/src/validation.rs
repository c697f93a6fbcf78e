//! Charge checks that run before anything is written. Each returns the first
//! failure in request order.

use be_remote_db::{Card, ExpiryDate};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::error::ChargeError;
use crate::policy::ChargePolicy;
use crate::types::ChargeRequest;

/// Cents; matches the `NUMERIC(14, 2)` money columns.
pub const MAX_AMOUNT_SCALE: u32 = 2;

/// A request with every field present and well formed.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedCharge {
    pub card_number: String,
    pub cvv: String,
    pub expiry_date: ExpiryDate,
    pub amount: Decimal,
    pub description: String,
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Field presence, positive whole-cent amount, then expiry format.
pub fn validate_request(request: ChargeRequest) -> Result<ValidatedCharge, ChargeError> {
    let card_number = present(request.card_number);
    let cvv = present(request.cvv);
    let expiry_date = present(request.expiry_date);
    let description = present(request.description);

    let missing: Vec<&'static str> = [
        ("cardNumber", card_number.is_none()),
        ("cvv", cvv.is_none()),
        ("expiryDate", expiry_date.is_none()),
        ("amount", request.amount.is_none()),
        ("description", description.is_none()),
    ]
    .into_iter()
    .filter_map(|(field, absent)| absent.then_some(field))
    .collect();

    let (Some(card_number), Some(cvv), Some(expiry_date), Some(amount), Some(description)) =
        (card_number, cvv, expiry_date, request.amount, description)
    else {
        return Err(ChargeError::MissingFields(missing));
    };

    if amount <= Decimal::ZERO {
        return Err(ChargeError::InvalidAmount);
    }
    let amount = amount.normalize();
    if amount.scale() > MAX_AMOUNT_SCALE {
        return Err(ChargeError::AmountPrecision);
    }

    let expiry_date = expiry_date
        .trim()
        .parse::<ExpiryDate>()
        .map_err(|_| ChargeError::InvalidExpiryFormat)?;

    Ok(ValidatedCharge {
        card_number: card_number.trim().to_string(),
        cvv: cvv.trim().to_string(),
        expiry_date,
        amount,
        description: description.trim().to_string(),
    })
}

/// Chargeability under `policy`, CVV, expiry match, expiry date and limit.
pub fn check_card(
    policy: ChargePolicy,
    card: &Card,
    charge: &ValidatedCharge,
    now: DateTime<Utc>,
) -> Result<(), ChargeError> {
    if !policy.is_chargeable(card) {
        return Err(ChargeError::CardNotFound);
    }
    if card.cvv != charge.cvv {
        return Err(ChargeError::InvalidCvv);
    }
    if card.expiry_date != charge.expiry_date {
        return Err(ChargeError::ExpiryMismatch);
    }
    if card.expiry_date.is_expired_at(now) {
        return Err(ChargeError::CardExpired);
    }

    let available = policy.remaining_authorization(card);
    if charge.amount > available {
        return Err(ChargeError::ExceedsLimit { available });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use be_remote_db::CardKind;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    use super::*;

    fn request() -> ChargeRequest {
        ChargeRequest {
            card_number: Some("123456789012".to_string()),
            cvv: Some("321".to_string()),
            expiry_date: Some("05/2027".to_string()),
            amount: Some(dec!(25.00)),
            description: Some("Lunch".to_string()),
        }
    }

    fn card() -> Card {
        let now = Utc::now();
        Card {
            id: Uuid::now_v7(),
            user_id: Uuid::now_v7(),
            card_number: "123456789012".to_string(),
            card_holder_name: "Ada".to_string(),
            kind: CardKind::Virtual,
            expiry_date: ExpiryDate::new(5, 2027).unwrap(),
            cvv: "321".to_string(),
            max_limit: dec!(10000),
            current_balance: Decimal::ZERO,
            is_active: true,
            is_used: false,
            transactions: Vec::new(),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    fn october_2026() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 17, 0, 0, 0).unwrap()
    }

    #[test]
    fn missing_fields_are_listed_together() {
        let err = validate_request(ChargeRequest {
            cvv: Some("  ".to_string()),
            amount: None,
            ..request()
        })
        .unwrap_err();
        match err {
            ChargeError::MissingFields(fields) => assert_eq!(fields, ["cvv", "amount"]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn amount_must_be_positive() {
        for amount in [dec!(0), dec!(-5)] {
            let err = validate_request(ChargeRequest {
                amount: Some(amount),
                ..request()
            })
            .unwrap_err();
            assert!(matches!(err, ChargeError::InvalidAmount));
        }
    }

    #[test]
    fn sub_cent_amounts_are_rejected() {
        for amount in [dec!(0.001), dec!(10.005)] {
            let err = validate_request(ChargeRequest {
                amount: Some(amount),
                ..request()
            })
            .unwrap_err();
            assert!(matches!(err, ChargeError::AmountPrecision), "{amount}");
        }

        let charge = validate_request(ChargeRequest {
            amount: Some(dec!(10.500)),
            ..request()
        })
        .unwrap();
        assert_eq!(charge.amount, dec!(10.5));
    }

    #[test]
    fn expiry_format_is_checked() {
        let err = validate_request(ChargeRequest {
            expiry_date: Some("5/27".to_string()),
            ..request()
        })
        .unwrap_err();
        assert!(matches!(err, ChargeError::InvalidExpiryFormat));
    }

    #[test]
    fn valid_charge_passes_card_checks() {
        let charge = validate_request(request()).unwrap();
        check_card(ChargePolicy::SingleUse, &card(), &charge, october_2026()).unwrap();
    }

    #[test]
    fn card_checks_run_in_order() {
        let now = october_2026();
        let policy = ChargePolicy::SingleUse;

        let mut used = card();
        used.is_used = true;
        let charge = validate_request(ChargeRequest {
            cvv: Some("000".to_string()),
            ..request()
        })
        .unwrap();
        assert!(matches!(
            check_card(policy, &used, &charge, now),
            Err(ChargeError::CardNotFound)
        ));
        assert!(matches!(
            check_card(policy, &card(), &charge, now),
            Err(ChargeError::InvalidCvv)
        ));

        let charge = validate_request(ChargeRequest {
            expiry_date: Some("06/2027".to_string()),
            ..request()
        })
        .unwrap();
        assert!(matches!(
            check_card(policy, &card(), &charge, now),
            Err(ChargeError::ExpiryMismatch)
        ));
    }

    #[test]
    fn expiry_month_is_already_expired() {
        let mut expiring = card();
        expiring.expiry_date = ExpiryDate::new(10, 2026).unwrap();
        let charge = validate_request(ChargeRequest {
            expiry_date: Some("10/2026".to_string()),
            ..request()
        })
        .unwrap();
        assert!(matches!(
            check_card(ChargePolicy::SingleUse, &expiring, &charge, october_2026()),
            Err(ChargeError::CardExpired)
        ));
    }

    #[test]
    fn limit_depends_on_policy() {
        let mut card = card();
        card.current_balance = dec!(9990);
        let charge = validate_request(ChargeRequest {
            amount: Some(dec!(20)),
            ..request()
        })
        .unwrap();

        check_card(ChargePolicy::SingleUse, &card, &charge, october_2026()).unwrap();
        assert!(matches!(
            check_card(ChargePolicy::Reusable, &card, &charge, october_2026()),
            Err(ChargeError::ExceedsLimit { available }) if available == dec!(10)
        ));

        let too_much = validate_request(ChargeRequest {
            amount: Some(dec!(10000.01)),
            ..request()
        })
        .unwrap();
        assert!(matches!(
            check_card(ChargePolicy::SingleUse, &card, &too_much, october_2026()),
            Err(ChargeError::ExceedsLimit { .. })
        ));
    }
}
