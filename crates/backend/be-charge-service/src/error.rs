use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use be_authz::{AuthzError, ErrorBody};
use be_remote_db::DbError;
use rust_decimal::Decimal;
use serde_json::json;
use tracing::error;

use crate::saga::{SagaError, SagaStep};

#[derive(Debug, thiserror::Error)]
pub enum ChargeError {
    #[error("Missing required fields")]
    MissingFields(Vec<&'static str>),

    #[error("Amount must be greater than zero")]
    InvalidAmount,

    #[error("Amount must have at most two decimal places")]
    AmountPrecision,

    #[error("Invalid expiry date format")]
    InvalidExpiryFormat,

    #[error("Card not found or invalid")]
    CardNotFound,

    #[error("Invalid CVV")]
    InvalidCvv,

    #[error("Invalid expiry date")]
    ExpiryMismatch,

    #[error("Card has expired")]
    CardExpired,

    #[error("Charge amount exceeds card limit")]
    ExceedsLimit { available: Decimal },

    #[error("User not found")]
    UserNotFound,

    #[error("Card was modified by a concurrent charge")]
    ConcurrentModification(#[source] SagaError),

    #[error("{}", failure_message(.0.step))]
    StepFailed(#[source] SagaError),

    #[error(transparent)]
    Authz(#[from] AuthzError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

fn failure_message(step: SagaStep) -> &'static str {
    match step {
        SagaStep::RecordTransaction => "Error processing transaction",
        SagaStep::SettleCard => "Error updating card",
        SagaStep::DebitCustomer => "Error updating user balance",
    }
}

impl From<SagaError> for ChargeError {
    fn from(err: SagaError) -> Self {
        if err.step == SagaStep::SettleCard && err.source.is_conflict() {
            ChargeError::ConcurrentModification(err)
        } else {
            ChargeError::StepFailed(err)
        }
    }
}

impl IntoResponse for ChargeError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        match self {
            ChargeError::MissingFields(fields) => ErrorBody::new(message)
                .with_details(fields)
                .into_response_with(StatusCode::BAD_REQUEST),
            ChargeError::InvalidExpiryFormat => ErrorBody::new(message)
                .with_details("Expected format MM/YYYY")
                .into_response_with(StatusCode::BAD_REQUEST),
            ChargeError::ExceedsLimit { available } => ErrorBody::new(message)
                .with_details(json!({ "availableLimit": available }))
                .into_response_with(StatusCode::BAD_REQUEST),
            ChargeError::InvalidAmount
            | ChargeError::AmountPrecision
            | ChargeError::InvalidCvv
            | ChargeError::ExpiryMismatch
            | ChargeError::CardExpired => {
                ErrorBody::new(message).into_response_with(StatusCode::BAD_REQUEST)
            }
            ChargeError::CardNotFound => ErrorBody::new(message)
                .with_details("The card may be expired, used, or inactive")
                .into_response_with(StatusCode::NOT_FOUND),
            ChargeError::UserNotFound => {
                ErrorBody::new(message).into_response_with(StatusCode::NOT_FOUND)
            }
            ChargeError::ConcurrentModification(_) => {
                ErrorBody::new(message).into_response_with(StatusCode::CONFLICT)
            }
            ChargeError::StepFailed(e) => {
                error!(step = %e.step, state = ?e.state, error = %e.source, "Charge failed");
                ErrorBody::new(message).into_response_with(StatusCode::INTERNAL_SERVER_ERROR)
            }
            ChargeError::Authz(e) => e.into_response(),
            ChargeError::Database(e) => {
                error!(error = %e, "Charge service database error");
                ErrorBody::new("Error processing charge")
                    .into_response_with(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}
