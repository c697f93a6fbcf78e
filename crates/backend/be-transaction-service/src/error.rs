use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use be_authz::{AuthzError, ErrorBody};
use be_remote_db::DbError;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
    #[error("Transaction not found")]
    TransactionNotFound,

    #[error("Access denied to this transaction")]
    AccessDenied,

    #[error("Valid merchant ID required for admin")]
    MerchantIdRequired,

    #[error("Merchant not found")]
    MerchantNotFound,

    #[error(transparent)]
    Authz(#[from] AuthzError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

impl IntoResponse for TransactionError {
    fn into_response(self) -> Response {
        let status = match &self {
            TransactionError::TransactionNotFound | TransactionError::MerchantNotFound => {
                StatusCode::NOT_FOUND
            }
            TransactionError::AccessDenied => StatusCode::FORBIDDEN,
            TransactionError::MerchantIdRequired => StatusCode::BAD_REQUEST,
            TransactionError::Authz(_) | TransactionError::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        match self {
            TransactionError::Authz(e) => e.into_response(),
            TransactionError::Database(e) => {
                error!(error = %e, "Transaction service database error");
                ErrorBody::new("Internal server error").into_response_with(status)
            }
            other => ErrorBody::new(other.to_string()).into_response_with(status),
        }
    }
}
