use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use be_authz::{AuthzError, ErrorBody};
use be_remote_db::DbError;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum CardError {
    #[error("User not found")]
    UserNotFound,

    #[error("Card not found")]
    CardNotFound,

    #[error("Maximum active cards limit reached")]
    CardLimitReached { max_active: i64 },

    #[error("Unable to allocate a card number")]
    CardNumberExhausted { attempts: usize },

    #[error(transparent)]
    Authz(#[from] AuthzError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

impl IntoResponse for CardError {
    fn into_response(self) -> Response {
        match self {
            CardError::UserNotFound | CardError::CardNotFound => {
                ErrorBody::new(self.to_string()).into_response_with(StatusCode::NOT_FOUND)
            }
            CardError::CardLimitReached { max_active } => ErrorBody::new(self.to_string())
                .with_details(format!(
                    "You can only have a maximum of {max_active} active cards at a time"
                ))
                .into_response_with(StatusCode::BAD_REQUEST),
            CardError::CardNumberExhausted { attempts } => {
                error!(attempts, "Card number space exhausted");
                ErrorBody::new(self.to_string()).into_response_with(StatusCode::SERVICE_UNAVAILABLE)
            }
            CardError::Authz(e) => e.into_response(),
            CardError::Database(e) => {
                error!(error = %e, "Card service database error");
                ErrorBody::new("Internal server error")
                    .into_response_with(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}
