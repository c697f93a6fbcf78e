use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use be_auth_core::TokenError;
use serde::{Deserialize, Serialize};

/// Failure envelope returned by every endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<serde_json::Value>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn into_response_with(self, status: StatusCode) -> Response {
        (status, axum::Json(self)).into_response()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RateLimitedBody {
    message: &'static str,
    retry_after: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    #[error("Authentication required")]
    MissingToken,

    #[error("Invalid or expired token")]
    InvalidToken(#[source] TokenError),

    #[error("Invalid or expired token")]
    InvalidSubject,

    #[error("Access denied")]
    Forbidden,

    #[error("{message}")]
    RateLimited {
        message: &'static str,
        retry_after_secs: u64,
    },

    #[error("Invalid request body")]
    InvalidBody(String),

    #[error("Request body too large")]
    PayloadTooLarge,
}

impl IntoResponse for AuthzError {
    fn into_response(self) -> Response {
        match self {
            AuthzError::MissingToken
            | AuthzError::InvalidToken(_)
            | AuthzError::InvalidSubject => {
                ErrorBody::new(self.to_string()).into_response_with(StatusCode::UNAUTHORIZED)
            }
            AuthzError::Forbidden => {
                ErrorBody::new(self.to_string()).into_response_with(StatusCode::FORBIDDEN)
            }
            AuthzError::PayloadTooLarge => {
                ErrorBody::new(self.to_string()).into_response_with(StatusCode::PAYLOAD_TOO_LARGE)
            }
            AuthzError::InvalidBody(details) => ErrorBody::new("Invalid request body")
                .with_details(details)
                .into_response_with(StatusCode::BAD_REQUEST),
            AuthzError::RateLimited {
                message,
                retry_after_secs,
            } => {
                let mut response = (
                    StatusCode::TOO_MANY_REQUESTS,
                    axum::Json(RateLimitedBody {
                        message,
                        retry_after: retry_after_secs,
                    }),
                )
                    .into_response();
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
                response
            }
        }
    }
}
