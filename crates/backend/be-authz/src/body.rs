use axum::Json;
use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use serde::de::DeserializeOwned;

use crate::AuthzError;

/// `axum::Json` whose rejection uses the shared error envelope
/// (400 "Invalid request body", or 413 past the body limit).
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBody<T>(pub T);

impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AuthzError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| {
                if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                    AuthzError::PayloadTooLarge
                } else {
                    AuthzError::InvalidBody(rejection.body_text())
                }
            })?;
        Ok(Self(value))
    }
}
