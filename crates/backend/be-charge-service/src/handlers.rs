use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, header};
use be_authz::{AuthUser, ClientIp, JsonBody};
use be_remote_db::TransactionMetadata;
use tracing::instrument;

use crate::error::ChargeError;
use crate::service::AppState;
use crate::types::{ChargeRequest, ChargeResponse};

// ---------------------------------------------------------------------------
// POST /charges
// ---------------------------------------------------------------------------

#[instrument(skip_all, fields(merchant = %user.claims.sub, %ip))]
pub async fn create_charge(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ClientIp(ip): ClientIp,
    headers: HeaderMap,
    JsonBody(body): JsonBody<ChargeRequest>,
) -> Result<Json<ChargeResponse>, ChargeError> {
    let metadata = TransactionMetadata {
        ip_address: Some(ip.to_string()),
        location: None,
        device_info: headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    };

    let transaction = state
        .process_charge(user.user_id()?, body, metadata)
        .await?;

    Ok(Json(ChargeResponse {
        message: "Charge processed successfully".to_string(),
        transaction: transaction.into(),
    }))
}
