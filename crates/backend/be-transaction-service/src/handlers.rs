use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use be_authz::AuthUser;
use tracing::instrument;

use crate::error::TransactionError;
use crate::service::AppState;
use crate::types::{
    AdminAnalyticsResponse, MerchantAnalyticsQuery, MerchantAnalyticsResponse,
    TransactionResponse,
};

#[instrument(skip(state, user), fields(sub = %user.claims.sub))]
pub async fn get_transaction(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(transaction_id): Path<String>,
) -> Result<Json<TransactionResponse>, TransactionError> {
    let transaction = state
        .lookup(user.user_id()?, user.role(), &transaction_id)
        .await?;
    Ok(Json(TransactionResponse {
        message: "Transaction retrieved successfully".to_string(),
        transaction,
    }))
}

#[instrument(skip_all, fields(sub = %user.claims.sub, merchant_id = ?query.merchant_id))]
pub async fn merchant_analytics(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<MerchantAnalyticsQuery>,
) -> Result<Json<MerchantAnalyticsResponse>, TransactionError> {
    let analytics = state
        .merchant_analytics(user.user_id()?, user.role(), query.merchant_id.as_deref())
        .await?;
    Ok(Json(MerchantAnalyticsResponse {
        message: "Merchant analytics retrieved successfully".to_string(),
        analytics,
    }))
}

#[instrument(skip_all, fields(sub = %user.claims.sub))]
pub async fn admin_analytics(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<AdminAnalyticsResponse>, TransactionError> {
    let analytics = state.admin_analytics().await?;
    Ok(Json(AdminAnalyticsResponse {
        message: "Admin analytics retrieved successfully".to_string(),
        analytics,
    }))
}
