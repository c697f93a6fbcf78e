use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use be_authz::{AuthUser, Role};
use tracing::instrument;

use crate::error::CardError;
use crate::service::AppState;
use crate::types::{CardDetails, CardResponse, IssueCardResponse, OverviewResponse};

#[instrument(skip_all, fields(sub = %user.claims.sub))]
pub async fn issue_card(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<(StatusCode, Json<IssueCardResponse>), CardError> {
    let card = state.issue_card(user.user_id()?).await?;
    Ok((
        StatusCode::CREATED,
        Json(IssueCardResponse {
            message: "Virtual card issued successfully".to_string(),
            card: card.into(),
        }),
    ))
}

#[instrument(skip(state, user), fields(sub = %user.claims.sub))]
pub async fn get_card(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<CardResponse>, CardError> {
    let role = user.role();
    let card = state.get_card(user.user_id()?, role, &id).await?;
    Ok(Json(CardResponse {
        message: "Card retrieved successfully".to_string(),
        card: CardDetails::new(card, role == Role::User),
    }))
}

#[instrument(skip_all, fields(sub = %user.claims.sub))]
pub async fn overview(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<OverviewResponse>, CardError> {
    let analytics = state.overview(user.user_id()?).await?;
    Ok(Json(OverviewResponse {
        message: "Card analytics retrieved successfully".to_string(),
        analytics,
    }))
}
