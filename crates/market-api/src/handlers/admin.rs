//! Admin handlers
//!
//! Manual resolution of requests the automated reviewer could not settle.

use axum::{extract::State, Json};
use market_service::dto::{LimitQuery, PartRequestResponse, ReviewDecisionRequest, ReviewResolutionResponse};
use market_service::services::ReviewQueue;

use crate::extractors::{AuthUser, IdPath, ValidatedJson, ValidatedQuery};
use crate::response::ApiResult;
use crate::state::AppState;

const DEFAULT_QUEUE_PAGE: i64 = 50;

/// Oldest `pending_review` requests first
///
/// GET /admin/requests/review
pub async fn review_queue(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidatedQuery(query): ValidatedQuery<LimitQuery>,
) -> ApiResult<Json<Vec<PartRequestResponse>>> {
    let queue = ReviewQueue::new(state.service_context());
    let requests = queue
        .pending_review(auth.user_id, query.limit_or(DEFAULT_QUEUE_PAGE))
        .await?;
    Ok(Json(
        requests
            .iter()
            .map(|r| PartRequestResponse::for_viewer(r, auth.user_id))
            .collect(),
    ))
}

/// POST /admin/requests/{id}/review
pub async fn resolve_review(
    State(state): State<AppState>,
    auth: AuthUser,
    IdPath(request_id): IdPath,
    ValidatedJson(decision): ValidatedJson<ReviewDecisionRequest>,
) -> ApiResult<Json<ReviewResolutionResponse>> {
    let queue = ReviewQueue::new(state.service_context());
    let outcome = queue
        .resolve_manually(auth.user_id, request_id, decision.approve)
        .await?;
    let request = queue.inspect(auth.user_id, request_id).await?;

    Ok(Json(ReviewResolutionResponse {
        outcome,
        request: PartRequestResponse::for_viewer(&request, auth.user_id),
    }))
}
