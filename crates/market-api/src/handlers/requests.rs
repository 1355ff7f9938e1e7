//! Part request handlers
//!
//! Submission, lookup, listing and completion of part requests, plus the
//! offers made on them.

use axum::{extract::State, Json};
use market_service::dto::{
    CreateOfferRequest, CreatePartRequest, LimitQuery, OfferResponse, PartRequestResponse,
    SubmissionResponse,
};
use market_service::services::{MatchingService, RequestService};

use crate::extractors::{AuthUser, IdPath, ValidatedJson, ValidatedQuery};
use crate::response::{ApiResult, Created};
use crate::state::AppState;

const DEFAULT_OPEN_PAGE: i64 = 50;

/// Submit a part request through the moderation gate
///
/// POST /requests
pub async fn submit_request(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidatedJson(request): ValidatedJson<CreatePartRequest>,
) -> ApiResult<Created<Json<SubmissionResponse>>> {
    let service = RequestService::new(state.service_context());
    // A flagged request's review keeps running after the response is sent
    let submission = service.submit_request(auth.user_id, request.into_draft()).await?;
    Ok(Created(Json(SubmissionResponse::from(&submission))))
}

/// Get request by ID
///
/// GET /requests/{id}
pub async fn get_request(
    State(state): State<AppState>,
    auth: AuthUser,
    IdPath(request_id): IdPath,
) -> ApiResult<Json<PartRequestResponse>> {
    let service = MatchingService::new(state.service_context());
    let request = service.get_request(request_id, auth.user_id).await?;
    Ok(Json(PartRequestResponse::for_viewer(&request, auth.user_id)))
}

/// Requests currently open for offers
///
/// GET /requests
pub async fn list_open_requests(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidatedQuery(query): ValidatedQuery<LimitQuery>,
) -> ApiResult<Json<Vec<PartRequestResponse>>> {
    let service = MatchingService::new(state.service_context());
    let requests = service.list_open_requests(query.limit_or(DEFAULT_OPEN_PAGE)).await?;
    Ok(Json(
        requests
            .iter()
            .map(|r| PartRequestResponse::for_viewer(r, auth.user_id))
            .collect(),
    ))
}

/// Close a matched request
///
/// POST /requests/{id}/complete
pub async fn complete_request(
    State(state): State<AppState>,
    auth: AuthUser,
    IdPath(request_id): IdPath,
) -> ApiResult<Json<PartRequestResponse>> {
    let service = MatchingService::new(state.service_context());
    let request = service.complete_request(request_id, auth.user_id).await?;
    Ok(Json(PartRequestResponse::for_viewer(&request, auth.user_id)))
}

/// Make an offer on a request
///
/// POST /requests/{id}/offers
pub async fn submit_offer(
    State(state): State<AppState>,
    auth: AuthUser,
    IdPath(request_id): IdPath,
    ValidatedJson(request): ValidatedJson<CreateOfferRequest>,
) -> ApiResult<Created<Json<OfferResponse>>> {
    let service = MatchingService::new(state.service_context());
    let offer = service
        .submit_offer(
            request_id,
            auth.user_id,
            request.price,
            request.message,
            request.contact_unlock_fee,
        )
        .await?;
    Ok(Created(Json(OfferResponse::from(offer))))
}

/// Offers on a request; suppliers only see their own
///
/// GET /requests/{id}/offers
pub async fn list_offers(
    State(state): State<AppState>,
    auth: AuthUser,
    IdPath(request_id): IdPath,
) -> ApiResult<Json<Vec<OfferResponse>>> {
    let service = MatchingService::new(state.service_context());
    let offers = service.list_offers_for_request(request_id, auth.user_id).await?;
    Ok(Json(offers.iter().map(OfferResponse::from).collect()))
}
