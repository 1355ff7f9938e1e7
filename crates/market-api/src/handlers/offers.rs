//! Offer handlers
//!
//! Acceptance, ratings and contact-unlock payments on a single offer.

use axum::{extract::State, Json};
use market_service::dto::{
    AcceptanceResponse, ConfirmPaymentRequest, CreateRatingRequest, PaymentResponse, RatingResponse,
};
use market_service::services::{MatchingService, PaymentService, RatingService};

use crate::extractors::{AuthUser, IdPath, ValidatedJson};
use crate::response::{ApiResult, Created};
use crate::state::AppState;

/// Accept an offer; sibling offers are rejected atomically
///
/// POST /offers/{id}/accept
pub async fn accept_offer(
    State(state): State<AppState>,
    auth: AuthUser,
    IdPath(offer_id): IdPath,
) -> ApiResult<Json<AcceptanceResponse>> {
    let service = MatchingService::new(state.service_context());
    let acceptance = service.accept_offer(offer_id, auth.user_id).await?;
    Ok(Json(AcceptanceResponse::from(&acceptance)))
}

/// Rate the supplier of a completed offer
///
/// POST /offers/{id}/ratings
pub async fn submit_rating(
    State(state): State<AppState>,
    auth: AuthUser,
    IdPath(offer_id): IdPath,
    ValidatedJson(request): ValidatedJson<CreateRatingRequest>,
) -> ApiResult<Created<Json<RatingResponse>>> {
    let service = RatingService::new(state.service_context());
    let rating = service
        .submit_rating(offer_id, auth.user_id, request.rating, request.comment)
        .await?;
    Ok(Created(Json(RatingResponse::from(&rating))))
}

/// GET /offers/{id}/ratings
pub async fn list_ratings(
    State(state): State<AppState>,
    _auth: AuthUser,
    IdPath(offer_id): IdPath,
) -> ApiResult<Json<Vec<RatingResponse>>> {
    let service = RatingService::new(state.service_context());
    let ratings = service.list_for_offer(offer_id).await?;
    Ok(Json(ratings.iter().map(RatingResponse::from).collect()))
}

/// Confirm the contact-unlock payment for an accepted offer
///
/// POST /offers/{id}/payments
pub async fn confirm_payment(
    State(state): State<AppState>,
    auth: AuthUser,
    IdPath(offer_id): IdPath,
    ValidatedJson(request): ValidatedJson<ConfirmPaymentRequest>,
) -> ApiResult<Created<Json<PaymentResponse>>> {
    let service = PaymentService::new(state.service_context());
    let payment = service
        .confirm_payment(offer_id, auth.user_id, &request.reference, request.amount)
        .await?;
    Ok(Created(Json(PaymentResponse::from(&payment))))
}

/// GET /offers/{id}/payments
pub async fn list_payments(
    State(state): State<AppState>,
    auth: AuthUser,
    IdPath(offer_id): IdPath,
) -> ApiResult<Json<Vec<PaymentResponse>>> {
    let service = PaymentService::new(state.service_context());
    let payments = service.list_for_offer(offer_id, auth.user_id).await?;
    Ok(Json(payments.iter().map(PaymentResponse::from).collect()))
}
