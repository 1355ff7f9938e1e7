//! Current-user handlers

use axum::{extract::State, Json};
use market_service::dto::{OfferResponse, PartRequestResponse};
use market_service::services::{DashboardStats, MatchingService, StatsService};

use crate::extractors::AuthUser;
use crate::response::ApiResult;
use crate::state::AppState;

/// GET /users/@me/requests
pub async fn my_requests(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<Vec<PartRequestResponse>>> {
    let service = MatchingService::new(state.service_context());
    let requests = service.list_requests_for_buyer(auth.user_id).await?;
    Ok(Json(
        requests
            .iter()
            .map(|r| PartRequestResponse::for_viewer(r, auth.user_id))
            .collect(),
    ))
}

/// Offers the caller made as a supplier
///
/// GET /users/@me/offers
pub async fn my_offers(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<Vec<OfferResponse>>> {
    let service = MatchingService::new(state.service_context());
    let offers = service.list_offers_for_supplier(auth.user_id).await?;
    Ok(Json(offers.iter().map(OfferResponse::from).collect()))
}

/// Dashboard counters; served stale when the store is unreachable
///
/// GET /users/@me/stats
pub async fn my_stats(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<DashboardStats>> {
    let service = StatsService::new(state.service_context());
    Ok(Json(service.dashboard(auth.user_id).await?))
}
