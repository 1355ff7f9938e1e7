//! Route definitions
//!
//! All API routes organized by domain and mounted under /api/v1.

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::{admin, chats, health, offers, requests, users};
use crate::state::AppState;

/// Create the main API router with all routes (excluding health for separate middleware handling)
pub fn create_router() -> Router<AppState> {
    Router::new().nest("/api/v1", api_v1_routes())
}

/// Health check routes (exported separately to bypass rate limiting)
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check))
}

/// API v1 routes
fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .merge(request_routes())
        .merge(offer_routes())
        .merge(chat_routes())
        .merge(user_routes())
        .merge(admin_routes())
}

/// Part request routes
fn request_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/requests",
            post(requests::submit_request).get(requests::list_open_requests),
        )
        .route("/requests/:id", get(requests::get_request))
        .route("/requests/:id/complete", post(requests::complete_request))
        .route(
            "/requests/:id/offers",
            post(requests::submit_offer).get(requests::list_offers),
        )
}

/// Offer routes
fn offer_routes() -> Router<AppState> {
    Router::new()
        .route("/offers/:id/accept", post(offers::accept_offer))
        .route(
            "/offers/:id/ratings",
            post(offers::submit_rating).get(offers::list_ratings),
        )
        .route(
            "/offers/:id/payments",
            post(offers::confirm_payment).get(offers::list_payments),
        )
}

/// Chat routes
fn chat_routes() -> Router<AppState> {
    Router::new()
        .route("/chats", get(chats::list_chats))
        .route("/chats/messages", post(chats::send_message))
        .route("/chats/:id/messages", get(chats::list_messages))
        .route("/chats/:id/read", post(chats::mark_read))
}

/// Current-user routes
fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users/@me/requests", get(users::my_requests))
        .route("/users/@me/offers", get(users::my_offers))
        .route("/users/@me/stats", get(users::my_stats))
}

/// Admin routes
fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/requests/review", get(admin::review_queue))
        .route("/admin/requests/:id/review", post(admin::resolve_review))
}
