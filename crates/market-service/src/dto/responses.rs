//! Response DTOs for API endpoints
//!
//! All response DTOs implement `Serialize` for JSON output.
//! Snowflake IDs are serialized as strings for JavaScript compatibility.

use chrono::{DateTime, Utc};
use serde::Serialize;

use market_core::{MessageType, ModerationVerdict, OfferStatus, PaymentStatus, RequestStatus};

use crate::services::ReviewOutcome;

// ============================================================================
// Request Responses
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct PartRequestResponse {
    pub id: String,
    pub buyer_id: String,
    pub car_make: String,
    pub car_model: String,
    pub car_year: i32,
    pub part_needed: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Only shown to the buyer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub location: String,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModerationResponse {
    pub verdict: ModerationVerdict,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub requires_review: bool,
}

/// Result of `POST /requests`
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionResponse {
    pub request: PartRequestResponse,
    pub moderation: ModerationResponse,
}

/// Result of an admin resolving a flagged request
#[derive(Debug, Clone, Serialize)]
pub struct ReviewResolutionResponse {
    #[serde(flatten)]
    pub outcome: ReviewOutcome,
    pub request: PartRequestResponse,
}

// ============================================================================
// Offer Responses
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct OfferResponse {
    pub id: String,
    pub request_id: String,
    pub supplier_id: String,
    pub price: i64,
    pub message: String,
    pub contact_unlock_fee: i64,
    pub status: OfferStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AcceptanceResponse {
    pub offer: OfferResponse,
    pub rejected_offer_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RatingResponse {
    pub id: String,
    pub offer_id: String,
    pub reviewer_id: String,
    pub rating: i16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentResponse {
    pub id: String,
    pub offer_id: String,
    pub payer_id: String,
    pub reference: String,
    pub amount: i64,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Chat Responses
// ============================================================================

/// A chat from one participant's point of view
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub id: String,
    pub buyer_id: String,
    pub seller_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub part_id: Option<String>,
    pub unread_count: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    pub content: String,
    pub message_type: MessageType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment_url: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SentMessageResponse {
    pub chat: ChatResponse,
    pub message: MessageResponse,
    pub duplicate: bool,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct MarkReadResponse {
    pub marked: u64,
}

// ============================================================================
// Health Responses
// ============================================================================

/// Basic health check response
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

impl HealthResponse {
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Readiness check response
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub checks: HealthChecks,
}

/// Health check status for each backing service
#[derive(Debug, Clone, Serialize)]
pub struct HealthChecks {
    pub store: String,
    pub redis: String,
}

fn health_label(healthy: bool) -> String {
    if healthy { "healthy" } else { "unhealthy" }.to_string()
}

impl ReadinessResponse {
    pub fn ready(store_healthy: bool, redis_healthy: bool) -> Self {
        Self {
            status: if store_healthy && redis_healthy {
                "ready"
            } else {
                "not_ready"
            }
            .to_string(),
            timestamp: Utc::now(),
            checks: HealthChecks {
                store: health_label(store_healthy),
                redis: health_label(redis_healthy),
            },
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status == "ready"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readiness_response() {
        let ready = ReadinessResponse::ready(true, true);
        assert!(ready.is_ready());

        let degraded = ReadinessResponse::ready(true, false);
        assert!(!degraded.is_ready());
        assert_eq!(degraded.checks.redis, "unhealthy");
        assert_eq!(degraded.checks.store, "healthy");
    }

    #[test]
    fn test_review_outcome_is_tagged() {
        let json = serde_json::to_value(ReviewOutcome::Approved).unwrap();
        assert_eq!(json["outcome"], "approved");
    }
}
