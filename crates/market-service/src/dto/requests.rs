//! Request DTOs for API endpoints
//!
//! All request DTOs implement `Deserialize` and `Validate` for input validation.

use serde::Deserialize;
use validator::Validate;

use market_core::{MessageType, RequestDraft, Snowflake};

use crate::services::NewMessage;

// ============================================================================
// Part Requests
// ============================================================================

/// Submit a part request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePartRequest {
    #[validate(length(min = 1, max = 50, message = "car_make must be 1-50 characters"))]
    pub car_make: String,

    #[validate(length(min = 1, max = 50, message = "car_model must be 1-50 characters"))]
    pub car_model: String,

    #[validate(range(min = 1900, max = 2100, message = "car_year is out of range"))]
    pub car_year: i32,

    #[validate(length(min = 1, max = 200, message = "part_needed must be 1-200 characters"))]
    pub part_needed: String,

    #[validate(length(max = 2000, message = "description must be at most 2000 characters"))]
    pub description: Option<String>,

    #[validate(length(min = 7, max = 32, message = "phone must be 7-32 characters"))]
    pub phone: String,

    #[validate(length(min = 1, max = 200, message = "location must be 1-200 characters"))]
    pub location: String,
}

impl CreatePartRequest {
    pub fn into_draft(self) -> RequestDraft {
        RequestDraft {
            car_make: self.car_make,
            car_model: self.car_model,
            car_year: self.car_year,
            part_needed: self.part_needed,
            description: self.description.filter(|d| !d.trim().is_empty()),
            phone: self.phone,
            location: self.location,
        }
    }
}

/// Paging for list endpoints
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct LimitQuery {
    #[validate(range(min = 1, max = 100, message = "limit must be 1-100"))]
    pub limit: Option<i64>,
}

impl LimitQuery {
    pub fn limit_or(&self, default: i64) -> i64 {
        self.limit.unwrap_or(default)
    }
}

// ============================================================================
// Offers
// ============================================================================

/// Submit an offer on a request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateOfferRequest {
    #[validate(range(min = 1, message = "price must be positive"))]
    pub price: i64,

    #[serde(default)]
    #[validate(length(max = 1000, message = "message must be at most 1000 characters"))]
    pub message: String,

    #[serde(default)]
    #[validate(range(min = 0, message = "contact_unlock_fee cannot be negative"))]
    pub contact_unlock_fee: i64,
}

/// Rate a completed offer
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateRatingRequest {
    #[validate(range(min = 1, max = 5, message = "rating must be 1-5"))]
    pub rating: i16,

    #[validate(length(max = 1000, message = "comment must be at most 1000 characters"))]
    pub comment: Option<String>,
}

/// Confirm a contact-unlock payment
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ConfirmPaymentRequest {
    #[validate(length(min = 1, max = 128, message = "reference must be 1-128 characters"))]
    pub reference: String,

    #[validate(range(min = 0, message = "amount cannot be negative"))]
    pub amount: i64,
}

// ============================================================================
// Chats
// ============================================================================

/// Send a message, opening the chat if needed
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SendMessageRequest {
    pub recipient_id: Snowflake,

    /// Request the conversation is about
    pub part_id: Option<Snowflake>,

    #[serde(default)]
    #[validate(length(max = 4000, message = "content must be at most 4000 characters"))]
    pub content: String,

    #[serde(default)]
    pub message_type: MessageType,

    #[validate(url(message = "attachment_url must be a URL"))]
    pub attachment_url: Option<String>,

    /// Client-generated id making retries idempotent
    pub client_id: Option<Snowflake>,
}

impl SendMessageRequest {
    pub fn into_message(self) -> NewMessage {
        NewMessage {
            content: self.content,
            message_type: self.message_type,
            attachment_url: self.attachment_url,
            client_id: self.client_id,
        }
    }
}

// ============================================================================
// Admin
// ============================================================================

/// Manual resolution of a flagged request
#[derive(Debug, Clone, Copy, Deserialize, Validate)]
pub struct ReviewDecisionRequest {
    pub approve: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_part_request_validation() {
        let valid: CreatePartRequest = serde_json::from_value(json!({
            "car_make": "Toyota",
            "car_model": "Corolla",
            "car_year": 2014,
            "part_needed": "alternator",
            "description": " ",
            "phone": "+1 555 010 2000",
            "location": "Lagos"
        }))
        .unwrap();
        assert!(valid.validate().is_ok());
        assert!(valid.clone().into_draft().description.is_none());

        let mut invalid = valid;
        invalid.car_year = 1800;
        invalid.part_needed = String::new();
        let errors = invalid.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("car_year"));
        assert!(errors.field_errors().contains_key("part_needed"));
    }

    #[test]
    fn test_offer_defaults_and_bounds() {
        let offer: CreateOfferRequest = serde_json::from_value(json!({"price": 100})).unwrap();
        assert_eq!(offer.contact_unlock_fee, 0);
        assert!(offer.validate().is_ok());

        let free: CreateOfferRequest = serde_json::from_value(json!({"price": 0})).unwrap();
        assert!(free.validate().is_err());
    }

    #[test]
    fn test_send_message_accepts_string_ids() {
        let request: SendMessageRequest = serde_json::from_value(json!({
            "recipient_id": "20",
            "content": "hello",
            "client_id": 77
        }))
        .unwrap();
        assert!(request.validate().is_ok());
        let message = request.clone().into_message();
        assert_eq!(request.recipient_id, Snowflake::new(20));
        assert_eq!(message.client_id, Some(Snowflake::new(77)));
        assert_eq!(message.message_type, MessageType::Text);
    }

    #[test]
    fn test_rating_bounds() {
        let rating: CreateRatingRequest = serde_json::from_value(json!({"rating": 6})).unwrap();
        assert!(rating.validate().is_err());
    }
}
