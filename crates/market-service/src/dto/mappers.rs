//! Entity to DTO mappers
//!
//! Implements `From` conversions from domain entities to response DTOs.

use market_core::{Chat, Message, Offer, OfferAcceptance, PartRequest, Payment, Rating, Snowflake};

use super::responses::{
    AcceptanceResponse, ChatResponse, MessageResponse, ModerationResponse, OfferResponse,
    PartRequestResponse, PaymentResponse, RatingResponse, SentMessageResponse, SubmissionResponse,
};
use crate::services::{RequestSubmission, SentMessage};

// ============================================================================
// Request Mappers
// ============================================================================

impl PartRequestResponse {
    /// The phone number is only visible to the request's buyer
    pub fn for_viewer(request: &PartRequest, viewer_id: Snowflake) -> Self {
        Self {
            id: request.id.to_string(),
            buyer_id: request.buyer_id.to_string(),
            car_make: request.car_make.clone(),
            car_model: request.car_model.clone(),
            car_year: request.car_year,
            part_needed: request.part_needed.clone(),
            description: request.description.clone(),
            phone: request
                .is_owned_by(viewer_id)
                .then(|| request.phone.clone()),
            location: request.location.clone(),
            status: request.status,
            created_at: request.created_at,
            updated_at: request.updated_at,
        }
    }
}

impl From<&RequestSubmission> for SubmissionResponse {
    fn from(submission: &RequestSubmission) -> Self {
        Self {
            request: PartRequestResponse::for_viewer(&submission.request, submission.request.buyer_id),
            moderation: ModerationResponse {
                verdict: submission.decision.verdict,
                reason: submission.decision.reason.clone(),
                requires_review: submission.decision.requires_review(),
            },
        }
    }
}

// ============================================================================
// Offer Mappers
// ============================================================================

impl From<&Offer> for OfferResponse {
    fn from(offer: &Offer) -> Self {
        Self {
            id: offer.id.to_string(),
            request_id: offer.request_id.to_string(),
            supplier_id: offer.supplier_id.to_string(),
            price: offer.price,
            message: offer.message.clone(),
            contact_unlock_fee: offer.contact_unlock_fee,
            status: offer.status,
            created_at: offer.created_at,
            completed_at: offer.completed_at,
        }
    }
}

impl From<Offer> for OfferResponse {
    fn from(offer: Offer) -> Self {
        Self::from(&offer)
    }
}

impl From<&OfferAcceptance> for AcceptanceResponse {
    fn from(acceptance: &OfferAcceptance) -> Self {
        Self {
            offer: OfferResponse::from(&acceptance.offer),
            rejected_offer_ids: acceptance.rejected.iter().map(|o| o.id.to_string()).collect(),
        }
    }
}

impl From<&Rating> for RatingResponse {
    fn from(rating: &Rating) -> Self {
        Self {
            id: rating.id.to_string(),
            offer_id: rating.offer_id.to_string(),
            reviewer_id: rating.reviewer_id.to_string(),
            rating: rating.rating,
            comment: rating.comment.clone(),
            created_at: rating.created_at,
        }
    }
}

impl From<&Payment> for PaymentResponse {
    fn from(payment: &Payment) -> Self {
        Self {
            id: payment.id.to_string(),
            offer_id: payment.offer_id.to_string(),
            payer_id: payment.payer_id.to_string(),
            reference: payment.reference.clone(),
            amount: payment.amount,
            status: payment.status,
            created_at: payment.created_at,
        }
    }
}

// ============================================================================
// Chat Mappers
// ============================================================================

impl ChatResponse {
    pub fn for_viewer(chat: &Chat, viewer_id: Snowflake) -> Self {
        Self {
            id: chat.id.to_string(),
            buyer_id: chat.buyer_id.to_string(),
            seller_id: chat.seller_id.to_string(),
            part_id: chat.part_id.map(|p| p.to_string()),
            unread_count: chat.unread_for(viewer_id),
            last_message: chat.last_message.clone(),
            last_message_at: chat.last_message_at,
            created_at: chat.created_at,
        }
    }
}

impl From<&Message> for MessageResponse {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id.to_string(),
            chat_id: message.chat_id.to_string(),
            sender_id: message.sender_id.to_string(),
            content: message.content.clone(),
            message_type: message.message_type,
            attachment_url: message.attachment_url.clone(),
            is_read: message.is_read,
            created_at: message.created_at,
        }
    }
}

impl From<&SentMessage> for SentMessageResponse {
    fn from(sent: &SentMessage) -> Self {
        Self {
            chat: ChatResponse::for_viewer(&sent.chat, sent.message.sender_id),
            message: MessageResponse::from(&sent.message),
            duplicate: sent.duplicate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use market_core::{RequestDraft, RequestStatus};

    fn request() -> PartRequest {
        PartRequest::new(
            Snowflake::new(1),
            Snowflake::new(10),
            RequestDraft {
                car_make: "Ford".into(),
                car_model: "Focus".into(),
                car_year: 2016,
                part_needed: "clutch".into(),
                description: None,
                phone: "15550102000".into(),
                location: "Nairobi".into(),
            },
            RequestStatus::Pending,
        )
    }

    #[test]
    fn test_phone_hidden_from_others() {
        let request = request();
        assert_eq!(
            PartRequestResponse::for_viewer(&request, Snowflake::new(10)).phone.as_deref(),
            Some("15550102000")
        );
        assert!(PartRequestResponse::for_viewer(&request, Snowflake::new(20)).phone.is_none());
    }

    #[test]
    fn test_chat_unread_is_per_viewer() {
        let mut chat = Chat::new(Snowflake::new(5), Snowflake::new(10), Snowflake::new(20), None);
        chat.record_message(Snowflake::new(10), "hi", chrono::Utc::now());

        assert_eq!(ChatResponse::for_viewer(&chat, Snowflake::new(20)).unread_count, 1);
        assert_eq!(ChatResponse::for_viewer(&chat, Snowflake::new(10)).unread_count, 0);
        let json = serde_json::to_value(ChatResponse::for_viewer(&chat, Snowflake::new(10))).unwrap();
        assert_eq!(json["id"], "5");
    }
}
