//! Domain events - emitted after every committed workflow transition
//!
//! Events are triggers, not state: a consumer that receives `OfferAccepted`
//! re-reads the request rather than trusting the payload.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entities::RequestStatus;
use crate::value_objects::Snowflake;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    // =========================================================================
    // Request Events
    // =========================================================================
    RequestAdmitted {
        request_id: Snowflake,
        buyer_id: Snowflake,
        status: RequestStatus,
    },
    RequestReviewed {
        request_id: Snowflake,
        buyer_id: Snowflake,
        approved: bool,
    },
    RequestCompleted {
        request_id: Snowflake,
        buyer_id: Snowflake,
        supplier_id: Snowflake,
    },
    ReviewStalled {
        request_id: Snowflake,
        attempts: u32,
        admins: Vec<Snowflake>,
    },

    // =========================================================================
    // Offer Events
    // =========================================================================
    OfferSubmitted {
        offer_id: Snowflake,
        request_id: Snowflake,
        buyer_id: Snowflake,
        supplier_id: Snowflake,
        price: i64,
    },
    OfferAccepted {
        offer_id: Snowflake,
        request_id: Snowflake,
        buyer_id: Snowflake,
        supplier_id: Snowflake,
        /// Suppliers whose sibling offers were rejected
        rejected_suppliers: Vec<Snowflake>,
    },

    // =========================================================================
    // Payment / Chat Events
    // =========================================================================
    PaymentConfirmed {
        payment_id: Snowflake,
        offer_id: Snowflake,
        payer_id: Snowflake,
        supplier_id: Snowflake,
        amount: i64,
    },
    MessageReceived {
        message_id: Snowflake,
        chat_id: Snowflake,
        sender_id: Snowflake,
        recipient_id: Snowflake,
        preview: String,
    },
}

impl DomainEvent {
    /// Event type string used by sinks
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::RequestAdmitted { .. } => "request_admitted",
            Self::RequestReviewed { .. } => "request_reviewed",
            Self::RequestCompleted { .. } => "request_completed",
            Self::ReviewStalled { .. } => "review_stalled",
            Self::OfferSubmitted { .. } => "offer_submitted",
            Self::OfferAccepted { .. } => "offer_accepted",
            Self::PaymentConfirmed { .. } => "payment_confirmed",
            Self::MessageReceived { .. } => "message_received",
        }
    }

    /// Stable id derived from the natural key of the transition, so a
    /// re-delivered event carries the same id and sinks can dedupe.
    pub fn event_id(&self) -> String {
        let key = match self {
            Self::RequestAdmitted { request_id, .. }
            | Self::RequestReviewed { request_id, .. }
            | Self::RequestCompleted { request_id, .. }
            | Self::ReviewStalled { request_id, .. } => *request_id,
            Self::OfferSubmitted { offer_id, .. } | Self::OfferAccepted { offer_id, .. } => *offer_id,
            Self::PaymentConfirmed { payment_id, .. } => *payment_id,
            Self::MessageReceived { message_id, .. } => *message_id,
        };
        format!("{}:{}", self.event_type(), key)
    }

    /// Users who should hear about this event
    pub fn recipients(&self) -> Vec<Snowflake> {
        match self {
            Self::RequestAdmitted { buyer_id, .. } | Self::RequestReviewed { buyer_id, .. } => {
                vec![*buyer_id]
            }
            Self::RequestCompleted { supplier_id, .. } => vec![*supplier_id],
            Self::ReviewStalled { admins, .. } => admins.clone(),
            Self::OfferSubmitted { buyer_id, .. } => vec![*buyer_id],
            Self::OfferAccepted {
                supplier_id,
                rejected_suppliers,
                ..
            } => {
                let mut all = vec![*supplier_id];
                all.extend(rejected_suppliers.iter().copied());
                all
            }
            Self::PaymentConfirmed { supplier_id, .. } => vec![*supplier_id],
            Self::MessageReceived { recipient_id, .. } => vec![*recipient_id],
        }
    }

    pub fn to_notification(&self) -> Notification {
        Notification {
            event_id: self.event_id(),
            event_type: self.event_type().to_string(),
            recipients: self.recipients(),
            payload: serde_json::to_value(self).unwrap_or(Value::Null),
        }
    }
}

/// What a notification sink receives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub event_id: String,
    pub event_type: String,
    pub recipients: Vec<Snowflake>,
    pub payload: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_id_is_stable() {
        let event = DomainEvent::OfferAccepted {
            offer_id: Snowflake::new(42),
            request_id: Snowflake::new(1),
            buyer_id: Snowflake::new(2),
            supplier_id: Snowflake::new(3),
            rejected_suppliers: vec![Snowflake::new(4)],
        };
        assert_eq!(event.event_id(), "offer_accepted:42");
        assert_eq!(event.clone().event_id(), event.event_id());
        assert_eq!(event.recipients(), vec![Snowflake::new(3), Snowflake::new(4)]);
    }

    #[test]
    fn test_notification_payload_is_tagged() {
        let event = DomainEvent::RequestReviewed {
            request_id: Snowflake::new(9),
            buyer_id: Snowflake::new(2),
            approved: false,
        };
        let notification = event.to_notification();

        assert_eq!(notification.event_type, "request_reviewed");
        assert_eq!(notification.recipients, vec![Snowflake::new(2)]);
        assert_eq!(notification.payload["type"], "request_reviewed");
        assert_eq!(notification.payload["request_id"], "9");
    }
}
