//! External collaborator ports
//!
//! Implementations report transport failures as
//! [`DomainError::DependencyUnavailable`] so callers can tell "the answer was
//! no" apart from "nobody answered".

use async_trait::async_trait;

use crate::entities::{PartRequest, ReviewVerdict, RuleVerdict, SpamCheck};
use crate::error::DomainError;
use crate::events::Notification;

/// Rate/velocity, duplicate-content and reputation rules
#[async_trait]
pub trait SpamRulesEvaluator: Send + Sync {
    async fn evaluate(&self, check: &SpamCheck) -> Result<RuleVerdict, DomainError>;
}

/// Second-pass content review for flagged requests
#[async_trait]
pub trait AiReviewer: Send + Sync {
    async fn evaluate(&self, request: &PartRequest) -> Result<ReviewVerdict, DomainError>;
}

/// Opaque payment provider check
#[async_trait]
pub trait PaymentVerifier: Send + Sync {
    async fn verify(&self, reference: &str, expected_amount: i64) -> Result<bool, DomainError>;
}

/// Push/SMS/email fan-out. Must tolerate duplicate delivery.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    fn name(&self) -> &'static str;

    async fn deliver(&self, notification: &Notification) -> Result<(), DomainError>;
}
