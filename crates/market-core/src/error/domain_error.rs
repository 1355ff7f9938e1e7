//! Domain errors - error types for the domain layer

use thiserror::Error;

use crate::value_objects::Snowflake;

/// Domain layer errors
#[derive(Debug, Error)]
pub enum DomainError {
    // =========================================================================
    // Not Found Errors
    // =========================================================================
    #[error("Request not found: {0}")]
    RequestNotFound(Snowflake),

    #[error("Offer not found: {0}")]
    OfferNotFound(Snowflake),

    #[error("Chat not found: {0}")]
    ChatNotFound(Snowflake),

    // =========================================================================
    // Validation Errors
    // =========================================================================
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid phone number: {0}")]
    InvalidPhone(String),

    #[error("Content too long: max {max} characters")]
    ContentTooLong { max: usize },

    #[error("Rating must be between 1 and 5, got {0}")]
    InvalidRating(i16),

    // =========================================================================
    // Authorization Errors
    // =========================================================================
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not a participant of chat {0}")]
    NotParticipant(Snowflake),

    #[error("Not the owner of request {0}")]
    NotRequestOwner(Snowflake),

    // =========================================================================
    // State Machine Violations
    // =========================================================================
    #[error("Cannot {action} {entity} {id} in status {status}")]
    InvalidState {
        entity: &'static str,
        id: Snowflake,
        status: String,
        action: &'static str,
    },

    // =========================================================================
    // Conflict Errors
    // =========================================================================
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Offer {offer_id} already rated by this reviewer")]
    RatingAlreadyExists { offer_id: Snowflake },

    #[error("Payment reference already recorded: {0}")]
    PaymentAlreadyRecorded(String),

    // =========================================================================
    // Moderation and Payments
    // =========================================================================
    #[error("Blocked by moderation: {0}")]
    ModerationBlocked(String),

    #[error("Payment rejected: {0}")]
    PaymentRejected(String),

    // =========================================================================
    // Availability
    // =========================================================================
    #[error("Dependency unavailable: {0}")]
    DependencyUnavailable(String),

    // =========================================================================
    // Infrastructure Errors (wrapped)
    // =========================================================================
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Cache error: {0}")]
    CacheError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl DomainError {
    /// Shorthand for a state machine violation
    pub fn invalid_state(
        entity: &'static str,
        id: Snowflake,
        status: impl Into<String>,
        action: &'static str,
    ) -> Self {
        Self::InvalidState {
            entity,
            id,
            status: status.into(),
            action,
        }
    }

    /// Get an error code string for API responses
    pub fn code(&self) -> &'static str {
        match self {
            // Not Found
            Self::RequestNotFound(_) => "UNKNOWN_REQUEST",
            Self::OfferNotFound(_) => "UNKNOWN_OFFER",
            Self::ChatNotFound(_) => "UNKNOWN_CHAT",

            // Validation
            Self::ValidationError(_) => "VALIDATION_ERROR",
            Self::InvalidPhone(_) => "INVALID_PHONE",
            Self::ContentTooLong { .. } => "CONTENT_TOO_LONG",
            Self::InvalidRating(_) => "INVALID_RATING",

            // Authorization
            Self::Forbidden(_) => "FORBIDDEN",
            Self::NotParticipant(_) => "NOT_PARTICIPANT",
            Self::NotRequestOwner(_) => "NOT_REQUEST_OWNER",

            // State
            Self::InvalidState { .. } => "INVALID_STATE",

            // Conflict
            Self::Conflict(_) => "CONFLICT",
            Self::RatingAlreadyExists { .. } => "RATING_EXISTS",
            Self::PaymentAlreadyRecorded(_) => "PAYMENT_EXISTS",

            // Moderation / payments
            Self::ModerationBlocked(_) => "MODERATION_BLOCKED",
            Self::PaymentRejected(_) => "PAYMENT_REJECTED",

            // Availability
            Self::DependencyUnavailable(_) => "DEPENDENCY_UNAVAILABLE",

            // Infrastructure
            Self::DatabaseError(_) => "DATABASE_ERROR",
            Self::CacheError(_) => "CACHE_ERROR",
            Self::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::RequestNotFound(_) | Self::OfferNotFound(_) | Self::ChatNotFound(_)
        )
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::ValidationError(_)
                | Self::InvalidPhone(_)
                | Self::ContentTooLong { .. }
                | Self::InvalidRating(_)
        )
    }

    /// Check if this is an authorization error
    pub fn is_authorization(&self) -> bool {
        matches!(
            self,
            Self::Forbidden(_) | Self::NotParticipant(_) | Self::NotRequestOwner(_)
        )
    }

    /// Check if this is a state machine violation
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Self::InvalidState { .. })
    }

    /// Check if this is a conflict error
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::Conflict(_) | Self::RatingAlreadyExists { .. } | Self::PaymentAlreadyRecorded(_)
        )
    }

    /// Check if an external collaborator or the store could not be reached
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::DependencyUnavailable(_))
    }
}
