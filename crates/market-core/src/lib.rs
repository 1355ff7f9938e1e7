//! # market-core
//!
//! Domain layer for the parts marketplace: entities and their state machines,
//! value objects, domain errors and events, and the ports (repository and
//! collaborator traits) the rest of the workspace implements.
//! This crate has zero dependencies on infrastructure (database, web framework, etc.).

pub mod entities;
pub mod error;
pub mod events;
pub mod traits;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use entities::{
    merge_messages, Chat, ChatRole, Message, MessageType, ModerationDecision, ModerationVerdict,
    Offer, OfferStatus, PartRequest, Payment, PaymentStatus, Rating, RequestDraft, RequestStatus,
    ReviewVerdict, RuleVerdict, SpamCheck, MAX_MESSAGE_LENGTH,
};
pub use error::DomainError;
pub use events::{ChangeFilter, ChangeOp, DomainEvent, FeedEvent, Notification, RowChange, Table};
pub use traits::{
    AiReviewer, ChangeFeed, ChatRepository, MessageRepository, NotificationSink, OfferAcceptance,
    OfferRepository, PaymentRepository, PaymentVerifier, RatingRepository, RepoResult,
    RequestRepository, SpamRulesEvaluator,
};
pub use value_objects::{PhoneNumber, Snowflake, SnowflakeGenerator, SnowflakeParseError};
