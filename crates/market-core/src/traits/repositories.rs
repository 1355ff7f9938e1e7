//! Repository traits (ports) - define the interface for data access
//!
//! The domain layer defines what it needs, and the infrastructure layer
//! provides the implementation (`market-db` ships a Postgres and an
//! in-memory one).

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::entities::{Chat, Message, Offer, OfferStatus, PartRequest, Payment, Rating, RequestStatus};
use crate::error::DomainError;
use crate::value_objects::Snowflake;

/// Result type for repository operations
pub type RepoResult<T> = Result<T, DomainError>;

// ============================================================================
// Request Repository
// ============================================================================

#[async_trait]
pub trait RequestRepository: Send + Sync {
    async fn find_by_id(&self, id: Snowflake) -> RepoResult<Option<PartRequest>>;

    async fn create(&self, request: &PartRequest) -> RepoResult<()>;

    /// Newest first
    async fn find_by_buyer(&self, buyer_id: Snowflake) -> RepoResult<Vec<PartRequest>>;

    /// Newest first, at most `limit`
    async fn find_by_status(&self, status: RequestStatus, limit: i64) -> RepoResult<Vec<PartRequest>>;

    /// Move `id` from `from` to `to` only if it is still in `from`.
    /// Returns whether the row changed.
    async fn compare_and_set_status(
        &self,
        id: Snowflake,
        from: RequestStatus,
        to: RequestStatus,
    ) -> RepoResult<bool>;

    /// `matched -> completed` and stamp the accepted offer's `completed_at`,
    /// atomically. Returns false if the request was no longer `matched`.
    async fn complete(&self, id: Snowflake, at: DateTime<Utc>) -> RepoResult<bool>;

    /// Expire `pending` requests created before `cutoff`
    async fn expire_pending(&self, cutoff: DateTime<Utc>) -> RepoResult<u64>;

    async fn count_by_status(&self, buyer_id: Snowflake) -> RepoResult<Vec<(RequestStatus, i64)>>;
}

// ============================================================================
// Offer Repository
// ============================================================================

/// Result of a successful acceptance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfferAcceptance {
    pub offer: Offer,
    /// Sibling offers moved to `rejected` in the same transaction
    pub rejected: Vec<Offer>,
}

#[async_trait]
pub trait OfferRepository: Send + Sync {
    async fn find_by_id(&self, id: Snowflake) -> RepoResult<Option<Offer>>;

    async fn create(&self, offer: &Offer) -> RepoResult<()>;

    /// Oldest first
    async fn find_by_request(&self, request_id: Snowflake) -> RepoResult<Vec<Offer>>;

    /// Newest first
    async fn find_by_supplier(&self, supplier_id: Snowflake) -> RepoResult<Vec<Offer>>;

    /// In one transaction: request `pending -> matched`, the offer
    /// `pending -> accepted`, every other pending offer on the request
    /// `-> rejected`. Returns `None` without writing anything if either
    /// compare-and-set fails.
    async fn accept(&self, offer_id: Snowflake, request_id: Snowflake) -> RepoResult<Option<OfferAcceptance>>;

    /// Expire `pending` offers created before `cutoff`
    async fn expire_pending(&self, cutoff: DateTime<Utc>) -> RepoResult<u64>;

    async fn count_by_status(&self, supplier_id: Snowflake) -> RepoResult<Vec<(OfferStatus, i64)>>;
}

// ============================================================================
// Chat Repository
// ============================================================================

#[async_trait]
pub trait ChatRepository: Send + Sync {
    async fn find_by_id(&self, id: Snowflake) -> RepoResult<Option<Chat>>;

    async fn find_between(
        &self,
        buyer_id: Snowflake,
        seller_id: Snowflake,
        part_id: Option<Snowflake>,
    ) -> RepoResult<Option<Chat>>;

    /// Insert `chat` unless a chat for the same `(buyer, seller, part)`
    /// exists; returns whichever row is stored.
    async fn find_or_create(&self, chat: &Chat) -> RepoResult<Chat>;

    /// Most recent activity first
    async fn find_by_user(&self, user_id: Snowflake) -> RepoResult<Vec<Chat>>;

    /// Insert the message, bump the recipient's unread counter and the
    /// preview, atomically. Returns `None` if a message with the same id
    /// was already stored (nothing is counted twice).
    async fn append_message(&self, message: &Message, preview: &str) -> RepoResult<Option<Chat>>;

    /// Zero the reader's counter and flag messages addressed to them as
    /// read. Returns the number of messages flipped.
    async fn mark_read(&self, chat_id: Snowflake, reader_id: Snowflake) -> RepoResult<u64>;

    /// Sum of the user's unread counters across chats
    async fn total_unread(&self, user_id: Snowflake) -> RepoResult<i64>;
}

// ============================================================================
// Message Repository
// ============================================================================

#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn find_by_id(&self, id: Snowflake) -> RepoResult<Option<Message>>;

    /// Ordered by `(created_at, id)`
    async fn find_by_chat(&self, chat_id: Snowflake) -> RepoResult<Vec<Message>>;

    /// Unread messages in the chat not sent by `reader_id`
    async fn count_unread(&self, chat_id: Snowflake, reader_id: Snowflake) -> RepoResult<i64>;
}

// ============================================================================
// Rating Repository
// ============================================================================

#[async_trait]
pub trait RatingRepository: Send + Sync {
    /// Fails with `RatingAlreadyExists` on a second rating by the same reviewer
    async fn create(&self, rating: &Rating) -> RepoResult<()>;

    async fn find_by_offer(&self, offer_id: Snowflake) -> RepoResult<Vec<Rating>>;
}

// ============================================================================
// Payment Repository
// ============================================================================

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Fails with `PaymentAlreadyRecorded` on a repeated `(offer, reference)`
    async fn create(&self, payment: &Payment) -> RepoResult<()>;

    async fn find_by_offer(&self, offer_id: Snowflake) -> RepoResult<Vec<Payment>>;
}
