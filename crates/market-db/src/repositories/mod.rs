//! Repository implementations
//!
//! PostgreSQL implementations of the repository traits defined in market-core.
//! Each repository handles database operations for a specific domain entity.

mod chat;
mod error;
mod message;
mod offer;
mod payment;
mod rating;
mod request;

pub use chat::PgChatRepository;
pub use message::PgMessageRepository;
pub use offer::PgOfferRepository;
pub use payment::PgPaymentRepository;
pub use rating::PgRatingRepository;
pub use request::PgRequestRepository;
