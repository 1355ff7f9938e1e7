//! Domain entities - core business objects

mod chat;
mod message;
mod moderation;
mod offer;
mod payment;
mod rating;
mod request;

pub use chat::{Chat, ChatRole};
pub use message::{merge_messages, Message, MessageType, MAX_MESSAGE_LENGTH};
pub use moderation::{ModerationDecision, ModerationVerdict, ReviewVerdict, RuleVerdict, SpamCheck};
pub use offer::{Offer, OfferStatus};
pub use payment::{Payment, PaymentStatus};
pub use rating::Rating;
pub use request::{PartRequest, RequestDraft, RequestStatus};
