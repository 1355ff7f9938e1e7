//! Business logic services
//!
//! This module contains the workflow services that sit between the HTTP
//! layer and the stores: moderation and review of part requests, offer
//! matching, chat synchronization, payments, ratings and notifications.

pub mod chat;
pub mod context;
pub mod error;
pub mod feed;
pub mod matching;
pub mod moderation;
pub mod notification;
pub mod payment;
pub mod rating;
pub mod request;
pub mod review;
pub mod stats;
pub mod timeline;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export all services for convenience
pub use chat::{ChatService, LiveTimeline, NewMessage, SentMessage, PREVIEW_LENGTH};
pub use context::{ServiceContext, ServiceContextBuilder, ServiceSettings};
pub use error::{ServiceError, ServiceResult};
pub use feed::{ChangeFeedSubscriber, FeedTrigger, Subscription, SubscriptionInfo};
pub use matching::{ExpiryReport, MatchingService};
pub use moderation::{AntiSpamGate, GateOutcome};
pub use notification::{DispatchReport, LoggingSink, NotificationDispatcher, RecordingSink};
pub use payment::PaymentService;
pub use rating::RatingService;
pub use request::{RequestService, RequestSubmission, MIN_CAR_YEAR};
pub use review::{ReviewOutcome, ReviewQueue};
pub use stats::{DashboardStats, LiveDashboard, StatsCache, StatsService};
pub use timeline::{ChatTimeline, TimelineUpdate};
