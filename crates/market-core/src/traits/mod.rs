//! Ports - the interfaces the domain needs from the outside world

mod change_feed;
mod collaborators;
mod repositories;

pub use change_feed::ChangeFeed;
pub use collaborators::{AiReviewer, NotificationSink, PaymentVerifier, SpamRulesEvaluator};
pub use repositories::{
    ChatRepository, MessageRepository, OfferAcceptance, OfferRepository, PaymentRepository,
    RatingRepository, RepoResult, RequestRepository,
};
