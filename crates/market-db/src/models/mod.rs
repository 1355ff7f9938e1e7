//! Database models - SQLx-compatible structs for PostgreSQL tables

mod chat;
mod message;
mod offer;
mod payment;
mod rating;
mod request;

pub use chat::ChatModel;
pub use message::MessageModel;
pub use offer::{OfferModel, StatusCountModel};
pub use payment::PaymentModel;
pub use rating::RatingModel;
pub use request::RequestModel;
