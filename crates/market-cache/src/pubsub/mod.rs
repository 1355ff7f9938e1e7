//! Redis Pub/Sub module.
//!
//! Fans domain notifications out to per-user channels.

mod channels;
mod publisher;

pub use channels::{PubSubChannel, ADMIN_CHANNEL, USER_CHANNEL_PREFIX};
pub use publisher::{PubSubEvent, Publisher};
