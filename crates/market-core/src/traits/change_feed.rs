//! Change feed port

use tokio::sync::broadcast;

use crate::events::FeedEvent;

/// Source of row-level change notifications.
///
/// Every call returns an independent receiver; dropping it is the only
/// cleanup required. A source that can lose notifications (a dropped
/// database connection) sends [`FeedEvent::Resync`] once it is back.
pub trait ChangeFeed: Send + Sync {
    fn subscribe(&self) -> broadcast::Receiver<FeedEvent>;
}
