//! PostgreSQL change feed over LISTEN/NOTIFY
//!
//! Triggers installed by the `0002_change_feed` migration publish every row
//! mutation on [`CHANGE_CHANNEL`]. A single `PgListener` task fans them out
//! to any number of broadcast receivers. When the listener reconnects after
//! a dropped connection, receivers get [`FeedEvent::Resync`] since any
//! NOTIFY sent in between is gone.

use std::time::Duration;

use sqlx::postgres::{PgListener, PgPool};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use market_core::{ChangeFeed, FeedEvent, RowChange};

/// NOTIFY channel the triggers publish on
pub const CHANGE_CHANNEL: &str = "market_changes";

/// Parse a trigger payload
pub fn parse_payload(payload: &str) -> Result<RowChange, serde_json::Error> {
    serde_json::from_str(payload)
}

/// Map one listener outcome to what receivers see; `None` is a reconnect
pub fn feed_event(payload: Option<&str>) -> Option<FeedEvent> {
    match payload {
        Some(payload) => match parse_payload(payload) {
            Ok(change) => {
                debug!(table = %change.table, op = ?change.op, "Row change");
                Some(FeedEvent::Row(change))
            }
            Err(e) => {
                warn!(error = %e, "Dropping malformed change payload");
                None
            }
        },
        None => {
            warn!("Change feed connection re-established; asking subscribers to resync");
            Some(FeedEvent::Resync)
        }
    }
}

pub struct PgChangeFeed {
    sender: broadcast::Sender<FeedEvent>,
    task: JoinHandle<()>,
}

impl PgChangeFeed {
    /// Connect a dedicated listener and start forwarding notifications
    pub async fn start(pool: &PgPool, capacity: usize) -> Result<Self, sqlx::Error> {
        let mut listener = PgListener::connect_with(pool).await?;
        listener.listen(CHANGE_CHANNEL).await?;

        let (sender, _) = broadcast::channel(capacity.max(16));
        let tx = sender.clone();

        let task = tokio::spawn(async move {
            loop {
                match listener.try_recv().await {
                    Ok(notification) => {
                        if let Some(event) = feed_event(notification.as_ref().map(|n| n.payload())) {
                            // No receivers is not an error
                            let _ = tx.send(event);
                        }
                    }
                    Err(e) => {
                        error!(error = %e, "Change feed listener failed, retrying");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });

        info!(channel = CHANGE_CHANNEL, "Change feed listening");
        Ok(Self { sender, task })
    }
}

impl ChangeFeed for PgChangeFeed {
    fn subscribe(&self) -> broadcast::Receiver<FeedEvent> {
        self.sender.subscribe()
    }
}

impl Drop for PgChangeFeed {
    fn drop(&mut self) {
        self.task.abort();
    }
}
