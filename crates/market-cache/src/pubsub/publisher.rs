//! Redis Pub/Sub publisher.

use crate::pool::{RedisPool, RedisResult};
use crate::pubsub::PubSubChannel;
use market_core::Notification;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};

/// Envelope published on a channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PubSubEvent {
    /// Stable id; clients drop repeats
    pub event_id: String,
    /// Event type name (e.g., "offer_accepted")
    pub event_type: String,
    pub data: serde_json::Value,
}

impl PubSubEvent {
    #[must_use]
    pub fn new(event_id: impl Into<String>, event_type: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            event_id: event_id.into(),
            event_type: event_type.into(),
            data,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl From<&Notification> for PubSubEvent {
    fn from(notification: &Notification) -> Self {
        Self::new(
            notification.event_id.clone(),
            notification.event_type.clone(),
            notification.payload.clone(),
        )
    }
}

/// Redis Pub/Sub publisher
#[derive(Clone)]
pub struct Publisher {
    pool: RedisPool,
}

impl Publisher {
    #[must_use]
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }

    /// Publish an event to a channel
    pub async fn publish(&self, channel: &PubSubChannel, event: &PubSubEvent) -> RedisResult<u32> {
        let mut conn = self.pool.get().await?;
        let channel_name = channel.name();
        let payload = event.to_json()?;

        let receivers: u32 = conn.publish(&channel_name, &payload).await?;

        tracing::debug!(
            channel = %channel_name,
            event_type = %event.event_type,
            receivers = receivers,
            "Published event"
        );

        Ok(receivers)
    }

    /// Publish to multiple channels over one connection
    pub async fn publish_many(
        &self,
        channels: &[PubSubChannel],
        event: &PubSubEvent,
    ) -> RedisResult<u32> {
        let payload = event.to_json()?;
        let mut total_receivers = 0;
        let mut conn = self.pool.get().await?;

        for channel in channels {
            let receivers: u32 = conn.publish(channel.name(), &payload).await?;
            total_receivers += receivers;
        }

        tracing::debug!(
            channels = channels.len(),
            event_type = %event.event_type,
            total_receivers = total_receivers,
            "Published event to multiple channels"
        );

        Ok(total_receivers)
    }
}
