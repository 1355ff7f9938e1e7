//! Publishes each notification on the recipients' user channels

use async_trait::async_trait;
use tracing::instrument;

use market_core::{DomainError, Notification, NotificationSink};

use crate::pubsub::{PubSubChannel, PubSubEvent, Publisher};

const REVIEW_STALLED: &str = "review_stalled";

#[derive(Clone)]
pub struct RedisNotificationSink {
    publisher: Publisher,
}

impl RedisNotificationSink {
    pub fn new(publisher: Publisher) -> Self {
        Self { publisher }
    }
}

/// Channels a notification is fanned out to
pub(crate) fn channels_for(notification: &Notification) -> Vec<PubSubChannel> {
    let mut channels: Vec<_> = notification
        .recipients
        .iter()
        .copied()
        .map(PubSubChannel::User)
        .collect();
    if notification.event_type == REVIEW_STALLED {
        channels.push(PubSubChannel::Admins);
    }
    channels
}

#[async_trait]
impl NotificationSink for RedisNotificationSink {
    fn name(&self) -> &'static str {
        "redis"
    }

    #[instrument(skip(self, notification), fields(event_id = %notification.event_id))]
    async fn deliver(&self, notification: &Notification) -> Result<(), DomainError> {
        let channels = channels_for(notification);
        if channels.is_empty() {
            return Ok(());
        }
        self.publisher
            .publish_many(&channels, &PubSubEvent::from(notification))
            .await?;
        Ok(())
    }
}
