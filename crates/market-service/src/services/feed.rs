//! Change-feed subscriber
//!
//! Turns row-level changes into "re-run your query" callbacks. A
//! [`Subscription`] owns its forwarding task: dropping it or calling
//! [`Subscription::unsubscribe`] stops delivery immediately. Subscriptions
//! never expire on their own.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use market_core::{ChangeFeed, ChangeFilter, FeedEvent, RowChange, Table};

/// Why a refresh callback is running
#[derive(Debug, Clone, PartialEq)]
pub enum FeedTrigger {
    /// A matching row changed
    Change(RowChange),
    /// The receiver fell behind and `skipped` changes were lost; the
    /// callback must assume anything could have changed.
    Lagged { skipped: u64 },
    /// The feed reconnected to its source; same contract as `Lagged`
    Resync,
}

impl FeedTrigger {
    pub fn change(&self) -> Option<&RowChange> {
        match self {
            Self::Change(change) => Some(change),
            Self::Lagged { .. } | Self::Resync => None,
        }
    }
}

/// Registry entry for a live subscription
#[derive(Debug, Clone)]
pub struct SubscriptionInfo {
    pub table: Table,
    pub filter: ChangeFilter,
    pub created_at: DateTime<Utc>,
}

pub struct ChangeFeedSubscriber {
    feed: Arc<dyn ChangeFeed>,
    registry: Arc<DashMap<u64, SubscriptionInfo>>,
    next_id: AtomicU64,
}

impl ChangeFeedSubscriber {
    pub fn new(feed: Arc<dyn ChangeFeed>) -> Self {
        Self {
            feed,
            registry: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Run `refresh` on every change matching `filter`, on lag and on resync.
    ///
    /// The underlying receiver is attached before this returns, so no
    /// change committed afterwards can be missed.
    pub fn subscribe<F, Fut>(&self, filter: ChangeFilter, refresh: F) -> Subscription
    where
        F: Fn(FeedTrigger) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut receiver = self.feed.subscribe();

        self.registry.insert(
            id,
            SubscriptionInfo {
                table: filter.table,
                filter: filter.clone(),
                created_at: Utc::now(),
            },
        );

        let task_filter = filter.clone();
        let task = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(FeedEvent::Row(change)) if task_filter.matches(&change) => {
                        refresh(FeedTrigger::Change(change)).await;
                    }
                    Ok(FeedEvent::Row(_)) => {}
                    Ok(FeedEvent::Resync) => {
                        debug!(subscription = id, "Change feed resynced, forcing refresh");
                        refresh(FeedTrigger::Resync).await;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(subscription = id, skipped, "Change feed lagged, forcing refresh");
                        refresh(FeedTrigger::Lagged { skipped }).await;
                    }
                    Err(RecvError::Closed) => {
                        debug!(subscription = id, "Change feed closed");
                        break;
                    }
                }
            }
        });

        debug!(subscription = id, table = %filter.table, "Subscribed to change feed");

        Subscription {
            id,
            filter,
            task,
            registry: Arc::clone(&self.registry),
        }
    }

    /// Number of live subscriptions
    pub fn active(&self) -> usize {
        self.registry.len()
    }
}

/// Scoped handle for one subscription
pub struct Subscription {
    id: u64,
    filter: ChangeFilter,
    task: JoinHandle<()>,
    registry: Arc<DashMap<u64, SubscriptionInfo>>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn filter(&self) -> &ChangeFilter {
        &self.filter
    }

    /// Stop delivery now
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
        self.registry.remove(&self.id);
        debug!(subscription = self.id, "Unsubscribed from change feed");
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("filter", &self.filter)
            .finish()
    }
}
