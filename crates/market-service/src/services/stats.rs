//! Dashboard statistics
//!
//! Per-user counters recomputed from the store. The last good snapshot is
//! cached so a failing refresh still answers, flagged as stale.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, instrument, warn};

use market_core::{ChangeFilter, OfferStatus, RequestStatus, Snowflake, Table};

use super::context::ServiceContext;
use super::error::ServiceResult;
use super::feed::Subscription;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub user_id: Snowflake,
    /// Requests the user filed, keyed by status
    pub requests_by_status: BTreeMap<String, i64>,
    /// Offers the user submitted, keyed by status
    pub offers_by_status: BTreeMap<String, i64>,
    pub unread_messages: i64,
    pub refreshed_at: DateTime<Utc>,
    pub stale: bool,
}

impl DashboardStats {
    pub fn requests_in(&self, status: RequestStatus) -> i64 {
        self.requests_by_status.get(status.as_str()).copied().unwrap_or(0)
    }

    pub fn offers_in(&self, status: OfferStatus) -> i64 {
        self.offers_by_status.get(status.as_str()).copied().unwrap_or(0)
    }

    /// Placeholder held by a live dashboard until its first computation
    fn unseeded(user_id: Snowflake) -> Self {
        Self {
            user_id,
            requests_by_status: BTreeMap::new(),
            offers_by_status: BTreeMap::new(),
            unread_messages: 0,
            refreshed_at: DateTime::<Utc>::MIN_UTC,
            stale: true,
        }
    }

    fn is_seeded(&self) -> bool {
        self.refreshed_at != DateTime::<Utc>::MIN_UTC
    }
}

/// Snapshots kept before the oldest is evicted
pub const DEFAULT_STATS_CACHE_CAPACITY: usize = 10_000;

/// Last good snapshot per user, bounded by evicting the least recently refreshed
#[derive(Debug)]
pub struct StatsCache {
    snapshots: DashMap<Snowflake, DashboardStats>,
    capacity: usize,
}

impl Default for StatsCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_STATS_CACHE_CAPACITY)
    }
}

impl StatsCache {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            snapshots: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn get(&self, user_id: Snowflake) -> Option<DashboardStats> {
        self.snapshots.get(&user_id).map(|entry| entry.value().clone())
    }

    pub fn put(&self, stats: DashboardStats) {
        let user_id = stats.user_id;
        self.snapshots.insert(user_id, stats);

        while self.snapshots.len() > self.capacity {
            let oldest = self
                .snapshots
                .iter()
                .filter(|entry| *entry.key() != user_id)
                .min_by_key(|entry| entry.value().refreshed_at)
                .map(|entry| *entry.key());
            match oldest {
                Some(evicted) => {
                    self.snapshots.remove(&evicted);
                    debug!(user_id = %evicted, "Evicted cached dashboard");
                }
                None => break,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

/// Stats service
pub struct StatsService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> StatsService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Recompute from the store, bypassing the cache
    #[instrument(skip(self))]
    pub async fn compute(&self, user_id: Snowflake) -> ServiceResult<DashboardStats> {
        let mut requests_by_status: BTreeMap<String, i64> = RequestStatus::ALL
            .iter()
            .map(|s| (s.as_str().to_string(), 0))
            .collect();
        for (status, count) in self.ctx.request_repo().count_by_status(user_id).await? {
            requests_by_status.insert(status.as_str().to_string(), count);
        }

        let mut offers_by_status: BTreeMap<String, i64> = OfferStatus::ALL
            .iter()
            .map(|s| (s.as_str().to_string(), 0))
            .collect();
        for (status, count) in self.ctx.offer_repo().count_by_status(user_id).await? {
            offers_by_status.insert(status.as_str().to_string(), count);
        }

        let unread_messages = self.ctx.chat_repo().total_unread(user_id).await?;

        Ok(DashboardStats {
            user_id,
            requests_by_status,
            offers_by_status,
            unread_messages,
            refreshed_at: Utc::now(),
            stale: false,
        })
    }

    /// Fresh stats when the store answers, otherwise the cached snapshot
    #[instrument(skip(self))]
    pub async fn dashboard(&self, user_id: Snowflake) -> ServiceResult<DashboardStats> {
        match self.compute(user_id).await {
            Ok(stats) => {
                self.ctx.stats_cache().put(stats.clone());
                Ok(stats)
            }
            Err(e) => match self.ctx.stats_cache().get(user_id) {
                Some(mut cached) => {
                    warn!(error = %e, "Stats refresh failed, serving cached snapshot");
                    cached.stale = true;
                    Ok(cached)
                }
                None => Err(e),
            },
        }
    }
}

/// Dashboard kept current by change-feed subscriptions
pub struct LiveDashboard {
    user_id: Snowflake,
    snapshot: watch::Receiver<DashboardStats>,
    _subscriptions: Vec<Subscription>,
}

impl LiveDashboard {
    /// Subscribe to every table that feeds the dashboard, then compute the
    /// first snapshot.
    ///
    /// A refresh that lands while the first snapshot is still computing wins
    /// over it, so a change committed in between is never lost.
    #[instrument(skip(ctx))]
    pub async fn open(ctx: &ServiceContext, user_id: Snowflake) -> ServiceResult<Self> {
        let (sender, mut snapshot) = watch::channel(DashboardStats::unseeded(user_id));
        let sender = Arc::new(sender);

        let filters = [
            ChangeFilter::eq(Table::Requests, "buyer_id", user_id),
            ChangeFilter::eq(Table::Offers, "supplier_id", user_id),
            ChangeFilter::eq(Table::Chats, "buyer_id", user_id),
            ChangeFilter::eq(Table::Chats, "seller_id", user_id),
        ];

        let subscriptions: Vec<Subscription> = filters
            .into_iter()
            .map(|filter| {
                let task_ctx = ctx.clone();
                let sender = Arc::clone(&sender);
                ctx.subscriber().subscribe(filter, move |_trigger| {
                    let ctx = task_ctx.clone();
                    let sender = Arc::clone(&sender);
                    async move {
                        match StatsService::new(&ctx).dashboard(user_id).await {
                            Ok(stats) => {
                                sender.send_replace(stats);
                            }
                            Err(e) => {
                                warn!(user_id = %user_id, error = %e, "Dashboard refresh failed");
                                sender.send_modify(|stats| stats.stale = true);
                            }
                        }
                    }
                })
            })
            .collect();

        let initial = StatsService::new(ctx).dashboard(user_id).await?;
        sender.send_if_modified(|current| {
            if current.is_seeded() {
                return false;
            }
            *current = initial;
            true
        });
        drop(snapshot.borrow_and_update());

        debug!(user_id = %user_id, "Live dashboard opened");

        Ok(Self {
            user_id,
            snapshot,
            _subscriptions: subscriptions,
        })
    }

    pub fn user_id(&self) -> Snowflake {
        self.user_id
    }

    pub fn snapshot(&self) -> DashboardStats {
        self.snapshot.borrow().clone()
    }

    /// Wait for the next refresh. Returns false once the feed is gone.
    pub async fn changed(&mut self) -> bool {
        self.snapshot.changed().await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{draft, fast_settings, harness, Fakes};
    use async_trait::async_trait;
    use market_core::{Offer, OfferAcceptance, OfferRepository, PartRequest, RepoResult, RequestRepository};
    use market_db::MemoryStore;
    use parking_lot::Mutex;
    use std::time::Duration;

    /// Commits a held offer right after the first supplier count is read
    struct OfferLandsMidCount {
        store: Arc<MemoryStore>,
        held: Mutex<Option<Offer>>,
    }

    #[async_trait]
    impl OfferRepository for OfferLandsMidCount {
        async fn find_by_id(&self, id: Snowflake) -> RepoResult<Option<Offer>> {
            OfferRepository::find_by_id(self.store.as_ref(), id).await
        }

        async fn create(&self, offer: &Offer) -> RepoResult<()> {
            OfferRepository::create(self.store.as_ref(), offer).await
        }

        async fn find_by_request(&self, request_id: Snowflake) -> RepoResult<Vec<Offer>> {
            self.store.find_by_request(request_id).await
        }

        async fn find_by_supplier(&self, supplier_id: Snowflake) -> RepoResult<Vec<Offer>> {
            self.store.find_by_supplier(supplier_id).await
        }

        async fn accept(&self, offer_id: Snowflake, request_id: Snowflake) -> RepoResult<Option<OfferAcceptance>> {
            self.store.accept(offer_id, request_id).await
        }

        async fn expire_pending(&self, cutoff: DateTime<Utc>) -> RepoResult<u64> {
            OfferRepository::expire_pending(self.store.as_ref(), cutoff).await
        }

        async fn count_by_status(&self, supplier_id: Snowflake) -> RepoResult<Vec<(OfferStatus, i64)>> {
            let counts = OfferRepository::count_by_status(self.store.as_ref(), supplier_id).await?;
            let held = self.held.lock().take();
            if let Some(offer) = held {
                OfferRepository::create(self.store.as_ref(), &offer).await?;
            }
            Ok(counts)
        }
    }

    fn snapshot_at(user: i64, minute: i64) -> DashboardStats {
        DashboardStats {
            user_id: Snowflake::new(user),
            requests_by_status: BTreeMap::new(),
            offers_by_status: BTreeMap::new(),
            unread_messages: 0,
            refreshed_at: DateTime::<Utc>::UNIX_EPOCH + chrono::Duration::minutes(minute),
            stale: false,
        }
    }

    #[tokio::test]
    async fn test_counts_every_status() {
        let h = harness();
        let buyer = Snowflake::new(10);
        for status in [RequestStatus::Pending, RequestStatus::Pending, RequestStatus::PendingReview] {
            let request = PartRequest::new(h.ctx.generate_id(), buyer, draft(), status);
            h.ctx.request_repo().create(&request).await.unwrap();
        }

        let stats = StatsService::new(&h.ctx).compute(buyer).await.unwrap();
        assert_eq!(stats.requests_in(RequestStatus::Pending), 2);
        assert_eq!(stats.requests_in(RequestStatus::PendingReview), 1);
        assert_eq!(stats.requests_in(RequestStatus::Matched), 0);
        assert_eq!(stats.requests_by_status.len(), RequestStatus::ALL.len());
        assert_eq!(stats.offers_in(OfferStatus::Pending), 0);
        assert!(!stats.stale);
    }

    #[tokio::test]
    async fn test_failed_refresh_serves_stale_snapshot() {
        let h = harness();
        let user = Snowflake::new(10);
        let service = StatsService::new(&h.ctx);

        let fresh = service.dashboard(user).await.unwrap();
        assert!(!fresh.stale);

        h.store.set_offline(true);
        let stale = service.dashboard(user).await.unwrap();
        assert!(stale.stale);
        assert_eq!(stale.refreshed_at, fresh.refreshed_at);

        // No snapshot to fall back to
        assert!(service.dashboard(Snowflake::new(11)).await.is_err());
    }

    #[tokio::test]
    async fn test_live_dashboard_follows_changes() {
        let h = harness();
        let buyer = Snowflake::new(10);
        let supplier = Snowflake::new(20);
        let mut live = LiveDashboard::open(&h.ctx, supplier).await.unwrap();
        assert_eq!(live.snapshot().offers_in(OfferStatus::Pending), 0);

        let request = PartRequest::new(h.ctx.generate_id(), buyer, draft(), RequestStatus::Pending);
        h.ctx.request_repo().create(&request).await.unwrap();
        let offer = Offer::new(h.ctx.generate_id(), request.id, supplier, 100, "in stock".into(), 5);
        h.ctx.offer_repo().create(&offer).await.unwrap();

        let refreshed = tokio::time::timeout(Duration::from_secs(1), async {
            while live.changed().await {
                if live.snapshot().offers_in(OfferStatus::Pending) == 1 {
                    return true;
                }
            }
            false
        })
        .await
        .unwrap_or(false);
        assert!(refreshed);
        assert_eq!(h.ctx.subscriber().active(), 4);

        drop(live);
        assert_eq!(h.ctx.subscriber().active(), 0);
    }

    #[tokio::test]
    async fn test_change_during_first_compute_reaches_dashboard() {
        let fakes = Fakes::default();
        let store = Arc::new(MemoryStore::new());
        let buyer = Snowflake::new(10);
        let supplier = Snowflake::new(20);

        let request = PartRequest::new(Snowflake::new(1), buyer, draft(), RequestStatus::Pending);
        RequestRepository::create(store.as_ref(), &request).await.unwrap();
        let offers = Arc::new(OfferLandsMidCount {
            store: store.clone(),
            held: Mutex::new(Some(Offer::new(Snowflake::new(2), request.id, supplier, 100, "in stock".into(), 5))),
        });

        let ctx = ServiceContext::builder()
            .store(store.clone())
            .offer_repo(offers)
            .spam_rules(fakes.spam.clone())
            .ai_reviewer(fakes.reviewer.clone())
            .payment_verifier(fakes.verifier.clone())
            .settings(fast_settings())
            .build()
            .unwrap();

        let live = LiveDashboard::open(&ctx, supplier).await.unwrap();
        let caught_up = tokio::time::timeout(Duration::from_secs(1), async {
            let mut live = live;
            loop {
                if live.snapshot().offers_in(OfferStatus::Pending) == 1 {
                    return true;
                }
                if !live.changed().await {
                    return false;
                }
            }
        })
        .await
        .unwrap_or(false);
        assert!(caught_up);
    }

    #[test]
    fn test_cache_evicts_least_recently_refreshed() {
        let cache = StatsCache::with_capacity(2);
        cache.put(snapshot_at(1, 10));
        cache.put(snapshot_at(2, 5));
        cache.put(snapshot_at(3, 20));

        assert_eq!(cache.len(), 2);
        assert!(cache.get(Snowflake::new(2)).is_none());
        assert!(cache.get(Snowflake::new(1)).is_some());

        // Refreshing a cached user does not evict anyone
        cache.put(snapshot_at(1, 30));
        assert_eq!(cache.len(), 2);
        assert!(cache.get(Snowflake::new(3)).is_some());

        // The newest entry survives even when it is the oldest refresh
        cache.put(snapshot_at(4, 0));
        assert_eq!(cache.len(), 2);
        assert!(cache.get(Snowflake::new(4)).is_some());
        assert!(cache.get(Snowflake::new(3)).is_none());
    }

    #[tokio::test]
    async fn test_resync_refreshes_live_dashboard() {
        let h = harness();
        let mut live = LiveDashboard::open(&h.ctx, Snowflake::new(20)).await.unwrap();
        let opened_at = live.snapshot().refreshed_at;

        h.store.resync();

        let refreshed = tokio::time::timeout(Duration::from_secs(1), live.changed()).await;
        assert!(matches!(refreshed, Ok(true)));
        assert!(live.snapshot().refreshed_at >= opened_at);
        assert!(!live.snapshot().stale);
    }
}
