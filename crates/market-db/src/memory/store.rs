//! In-process store implementing every repository trait plus a change feed
//!
//! All state sits behind one `parking_lot::Mutex`, so each trait method is a
//! single critical section; offer acceptance in particular is atomic the same
//! way the Postgres transaction is. Row changes are broadcast after the lock
//! is released, serialized the same way the entities serialize.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::warn;

use market_core::{
    ChangeFeed, ChangeOp, Chat, ChatRepository, DomainError, FeedEvent, Message, MessageRepository, Offer,
    OfferAcceptance, OfferRepository, OfferStatus, PartRequest, Payment, PaymentRepository,
    Rating, RatingRepository, RepoResult, RequestRepository, RequestStatus, RowChange, Snowflake,
    Table,
};

const DEFAULT_FEED_CAPACITY: usize = 1024;

#[derive(Default)]
struct State {
    requests: HashMap<Snowflake, PartRequest>,
    offers: HashMap<Snowflake, Offer>,
    chats: HashMap<Snowflake, Chat>,
    messages: HashMap<Snowflake, Message>,
    ratings: Vec<Rating>,
    payments: Vec<Payment>,
}

/// Changes collected under the lock, published after it is released
#[derive(Default)]
struct Pending(Vec<RowChange>);

impl Pending {
    fn push<T: Serialize>(&mut self, table: Table, op: ChangeOp, row: &T) {
        match serde_json::to_value(row) {
            Ok(value) => self.0.push(RowChange::new(table, op, value)),
            Err(e) => warn!(error = %e, %table, "Failed to serialize row change"),
        }
    }
}

pub struct MemoryStore {
    state: Mutex<State>,
    changes: broadcast::Sender<FeedEvent>,
    offline: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_FEED_CAPACITY)
    }

    /// `capacity` bounds the change-feed backlog per receiver
    pub fn with_capacity(capacity: usize) -> Self {
        let (changes, _) = broadcast::channel(capacity.max(1));
        Self {
            state: Mutex::new(State::default()),
            changes,
            offline: AtomicBool::new(false),
        }
    }

    /// Simulate an unreachable store: every call fails with
    /// `DependencyUnavailable` until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Tell every receiver that changes may have been missed, as a
    /// reconnecting database listener does
    pub fn resync(&self) {
        let _ = self.changes.send(FeedEvent::Resync);
    }

    fn check_online(&self) -> RepoResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(DomainError::DependencyUnavailable("memory store offline".into()));
        }
        Ok(())
    }

    fn publish(&self, pending: Pending) {
        for change in pending.0 {
            // No receivers is fine
            let _ = self.changes.send(FeedEvent::Row(change));
        }
    }
}

fn newest_first<T, F>(items: &mut [T], key: F)
where
    F: Fn(&T) -> (DateTime<Utc>, Snowflake),
{
    items.sort_by(|a, b| key(b).cmp(&key(a)));
}

// ============================================================================
// Requests
// ============================================================================

#[async_trait]
impl RequestRepository for MemoryStore {
    async fn find_by_id(&self, id: Snowflake) -> RepoResult<Option<PartRequest>> {
        self.check_online()?;
        Ok(self.state.lock().requests.get(&id).cloned())
    }

    async fn create(&self, request: &PartRequest) -> RepoResult<()> {
        self.check_online()?;
        let mut pending = Pending::default();
        {
            let mut state = self.state.lock();
            if state.requests.contains_key(&request.id) {
                return Err(DomainError::DatabaseError(format!(
                    "duplicate request id {}",
                    request.id
                )));
            }
            state.requests.insert(request.id, request.clone());
            pending.push(Table::Requests, ChangeOp::Insert, request);
        }
        self.publish(pending);
        Ok(())
    }

    async fn find_by_buyer(&self, buyer_id: Snowflake) -> RepoResult<Vec<PartRequest>> {
        self.check_online()?;
        let mut found: Vec<_> = self
            .state
            .lock()
            .requests
            .values()
            .filter(|r| r.buyer_id == buyer_id)
            .cloned()
            .collect();
        newest_first(&mut found, |r| (r.created_at, r.id));
        Ok(found)
    }

    async fn find_by_status(&self, status: RequestStatus, limit: i64) -> RepoResult<Vec<PartRequest>> {
        self.check_online()?;
        let mut found: Vec<_> = self
            .state
            .lock()
            .requests
            .values()
            .filter(|r| r.status == status)
            .cloned()
            .collect();
        newest_first(&mut found, |r| (r.created_at, r.id));
        found.truncate(limit.clamp(1, 200) as usize);
        Ok(found)
    }

    async fn compare_and_set_status(
        &self,
        id: Snowflake,
        from: RequestStatus,
        to: RequestStatus,
    ) -> RepoResult<bool> {
        self.check_online()?;
        let mut pending = Pending::default();
        {
            let mut state = self.state.lock();
            let Some(request) = state.requests.get_mut(&id) else {
                return Ok(false);
            };
            if request.status != from {
                return Ok(false);
            }
            request.status = to;
            request.updated_at = Utc::now();
            pending.push(Table::Requests, ChangeOp::Update, &*request);
        }
        self.publish(pending);
        Ok(true)
    }

    async fn complete(&self, id: Snowflake, at: DateTime<Utc>) -> RepoResult<bool> {
        self.check_online()?;
        let mut pending = Pending::default();
        {
            let mut state = self.state.lock();
            let State { requests, offers, .. } = &mut *state;

            let Some(request) = requests.get_mut(&id) else {
                return Ok(false);
            };
            if request.status != RequestStatus::Matched {
                return Ok(false);
            }
            request.status = RequestStatus::Completed;
            request.updated_at = at;
            pending.push(Table::Requests, ChangeOp::Update, &*request);

            for offer in offers
                .values_mut()
                .filter(|o| o.request_id == id && o.status == OfferStatus::Accepted)
            {
                offer.completed_at = Some(at);
                pending.push(Table::Offers, ChangeOp::Update, &*offer);
            }
        }
        self.publish(pending);
        Ok(true)
    }

    async fn expire_pending(&self, cutoff: DateTime<Utc>) -> RepoResult<u64> {
        self.check_online()?;
        let mut pending = Pending::default();
        let mut expired = 0;
        {
            let mut state = self.state.lock();
            let now = Utc::now();
            for request in state
                .requests
                .values_mut()
                .filter(|r| r.status == RequestStatus::Pending && r.created_at < cutoff)
            {
                request.status = RequestStatus::Expired;
                request.updated_at = now;
                pending.push(Table::Requests, ChangeOp::Update, &*request);
                expired += 1;
            }
        }
        self.publish(pending);
        Ok(expired)
    }

    async fn count_by_status(&self, buyer_id: Snowflake) -> RepoResult<Vec<(RequestStatus, i64)>> {
        self.check_online()?;
        let state = self.state.lock();
        let mut counts: HashMap<RequestStatus, i64> = HashMap::new();
        for request in state.requests.values().filter(|r| r.buyer_id == buyer_id) {
            *counts.entry(request.status).or_default() += 1;
        }
        Ok(counts.into_iter().collect())
    }
}

// ============================================================================
// Offers
// ============================================================================

#[async_trait]
impl OfferRepository for MemoryStore {
    async fn find_by_id(&self, id: Snowflake) -> RepoResult<Option<Offer>> {
        self.check_online()?;
        Ok(self.state.lock().offers.get(&id).cloned())
    }

    async fn create(&self, offer: &Offer) -> RepoResult<()> {
        self.check_online()?;
        let mut pending = Pending::default();
        {
            let mut state = self.state.lock();
            if !state.requests.contains_key(&offer.request_id) {
                return Err(DomainError::RequestNotFound(offer.request_id));
            }
            state.offers.insert(offer.id, offer.clone());
            pending.push(Table::Offers, ChangeOp::Insert, offer);
        }
        self.publish(pending);
        Ok(())
    }

    async fn find_by_request(&self, request_id: Snowflake) -> RepoResult<Vec<Offer>> {
        self.check_online()?;
        let mut found: Vec<_> = self
            .state
            .lock()
            .offers
            .values()
            .filter(|o| o.request_id == request_id)
            .cloned()
            .collect();
        found.sort_by_key(|o| (o.created_at, o.id));
        Ok(found)
    }

    async fn find_by_supplier(&self, supplier_id: Snowflake) -> RepoResult<Vec<Offer>> {
        self.check_online()?;
        let mut found: Vec<_> = self
            .state
            .lock()
            .offers
            .values()
            .filter(|o| o.supplier_id == supplier_id)
            .cloned()
            .collect();
        newest_first(&mut found, |o| (o.created_at, o.id));
        Ok(found)
    }

    async fn accept(&self, offer_id: Snowflake, request_id: Snowflake) -> RepoResult<Option<OfferAcceptance>> {
        self.check_online()?;
        let mut pending = Pending::default();
        let acceptance = {
            let mut state = self.state.lock();
            let State { requests, offers, .. } = &mut *state;

            let request_pending = requests
                .get(&request_id)
                .is_some_and(|r| r.status == RequestStatus::Pending);
            let offer_pending = offers
                .get(&offer_id)
                .is_some_and(|o| o.request_id == request_id && o.is_pending());
            if !request_pending || !offer_pending {
                return Ok(None);
            }

            let mut accepted = None;
            let mut rejected = Vec::new();
            for offer in offers
                .values_mut()
                .filter(|o| o.request_id == request_id && o.is_pending())
            {
                if offer.id == offer_id {
                    offer.status = OfferStatus::Accepted;
                    accepted = Some(offer.clone());
                } else {
                    offer.status = OfferStatus::Rejected;
                    rejected.push(offer.clone());
                }
                pending.push(Table::Offers, ChangeOp::Update, &*offer);
            }

            if let Some(request) = requests.get_mut(&request_id) {
                request.status = RequestStatus::Matched;
                request.updated_at = Utc::now();
                pending.push(Table::Requests, ChangeOp::Update, &*request);
            }

            rejected.sort_by_key(|o| (o.created_at, o.id));
            accepted.map(|offer| OfferAcceptance { offer, rejected })
        };
        self.publish(pending);
        Ok(acceptance)
    }

    async fn expire_pending(&self, cutoff: DateTime<Utc>) -> RepoResult<u64> {
        self.check_online()?;
        let mut pending = Pending::default();
        let mut expired = 0;
        {
            let mut state = self.state.lock();
            for offer in state
                .offers
                .values_mut()
                .filter(|o| o.is_pending() && o.created_at < cutoff)
            {
                offer.status = OfferStatus::Expired;
                pending.push(Table::Offers, ChangeOp::Update, &*offer);
                expired += 1;
            }
        }
        self.publish(pending);
        Ok(expired)
    }

    async fn count_by_status(&self, supplier_id: Snowflake) -> RepoResult<Vec<(OfferStatus, i64)>> {
        self.check_online()?;
        let state = self.state.lock();
        let mut counts: HashMap<OfferStatus, i64> = HashMap::new();
        for offer in state.offers.values().filter(|o| o.supplier_id == supplier_id) {
            *counts.entry(offer.status).or_default() += 1;
        }
        Ok(counts.into_iter().collect())
    }
}

// ============================================================================
// Chats
// ============================================================================

fn same_pair(chat: &Chat, buyer_id: Snowflake, seller_id: Snowflake, part_id: Option<Snowflake>) -> bool {
    chat.buyer_id == buyer_id && chat.seller_id == seller_id && chat.part_id == part_id
}

#[async_trait]
impl ChatRepository for MemoryStore {
    async fn find_by_id(&self, id: Snowflake) -> RepoResult<Option<Chat>> {
        self.check_online()?;
        Ok(self.state.lock().chats.get(&id).cloned())
    }

    async fn find_between(
        &self,
        buyer_id: Snowflake,
        seller_id: Snowflake,
        part_id: Option<Snowflake>,
    ) -> RepoResult<Option<Chat>> {
        self.check_online()?;
        Ok(self
            .state
            .lock()
            .chats
            .values()
            .find(|c| same_pair(c, buyer_id, seller_id, part_id))
            .cloned())
    }

    async fn find_or_create(&self, chat: &Chat) -> RepoResult<Chat> {
        self.check_online()?;
        let mut pending = Pending::default();
        let stored = {
            let mut state = self.state.lock();
            if let Some(existing) = state
                .chats
                .values()
                .find(|c| same_pair(c, chat.buyer_id, chat.seller_id, chat.part_id))
            {
                existing.clone()
            } else {
                state.chats.insert(chat.id, chat.clone());
                pending.push(Table::Chats, ChangeOp::Insert, chat);
                chat.clone()
            }
        };
        self.publish(pending);
        Ok(stored)
    }

    async fn find_by_user(&self, user_id: Snowflake) -> RepoResult<Vec<Chat>> {
        self.check_online()?;
        let mut found: Vec<_> = self
            .state
            .lock()
            .chats
            .values()
            .filter(|c| c.is_participant(user_id))
            .cloned()
            .collect();
        newest_first(&mut found, |c| (c.last_message_at.unwrap_or(c.created_at), c.id));
        Ok(found)
    }

    async fn append_message(&self, message: &Message, preview: &str) -> RepoResult<Option<Chat>> {
        self.check_online()?;
        let mut pending = Pending::default();
        let chat = {
            let mut state = self.state.lock();
            if state.messages.contains_key(&message.id) {
                return Ok(None);
            }
            let State { chats, messages, .. } = &mut *state;
            let chat = chats
                .get_mut(&message.chat_id)
                .ok_or(DomainError::ChatNotFound(message.chat_id))?;

            let mut stored = message.clone();
            stored.is_read = false;
            pending.push(Table::Messages, ChangeOp::Insert, &stored);
            messages.insert(stored.id, stored);

            chat.record_message(message.sender_id, preview, message.created_at);
            pending.push(Table::Chats, ChangeOp::Update, &*chat);
            chat.clone()
        };
        self.publish(pending);
        Ok(Some(chat))
    }

    async fn mark_read(&self, chat_id: Snowflake, reader_id: Snowflake) -> RepoResult<u64> {
        self.check_online()?;
        let mut pending = Pending::default();
        let mut flipped = 0;
        {
            let mut state = self.state.lock();
            let State { chats, messages, .. } = &mut *state;
            let chat = chats.get_mut(&chat_id).ok_or(DomainError::ChatNotFound(chat_id))?;

            for message in messages
                .values_mut()
                .filter(|m| m.chat_id == chat_id && m.sender_id != reader_id && !m.is_read)
            {
                message.is_read = true;
                pending.push(Table::Messages, ChangeOp::Update, &*message);
                flipped += 1;
            }

            chat.reset_unread(reader_id);
            pending.push(Table::Chats, ChangeOp::Update, &*chat);
        }
        self.publish(pending);
        Ok(flipped)
    }

    async fn total_unread(&self, user_id: Snowflake) -> RepoResult<i64> {
        self.check_online()?;
        Ok(self
            .state
            .lock()
            .chats
            .values()
            .map(|c| i64::from(c.unread_for(user_id)))
            .sum())
    }
}

// ============================================================================
// Messages
// ============================================================================

#[async_trait]
impl MessageRepository for MemoryStore {
    async fn find_by_id(&self, id: Snowflake) -> RepoResult<Option<Message>> {
        self.check_online()?;
        Ok(self.state.lock().messages.get(&id).cloned())
    }

    async fn find_by_chat(&self, chat_id: Snowflake) -> RepoResult<Vec<Message>> {
        self.check_online()?;
        let mut found: Vec<_> = self
            .state
            .lock()
            .messages
            .values()
            .filter(|m| m.chat_id == chat_id)
            .cloned()
            .collect();
        found.sort_by_key(Message::sort_key);
        Ok(found)
    }

    async fn count_unread(&self, chat_id: Snowflake, reader_id: Snowflake) -> RepoResult<i64> {
        self.check_online()?;
        Ok(self
            .state
            .lock()
            .messages
            .values()
            .filter(|m| m.chat_id == chat_id && m.sender_id != reader_id && !m.is_read)
            .count() as i64)
    }
}

// ============================================================================
// Ratings and payments
// ============================================================================

#[async_trait]
impl RatingRepository for MemoryStore {
    async fn create(&self, rating: &Rating) -> RepoResult<()> {
        self.check_online()?;
        let mut pending = Pending::default();
        {
            let mut state = self.state.lock();
            if state
                .ratings
                .iter()
                .any(|r| r.offer_id == rating.offer_id && r.reviewer_id == rating.reviewer_id)
            {
                return Err(DomainError::RatingAlreadyExists {
                    offer_id: rating.offer_id,
                });
            }
            state.ratings.push(rating.clone());
            pending.push(Table::Reviews, ChangeOp::Insert, rating);
        }
        self.publish(pending);
        Ok(())
    }

    async fn find_by_offer(&self, offer_id: Snowflake) -> RepoResult<Vec<Rating>> {
        self.check_online()?;
        Ok(self
            .state
            .lock()
            .ratings
            .iter()
            .filter(|r| r.offer_id == offer_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PaymentRepository for MemoryStore {
    async fn create(&self, payment: &Payment) -> RepoResult<()> {
        self.check_online()?;
        let mut pending = Pending::default();
        {
            let mut state = self.state.lock();
            if state
                .payments
                .iter()
                .any(|p| p.offer_id == payment.offer_id && p.reference == payment.reference)
            {
                return Err(DomainError::PaymentAlreadyRecorded(payment.reference.clone()));
            }
            state.payments.push(payment.clone());
            pending.push(Table::Payments, ChangeOp::Insert, payment);
        }
        self.publish(pending);
        Ok(())
    }

    async fn find_by_offer(&self, offer_id: Snowflake) -> RepoResult<Vec<Payment>> {
        self.check_online()?;
        Ok(self
            .state
            .lock()
            .payments
            .iter()
            .filter(|p| p.offer_id == offer_id)
            .cloned()
            .collect())
    }
}

impl ChangeFeed for MemoryStore {
    fn subscribe(&self) -> broadcast::Receiver<FeedEvent> {
        self.changes.subscribe()
    }
}
