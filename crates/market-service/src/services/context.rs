//! Service context - dependency container for services
//!
//! Holds the repositories, external collaborators, moderation policy and
//! settings every service needs. Cloning is cheap; background tasks (AI
//! review, change-feed refreshes) carry their own clone.

use std::sync::Arc;

use market_common::{
    AppConfig, MatchingConfig, ModerationConfig, ModerationPolicy, NotificationConfig, ReviewConfig,
};
use market_core::{
    AiReviewer, ChangeFeed, ChatRepository, DomainEvent, MessageRepository, NotificationSink,
    OfferRepository, PaymentRepository, PaymentVerifier, RatingRepository, RequestRepository,
    Snowflake, SnowflakeGenerator, SpamRulesEvaluator,
};

use super::error::{ServiceError, ServiceResult};
use super::feed::ChangeFeedSubscriber;
use super::notification::{LoggingSink, NotificationDispatcher};
use super::stats::StatsCache;

/// Tunables the services read at call time
#[derive(Debug, Clone, Default)]
pub struct ServiceSettings {
    pub moderation: ModerationConfig,
    pub review: ReviewConfig,
    pub matching: MatchingConfig,
    pub notifications: NotificationConfig,
}

impl ServiceSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            moderation: config.moderation.clone(),
            review: config.review.clone(),
            matching: config.matching.clone(),
            notifications: config.notifications.clone(),
        }
    }
}

/// Service context containing all dependencies
#[derive(Clone)]
pub struct ServiceContext {
    // Repositories
    request_repo: Arc<dyn RequestRepository>,
    offer_repo: Arc<dyn OfferRepository>,
    chat_repo: Arc<dyn ChatRepository>,
    message_repo: Arc<dyn MessageRepository>,
    rating_repo: Arc<dyn RatingRepository>,
    payment_repo: Arc<dyn PaymentRepository>,

    // Collaborators
    spam_rules: Arc<dyn SpamRulesEvaluator>,
    ai_reviewer: Arc<dyn AiReviewer>,
    payment_verifier: Arc<dyn PaymentVerifier>,

    // Fan-out
    notifier: Arc<NotificationDispatcher>,
    subscriber: Arc<ChangeFeedSubscriber>,
    stats_cache: Arc<StatsCache>,

    policy: Arc<ModerationPolicy>,
    settings: Arc<ServiceSettings>,
    snowflake_generator: Arc<SnowflakeGenerator>,
}

impl ServiceContext {
    pub fn builder() -> ServiceContextBuilder {
        ServiceContextBuilder::new()
    }

    // === Repositories ===

    pub fn request_repo(&self) -> &dyn RequestRepository {
        self.request_repo.as_ref()
    }

    pub fn offer_repo(&self) -> &dyn OfferRepository {
        self.offer_repo.as_ref()
    }

    pub fn chat_repo(&self) -> &dyn ChatRepository {
        self.chat_repo.as_ref()
    }

    pub fn message_repo(&self) -> &dyn MessageRepository {
        self.message_repo.as_ref()
    }

    pub fn rating_repo(&self) -> &dyn RatingRepository {
        self.rating_repo.as_ref()
    }

    pub fn payment_repo(&self) -> &dyn PaymentRepository {
        self.payment_repo.as_ref()
    }

    // === Collaborators ===

    pub fn spam_rules(&self) -> &dyn SpamRulesEvaluator {
        self.spam_rules.as_ref()
    }

    pub fn ai_reviewer(&self) -> &dyn AiReviewer {
        self.ai_reviewer.as_ref()
    }

    pub fn payment_verifier(&self) -> &dyn PaymentVerifier {
        self.payment_verifier.as_ref()
    }

    // === Fan-out ===

    pub fn notifier(&self) -> &NotificationDispatcher {
        self.notifier.as_ref()
    }

    /// Hand the event to a background dispatch; delivery failures are only logged
    pub fn notify(&self, event: DomainEvent) {
        drop(self.notifier.spawn(event));
    }

    /// Wait for every notification handed off so far to be delivered or dropped
    pub async fn notifications_settled(&self) {
        self.notifier.settled().await;
    }

    pub fn subscriber(&self) -> &ChangeFeedSubscriber {
        self.subscriber.as_ref()
    }

    pub fn stats_cache(&self) -> &StatsCache {
        self.stats_cache.as_ref()
    }

    // === Policy and settings ===

    pub fn policy(&self) -> &ModerationPolicy {
        self.policy.as_ref()
    }

    pub fn settings(&self) -> &ServiceSettings {
        self.settings.as_ref()
    }

    /// Generate a new Snowflake ID
    pub fn generate_id(&self) -> Snowflake {
        self.snowflake_generator.generate()
    }
}

impl std::fmt::Debug for ServiceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceContext")
            .field("repositories", &"...")
            .field("sinks", &self.notifier.sink_names())
            .field("subscriptions", &self.subscriber.active())
            .field("settings", &self.settings)
            .finish()
    }
}

/// Builder for creating ServiceContext
#[derive(Default)]
pub struct ServiceContextBuilder {
    request_repo: Option<Arc<dyn RequestRepository>>,
    offer_repo: Option<Arc<dyn OfferRepository>>,
    chat_repo: Option<Arc<dyn ChatRepository>>,
    message_repo: Option<Arc<dyn MessageRepository>>,
    rating_repo: Option<Arc<dyn RatingRepository>>,
    payment_repo: Option<Arc<dyn PaymentRepository>>,
    change_feed: Option<Arc<dyn ChangeFeed>>,
    spam_rules: Option<Arc<dyn SpamRulesEvaluator>>,
    ai_reviewer: Option<Arc<dyn AiReviewer>>,
    payment_verifier: Option<Arc<dyn PaymentVerifier>>,
    sinks: Vec<Arc<dyn NotificationSink>>,
    policy: Option<ModerationPolicy>,
    settings: Option<ServiceSettings>,
    snowflake_generator: Option<Arc<SnowflakeGenerator>>,
}

impl ServiceContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use one backend for every repository and the change feed
    pub fn store<S>(mut self, store: Arc<S>) -> Self
    where
        S: RequestRepository
            + OfferRepository
            + ChatRepository
            + MessageRepository
            + RatingRepository
            + PaymentRepository
            + ChangeFeed
            + 'static,
    {
        self.request_repo = Some(store.clone());
        self.offer_repo = Some(store.clone());
        self.chat_repo = Some(store.clone());
        self.message_repo = Some(store.clone());
        self.rating_repo = Some(store.clone());
        self.payment_repo = Some(store.clone());
        self.change_feed = Some(store);
        self
    }

    pub fn request_repo(mut self, repo: Arc<dyn RequestRepository>) -> Self {
        self.request_repo = Some(repo);
        self
    }

    pub fn offer_repo(mut self, repo: Arc<dyn OfferRepository>) -> Self {
        self.offer_repo = Some(repo);
        self
    }

    pub fn chat_repo(mut self, repo: Arc<dyn ChatRepository>) -> Self {
        self.chat_repo = Some(repo);
        self
    }

    pub fn message_repo(mut self, repo: Arc<dyn MessageRepository>) -> Self {
        self.message_repo = Some(repo);
        self
    }

    pub fn rating_repo(mut self, repo: Arc<dyn RatingRepository>) -> Self {
        self.rating_repo = Some(repo);
        self
    }

    pub fn payment_repo(mut self, repo: Arc<dyn PaymentRepository>) -> Self {
        self.payment_repo = Some(repo);
        self
    }

    pub fn change_feed(mut self, feed: Arc<dyn ChangeFeed>) -> Self {
        self.change_feed = Some(feed);
        self
    }

    pub fn spam_rules(mut self, rules: Arc<dyn SpamRulesEvaluator>) -> Self {
        self.spam_rules = Some(rules);
        self
    }

    pub fn ai_reviewer(mut self, reviewer: Arc<dyn AiReviewer>) -> Self {
        self.ai_reviewer = Some(reviewer);
        self
    }

    pub fn payment_verifier(mut self, verifier: Arc<dyn PaymentVerifier>) -> Self {
        self.payment_verifier = Some(verifier);
        self
    }

    /// Add a notification sink; with none, notifications are only logged
    pub fn sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn policy(mut self, policy: ModerationPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn settings(mut self, settings: ServiceSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn snowflake_generator(mut self, generator: Arc<SnowflakeGenerator>) -> Self {
        self.snowflake_generator = Some(generator);
        self
    }

    /// Build the ServiceContext
    ///
    /// # Errors
    /// Returns `ServiceError::Validation` if any required dependency is missing
    pub fn build(self) -> ServiceResult<ServiceContext> {
        fn required<T>(value: Option<T>, name: &str) -> ServiceResult<T> {
            value.ok_or_else(|| ServiceError::validation(format!("{name} is required")))
        }

        let settings = self.settings.unwrap_or_default();
        let sinks = if self.sinks.is_empty() {
            vec![Arc::new(LoggingSink) as Arc<dyn NotificationSink>]
        } else {
            self.sinks
        };
        let notifier = NotificationDispatcher::new(sinks, &settings.notifications);
        let policy = self
            .policy
            .unwrap_or_else(|| ModerationPolicy::from_config(&settings.moderation));

        Ok(ServiceContext {
            request_repo: required(self.request_repo, "request_repo")?,
            offer_repo: required(self.offer_repo, "offer_repo")?,
            chat_repo: required(self.chat_repo, "chat_repo")?,
            message_repo: required(self.message_repo, "message_repo")?,
            rating_repo: required(self.rating_repo, "rating_repo")?,
            payment_repo: required(self.payment_repo, "payment_repo")?,
            subscriber: Arc::new(ChangeFeedSubscriber::new(required(
                self.change_feed,
                "change_feed",
            )?)),
            spam_rules: required(self.spam_rules, "spam_rules")?,
            ai_reviewer: required(self.ai_reviewer, "ai_reviewer")?,
            payment_verifier: required(self.payment_verifier, "payment_verifier")?,
            notifier: Arc::new(notifier),
            stats_cache: Arc::new(StatsCache::default()),
            policy: Arc::new(policy),
            settings: Arc::new(settings),
            snowflake_generator: self
                .snowflake_generator
                .unwrap_or_else(|| Arc::new(SnowflakeGenerator::default())),
        })
    }
}
