//! # market-cache
//!
//! Redis layer for the parts marketplace.
//!
//! ## Features
//!
//! - **Connection Pool**: Managed Redis connection pool with deadpool
//! - **Pub/Sub**: Per-user notification channels shared across server instances
//! - **Anti-spam**: Velocity windows and duplicate-content fingerprints
//!
//! ## Example
//!
//! ```ignore
//! use market_cache::{Publisher, RedisNotificationSink, RedisPool, RedisPoolConfig, RedisSpamRules, SpamLimits};
//!
//! let pool = RedisPool::new(RedisPoolConfig::default())?;
//! let rules = RedisSpamRules::new(pool.clone(), SpamLimits::from(&config.moderation));
//! let sink = RedisNotificationSink::new(Publisher::new(pool));
//! ```

pub mod notify;
pub mod pool;
pub mod pubsub;
pub mod spam;

pub use notify::RedisNotificationSink;
pub use pool::{
    create_shared_pool, RedisPool, RedisPoolConfig, RedisPoolError, RedisResult, SharedRedisPool,
};
pub use pubsub::{PubSubChannel, PubSubEvent, Publisher, ADMIN_CHANNEL, USER_CHANNEL_PREFIX};
pub use spam::{fingerprint, RedisSpamRules, SpamLimits};
