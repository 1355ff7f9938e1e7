//! Velocity windows and duplicate-content detection over Redis counters

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

use market_common::ModerationConfig;
use market_core::{DomainError, RuleVerdict, SpamCheck, SpamRulesEvaluator};

use crate::pool::RedisPool;

const PHONE_KEY_PREFIX: &str = "spam:phone:";
const USER_KEY_PREFIX: &str = "spam:user:";
const DUPLICATE_KEY_PREFIX: &str = "spam:dup:";

/// Thresholds for one velocity window. Counts above `hard` reject, above
/// `soft` send the request to review.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpamLimits {
    pub window_secs: u64,
    pub phone_soft: u32,
    pub phone_hard: u32,
    pub user_soft: u32,
    pub user_hard: u32,
    pub duplicate_ttl_secs: u64,
}

impl From<&ModerationConfig> for SpamLimits {
    fn from(config: &ModerationConfig) -> Self {
        Self {
            window_secs: config.velocity_window_secs,
            phone_soft: config.phone_soft_limit,
            phone_hard: config.phone_hard_limit,
            user_soft: config.user_soft_limit,
            user_hard: config.user_hard_limit,
            duplicate_ttl_secs: config.duplicate_ttl_secs,
        }
    }
}

impl SpamLimits {
    /// Turn the observed counters into a verdict
    pub fn judge(&self, phone_count: i64, user_count: i64, duplicate: bool) -> RuleVerdict {
        if phone_count > i64::from(self.phone_hard) {
            return RuleVerdict::Reject(format!(
                "phone used {phone_count} times in {}s",
                self.window_secs
            ));
        }
        if user_count > i64::from(self.user_hard) {
            return RuleVerdict::Reject(format!(
                "{user_count} requests in {}s",
                self.window_secs
            ));
        }
        if phone_count > i64::from(self.phone_soft) {
            return RuleVerdict::Uncertain("unusual phone velocity".to_string());
        }
        if user_count > i64::from(self.user_soft) {
            return RuleVerdict::Uncertain("unusual request velocity".to_string());
        }
        if duplicate {
            return RuleVerdict::Uncertain("duplicate content".to_string());
        }
        RuleVerdict::Allow
    }
}

/// SHA-256 of the normalized content, hex encoded. Case, punctuation and
/// whitespace runs do not change the fingerprint, and the key is stable
/// across builds so it can live in Redis.
pub fn fingerprint(content: &str) -> String {
    let normalized: String = content
        .split_whitespace()
        .map(|word| {
            word.chars()
                .filter(|c| c.is_alphanumeric())
                .flat_map(char::to_lowercase)
                .collect::<String>()
        })
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub struct RedisSpamRules {
    pool: RedisPool,
    limits: SpamLimits,
}

impl RedisSpamRules {
    pub fn new(pool: RedisPool, limits: SpamLimits) -> Self {
        Self { pool, limits }
    }
}

#[async_trait]
impl SpamRulesEvaluator for RedisSpamRules {
    #[instrument(skip(self, check), fields(user_id = %check.user_id))]
    async fn evaluate(&self, check: &SpamCheck) -> Result<RuleVerdict, DomainError> {
        let window = self.limits.window_secs;

        let phone_count = self
            .pool
            .incr_in_window(&format!("{PHONE_KEY_PREFIX}{}", check.phone), window)
            .await?;
        let user_count = self
            .pool
            .incr_in_window(&format!("{USER_KEY_PREFIX}{}", check.user_id), window)
            .await?;
        let first_seen = self
            .pool
            .set_if_absent(
                &format!("{DUPLICATE_KEY_PREFIX}{}", fingerprint(&check.content)),
                &check.user_id.to_string(),
                self.limits.duplicate_ttl_secs,
            )
            .await?;

        let verdict = self.limits.judge(phone_count, user_count, !first_seen);
        debug!(phone_count, user_count, duplicate = !first_seen, ?verdict, "Spam rules evaluated");
        Ok(verdict)
    }
}
