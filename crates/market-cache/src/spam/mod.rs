//! Redis-backed anti-spam rules

mod rules;

pub use rules::{fingerprint, RedisSpamRules, SpamLimits};
