//! Moderation policy
//!
//! Blocklisted phones, trusted users and admins, built once from config and
//! passed explicitly to the gate and to admin-only operations.

use std::collections::HashSet;

use market_core::{PhoneNumber, Snowflake};

use crate::config::ModerationConfig;

#[derive(Debug, Clone, Default)]
pub struct ModerationPolicy {
    blocked_phones: HashSet<String>,
    trusted_users: HashSet<Snowflake>,
    admins: HashSet<Snowflake>,
}

impl ModerationPolicy {
    pub fn new(
        blocked_phones: impl IntoIterator<Item = String>,
        trusted_users: impl IntoIterator<Item = Snowflake>,
        admins: impl IntoIterator<Item = Snowflake>,
    ) -> Self {
        Self {
            blocked_phones: blocked_phones
                .into_iter()
                .map(|p| PhoneNumber::normalize(&p))
                .filter(|p| !p.is_empty())
                .collect(),
            trusted_users: trusted_users.into_iter().collect(),
            admins: admins.into_iter().collect(),
        }
    }

    pub fn from_config(config: &ModerationConfig) -> Self {
        Self::new(
            config.blocked_phones.iter().cloned(),
            config.trusted_users.iter().copied().map(Snowflake::new),
            config.admins.iter().copied().map(Snowflake::new),
        )
    }

    /// `phone` may be raw or normalized
    pub fn is_phone_blocked(&self, phone: &str) -> bool {
        self.blocked_phones.contains(&PhoneNumber::normalize(phone))
    }

    pub fn is_trusted(&self, user_id: Snowflake) -> bool {
        self.trusted_users.contains(&user_id)
    }

    pub fn is_admin(&self, user_id: Snowflake) -> bool {
        self.admins.contains(&user_id)
    }

    /// Admin ids, sorted for stable notification recipients
    pub fn admins(&self) -> Vec<Snowflake> {
        let mut admins: Vec<_> = self.admins.iter().copied().collect();
        admins.sort_unstable();
        admins
    }
}
