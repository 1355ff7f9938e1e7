//! Pub/Sub channel definitions.
//!
//! Every user has one channel; all of their connected clients listen on it.

use market_core::Snowflake;

/// Channel prefix for user-specific events
pub const USER_CHANNEL_PREFIX: &str = "user:";
/// Channel moderators listen on
pub const ADMIN_CHANNEL: &str = "admins";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PubSubChannel {
    /// Events for a specific user (all their sessions)
    User(Snowflake),
    /// Moderation events
    Admins,
}

impl PubSubChannel {
    #[must_use]
    pub fn user(user_id: Snowflake) -> Self {
        Self::User(user_id)
    }

    /// Get the Redis channel name
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::User(id) => format!("{USER_CHANNEL_PREFIX}{id}"),
            Self::Admins => ADMIN_CHANNEL.to_string(),
        }
    }

    /// Parse a channel name back to a `PubSubChannel`
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        if name == ADMIN_CHANNEL {
            return Some(Self::Admins);
        }
        name.strip_prefix(USER_CHANNEL_PREFIX)
            .and_then(|id| Snowflake::parse(id).ok())
            .map(Self::User)
    }
}

impl std::fmt::Display for PubSubChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_names() {
        assert_eq!(PubSubChannel::user(Snowflake::new(11111)).name(), "user:11111");
        assert_eq!(PubSubChannel::Admins.name(), "admins");
    }

    #[test]
    fn test_channel_parse() {
        assert_eq!(
            PubSubChannel::parse("user:11111"),
            Some(PubSubChannel::User(Snowflake::new(11111)))
        );
        assert_eq!(PubSubChannel::parse("admins"), Some(PubSubChannel::Admins));
        assert_eq!(PubSubChannel::parse("request:1"), None);
        assert_eq!(PubSubChannel::parse("user:abc"), None);
    }
}
