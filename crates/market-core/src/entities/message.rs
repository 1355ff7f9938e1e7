//! Message entity and the deterministic timeline merge

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::value_objects::Snowflake;

/// Maximum message length in characters
pub const MAX_MESSAGE_LENGTH: usize = 4000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    #[default]
    Text,
    Image,
    Offer,
    System,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Offer => "offer",
            Self::System => "system",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "image" => Ok(Self::Image),
            "offer" => Ok(Self::Offer),
            "system" => Ok(Self::System),
            other => Err(DomainError::ValidationError(format!(
                "unknown message type: {other}"
            ))),
        }
    }
}

/// Message entity. Immutable once created except for `is_read`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Snowflake,
    pub chat_id: Snowflake,
    pub sender_id: Snowflake,
    pub content: String,
    pub message_type: MessageType,
    pub attachment_url: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(
        id: Snowflake,
        chat_id: Snowflake,
        sender_id: Snowflake,
        content: String,
        message_type: MessageType,
        attachment_url: Option<String>,
    ) -> Self {
        Self {
            id,
            chat_id,
            sender_id,
            content,
            message_type,
            attachment_url,
            is_read: false,
            created_at: Utc::now(),
        }
    }

    /// Total order within a chat
    #[inline]
    pub fn sort_key(&self) -> (DateTime<Utc>, Snowflake) {
        (self.created_at, self.id)
    }

    /// Get a truncated preview of the message (for chat lists and notifications)
    pub fn preview(&self, max_len: usize) -> &str {
        if self.content.len() <= max_len {
            &self.content
        } else {
            let mut end = max_len;
            while !self.content.is_char_boundary(end) && end > 0 {
                end -= 1;
            }
            &self.content[..end]
        }
    }

    /// Check if message content is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty() && self.attachment_url.is_none()
    }
}

/// Merge `incoming` into `timeline`.
///
/// A message whose id is already present is dropped, never replaced. The
/// result is sorted by `(created_at, id)`, so any two readers holding the
/// same set of messages see the same sequence whatever the delivery order.
/// Returns the number of messages actually inserted.
pub fn merge_messages<I>(timeline: &mut Vec<Message>, incoming: I) -> usize
where
    I: IntoIterator<Item = Message>,
{
    let mut seen: HashSet<Snowflake> = timeline.iter().map(|m| m.id).collect();
    let before = timeline.len();

    for message in incoming {
        if seen.insert(message.id) {
            timeline.push(message);
        }
    }

    let inserted = timeline.len() - before;
    if inserted > 0 {
        timeline.sort_by_key(Message::sort_key);
    }
    inserted
}
