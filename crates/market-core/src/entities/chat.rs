//! Chat entity - a message channel between one buyer and one seller

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::Snowflake;

/// Which side of the chat a user is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    Buyer,
    Seller,
}

/// Chat entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: Snowflake,
    pub buyer_id: Snowflake,
    pub seller_id: Snowflake,
    /// Optional request the conversation is about
    pub part_id: Option<Snowflake>,
    pub buyer_unread_count: i32,
    pub seller_unread_count: i32,
    pub last_message: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Chat {
    pub fn new(id: Snowflake, buyer_id: Snowflake, seller_id: Snowflake, part_id: Option<Snowflake>) -> Self {
        Self {
            id,
            buyer_id,
            seller_id,
            part_id,
            buyer_unread_count: 0,
            seller_unread_count: 0,
            last_message: None,
            last_message_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn role_of(&self, user_id: Snowflake) -> Option<ChatRole> {
        if user_id == self.buyer_id {
            Some(ChatRole::Buyer)
        } else if user_id == self.seller_id {
            Some(ChatRole::Seller)
        } else {
            None
        }
    }

    #[inline]
    pub fn is_participant(&self, user_id: Snowflake) -> bool {
        self.role_of(user_id).is_some()
    }

    /// The other participant
    pub fn counterpart(&self, user_id: Snowflake) -> Option<Snowflake> {
        match self.role_of(user_id)? {
            ChatRole::Buyer => Some(self.seller_id),
            ChatRole::Seller => Some(self.buyer_id),
        }
    }

    /// Unread count for a participant, 0 for outsiders
    pub fn unread_for(&self, user_id: Snowflake) -> i32 {
        match self.role_of(user_id) {
            Some(ChatRole::Buyer) => self.buyer_unread_count,
            Some(ChatRole::Seller) => self.seller_unread_count,
            None => 0,
        }
    }

    /// Count a new message against the recipient and refresh the preview
    pub fn record_message(&mut self, sender_id: Snowflake, preview: &str, at: DateTime<Utc>) {
        match self.role_of(sender_id) {
            Some(ChatRole::Buyer) => self.seller_unread_count += 1,
            Some(ChatRole::Seller) => self.buyer_unread_count += 1,
            None => return,
        }
        self.last_message = Some(preview.to_string());
        self.last_message_at = Some(at);
    }

    /// Reset the reader's counter; the other side is untouched
    pub fn reset_unread(&mut self, reader_id: Snowflake) {
        match self.role_of(reader_id) {
            Some(ChatRole::Buyer) => self.buyer_unread_count = 0,
            Some(ChatRole::Seller) => self.seller_unread_count = 0,
            None => {}
        }
    }
}
