//! Chat database model

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database model for chats table
#[derive(Debug, Clone, FromRow)]
pub struct ChatModel {
    pub id: i64,
    pub buyer_id: i64,
    pub seller_id: i64,
    pub part_id: Option<i64>,
    pub buyer_unread_count: i32,
    pub seller_unread_count: i32,
    pub last_message: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
