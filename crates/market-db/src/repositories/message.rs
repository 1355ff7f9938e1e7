//! PostgreSQL implementation of MessageRepository

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use market_core::{Message, MessageRepository, RepoResult, Snowflake};

use crate::mappers::try_collect;
use crate::models::MessageModel;

use super::error::map_db_error;

/// PostgreSQL implementation of MessageRepository
#[derive(Clone)]
pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: Snowflake) -> RepoResult<Option<Message>> {
        let row = sqlx::query_as::<_, MessageModel>(
            r#"
            SELECT id, chat_id, sender_id, content, message_type, attachment_url, is_read, created_at
            FROM messages
            WHERE id = $1
            "#,
        )
        .bind(id.into_inner())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        row.map(Message::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn find_by_chat(&self, chat_id: Snowflake) -> RepoResult<Vec<Message>> {
        let rows = sqlx::query_as::<_, MessageModel>(
            r#"
            SELECT id, chat_id, sender_id, content, message_type, attachment_url, is_read, created_at
            FROM messages
            WHERE chat_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(chat_id.into_inner())
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        try_collect(rows)
    }

    #[instrument(skip(self))]
    async fn count_unread(&self, chat_id: Snowflake, reader_id: Snowflake) -> RepoResult<i64> {
        sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM messages
            WHERE chat_id = $1 AND sender_id <> $2 AND is_read = FALSE
            "#,
        )
        .bind(chat_id.into_inner())
        .bind(reader_id.into_inner())
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)
    }
}
