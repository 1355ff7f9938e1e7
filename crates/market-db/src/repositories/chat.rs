//! PostgreSQL implementation of ChatRepository

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use market_core::{Chat, ChatRepository, Message, RepoResult, Snowflake};

use crate::mappers::try_collect;
use crate::models::ChatModel;

use super::error::map_db_error;

const CHAT_COLUMNS: &str = "id, buyer_id, seller_id, part_id, buyer_unread_count, \
     seller_unread_count, last_message, last_message_at, created_at";

/// PostgreSQL implementation of ChatRepository
#[derive(Clone)]
pub struct PgChatRepository {
    pool: PgPool,
}

impl PgChatRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChatRepository for PgChatRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: Snowflake) -> RepoResult<Option<Chat>> {
        let row = sqlx::query_as::<_, ChatModel>(&format!(
            "SELECT {CHAT_COLUMNS} FROM chats WHERE id = $1"
        ))
        .bind(id.into_inner())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        row.map(Chat::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn find_between(
        &self,
        buyer_id: Snowflake,
        seller_id: Snowflake,
        part_id: Option<Snowflake>,
    ) -> RepoResult<Option<Chat>> {
        let row = sqlx::query_as::<_, ChatModel>(&format!(
            "SELECT {CHAT_COLUMNS} FROM chats \
             WHERE buyer_id = $1 AND seller_id = $2 AND part_id IS NOT DISTINCT FROM $3"
        ))
        .bind(buyer_id.into_inner())
        .bind(seller_id.into_inner())
        .bind(part_id.map(Snowflake::into_inner))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        row.map(Chat::try_from).transpose()
    }

    #[instrument(skip(self, chat), fields(chat_id = %chat.id))]
    async fn find_or_create(&self, chat: &Chat) -> RepoResult<Chat> {
        // Losing an insert race leaves the other writer's row in place
        sqlx::query(
            r#"
            INSERT INTO chats (id, buyer_id, seller_id, part_id, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(chat.id.into_inner())
        .bind(chat.buyer_id.into_inner())
        .bind(chat.seller_id.into_inner())
        .bind(chat.part_id.map(Snowflake::into_inner))
        .bind(chat.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        self.find_between(chat.buyer_id, chat.seller_id, chat.part_id)
            .await?
            .ok_or_else(|| market_core::DomainError::ChatNotFound(chat.id))
    }

    #[instrument(skip(self))]
    async fn find_by_user(&self, user_id: Snowflake) -> RepoResult<Vec<Chat>> {
        let rows = sqlx::query_as::<_, ChatModel>(&format!(
            "SELECT {CHAT_COLUMNS} FROM chats \
             WHERE buyer_id = $1 OR seller_id = $1 \
             ORDER BY COALESCE(last_message_at, created_at) DESC, id DESC"
        ))
        .bind(user_id.into_inner())
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        try_collect(rows)
    }

    #[instrument(skip(self, message, preview), fields(message_id = %message.id, chat_id = %message.chat_id))]
    async fn append_message(&self, message: &Message, preview: &str) -> RepoResult<Option<Chat>> {
        let mut tx = self.pool.begin().await.map_err(map_db_error)?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO messages (id, chat_id, sender_id, content, message_type,
                                  attachment_url, is_read, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, FALSE, $7)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(message.id.into_inner())
        .bind(message.chat_id.into_inner())
        .bind(message.sender_id.into_inner())
        .bind(&message.content)
        .bind(message.message_type.as_str())
        .bind(&message.attachment_url)
        .bind(message.created_at)
        .execute(&mut *tx)
        .await
        .map_err(map_db_error)?;

        if inserted.rows_affected() == 0 {
            tx.rollback().await.map_err(map_db_error)?;
            return Ok(None);
        }

        let chat = sqlx::query_as::<_, ChatModel>(&format!(
            "UPDATE chats SET \
                 buyer_unread_count = buyer_unread_count + CASE WHEN seller_id = $2 THEN 1 ELSE 0 END, \
                 seller_unread_count = seller_unread_count + CASE WHEN buyer_id = $2 THEN 1 ELSE 0 END, \
                 last_message = $3, \
                 last_message_at = $4 \
             WHERE id = $1 \
             RETURNING {CHAT_COLUMNS}"
        ))
        .bind(message.chat_id.into_inner())
        .bind(message.sender_id.into_inner())
        .bind(preview)
        .bind(message.created_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_db_error)?;

        tx.commit().await.map_err(map_db_error)?;
        Chat::try_from(chat).map(Some)
    }

    #[instrument(skip(self))]
    async fn mark_read(&self, chat_id: Snowflake, reader_id: Snowflake) -> RepoResult<u64> {
        let mut tx = self.pool.begin().await.map_err(map_db_error)?;

        let flipped = sqlx::query(
            r#"
            UPDATE messages
            SET is_read = TRUE
            WHERE chat_id = $1 AND sender_id <> $2 AND is_read = FALSE
            "#,
        )
        .bind(chat_id.into_inner())
        .bind(reader_id.into_inner())
        .execute(&mut *tx)
        .await
        .map_err(map_db_error)?;

        sqlx::query(
            r#"
            UPDATE chats SET
                buyer_unread_count = CASE WHEN buyer_id = $2 THEN 0 ELSE buyer_unread_count END,
                seller_unread_count = CASE WHEN seller_id = $2 THEN 0 ELSE seller_unread_count END
            WHERE id = $1
            "#,
        )
        .bind(chat_id.into_inner())
        .bind(reader_id.into_inner())
        .execute(&mut *tx)
        .await
        .map_err(map_db_error)?;

        tx.commit().await.map_err(map_db_error)?;
        Ok(flipped.rows_affected())
    }

    #[instrument(skip(self))]
    async fn total_unread(&self, user_id: Snowflake) -> RepoResult<i64> {
        let total: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT SUM(CASE WHEN buyer_id = $1 THEN buyer_unread_count ELSE seller_unread_count END)::BIGINT
            FROM chats
            WHERE buyer_id = $1 OR seller_id = $1
            "#,
        )
        .bind(user_id.into_inner())
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(total.unwrap_or(0))
    }
}
