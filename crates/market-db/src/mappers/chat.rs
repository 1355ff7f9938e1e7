//! Chat <-> model mapper

use market_core::{Chat, DomainError, Snowflake};

use crate::models::ChatModel;

impl TryFrom<ChatModel> for Chat {
    type Error = DomainError;

    fn try_from(model: ChatModel) -> Result<Self, Self::Error> {
        Ok(Chat {
            id: Snowflake::new(model.id),
            buyer_id: Snowflake::new(model.buyer_id),
            seller_id: Snowflake::new(model.seller_id),
            part_id: model.part_id.map(Snowflake::new),
            buyer_unread_count: model.buyer_unread_count,
            seller_unread_count: model.seller_unread_count,
            last_message: model.last_message,
            last_message_at: model.last_message_at,
            created_at: model.created_at,
        })
    }
}
