//! Message <-> model mapper

use market_core::{DomainError, Message, MessageType, Snowflake};

use crate::models::MessageModel;

use super::corrupt;

impl TryFrom<MessageModel> for Message {
    type Error = DomainError;

    fn try_from(model: MessageModel) -> Result<Self, Self::Error> {
        let message_type = model
            .message_type
            .parse::<MessageType>()
            .map_err(|_| corrupt("messages.message_type", &model.message_type))?;

        Ok(Message {
            id: Snowflake::new(model.id),
            chat_id: Snowflake::new(model.chat_id),
            sender_id: Snowflake::new(model.sender_id),
            content: model.content,
            message_type,
            attachment_url: model.attachment_url,
            is_read: model.is_read,
            created_at: model.created_at,
        })
    }
}
