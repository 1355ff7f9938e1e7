//! Chat synchronizer
//!
//! Opens buyer/seller chats lazily and keeps unread counters in step with
//! the messages addressed to each party. Appends are idempotent by message
//! id so a retried send never counts twice.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use market_core::{
    Chat, ChangeFilter, DomainError, DomainEvent, Message, MessageType, Snowflake, Table,
    MAX_MESSAGE_LENGTH,
};

use super::context::ServiceContext;
use super::error::{ServiceError, ServiceResult};
use super::feed::Subscription;
use super::timeline::{ChatTimeline, TimelineUpdate};

/// Characters kept in `chats.last_message`
pub const PREVIEW_LENGTH: usize = 100;

/// Message body as submitted by a client
#[derive(Debug, Clone, Default)]
pub struct NewMessage {
    pub content: String,
    pub message_type: MessageType,
    pub attachment_url: Option<String>,
    /// Client-chosen id; a retry with the same id is a no-op
    pub client_id: Option<Snowflake>,
}

impl NewMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SentMessage {
    pub chat: Chat,
    pub message: Message,
    /// The message was already stored by an earlier attempt
    pub duplicate: bool,
}

/// Chat service
pub struct ChatService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> ChatService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Send to `recipient_id`, opening the chat on first contact
    #[instrument(skip(self, message))]
    pub async fn send_message(
        &self,
        sender_id: Snowflake,
        recipient_id: Snowflake,
        part_id: Option<Snowflake>,
        message: NewMessage,
    ) -> ServiceResult<SentMessage> {
        if sender_id == recipient_id {
            return Err(ServiceError::validation("cannot message yourself"));
        }
        validate_body(&message)?;

        let (buyer_id, seller_id) = self.resolve_roles(sender_id, recipient_id, part_id).await?;
        let chat = self
            .ctx
            .chat_repo()
            .find_or_create(&Chat::new(self.ctx.generate_id(), buyer_id, seller_id, part_id))
            .await?;

        self.append_message(chat.id, sender_id, message).await
    }

    /// Append to an existing chat
    #[instrument(skip(self, message))]
    pub async fn append_message(
        &self,
        chat_id: Snowflake,
        sender_id: Snowflake,
        message: NewMessage,
    ) -> ServiceResult<SentMessage> {
        validate_body(&message)?;
        let chat = self.participant_chat(chat_id, sender_id).await?;

        if let Some(client_id) = message.client_id {
            if let Some(existing) = self.ctx.message_repo().find_by_id(client_id).await? {
                return self.replayed(chat, existing, sender_id);
            }
        }

        let message = Message::new(
            message.client_id.unwrap_or_else(|| self.ctx.generate_id()),
            chat_id,
            sender_id,
            message.content,
            message.message_type,
            message.attachment_url,
        );
        let preview = message.preview(PREVIEW_LENGTH).to_string();

        let Some(chat) = self.ctx.chat_repo().append_message(&message, &preview).await? else {
            // Lost a race with a concurrent retry of the same id
            let existing = self
                .ctx
                .message_repo()
                .find_by_id(message.id)
                .await?
                .ok_or_else(|| ServiceError::internal(format!("message {} vanished", message.id)))?;
            return self.replayed(chat, existing, sender_id);
        };

        info!(message_id = %message.id, chat_id = %chat_id, "Message appended");

        if let Some(recipient_id) = chat.counterpart(sender_id) {
            self.ctx.notify(DomainEvent::MessageReceived {
                message_id: message.id,
                chat_id,
                sender_id,
                recipient_id,
                preview: preview.clone(),
            });
        }

        Ok(SentMessage {
            chat,
            message,
            duplicate: false,
        })
    }

    /// Zero the reader's counter; returns how many messages were flipped
    #[instrument(skip(self))]
    pub async fn mark_read(&self, chat_id: Snowflake, reader_id: Snowflake) -> ServiceResult<u64> {
        self.participant_chat(chat_id, reader_id).await?;
        let flipped = self.ctx.chat_repo().mark_read(chat_id, reader_id).await?;
        debug!(chat_id = %chat_id, flipped, "Chat marked read");
        Ok(flipped)
    }

    #[instrument(skip(self))]
    pub async fn get_chat(&self, chat_id: Snowflake, user_id: Snowflake) -> ServiceResult<Chat> {
        self.participant_chat(chat_id, user_id).await
    }

    /// Ordered by `(created_at, id)`
    #[instrument(skip(self))]
    pub async fn list_messages(&self, chat_id: Snowflake, reader_id: Snowflake) -> ServiceResult<Vec<Message>> {
        self.participant_chat(chat_id, reader_id).await?;
        Ok(self.ctx.message_repo().find_by_chat(chat_id).await?)
    }

    #[instrument(skip(self))]
    pub async fn list_chats(&self, user_id: Snowflake) -> ServiceResult<Vec<Chat>> {
        Ok(self.ctx.chat_repo().find_by_user(user_id).await?)
    }

    #[instrument(skip(self))]
    pub async fn unread_total(&self, user_id: Snowflake) -> ServiceResult<i64> {
        Ok(self.ctx.chat_repo().total_unread(user_id).await?)
    }

    // === Internals ===

    async fn participant_chat(&self, chat_id: Snowflake, user_id: Snowflake) -> ServiceResult<Chat> {
        let chat = self
            .ctx
            .chat_repo()
            .find_by_id(chat_id)
            .await?
            .ok_or(DomainError::ChatNotFound(chat_id))?;
        if !chat.is_participant(user_id) {
            return Err(DomainError::NotParticipant(chat_id).into());
        }
        Ok(chat)
    }

    /// Buyer/seller for a new conversation. A part that is one of our
    /// requests decides it; otherwise an existing chat in either direction,
    /// otherwise whoever writes first is the buyer.
    async fn resolve_roles(
        &self,
        sender_id: Snowflake,
        recipient_id: Snowflake,
        part_id: Option<Snowflake>,
    ) -> ServiceResult<(Snowflake, Snowflake)> {
        if let Some(part_id) = part_id {
            if let Some(request) = self.ctx.request_repo().find_by_id(part_id).await? {
                return if request.is_owned_by(sender_id) {
                    Ok((sender_id, recipient_id))
                } else if request.is_owned_by(recipient_id) {
                    Ok((recipient_id, sender_id))
                } else {
                    Err(ServiceError::forbidden("neither party owns this request"))
                };
            }
        }

        let chats = self.ctx.chat_repo();
        if chats.find_between(sender_id, recipient_id, part_id).await?.is_some() {
            return Ok((sender_id, recipient_id));
        }
        if chats.find_between(recipient_id, sender_id, part_id).await?.is_some() {
            return Ok((recipient_id, sender_id));
        }
        Ok((sender_id, recipient_id))
    }

    fn replayed(&self, chat: Chat, existing: Message, sender_id: Snowflake) -> ServiceResult<SentMessage> {
        if existing.chat_id != chat.id || existing.sender_id != sender_id {
            return Err(ServiceError::conflict(format!("message id {} is taken", existing.id)));
        }
        debug!(message_id = %existing.id, "Duplicate append ignored");
        Ok(SentMessage {
            chat,
            message: existing,
            duplicate: true,
        })
    }
}

fn validate_body(message: &NewMessage) -> ServiceResult<()> {
    if message.content.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(DomainError::ContentTooLong {
            max: MAX_MESSAGE_LENGTH,
        }
        .into());
    }
    if message.content.trim().is_empty() && message.attachment_url.is_none() {
        return Err(ServiceError::validation("message must have content or an attachment"));
    }
    Ok(())
}

/// Chat timeline kept current by the change feed
pub struct LiveTimeline {
    timeline: Arc<Mutex<ChatTimeline>>,
    version: watch::Receiver<u64>,
    _subscription: Subscription,
}

impl LiveTimeline {
    /// Subscribe first, then load history, so nothing committed in between
    /// is missed.
    #[instrument(skip(ctx))]
    pub async fn open(ctx: &ServiceContext, chat_id: Snowflake, reader_id: Snowflake) -> ServiceResult<Self> {
        ChatService::new(ctx).participant_chat(chat_id, reader_id).await?;

        let timeline = Arc::new(Mutex::new(ChatTimeline::new(chat_id)));
        let (sender, version) = watch::channel(0u64);
        let sender = Arc::new(sender);

        let task_ctx = ctx.clone();
        let task_timeline = Arc::clone(&timeline);
        let task_sender = Arc::clone(&sender);
        let subscription = ctx.subscriber().subscribe(
            ChangeFilter::eq(Table::Messages, "chat_id", chat_id),
            move |trigger| {
                let ctx = task_ctx.clone();
                let timeline = Arc::clone(&task_timeline);
                let sender = Arc::clone(&task_sender);
                async move {
                    let update = match trigger.change() {
                        Some(change) => timeline.lock().apply(change),
                        None => TimelineUpdate::NeedsRefresh,
                    };
                    if update == TimelineUpdate::NeedsRefresh {
                        match ctx.message_repo().find_by_chat(chat_id).await {
                            Ok(messages) => timeline.lock().reset(messages),
                            Err(e) => {
                                warn!(chat_id = %chat_id, error = %e, "Timeline refresh failed");
                                return;
                            }
                        }
                    }
                    if update != TimelineUpdate::Ignored {
                        sender.send_modify(|v| *v += 1);
                    }
                }
            },
        );

        let history = ctx.message_repo().find_by_chat(chat_id).await?;
        timeline.lock().merge(history);

        Ok(Self {
            timeline,
            version,
            _subscription: subscription,
        })
    }

    pub fn messages(&self) -> Vec<Message> {
        self.timeline.lock().messages().to_vec()
    }

    pub fn unread_for(&self, reader_id: Snowflake) -> usize {
        self.timeline.lock().unread_for(reader_id)
    }

    /// Wait until the timeline changes
    pub async fn changed(&mut self) -> bool {
        self.version.changed().await.is_ok()
    }
}
