//! Local chat timeline
//!
//! A reader-side cache of one chat's messages. Messages can arrive twice or
//! out of order (history fetch racing live changes); the timeline converges
//! to the same `(created_at, id)` order either way.

use market_core::{merge_messages, ChangeOp, Message, RowChange, Snowflake, Table};

/// What applying a change did to the timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelineUpdate {
    /// Number of new messages inserted
    Merged(usize),
    /// Number of messages whose read flag changed
    ReadFlags(usize),
    Removed,
    /// Not about this chat
    Ignored,
    /// The change could not be applied locally; re-fetch the chat
    NeedsRefresh,
}

#[derive(Debug, Clone, Default)]
pub struct ChatTimeline {
    chat_id: Snowflake,
    messages: Vec<Message>,
}

impl ChatTimeline {
    pub fn new(chat_id: Snowflake) -> Self {
        Self {
            chat_id,
            messages: Vec::new(),
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Merge messages from any source. Existing copies win.
    pub fn merge<I>(&mut self, incoming: I) -> usize
    where
        I: IntoIterator<Item = Message>,
    {
        merge_messages(
            &mut self.messages,
            incoming.into_iter().filter(|m| m.chat_id == self.chat_id),
        )
    }

    /// Replace the whole timeline with a fresh fetch
    pub fn reset(&mut self, messages: Vec<Message>) {
        self.messages.clear();
        self.merge(messages);
    }

    /// Unread messages addressed to `reader_id`
    pub fn unread_for(&self, reader_id: Snowflake) -> usize {
        self.messages
            .iter()
            .filter(|m| m.sender_id != reader_id && !m.is_read)
            .count()
    }

    /// Reconcile one row-level change
    pub fn apply(&mut self, change: &RowChange) -> TimelineUpdate {
        if change.table != Table::Messages {
            return TimelineUpdate::Ignored;
        }
        match change.column("chat_id") {
            Some(chat_id) if chat_id == self.chat_id.to_string() => {}
            Some(_) => return TimelineUpdate::Ignored,
            None => return TimelineUpdate::NeedsRefresh,
        }

        match change.op {
            ChangeOp::Insert => match serde_json::from_value::<Message>(change.row.clone()) {
                Ok(message) => TimelineUpdate::Merged(self.merge([message])),
                Err(_) => TimelineUpdate::NeedsRefresh,
            },
            ChangeOp::Update => self.apply_update(change),
            ChangeOp::Delete => {
                let Some(id) = row_id(change) else {
                    return TimelineUpdate::NeedsRefresh;
                };
                self.messages.retain(|m| m.id != id);
                TimelineUpdate::Removed
            }
        }
    }

    fn apply_update(&mut self, change: &RowChange) -> TimelineUpdate {
        let Some(id) = row_id(change) else {
            return TimelineUpdate::NeedsRefresh;
        };

        match self.messages.iter_mut().find(|m| m.id == id) {
            Some(existing) => match change.row.get("is_read").and_then(serde_json::Value::as_bool) {
                Some(is_read) if is_read != existing.is_read => {
                    existing.is_read = is_read;
                    TimelineUpdate::ReadFlags(1)
                }
                Some(_) => TimelineUpdate::ReadFlags(0),
                None => TimelineUpdate::NeedsRefresh,
            },
            // Update for a message we never saw the insert of
            None => match serde_json::from_value::<Message>(change.row.clone()) {
                Ok(message) => TimelineUpdate::Merged(self.merge([message])),
                Err(_) => TimelineUpdate::NeedsRefresh,
            },
        }
    }
}

fn row_id(change: &RowChange) -> Option<Snowflake> {
    change.column("id")?.parse().ok()
}
