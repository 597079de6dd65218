//! Message sync engine: per-conversation merged message views.
//!
//! Threads are keyed by conversation id, which is what makes a late fetch
//! for a deselected conversation harmless: its merge lands in its own
//! thread and never in the active view. The merge itself is idempotent and
//! only ever adds, replaces a pending echo in place, or promotes delivery
//! state; it never removes a message.

use dashmap::DashMap;
use tracing::debug;

use crate::ids::{ConversationId, MessageId};
use crate::types::{DeliveryState, Message};

/// Per-conversation message views with idempotent merge semantics.
#[derive(Default)]
pub struct MessageSyncEngine {
    threads: DashMap<ConversationId, Vec<Message>>,
}

impl MessageSyncEngine {
    /// Create an engine with no threads.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a fetched (or echoed-back) message sequence into the
    /// conversation's view and return the merged sequence.
    ///
    /// Per incoming message: already present by id → delivery-state
    /// promotion only; content-matches a pending echo → the pending entry is
    /// replaced in place; otherwise inserted. The result is re-ordered
    /// non-decreasingly by `created_at` with a stable sort, so ties keep
    /// insertion order.
    pub fn merge_remote(
        &self,
        conversation: &ConversationId,
        incoming: Vec<Message>,
    ) -> Vec<Message> {
        let mut thread = self.threads.entry(conversation.clone()).or_default();

        for message in incoming {
            if let Some(existing) = thread.iter_mut().find(|m| m.id == message.id) {
                if existing.delivery_state != DeliveryState::Confirmed
                    && message.delivery_state == DeliveryState::Confirmed
                {
                    existing.delivery_state = DeliveryState::Confirmed;
                }
                continue;
            }

            if let Some(pending) = thread.iter_mut().find(|m| {
                m.id.is_local()
                    && m.delivery_state == DeliveryState::Pending
                    && m.content == message.content
            }) {
                debug!(conversation = %conversation, id = %message.id, "reconciled pending echo");
                *pending = message;
                continue;
            }

            thread.push(message);
        }

        thread.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        thread.clone()
    }

    /// Insert an optimistic echo.
    pub fn insert_pending(&self, message: Message) {
        let mut thread = self
            .threads
            .entry(message.conversation_id.clone())
            .or_default();
        thread.push(message);
        thread.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    }

    /// Mark a pending echo as failed. Returns `false` if the id is unknown.
    pub fn mark_failed(&self, conversation: &ConversationId, id: &MessageId) -> bool {
        let Some(mut thread) = self.threads.get_mut(conversation) else {
            return false;
        };
        match thread.iter_mut().find(|m| &m.id == id) {
            Some(message) => {
                message.delivery_state = DeliveryState::Failed;
                true
            }
            None => false,
        }
    }

    /// Flip a failed echo back to pending for a retry, returning a clone of
    /// the entry so the caller can re-issue the same content.
    pub fn reset_for_retry(
        &self,
        conversation: &ConversationId,
        id: &MessageId,
    ) -> Option<Message> {
        let mut thread = self.threads.get_mut(conversation)?;
        let message = thread
            .iter_mut()
            .find(|m| &m.id == id && m.delivery_state == DeliveryState::Failed)?;
        message.delivery_state = DeliveryState::Pending;
        Some(message.clone())
    }

    /// Remove a failed echo on explicit user request. Only failed entries
    /// are removable; merges never remove anything.
    pub fn discard_failed(&self, conversation: &ConversationId, id: &MessageId) -> bool {
        let Some(mut thread) = self.threads.get_mut(conversation) else {
            return false;
        };
        let before = thread.len();
        thread.retain(|m| !(&m.id == id && m.delivery_state == DeliveryState::Failed));
        thread.len() < before
    }

    /// Snapshot of a conversation's merged view, in render order.
    #[must_use]
    pub fn thread(&self, conversation: &ConversationId) -> Vec<Message> {
        self.threads
            .get(conversation)
            .map(|t| t.clone())
            .unwrap_or_default()
    }
}
