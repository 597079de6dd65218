//! Optimistic send queue.
//!
//! A send echoes into the local view immediately under a provisional id,
//! then reconciles against the server-confirmed record. Failures keep the
//! echo visible as `Failed` for explicit retry or discard; they are never
//! silently dropped. Sends are independent of each other, so out-of-order
//! server acknowledgement is tolerated (reconciliation is per message).

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use crate::error::{ChatError, ChatResult};
use crate::ids::{ConversationId, MessageId};
use crate::staging::AttachmentStaging;
use crate::store::ConversationStore;
use crate::sync::MessageSyncEngine;
use crate::transport::ChatTransport;
use crate::types::{DeliveryState, Message, OutboundMessage, SenderRole};

/// Wraps outbound sends with local echo, reconciliation and rollback.
pub struct OutboundQueue {
    transport: Arc<dyn ChatTransport>,
    sync: Arc<MessageSyncEngine>,
    store: Arc<ConversationStore>,
    staging: Arc<AttachmentStaging>,
    local_role: SenderRole,
}

impl OutboundQueue {
    /// Wire the queue to its collaborators.
    #[must_use]
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        sync: Arc<MessageSyncEngine>,
        store: Arc<ConversationStore>,
        staging: Arc<AttachmentStaging>,
        local_role: SenderRole,
    ) -> Self {
        Self {
            transport,
            sync,
            store,
            staging,
            local_role,
        }
    }

    /// Send a message: echo locally, dispatch, reconcile.
    ///
    /// On success the staged attachments are cleared and the confirmed
    /// remote id is returned. On failure the echo stays in the view as
    /// `Failed` and the staged attachments are preserved for retry.
    ///
    /// # Errors
    /// Returns the transport error; the echo is retained either way.
    pub async fn send(
        &self,
        conversation: &ConversationId,
        content: impl Into<String> + Send,
    ) -> ChatResult<MessageId> {
        let content = content.into();
        let attachments = self.staging.snapshot().await;
        let now = Utc::now();

        let echo = Message {
            id: MessageId::provisional(),
            conversation_id: conversation.clone(),
            sender_role: self.local_role,
            content: content.clone(),
            attachments: attachments.clone(),
            created_at: now,
            delivery_state: DeliveryState::Pending,
        };
        let provisional = echo.id.clone();
        self.sync.insert_pending(echo);
        self.store.note_local_send(conversation, &content, now).await;

        let payload = OutboundMessage::text(content).with_attachments(attachments);
        self.dispatch(conversation, &provisional, &payload).await
    }

    /// Re-issue a failed send with the same content and attachments.
    ///
    /// # Errors
    /// Returns [`ChatError::UnknownMessage`] if the id does not name a
    /// failed echo in this conversation, or the transport error on failure.
    pub async fn retry(
        &self,
        conversation: &ConversationId,
        id: &MessageId,
    ) -> ChatResult<MessageId> {
        let Some(echo) = self.sync.reset_for_retry(conversation, id) else {
            return Err(ChatError::UnknownMessage(id.to_string()));
        };
        debug!(conversation = %conversation, id = %id, "retrying failed send");
        let payload = OutboundMessage::text(echo.content).with_attachments(echo.attachments);
        self.dispatch(conversation, id, &payload).await
    }

    /// Remove a failed echo on explicit user request.
    #[must_use]
    pub fn discard(&self, conversation: &ConversationId, id: &MessageId) -> bool {
        self.sync.discard_failed(conversation, id)
    }

    async fn dispatch(
        &self,
        conversation: &ConversationId,
        provisional: &MessageId,
        payload: &OutboundMessage,
    ) -> ChatResult<MessageId> {
        match self.transport.send_message(conversation, payload).await {
            Ok(record) => {
                let confirmed = record.id.clone();
                self.sync.merge_remote(conversation, vec![record]);
                self.staging.clear().await;
                Ok(confirmed)
            }
            Err(err) => {
                warn!(conversation = %conversation, id = %provisional, %err, "send failed");
                self.sync.mark_failed(conversation, provisional);
                Err(err)
            }
        }
    }
}
