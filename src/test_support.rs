//! Scripted transport and fixtures shared by the module test suites.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::error::{ChatError, ChatResult};
use crate::ids::{ConversationId, MessageId};
use crate::transport::ChatTransport;
use crate::types::{
    Conversation, ConversationStatus, DeliveryState, Message, NewConversation, OutboundMessage,
    Priority, SenderRole, TicketRef,
};

/// A bare conversation fixture.
pub(crate) fn conversation(id: &str) -> Conversation {
    Conversation {
        id: ConversationId::new(id),
        title: None,
        counterpart_name: None,
        status: ConversationStatus::default(),
        priority: Priority::default(),
        last_message_preview: None,
        last_activity_at: None,
        unread_count: 0,
        linked_ticket: None,
    }
}

/// A confirmed remote message fixture with a deterministic timestamp.
pub(crate) fn message(
    id: &str,
    conv: &str,
    role: SenderRole,
    content: &str,
    offset: i64,
) -> Message {
    Message {
        id: MessageId::remote(id),
        conversation_id: ConversationId::new(conv),
        sender_role: role,
        content: content.to_owned(),
        attachments: Vec::new(),
        created_at: DateTime::from_timestamp(1_750_000_000 + offset, 0).unwrap_or_else(Utc::now),
        delivery_state: DeliveryState::Confirmed,
    }
}

/// Scripted [`ChatTransport`] with failure toggles and call recording.
#[derive(Default)]
pub(crate) struct MockTransport {
    conversations: Mutex<Vec<Conversation>>,
    messages: Mutex<HashMap<ConversationId, Vec<Message>>>,
    fail_list: AtomicBool,
    fail_send: AtomicBool,
    fail_mark_read: AtomicBool,
    list_calls: AtomicUsize,
    send_seq: AtomicUsize,
    create_seq: AtomicUsize,
    mark_read_log: Mutex<Vec<MessageId>>,
    sent_log: Mutex<Vec<(ConversationId, OutboundMessage)>>,
    created_log: Mutex<Vec<NewConversation>>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn set_conversations(&self, conversations: Vec<Conversation>) {
        *self.conversations.lock().await = conversations;
    }

    pub(crate) async fn set_messages(&self, conversation: &str, messages: Vec<Message>) {
        self.messages
            .lock()
            .await
            .insert(ConversationId::new(conversation), messages);
    }

    pub(crate) fn fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_send(&self, fail: bool) {
        self.fail_send.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_mark_read(&self, fail: bool) {
        self.fail_mark_read.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub(crate) async fn mark_read_log(&self) -> Vec<MessageId> {
        self.mark_read_log.lock().await.clone()
    }

    pub(crate) async fn sent_log(&self) -> Vec<(ConversationId, OutboundMessage)> {
        self.sent_log.lock().await.clone()
    }

    pub(crate) async fn created_log(&self) -> Vec<NewConversation> {
        self.created_log.lock().await.clone()
    }

    fn unavailable() -> ChatError {
        ChatError::Status {
            status: 503,
            detail: "scripted failure".to_owned(),
        }
    }
}

#[async_trait]
impl ChatTransport for MockTransport {
    async fn list_conversations(&self) -> ChatResult<Vec<Conversation>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        Ok(self.conversations.lock().await.clone())
    }

    async fn create_conversation(&self, request: &NewConversation) -> ChatResult<Conversation> {
        let n = self.create_seq.fetch_add(1, Ordering::SeqCst);
        let linked_ticket: Option<TicketRef> = request
            .metadata
            .get("ticket")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok());

        let created = Conversation {
            id: ConversationId::new(format!("conv-{n}")),
            title: request.title.clone(),
            counterpart_name: None,
            status: ConversationStatus::default(),
            priority: Priority::default(),
            last_message_preview: None,
            last_activity_at: None,
            unread_count: 0,
            linked_ticket,
        };

        self.created_log.lock().await.push(request.clone());
        self.conversations.lock().await.push(created.clone());
        Ok(created)
    }

    async fn list_messages(&self, conversation: &ConversationId) -> ChatResult<Vec<Message>> {
        Ok(self
            .messages
            .lock()
            .await
            .get(conversation)
            .cloned()
            .unwrap_or_default())
    }

    async fn send_message(
        &self,
        conversation: &ConversationId,
        payload: &OutboundMessage,
    ) -> ChatResult<Message> {
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }

        let n = self.send_seq.fetch_add(1, Ordering::SeqCst);
        let record = Message {
            id: MessageId::remote(format!("srv-{n}")),
            conversation_id: conversation.clone(),
            sender_role: SenderRole::Client,
            content: payload.content.clone(),
            attachments: payload.attachments.clone(),
            created_at: Utc::now(),
            delivery_state: DeliveryState::Confirmed,
        };

        self.sent_log
            .lock()
            .await
            .push((conversation.clone(), payload.clone()));
        self.messages
            .lock()
            .await
            .entry(conversation.clone())
            .or_default()
            .push(record.clone());
        Ok(record)
    }

    async fn mark_read(&self, message: &MessageId) -> ChatResult<()> {
        if self.fail_mark_read.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        self.mark_read_log.lock().await.push(message.clone());
        Ok(())
    }
}
