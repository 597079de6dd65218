//! Transport boundary to the REST backend.
//!
//! This is the single place where backend shape variance is handled:
//! `_id` vs `id`, nested `sender.role` vs flat `senderRole`, `createdAt` as
//! RFC 3339 or epoch millis, and response envelopes that are bare arrays,
//! `{data: [...]}` or `{conversations|messages: [...]}`. Everything past
//! this module sees only the canonical shapes in [`crate::types`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;
use url::Url;

use crate::auth::AuthProvider;
use crate::config::ChatConfig;
use crate::error::{ChatError, ChatResult};
use crate::ids::{ConversationId, MessageId};
use crate::types::{
    AttachmentRef, Conversation, ConversationStatus, DeliveryState, Message, NewConversation,
    OutboundMessage, Priority, SenderRole, TicketRef,
};

/// Cap on the response-body excerpt carried in status errors.
const ERROR_DETAIL_MAX: usize = 300;

/// Backend operations the sync components depend on. Pure I/O, no state.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Fetch the full conversation list.
    ///
    /// # Errors
    /// Returns an error if the request or decoding fails.
    async fn list_conversations(&self) -> ChatResult<Vec<Conversation>>;

    /// Create a conversation.
    ///
    /// # Errors
    /// Returns an error if the request fails; validation detail from the
    /// backend is preserved in [`ChatError::Status`].
    async fn create_conversation(&self, request: &NewConversation) -> ChatResult<Conversation>;

    /// Fetch the full message sequence of a conversation.
    ///
    /// # Errors
    /// Returns an error if the request or decoding fails.
    async fn list_messages(&self, conversation: &ConversationId) -> ChatResult<Vec<Message>>;

    /// Send a message and return the server-confirmed record.
    ///
    /// # Errors
    /// Returns an error if the request or decoding fails.
    async fn send_message(
        &self,
        conversation: &ConversationId,
        payload: &OutboundMessage,
    ) -> ChatResult<Message>;

    /// Acknowledge a message as read.
    ///
    /// # Errors
    /// Returns an error if the request fails or the id is not a remote id.
    async fn mark_read(&self, message: &MessageId) -> ChatResult<()>;
}

/// HTTP implementation over a shared reqwest client.
pub struct HttpTransport {
    client: reqwest::Client,
    base: Url,
    auth: Arc<dyn AuthProvider>,
}

impl HttpTransport {
    /// Build a transport from config and the auth collaborator.
    ///
    /// # Errors
    /// Returns an error if the config is invalid or the HTTP client cannot
    /// be constructed.
    pub fn new(config: &ChatConfig, auth: Arc<dyn AuthProvider>) -> ChatResult<Self> {
        config.validate()?;
        let base = Url::parse(&config.base_url)?;
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self { client, base, auth })
    }

    /// Build an endpoint URL under the base path.
    fn endpoint(&self, segments: &[&str]) -> ChatResult<Url> {
        let mut url = self.base.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|()| ChatError::Config("base URL cannot carry path segments".to_owned()))?;
            path.pop_if_empty();
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }

    async fn get_json(&self, url: Url) -> ChatResult<Value> {
        let token = self.auth.bearer_token().await?;
        let response = self.client.get(url).bearer_auth(token).send().await?;
        Self::decode(response).await
    }

    async fn post_json<B>(&self, url: Url, body: &B) -> ChatResult<Value>
    where
        B: serde::Serialize + Sync,
    {
        let token = self.auth.bearer_token().await?;
        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;
        Self::decode(response).await
    }

    /// Map a response into a JSON value, preserving backend detail on
    /// non-success statuses. An empty body decodes to `null` (read
    /// acknowledgements often return nothing).
    async fn decode(response: reqwest::Response) -> ChatResult<Value> {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(ChatError::Status {
                status: status.as_u16(),
                detail: text.chars().take(ERROR_DETAIL_MAX).collect(),
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn list_conversations(&self) -> ChatResult<Vec<Conversation>> {
        let url = self.endpoint(&["conversations"])?;
        let body = self.get_json(url).await?;
        let items = unwrap_collection(body, "conversations")?;
        Ok(items
            .into_iter()
            .filter_map(conversation_from_wire)
            .collect())
    }

    async fn create_conversation(&self, request: &NewConversation) -> ChatResult<Conversation> {
        let url = self.endpoint(&["conversations"])?;
        let body = self.post_json(url, request).await?;
        let record = unwrap_record(body, "conversation")?;
        conversation_from_wire(record)
            .ok_or_else(|| ChatError::UnexpectedShape("conversation record missing id".to_owned()))
    }

    async fn list_messages(&self, conversation: &ConversationId) -> ChatResult<Vec<Message>> {
        let url = self.endpoint(&["conversations", conversation.as_str(), "messages"])?;
        let body = self.get_json(url).await?;
        let items = unwrap_collection(body, "messages")?;
        Ok(items
            .into_iter()
            .filter_map(|item| message_from_wire(item, conversation))
            .collect())
    }

    async fn send_message(
        &self,
        conversation: &ConversationId,
        payload: &OutboundMessage,
    ) -> ChatResult<Message> {
        let url = self.endpoint(&["conversations", conversation.as_str(), "messages"])?;
        let body = self.post_json(url, payload).await?;
        let record = unwrap_record(body, "message")?;
        message_from_wire(record, conversation)
            .ok_or_else(|| ChatError::UnexpectedShape("message record missing id".to_owned()))
    }

    async fn mark_read(&self, message: &MessageId) -> ChatResult<()> {
        let Some(remote) = message.as_remote() else {
            return Err(ChatError::UnknownMessage(message.to_string()));
        };
        let url = self.endpoint(&["messages", remote, "read"])?;
        self.post_json(url, &serde_json::json!({})).await?;
        Ok(())
    }
}

// ===== Envelope handling ====================================================

/// Unwrap a collection response: a bare array, `{data: ...}`, or an object
/// keyed by the collection name (possibly nested, as in
/// `{data: {messages: [...]}}`).
fn unwrap_collection(body: Value, key: &str) -> ChatResult<Vec<Value>> {
    match body {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => {
            if let Some(inner) = map.remove(key) {
                return unwrap_collection(inner, key);
            }
            if let Some(inner) = map.remove("data") {
                return unwrap_collection(inner, key);
            }
            Err(ChatError::UnexpectedShape(format!(
                "expected an array or an envelope holding `{key}`"
            )))
        }
        other => Err(ChatError::UnexpectedShape(format!(
            "expected an array for `{key}`, got {other}"
        ))),
    }
}

/// Unwrap a single-record response: the record itself (detected by the
/// presence of an id) or an envelope keyed by `data` or the record name.
fn unwrap_record(body: Value, key: &str) -> ChatResult<Value> {
    match body {
        Value::Object(mut map) => {
            if map.contains_key("id") || map.contains_key("_id") {
                return Ok(Value::Object(map));
            }
            if let Some(inner) = map.remove(key) {
                return unwrap_record(inner, key);
            }
            if let Some(inner) = map.remove("data") {
                return unwrap_record(inner, key);
            }
            Err(ChatError::UnexpectedShape(format!(
                "expected a `{key}` record with an id"
            )))
        }
        other => Err(ChatError::UnexpectedShape(format!(
            "expected a `{key}` record, got {other}"
        ))),
    }
}

// ===== Wire records =========================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConversation {
    #[serde(alias = "_id")]
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default, alias = "counterpart_name", alias = "participantName")]
    counterpart_name: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    priority: Option<String>,
    #[serde(
        default,
        alias = "last_message",
        alias = "lastMessagePreview",
        alias = "last_message_preview"
    )]
    last_message: Option<Value>,
    #[serde(
        default,
        alias = "last_activity_at",
        alias = "updatedAt",
        alias = "updated_at"
    )]
    last_activity_at: Option<Value>,
    #[serde(default, alias = "unread_count", alias = "unread")]
    unread_count: u32,
    #[serde(default, alias = "linked_ticket", alias = "ticket")]
    linked_ticket: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMessage {
    #[serde(alias = "_id")]
    id: String,
    #[serde(default)]
    sender: Option<Value>,
    #[serde(default, alias = "sender_role")]
    sender_role: Option<String>,
    #[serde(default, alias = "text", alias = "body")]
    content: String,
    #[serde(default, alias = "created_at", alias = "timestamp", alias = "sentAt")]
    created_at: Option<Value>,
    #[serde(default)]
    attachments: Vec<Value>,
}

// ===== Normalization ========================================================

fn conversation_from_wire(value: Value) -> Option<Conversation> {
    let raw: RawConversation = match serde_json::from_value(value) {
        Ok(raw) => raw,
        Err(err) => {
            warn!(%err, "skipping malformed conversation record");
            return None;
        }
    };

    Some(Conversation {
        id: ConversationId::new(raw.id),
        title: raw.title.filter(|t| !t.trim().is_empty()),
        counterpart_name: raw.counterpart_name.filter(|n| !n.trim().is_empty()),
        status: raw.status.as_deref().map(parse_status).unwrap_or_default(),
        priority: raw
            .priority
            .as_deref()
            .map(parse_priority)
            .unwrap_or_default(),
        last_message_preview: raw.last_message.as_ref().and_then(extract_preview),
        last_activity_at: raw.last_activity_at.as_ref().and_then(parse_timestamp),
        unread_count: raw.unread_count,
        linked_ticket: raw.linked_ticket.and_then(extract_ticket),
    })
}

fn message_from_wire(value: Value, conversation: &ConversationId) -> Option<Message> {
    let raw: RawMessage = match serde_json::from_value(value) {
        Ok(raw) => raw,
        Err(err) => {
            warn!(%err, conversation = %conversation, "skipping malformed message record");
            return None;
        }
    };

    let role = raw
        .sender
        .as_ref()
        .and_then(extract_sender_role)
        .or(raw.sender_role)
        .map_or(SenderRole::System, |s| parse_role(&s));

    Some(Message {
        id: MessageId::remote(raw.id),
        conversation_id: conversation.clone(),
        sender_role: role,
        content: raw.content,
        attachments: raw
            .attachments
            .into_iter()
            .filter_map(extract_attachment)
            .collect(),
        created_at: raw
            .created_at
            .as_ref()
            .and_then(parse_timestamp)
            .unwrap_or_else(Utc::now),
        delivery_state: DeliveryState::Confirmed,
    })
}

fn parse_status(raw: &str) -> ConversationStatus {
    match raw.to_ascii_lowercase().as_str() {
        "waiting" | "pending" => ConversationStatus::Waiting,
        "resolved" | "closed" => ConversationStatus::Resolved,
        _ => ConversationStatus::Active,
    }
}

fn parse_priority(raw: &str) -> Priority {
    match raw.to_ascii_lowercase().as_str() {
        "low" => Priority::Low,
        "high" | "urgent" => Priority::High,
        _ => Priority::Medium,
    }
}

fn parse_role(raw: &str) -> SenderRole {
    match raw.to_ascii_lowercase().as_str() {
        "client" | "user" | "buyer" | "customer" => SenderRole::Client,
        "agent" | "admin" | "support" | "staff" => SenderRole::Agent,
        _ => SenderRole::System,
    }
}

/// Pull a role string out of a `sender` field that may be a bare role
/// string or an object carrying `role`.
fn extract_sender_role(sender: &Value) -> Option<String> {
    match sender {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map
            .get("role")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned),
        _ => None,
    }
}

/// Pull preview text out of a `lastMessage` field that may be a bare string
/// or a message object.
fn extract_preview(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Object(map) => map
            .get("content")
            .or_else(|| map.get("text"))
            .and_then(Value::as_str)
            .map(ToOwned::to_owned),
        _ => None,
    }
}

/// Accept RFC 3339 strings as well as epoch seconds/milliseconds.
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => {
            let raw = n.as_i64()?;
            if raw >= 100_000_000_000 {
                DateTime::from_timestamp_millis(raw)
            } else {
                DateTime::from_timestamp(raw, 0)
            }
        }
        _ => None,
    }
}

fn extract_ticket(value: Value) -> Option<TicketRef> {
    match &value {
        Value::String(id) if !id.is_empty() => Some(TicketRef {
            id: id.clone(),
            metadata: Value::Null,
        }),
        Value::Object(map) => {
            let id = map
                .get("id")
                .or_else(|| map.get("_id"))
                .or_else(|| map.get("ticketId"))
                .and_then(Value::as_str)?
                .to_owned();
            Some(TicketRef {
                id,
                metadata: value,
            })
        }
        _ => None,
    }
}

fn extract_attachment(value: Value) -> Option<AttachmentRef> {
    match value {
        Value::String(url) if !url.is_empty() => {
            let name = url.rsplit('/').next().unwrap_or("attachment").to_owned();
            Some(AttachmentRef::new(name, url))
        }
        Value::Object(map) => {
            let url = map
                .get("url")
                .or_else(|| map.get("path"))
                .and_then(Value::as_str)?
                .to_owned();
            let name = map
                .get("name")
                .or_else(|| map.get("filename"))
                .or_else(|| map.get("originalName"))
                .and_then(Value::as_str)
                .unwrap_or("attachment")
                .to_owned();
            Some(AttachmentRef {
                name,
                url,
                mime: map
                    .get("mime")
                    .or_else(|| map.get("contentType"))
                    .and_then(Value::as_str)
                    .map(ToOwned::to_owned),
                size: map.get("size").and_then(Value::as_u64),
            })
        }
        _ => None,
    }
}
