//! Canonical data model shared by the sync components.
//!
//! Everything here is already normalized: backend field-naming variance is
//! resolved at the transport boundary, so stores and engines can rely on
//! these shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{ConversationId, MessageId};

/// Lifecycle status of a conversation.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    /// Conversation is open and being handled.
    #[default]
    Active,
    /// Waiting on a reply.
    Waiting,
    /// Closed out.
    Resolved,
}

/// Display priority of a conversation. Not ordering-significant for sync.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Low priority.
    Low,
    /// Medium priority (default).
    #[default]
    Medium,
    /// High priority.
    High,
}

/// Role of a message author.
///
/// The core compares this against the local actor's role to exclude
/// self-authored messages from read-receipt consideration; the UI uses it
/// for alignment and styling.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderRole {
    /// Marketplace customer.
    Client,
    /// Support or admin agent.
    Agent,
    /// Automated or unattributed sender.
    System,
}

/// Delivery lifecycle of a message in the local view.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryState {
    /// Optimistic echo awaiting the server record.
    Pending,
    /// Confirmed by the backend.
    #[default]
    Confirmed,
    /// Send failed; retained for retry or discard.
    Failed,
}

/// Opaque external-ticket reference carried on a conversation.
///
/// Never interpreted by the core beyond id equality.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TicketRef {
    /// Ticket identifier.
    pub id: String,
    /// Free-form ticket metadata, passed through untouched.
    #[serde(default)]
    pub metadata: Value,
}

/// Startup hint naming an incoming ticket the session should open a
/// conversation for if none exists yet.
#[derive(Clone, Debug)]
pub struct TicketHint {
    /// The ticket to look for (or attach to a created conversation).
    pub ticket: TicketRef,
    /// Optional title for a conversation created from this hint.
    pub title: Option<String>,
}

/// A conversation as held by the [`crate::store::ConversationStore`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Conversation {
    /// Backend-assigned identifier.
    pub id: ConversationId,
    /// Display title, if the backend set one.
    pub title: Option<String>,
    /// Counterpart display name, if known.
    pub counterpart_name: Option<String>,
    /// Lifecycle status.
    pub status: ConversationStatus,
    /// Display priority.
    pub priority: Priority,
    /// Preview of the most recent message.
    pub last_message_preview: Option<String>,
    /// Timestamp of the most recent activity.
    pub last_activity_at: Option<DateTime<Utc>>,
    /// Number of unread inbound messages.
    pub unread_count: u32,
    /// Linked external ticket, passed through opaquely.
    pub linked_ticket: Option<TicketRef>,
}

impl Conversation {
    /// Display label: title, then counterpart name, then the fallback.
    #[must_use]
    pub fn display_label(&self, fallback: &str) -> String {
        self.title
            .as_deref()
            .or(self.counterpart_name.as_deref())
            .unwrap_or(fallback)
            .to_owned()
    }

    /// Record a local send: bump preview and activity timestamp.
    pub(crate) fn note_local_send(&mut self, preview: &str, at: DateTime<Utc>) {
        self.last_message_preview = Some(preview.to_owned());
        self.last_activity_at = Some(at);
    }
}

/// Reference to an uploaded attachment.
///
/// Upload storage is an external collaborator; the core only carries
/// references and attaches them to outbound payloads.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef {
    /// Display file name.
    pub name: String,
    /// Storage URL or path reference.
    pub url: String,
    /// MIME type, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime: Option<String>,
    /// Size in bytes, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl AttachmentRef {
    /// Build a reference from a name and storage URL.
    #[must_use]
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            mime: None,
            size: None,
        }
    }
}

/// A message in a conversation's merged view.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    /// Remote or provisional identifier.
    pub id: MessageId,
    /// Owning conversation.
    pub conversation_id: ConversationId,
    /// Author role.
    pub sender_role: SenderRole,
    /// Text payload.
    pub content: String,
    /// Attachment references, possibly empty.
    pub attachments: Vec<AttachmentRef>,
    /// Creation timestamp; source of truth for render order.
    pub created_at: DateTime<Utc>,
    /// Delivery lifecycle in the local view.
    pub delivery_state: DeliveryState,
}

impl Message {
    /// Whether this message was authored by the counterpart (or the system),
    /// i.e. is eligible for read-receipt consideration.
    #[must_use]
    pub fn is_inbound(&self, local_role: SenderRole) -> bool {
        self.sender_role != local_role
    }
}

/// Request payload for creating a conversation.
#[derive(Clone, Debug, Serialize)]
pub struct NewConversation {
    /// Conversation kind understood by the backend.
    #[serde(rename = "type")]
    pub kind: String,
    /// Optional title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Participant identifiers, if the caller pre-selects them.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub participants: Vec<String>,
    /// Free-form metadata (ticket context and the like).
    #[serde(skip_serializing_if = "Value::is_null")]
    pub metadata: Value,
}

impl NewConversation {
    /// A support conversation with no extra context.
    #[must_use]
    pub fn support() -> Self {
        Self {
            kind: "support".to_owned(),
            title: None,
            participants: Vec::new(),
            metadata: Value::Null,
        }
    }

    /// Set the title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Attach free-form metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Outbound message payload handed to the transport.
#[derive(Clone, Debug, Serialize)]
pub struct OutboundMessage {
    /// Text payload.
    pub content: String,
    /// Message kind understood by the backend.
    #[serde(rename = "type")]
    pub kind: String,
    /// Attachment references staged for this send.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<AttachmentRef>,
}

impl OutboundMessage {
    /// A plain text message.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            kind: "text".to_owned(),
            attachments: Vec::new(),
        }
    }

    /// Attach staged references.
    #[must_use]
    pub fn with_attachments(mut self, attachments: Vec<AttachmentRef>) -> Self {
        self.attachments = attachments;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conversation(id: &str) -> Conversation {
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

    #[test]
    fn test_display_label_fallback_chain() {
        let mut conv = conversation("c1");
        assert_eq!(conv.display_label("Support"), "Support");

        conv.counterpart_name = Some("Ferme du Vallon".to_owned());
        assert_eq!(conv.display_label("Support"), "Ferme du Vallon");

        conv.title = Some("Order #1042".to_owned());
        assert_eq!(conv.display_label("Support"), "Order #1042");
    }

    #[test]
    fn test_inbound_excludes_own_role() {
        let msg = Message {
            id: MessageId::remote("m1"),
            conversation_id: ConversationId::new("c1"),
            sender_role: SenderRole::Agent,
            content: "hello".to_owned(),
            attachments: Vec::new(),
            created_at: Utc::now(),
            delivery_state: DeliveryState::Confirmed,
        };

        assert!(msg.is_inbound(SenderRole::Client));
        assert!(!msg.is_inbound(SenderRole::Agent));
    }

    #[test]
    fn test_outbound_payload_shape() {
        let payload = OutboundMessage::text("Bonjour")
            .with_attachments(vec![AttachmentRef::new("a.png", "/uploads/a.png")]);
        let json = serde_json::to_value(&payload).unwrap_or_default();

        assert_eq!(json["content"], "Bonjour");
        assert_eq!(json["type"], "text");
        assert_eq!(json["attachments"][0]["name"], "a.png");
    }

    #[test]
    fn test_new_conversation_omits_empty_fields() {
        let json = serde_json::to_value(NewConversation::support()).unwrap_or_default();
        assert_eq!(json["type"], "support");
        assert!(json.get("title").is_none());
        assert!(json.get("participants").is_none());
        assert!(json.get("metadata").is_none());
    }
}
