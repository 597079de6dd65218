//! Conversation store: the ordered conversation collection and selection.
//!
//! The backend owns every field of a conversation record, so a refresh is a
//! backend-authoritative replacement in backend order. The only local
//! mutations are the preview bump after a send, unread zeroing after a read
//! acknowledgement, and the upsert of a freshly created conversation that
//! has not appeared in a list response yet.

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use crate::ids::ConversationId;
use crate::types::Conversation;

/// Holds the conversation collection and the active selection.
#[derive(Default)]
pub struct ConversationStore {
    conversations: RwLock<Vec<Conversation>>,
    selected: RwLock<Option<ConversationId>>,
}

impl ConversationStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a refreshed conversation list, keeping the current selection if
    /// the selected conversation is still present and clearing it otherwise.
    ///
    /// Callers keep prior state on fetch failure by simply not calling this.
    pub async fn merge_remote(&self, incoming: Vec<Conversation>) {
        let mut selected = self.selected.write().await;
        if let Some(current) = selected.clone()
            && !incoming.iter().any(|c| c.id == current)
        {
            debug!(conversation = %current, "selected conversation no longer listed; clearing selection");
            *selected = None;
        }
        *self.conversations.write().await = incoming;
    }

    /// Insert a conversation not yet present in the collection (e.g. just
    /// created, before the next list refresh includes it).
    pub async fn upsert(&self, conversation: Conversation) {
        let mut conversations = self.conversations.write().await;
        if let Some(existing) = conversations.iter_mut().find(|c| c.id == conversation.id) {
            *existing = conversation;
        } else {
            conversations.push(conversation);
        }
    }

    /// Change the active conversation. Returns `true` if the selection
    /// actually changed.
    pub async fn select(&self, id: ConversationId) -> bool {
        let mut selected = self.selected.write().await;
        if selected.as_ref() == Some(&id) {
            return false;
        }
        debug!(conversation = %id, "selecting conversation");
        *selected = Some(id);
        true
    }

    /// Clear the active selection.
    pub async fn deselect(&self) {
        *self.selected.write().await = None;
    }

    /// Currently selected conversation id.
    pub async fn selected(&self) -> Option<ConversationId> {
        self.selected.read().await.clone()
    }

    /// Snapshot of the collection in backend order.
    pub async fn snapshot(&self) -> Vec<Conversation> {
        self.conversations.read().await.clone()
    }

    /// Look up one conversation by id.
    pub async fn get(&self, id: &ConversationId) -> Option<Conversation> {
        self.conversations
            .read()
            .await
            .iter()
            .find(|c| &c.id == id)
            .cloned()
    }

    /// Find a conversation by linked-ticket id.
    pub async fn find_by_ticket(&self, ticket_id: &str) -> Option<Conversation> {
        self.conversations
            .read()
            .await
            .iter()
            .find(|c| {
                c.linked_ticket
                    .as_ref()
                    .is_some_and(|t| t.id == ticket_id)
            })
            .cloned()
    }

    /// Bump the preview and activity timestamp after a local send. Kept even
    /// if the send later fails (best-known local state).
    pub async fn note_local_send(
        &self,
        id: &ConversationId,
        preview: &str,
        at: DateTime<Utc>,
    ) {
        if let Some(conversation) = self
            .conversations
            .write()
            .await
            .iter_mut()
            .find(|c| &c.id == id)
        {
            conversation.note_local_send(preview, at);
        }
    }

    /// Zero the unread counter after a successful read acknowledgement.
    pub async fn clear_unread(&self, id: &ConversationId) {
        if let Some(conversation) = self
            .conversations
            .write()
            .await
            .iter_mut()
            .find(|c| &c.id == id)
        {
            conversation.unread_count = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ConversationStatus, Priority, TicketRef};

    fn conversation(id: &str, unread: u32) -> Conversation {
        Conversation {
            id: ConversationId::new(id),
            title: None,
            counterpart_name: None,
            status: ConversationStatus::default(),
            priority: Priority::default(),
            last_message_preview: None,
            last_activity_at: None,
            unread_count: unread,
            linked_ticket: None,
        }
    }

    #[tokio::test]
    async fn test_merge_preserves_selection_when_present() {
        let store = ConversationStore::new();
        store
            .merge_remote(vec![conversation("c1", 0), conversation("c2", 1)])
            .await;
        assert!(store.select(ConversationId::new("c2")).await);

        store
            .merge_remote(vec![conversation("c2", 0), conversation("c3", 0)])
            .await;
        assert_eq!(store.selected().await, Some(ConversationId::new("c2")));
    }

    #[tokio::test]
    async fn test_merge_clears_vanished_selection() {
        let store = ConversationStore::new();
        store.merge_remote(vec![conversation("c1", 0)]).await;
        store.select(ConversationId::new("c1")).await;

        store.merge_remote(vec![conversation("c2", 0)]).await;
        assert_eq!(store.selected().await, None);
    }

    #[tokio::test]
    async fn test_select_is_change_aware() {
        let store = ConversationStore::new();
        assert!(store.select(ConversationId::new("c1")).await);
        assert!(!store.select(ConversationId::new("c1")).await);
        assert!(store.select(ConversationId::new("c2")).await);
    }

    #[tokio::test]
    async fn test_note_local_send_and_clear_unread() {
        let store = ConversationStore::new();
        store.merge_remote(vec![conversation("c1", 3)]).await;

        let id = ConversationId::new("c1");
        store.note_local_send(&id, "Bonjour", Utc::now()).await;
        store.clear_unread(&id).await;

        let conv = store.get(&id).await;
        assert_eq!(
            conv.as_ref().and_then(|c| c.last_message_preview.as_deref()),
            Some("Bonjour")
        );
        assert_eq!(conv.map(|c| c.unread_count), Some(0));
    }

    #[tokio::test]
    async fn test_find_by_ticket() {
        let store = ConversationStore::new();
        let mut conv = conversation("c1", 0);
        conv.linked_ticket = Some(TicketRef {
            id: "t-9".to_owned(),
            metadata: serde_json::Value::Null,
        });
        store.merge_remote(vec![conv]).await;

        assert!(store.find_by_ticket("t-9").await.is_some());
        assert!(store.find_by_ticket("t-0").await.is_none());
    }

    #[tokio::test]
    async fn test_upsert_inserts_then_replaces() {
        let store = ConversationStore::new();
        store.upsert(conversation("c1", 0)).await;
        store.upsert(conversation("c1", 2)).await;

        let all = store.snapshot().await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].unread_count, 2);
    }
}
