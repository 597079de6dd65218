//! Session façade: the surface the UI layer consumes.
//!
//! A [`ChatSession`] owns the conversation store, the message sync engine,
//! the outbound queue, the read-receipt tracker and the attachment staging
//! buffer, and exposes snapshots plus the actions the chat surfaces need.
//! A `watch` channel carries the last failed operation as a non-blocking
//! status signal; transient failures leave prior state untouched and
//! self-heal on the next poll tick.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info};

use crate::auth::{AuthProvider, LocalIdentity};
use crate::config::ChatConfig;
use crate::error::{ChatError, ChatResult};
use crate::ids::{ConversationId, MessageId};
use crate::outbox::OutboundQueue;
use crate::receipts::ReadReceiptTracker;
use crate::staging::AttachmentStaging;
use crate::store::ConversationStore;
use crate::sync::MessageSyncEngine;
use crate::transport::{ChatTransport, HttpTransport};
use crate::types::{AttachmentRef, Conversation, Message, NewConversation, TicketHint};

/// Non-blocking sync status surfaced to the UI.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SyncStatus {
    /// Everything up to date (or recovering silently).
    #[default]
    Idle,
    /// The last operation failed; prior state is still shown.
    Degraded {
        /// Which operation failed.
        operation: String,
        /// Human-readable failure detail.
        detail: String,
    },
}

/// The chat synchronization core behind one chat surface.
pub struct ChatSession {
    config: ChatConfig,
    identity: LocalIdentity,
    transport: Arc<dyn ChatTransport>,
    store: Arc<ConversationStore>,
    sync: Arc<MessageSyncEngine>,
    staging: Arc<AttachmentStaging>,
    outbox: OutboundQueue,
    receipts: ReadReceiptTracker,
    status: watch::Sender<SyncStatus>,
}

impl ChatSession {
    /// Build a session over an injected transport.
    #[must_use]
    pub fn new(
        config: ChatConfig,
        transport: Arc<dyn ChatTransport>,
        identity: LocalIdentity,
    ) -> Arc<Self> {
        let store = Arc::new(ConversationStore::new());
        let sync = Arc::new(MessageSyncEngine::new());
        let staging = Arc::new(AttachmentStaging::new());
        let outbox = OutboundQueue::new(
            Arc::clone(&transport),
            Arc::clone(&sync),
            Arc::clone(&store),
            Arc::clone(&staging),
            identity.role,
        );
        let receipts = ReadReceiptTracker::new(Arc::clone(&transport), config.acked_capacity);
        let (status, _) = watch::channel(SyncStatus::Idle);

        Arc::new(Self {
            config,
            identity,
            transport,
            store,
            sync,
            staging,
            outbox,
            receipts,
            status,
        })
    }

    /// Build a session over HTTP using the external auth collaborator.
    ///
    /// # Errors
    /// Returns an error if the config is invalid or the HTTP client cannot
    /// be constructed.
    pub fn connect(config: ChatConfig, auth: Arc<dyn AuthProvider>) -> ChatResult<Arc<Self>> {
        let identity = auth.identity();
        let transport = Arc::new(HttpTransport::new(&config, auth)?);
        Ok(Self::new(config, transport, identity))
    }

    /// Initial load. With a ticket hint, ensures a conversation for that
    /// ticket exists (creating one before the first refresh completes if
    /// necessary) and selects it.
    ///
    /// # Errors
    /// Returns an error if the initial list fetch or the conversation
    /// creation fails; creation failures are not retried automatically.
    pub async fn bootstrap(&self, hint: Option<TicketHint>) -> ChatResult<()> {
        let list = match self.transport.list_conversations().await {
            Ok(list) => list,
            Err(err) => return Err(self.degrade("list_conversations", err)),
        };

        if let Some(hint) = hint {
            let existing = list
                .iter()
                .find(|c| {
                    c.linked_ticket
                        .as_ref()
                        .is_some_and(|t| t.id == hint.ticket.id)
                })
                .map(|c| c.id.clone());

            match existing {
                Some(id) => {
                    self.store.merge_remote(list).await;
                    self.store.select(id).await;
                }
                None => {
                    let mut request = NewConversation::support()
                        .with_metadata(serde_json::json!({ "ticket": hint.ticket }));
                    if let Some(title) = hint.title {
                        request = request.with_title(title);
                    }
                    let created = match self.transport.create_conversation(&request).await {
                        Ok(created) => created,
                        Err(err) => return Err(self.degrade("create_conversation", err)),
                    };
                    info!(conversation = %created.id, "created conversation for incoming ticket");
                    self.store.merge_remote(list).await;
                    let id = created.id.clone();
                    self.store.upsert(created).await;
                    self.store.select(id).await;
                }
            }
        } else {
            self.store.merge_remote(list).await;
        }

        self.refresh_active().await?;
        self.clear_status();
        Ok(())
    }

    /// One poll tick: refresh the conversation list, then the active
    /// conversation's messages, then run read-receipt inspection.
    ///
    /// # Errors
    /// Returns the underlying failure; prior state is retained and the next
    /// scheduled tick serves as the retry.
    pub async fn refresh(&self) -> ChatResult<()> {
        match self.transport.list_conversations().await {
            Ok(list) => self.store.merge_remote(list).await,
            Err(err) => return Err(self.degrade("list_conversations", err)),
        }

        self.refresh_active().await?;
        self.clear_status();
        Ok(())
    }

    /// Change the active conversation and fetch its messages immediately.
    /// The previous conversation's in-flight fetch, if any, merges into its
    /// own thread and never into the new view.
    ///
    /// # Errors
    /// Returns an error if the immediate fetch fails; the selection sticks
    /// and the next tick retries.
    pub async fn select(&self, id: ConversationId) -> ChatResult<()> {
        if self.store.select(id).await {
            debug!("conversation switched; fetching its thread");
        }
        self.refresh_active().await
    }

    /// Send a message in the active conversation.
    ///
    /// # Errors
    /// Returns [`ChatError::NoActiveConversation`] without a selection, or
    /// the transport failure (the optimistic echo stays visible as failed).
    pub async fn send(&self, content: impl Into<String> + Send) -> ChatResult<MessageId> {
        let active = self
            .store
            .selected()
            .await
            .ok_or(ChatError::NoActiveConversation)?;
        self.outbox
            .send(&active, content)
            .await
            .map_err(|err| self.degrade("send_message", err))
    }

    /// Retry a failed send in the active conversation.
    ///
    /// # Errors
    /// Returns an error if there is no selection, the id does not name a
    /// failed message, or the transport fails again.
    pub async fn retry(&self, id: &MessageId) -> ChatResult<MessageId> {
        let active = self
            .store
            .selected()
            .await
            .ok_or(ChatError::NoActiveConversation)?;
        self.outbox
            .retry(&active, id)
            .await
            .map_err(|err| self.degrade("send_message", err))
    }

    /// Discard a failed send from the active conversation's view.
    pub async fn discard_failed(&self, id: &MessageId) -> bool {
        match self.store.selected().await {
            Some(active) => self.outbox.discard(&active, id),
            None => false,
        }
    }

    /// Stage attachment references for the next send, replacing any
    /// previously staged set.
    pub async fn stage_attachments(&self, files: Vec<AttachmentRef>) {
        self.staging.stage(files).await;
    }

    /// Drop all staged attachments.
    pub async fn clear_attachments(&self) {
        self.staging.clear().await;
    }

    /// Conversation list snapshot, in backend order.
    pub async fn conversations(&self) -> Vec<Conversation> {
        self.store.snapshot().await
    }

    /// The active conversation, if any.
    pub async fn active_conversation(&self) -> Option<Conversation> {
        match self.store.selected().await {
            Some(id) => self.store.get(&id).await,
            None => None,
        }
    }

    /// Merged message view of the active conversation, in render order.
    pub async fn active_messages(&self) -> Vec<Message> {
        match self.store.selected().await {
            Some(id) => self.sync.thread(&id),
            None => Vec::new(),
        }
    }

    /// Display label for a conversation, with the configured fallback.
    #[must_use]
    pub fn display_label(&self, conversation: &Conversation) -> String {
        conversation.display_label(&self.config.fallback_label)
    }

    /// Subscribe to the sync status signal.
    #[must_use]
    pub fn status_signal(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    /// Current sync status.
    #[must_use]
    pub fn status(&self) -> SyncStatus {
        self.status.borrow().clone()
    }

    async fn refresh_active(&self) -> ChatResult<()> {
        let Some(active) = self.store.selected().await else {
            return Ok(());
        };

        let messages = match self.transport.list_messages(&active).await {
            Ok(messages) => messages,
            Err(err) => return Err(self.degrade("list_messages", err)),
        };

        let merged = self.sync.merge_remote(&active, messages);
        if self
            .receipts
            .observe(&merged, self.identity.role)
            .await
            .is_some()
        {
            self.store.clear_unread(&active).await;
        }
        Ok(())
    }

    /// Record a failed operation on the status signal and hand the error
    /// back to the caller.
    fn degrade(&self, operation: &str, err: ChatError) -> ChatError {
        self.status.send_replace(SyncStatus::Degraded {
            operation: operation.to_owned(),
            detail: err.to_string(),
        });
        err
    }

    fn clear_status(&self) {
        let degraded = *self.status.borrow() != SyncStatus::Idle;
        if degraded {
            self.status.send_replace(SyncStatus::Idle);
        }
    }
}
