//! Chat/conversation synchronization core for the FarmLink marketplace.
//!
//! Keeps a conversation list and the active conversation's message thread
//! consistent with a REST backend that is only polled periodically (no push
//! channel), with optimistic local echoes, attachment staging, read-receipt
//! propagation, and safe re-entry when the user switches conversations
//! mid-flight. The UI layer consumes a [`ChatSession`] and drives it with a
//! [`PollScheduler`]; everything else is internal plumbing.

#![deny(unsafe_code)]
#![deny(non_snake_case)]
#![deny(non_camel_case_types)]
#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

/// Seam to the external auth collaborator.
pub mod auth;
/// Session and scheduler configuration.
pub mod config;
/// Error taxonomy.
pub mod error;
/// Typed identifiers.
pub mod ids;
/// Tracing subscriber bootstrap.
pub mod logging;
/// Optimistic send queue.
pub mod outbox;
/// Read-receipt tracker.
pub mod receipts;
/// Poll scheduler.
pub mod scheduler;
/// Session façade consumed by the UI layer.
pub mod session;
/// Attachment staging buffer.
pub mod staging;
/// Conversation store.
pub mod store;
/// Message sync engine.
pub mod sync;
/// Transport boundary to the REST backend.
pub mod transport;
/// Canonical data model.
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use auth::{AuthProvider, LocalIdentity, StaticAuth};
pub use config::ChatConfig;
pub use error::{ChatError, ChatResult};
pub use ids::{ConversationId, MessageId};
pub use scheduler::PollScheduler;
pub use session::{ChatSession, SyncStatus};
pub use transport::{ChatTransport, HttpTransport};
pub use types::{
    AttachmentRef, Conversation, ConversationStatus, DeliveryState, Message, NewConversation,
    OutboundMessage, Priority, SenderRole, TicketHint, TicketRef,
};
