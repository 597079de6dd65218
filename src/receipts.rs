//! Read-receipt tracker.
//!
//! After every merge, the tracker looks at the newest inbound message of the
//! merged sequence and acknowledges it at most once per session. Marking the
//! newest is assumed to cover earlier unread messages on the backend side
//! (see DESIGN.md). Failures are logged and retried naturally by a later
//! merge surfacing the same unacknowledged id.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::ids::MessageId;
use crate::transport::ChatTransport;
use crate::types::{Message, SenderRole};

/// Issues at most one read acknowledgement per newly observed inbound
/// message, with a bounded memory of what was already acknowledged.
pub struct ReadReceiptTracker {
    transport: Arc<dyn ChatTransport>,
    acked: Mutex<LruCache<MessageId, ()>>,
}

impl ReadReceiptTracker {
    /// Create a tracker with the given acknowledged-id cache capacity.
    #[must_use]
    pub fn new(transport: Arc<dyn ChatTransport>, acked_capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(acked_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            transport,
            acked: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Inspect a merged message sequence (render order) and acknowledge the
    /// newest inbound message if it has not been acknowledged yet.
    ///
    /// Returns the acknowledged id, or `None` when there was nothing new to
    /// acknowledge or the acknowledgement failed (in which case the next
    /// merge retries).
    pub async fn observe(&self, messages: &[Message], local_role: SenderRole) -> Option<MessageId> {
        let newest_inbound = messages
            .iter()
            .rev()
            .find(|m| m.is_inbound(local_role) && m.id.is_remote())?;

        {
            let acked = self.acked.lock().await;
            if acked.contains(&newest_inbound.id) {
                return None;
            }
        }

        match self.transport.mark_read(&newest_inbound.id).await {
            Ok(()) => {
                debug!(message = %newest_inbound.id, "acknowledged read");
                self.acked
                    .lock()
                    .await
                    .put(newest_inbound.id.clone(), ());
                Some(newest_inbound.id.clone())
            }
            Err(err) => {
                // Not retried this tick; a later merge surfaces the same id.
                warn!(message = %newest_inbound.id, %err, "read acknowledgement failed");
                None
            }
        }
    }
}
