//! Attachment staging buffer.
//!
//! Holds locally selected attachment references until a send picks them up.
//! The buffer is snapshot-read by the send path and cleared only on send
//! success, so a failed send keeps the staged set available for retry.

use tokio::sync::Mutex;

use crate::types::AttachmentRef;

/// Staging buffer for attachment references awaiting a send.
#[derive(Default)]
pub struct AttachmentStaging {
    files: Mutex<Vec<AttachmentRef>>,
}

impl AttachmentStaging {
    /// Create an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the staged set.
    pub async fn stage(&self, files: Vec<AttachmentRef>) {
        *self.files.lock().await = files;
    }

    /// Empty the buffer.
    pub async fn clear(&self) {
        self.files.lock().await.clear();
    }

    /// Snapshot the staged set without consuming it.
    pub async fn snapshot(&self) -> Vec<AttachmentRef> {
        self.files.lock().await.clone()
    }

    /// Number of staged attachments.
    pub async fn len(&self) -> usize {
        self.files.lock().await.len()
    }

    /// Whether nothing is staged.
    pub async fn is_empty(&self) -> bool {
        self.files.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stage_replaces_previous_set() {
        let staging = AttachmentStaging::new();
        staging
            .stage(vec![AttachmentRef::new("a.png", "/uploads/a.png")])
            .await;
        staging
            .stage(vec![AttachmentRef::new("b.png", "/uploads/b.png")])
            .await;

        let staged = staging.snapshot().await;
        assert_eq!(staged.len(), 1);
        assert_eq!(staged[0].name, "b.png");
    }

    #[tokio::test]
    async fn test_snapshot_does_not_consume() {
        let staging = AttachmentStaging::new();
        staging
            .stage(vec![AttachmentRef::new("a.png", "/uploads/a.png")])
            .await;

        let _ = staging.snapshot().await;
        assert_eq!(staging.len().await, 1);

        staging.clear().await;
        assert!(staging.is_empty().await);
    }
}
