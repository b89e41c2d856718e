use std::time::Duration;

use common::retry::{retry, RetryPolicy};
use common::storage::{BlobRef, BlobStore, StorageError};
use tracing::{debug, error};

/// Blobs created by the current invocation that no committed row references yet.
#[derive(Debug, Default)]
pub struct CompensationLog {
    created: Vec<BlobRef>,
}

impl CompensationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, blob: BlobRef) {
        self.created.push(blob);
    }

    pub fn len(&self) -> usize {
        self.created.len()
    }

    pub fn is_empty(&self) -> bool {
        self.created.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.created.iter().map(|b| b.key.as_str())
    }

    /// The owning row committed: every recorded blob is now referenced and must stay.
    pub fn commit(self) -> Vec<BlobRef> {
        self.created
    }

    /// Delete every recorded blob, retrying each one under `policy`.
    ///
    /// Returns the keys that could not be removed. A blob that is already gone counts
    /// as removed.
    pub async fn drain(
        self,
        store: &dyn BlobStore,
        policy: &RetryPolicy,
        timeout: Duration,
    ) -> Vec<String> {
        let mut leaked = Vec::new();
        for blob in self.created {
            let key = blob.key.as_str();
            let result = retry(policy, "compensating blob delete", move |_| async move {
                match tokio::time::timeout(timeout, store.delete(key)).await {
                    Ok(result) => result,
                    Err(_) => Err(StorageError::Timeout(timeout)),
                }
            })
            .await;

            match result {
                Ok(existed) => debug!(key, existed, "Compensated blob"),
                Err(e) => {
                    error!(key, error = %e, "Compensating delete failed, blob is orphaned");
                    leaked.push(blob.key.clone());
                }
            }
        }
        leaked
    }
}
