use common::retry::retry;
use common::storage::{generate_key, BlobRef, StorageError};
use sea_orm::DatabaseTransaction;
use tracing::{debug, error, warn};

use super::{
    rollback, BlobInput, CompensationLog, CoordinatorError, MediaCoordinator, Phase,
};

impl MediaCoordinator {
    /// Upload and record in `log` so that any later failure removes it again.
    ///
    /// The key is fixed before the write starts. A write that times out may still land
    /// on the backend, so its key is recorded too and compensation deletes it.
    pub(super) async fn upload_into(
        &self,
        log: &mut CompensationLog,
        owner_id: i32,
        folder: &'static str,
        input: &BlobInput,
    ) -> Result<BlobRef, CoordinatorError> {
        debug!(phase = ?Phase::Uploading, folder, bytes = input.size(), "Uploading blob");
        let context = || format!("upload to {folder}");
        let key = generate_key(owner_id, folder, &input.content_type)
            .map_err(|e| CoordinatorError::blob(Phase::Uploading, context(), e))?;
        let timeout = self.settings.blob_timeout;
        let put = self
            .blobs
            .put(&key, input.data.clone(), &input.content_type);

        let outcome = tokio::time::timeout(timeout, put).await;
        match outcome {
            Ok(Ok(blob)) => {
                log.record(blob.clone());
                Ok(blob)
            }
            Ok(Err(e)) => Err(CoordinatorError::blob(Phase::Uploading, context(), e)),
            Err(_) => {
                warn!(key = %key, "Upload timed out, scheduling its key for cleanup");
                let url = self.blobs.public_url(&key);
                log.record(BlobRef::new(key, url));
                Err(CoordinatorError::blob(
                    Phase::Uploading,
                    context(),
                    StorageError::Timeout(timeout),
                ))
            }
        }
    }

    /// Bounded, retried delete. `Ok(false)` means the blob was already gone.
    pub(super) async fn delete_blob(&self, key: &str) -> Result<bool, StorageError> {
        let store = self.blobs.as_ref();
        let timeout = self.settings.blob_timeout;
        retry(&self.settings.delete_retry, "blob delete", move |_| async move {
            match tokio::time::timeout(timeout, store.delete(key)).await {
                Ok(result) => result,
                Err(_) => Err(StorageError::Timeout(timeout)),
            }
        })
        .await
    }

    /// Drain `log` after a failure and fold any leaked keys into the returned error.
    pub(super) async fn compensate(
        &self,
        log: CompensationLog,
        cause: CoordinatorError,
    ) -> CoordinatorError {
        if log.is_empty() {
            debug!(phase = ?Phase::Failed, error = %cause, "Operation failed before any upload");
            return cause;
        }

        warn!(
            phase = ?Phase::CompensatingAndFailed,
            blobs = log.len(),
            error = %cause,
            "Compensating uploaded blobs"
        );
        let leaked = log
            .drain(
                self.blobs.as_ref(),
                &self.settings.delete_retry,
                self.settings.blob_timeout,
            )
            .await;
        if leaked.is_empty() {
            cause
        } else {
            CoordinatorError::CompensationFailed {
                source: Box::new(cause),
                leaked,
            }
        }
    }

    /// Delete blobs the change staged in `txn` stops referencing, then commit.
    ///
    /// Used by deletes and by updates that replace a blob. The first blob failure rolls
    /// the row back. It is a plain upstream failure if nothing had been removed yet,
    /// otherwise a partial delete.
    pub(super) async fn remove_blobs_and_commit(
        &self,
        txn: DatabaseTransaction,
        entity: &'static str,
        id: i32,
        keys: Vec<String>,
    ) -> Result<(), CoordinatorError> {
        let mut removed: Vec<String> = Vec::with_capacity(keys.len());
        for (idx, key) in keys.iter().enumerate() {
            match self.delete_blob(key).await {
                Ok(existed) => {
                    if !existed {
                        debug!(entity, id, key = %key, "Blob already absent");
                    }
                    removed.push(key.clone());
                }
                Err(e) => {
                    rollback(txn).await;
                    if removed.is_empty() {
                        return Err(CoordinatorError::blob(
                            Phase::Persisting,
                            format!("delete {entity} {id} blobs"),
                            e,
                        ));
                    }
                    let failed = keys[idx..].to_vec();
                    error!(
                        entity,
                        id,
                        ?removed,
                        ?failed,
                        error = %e,
                        "Partial delete: row kept but some of its blobs are gone"
                    );
                    return Err(CoordinatorError::PartialDelete {
                        entity,
                        id,
                        removed,
                        failed,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if let Err(e) = txn.commit().await {
            error!(
                entity,
                id,
                ?removed,
                error = %e,
                "Partial delete: blobs removed but the row change did not commit"
            );
            return Err(CoordinatorError::PartialDelete {
                entity,
                id,
                removed,
                failed: Vec::new(),
                reason: format!("commit failed: {e}"),
            });
        }
        Ok(())
    }
}
