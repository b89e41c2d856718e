//! Cross-store writes for media-backed entities.
//!
//! Albums and songs live as a relational row plus one or two bucket blobs, and the two
//! stores share no transaction. Each operation here records the blobs it creates in a
//! [`CompensationLog`] and drains that log on every failure path, so a failed call never
//! leaves an orphaned blob and a committed row never points at a missing one.

mod album;
mod blobs;
mod compensation;
mod error;
pub mod like;
mod policy;
mod song;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use common::retry::RetryPolicy;
use common::storage::BlobStore;
use sea_orm::{
    DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait, SqlErr, TransactionTrait,
};
use tracing::{Instrument, warn};

use crate::entity::user;

pub use album::{AlbumChanges, NewAlbum};
pub use compensation::CompensationLog;
pub use error::{CoordinatorError, UpstreamError};
pub use like::{LikeOutcome, LikeToggle};
pub use policy::{MediaPolicy, SlotPolicy};
pub use song::{NewSong, SongChanges, SongUploads};

/// Bucket folders, one per blob slot.
pub mod folders {
    pub const ALBUM_COVER: &str = "album_cover";
    pub const SONG_COVER: &str = "song_cover";
    pub const SONG_FILE: &str = "song_file";
}

/// Where an invocation was when it stopped.
///
/// `Validating` failures go straight to `Failed` with no side effects. Failures in
/// `Uploading` or `Persisting` pass through `CompensatingAndFailed` first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Validating,
    Uploading,
    Persisting,
    Committed,
    CompensatingAndFailed,
    Failed,
}

/// An uploaded file that has not been validated or stored yet.
#[derive(Debug, Clone)]
pub struct BlobInput {
    pub content_type: String,
    pub data: Bytes,
}

impl BlobInput {
    pub fn new(content_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            content_type: content_type.into(),
            data: data.into(),
        }
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    /// Bound on each blob call, independent of the database's own timeouts.
    pub blob_timeout: Duration,
    /// Retry schedule for compensating and destructive deletes.
    pub delete_retry: RetryPolicy,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            blob_timeout: Duration::from_secs(30),
            delete_retry: RetryPolicy::default(),
        }
    }
}

/// Orchestrates album and song writes across the record store and the blob store.
///
/// Both stores are injected; the coordinator holds no other state and is cheap to clone.
#[derive(Clone)]
pub struct MediaCoordinator {
    db: DatabaseConnection,
    blobs: Arc<dyn BlobStore>,
    policy: Arc<MediaPolicy>,
    settings: CoordinatorSettings,
}

impl MediaCoordinator {
    pub fn new(
        db: DatabaseConnection,
        blobs: Arc<dyn BlobStore>,
        policy: MediaPolicy,
        settings: CoordinatorSettings,
    ) -> Self {
        Self {
            db,
            blobs,
            policy: Arc::new(policy),
            settings,
        }
    }

    async fn require_owner(&self, owner_id: i32) -> Result<user::Model, CoordinatorError> {
        user::Entity::find_by_id(owner_id)
            .one(&self.db)
            .await
            .map_err(|e| CoordinatorError::record(Phase::Validating, "load owner", e))?
            .ok_or_else(|| CoordinatorError::NotFound(format!("User {owner_id} not found")))
    }

    async fn begin(&self) -> Result<DatabaseTransaction, CoordinatorError> {
        self.db
            .begin()
            .await
            .map_err(|e| CoordinatorError::record(Phase::Persisting, "begin transaction", e))
    }
}

/// Run a whole operation on its own task.
///
/// A caller that stops waiting does not stop the operation: it still reaches either a
/// commit or a fully compensated failure, and a delete is never cut off between its
/// blob removals and its commit.
async fn detached<T, F>(context: &'static str, op: F) -> Result<T, CoordinatorError>
where
    T: Send + 'static,
    F: Future<Output = Result<T, CoordinatorError>> + Send + 'static,
{
    tokio::spawn(op.in_current_span())
        .await
        .map_err(|e| CoordinatorError::Upstream {
            phase: Phase::Failed,
            context: context.into(),
            source: UpstreamError::Task(e),
        })?
}

/// Commit on success, roll back on failure.
///
/// Rollback always runs before the error is handed back, so compensation only ever
/// starts once the row changes are gone.
async fn settle<T>(
    txn: DatabaseTransaction,
    outcome: Result<T, CoordinatorError>,
    context: &str,
) -> Result<T, CoordinatorError> {
    match outcome {
        Ok(value) => {
            txn.commit().await.map_err(|e| {
                CoordinatorError::record(Phase::Persisting, format!("commit {context}"), e)
            })?;
            Ok(value)
        }
        Err(e) => {
            rollback(txn).await;
            Err(e)
        }
    }
}

async fn rollback(txn: DatabaseTransaction) {
    if let Err(e) = txn.rollback().await {
        warn!(error = %e, "Transaction rollback failed");
    }
}

/// Map a write failure, turning constraint violations into client errors.
fn write_error(err: DbErr, conflict: &str, context: &str) -> CoordinatorError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => CoordinatorError::Conflict(conflict.into()),
        Some(SqlErr::ForeignKeyConstraintViolation(_)) => {
            CoordinatorError::NotFound(format!("{context}: a referenced row no longer exists"))
        }
        _ => CoordinatorError::record(Phase::Persisting, context, err),
    }
}

/// Trim and length-check a display name.
fn validate_name(name: &str) -> Result<String, CoordinatorError> {
    let name = name.trim();
    let len = name.chars().count();
    if !(3..=256).contains(&len) {
        return Err(CoordinatorError::validation(
            "name",
            "Name must be 3-256 characters",
        ));
    }
    Ok(name.to_string())
}

fn ensure_owner(entity: &str, singer_id: i32, caller_id: i32) -> Result<(), CoordinatorError> {
    if singer_id != caller_id {
        return Err(CoordinatorError::Forbidden(format!(
            "Cannot modify another user's {entity}"
        )));
    }
    Ok(())
}
