use common::storage::StorageError;
use sea_orm::DbErr;
use thiserror::Error;
use tokio::task::JoinError;

use super::Phase;

/// I/O failure in one of the two stores.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("blob store: {0}")]
    Blob(#[from] StorageError),

    #[error("record store: {0}")]
    Record(#[from] DbErr),

    /// The task running the operation panicked or was aborted.
    #[error("operation task: {0}")]
    Task(#[from] JoinError),
}

/// Failures surfaced by coordinator operations.
///
/// `ValidationFailed`, `Conflict`, `NotFound` and `Forbidden` are raised before any
/// remote mutation. `Upstream` may follow partial side effects, which have already been
/// compensated by the time the caller sees it.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("invalid {field}: {reason}")]
    ValidationFailed { field: &'static str, reason: String },

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{context} failed while {phase:?}: {source}")]
    Upstream {
        phase: Phase,
        context: String,
        #[source]
        source: UpstreamError,
    },

    /// Compensation could not remove every blob created by the failed call.
    #[error("{source} (compensation left blobs behind: {leaked:?})")]
    CompensationFailed {
        #[source]
        source: Box<CoordinatorError>,
        leaked: Vec<String>,
    },

    /// A delete stopped after destroying some of its targets.
    #[error("partial delete of {entity} {id}: {reason} (removed {removed:?}, failed {failed:?})")]
    PartialDelete {
        entity: &'static str,
        id: i32,
        removed: Vec<String>,
        failed: Vec<String>,
        reason: String,
    },
}

impl CoordinatorError {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::ValidationFailed {
            field,
            reason: reason.into(),
        }
    }

    pub(crate) fn blob(phase: Phase, context: impl Into<String>, err: StorageError) -> Self {
        Self::Upstream {
            phase,
            context: context.into(),
            source: err.into(),
        }
    }

    pub(crate) fn record(phase: Phase, context: impl Into<String>, err: DbErr) -> Self {
        Self::Upstream {
            phase,
            context: context.into(),
            source: err.into(),
        }
    }

    /// The error that started the failure, looking through compensation wrappers.
    pub fn root(&self) -> &CoordinatorError {
        match self {
            Self::CompensationFailed { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether the failure is attributable to the request rather than to a store.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self.root(),
            Self::ValidationFailed { .. } | Self::Conflict(_) | Self::NotFound(_) | Self::Forbidden(_)
        )
    }
}
