//! The storage-layer error taxonomy (spec §7).
//!
//! Every `taskcore-db` query returns `Result<T, StoreError>` so callers in
//! `taskcore-core` can distinguish recoverable conditions
//! (`SerializationConflict`) from caller bugs (`InvalidTransition`,
//! `InvalidArgument`) from missing rows (`NotFound`) without downcasting an
//! opaque `anyhow::Error`.

use uuid::Uuid;

use crate::models::TaskStatus;

/// Errors surfaced by the task store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("task {id} not found")]
    NotFound { id: Uuid },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid state transition: {from} -> {to} for task {id}")]
    InvalidTransition {
        id: Uuid,
        from: TaskStatus,
        to: TaskStatus,
    },

    #[error("optimistic lock conflict updating task {id}")]
    SerializationConflict { id: Uuid },

    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[from] sqlx::Error),
}

impl StoreError {
    /// True for errors that a caller may retry locally with bounded
    /// backoff (spec §7 propagation policy).
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::SerializationConflict { .. } => true,
            Self::StorageUnavailable(e) => {
                matches!(e, sqlx::Error::PoolTimedOut | sqlx::Error::Io(_))
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
