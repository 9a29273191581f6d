//! Service layer: the upload engine proper.
//!
//! `UploadCoordinator` is the entry point; it drives the durable
//! `SessionRegistry` (SQLite) and `ChunkStore` (disk), hands completed
//! chunk sets to the `Merger`, and reports lifecycle changes through an
//! injected `ProgressNotifier`.

use crate::models::SessionStatus;
use std::io;
use thiserror::Error;
use uuid::Uuid;

pub mod chunk_store;
pub mod coordinator;
pub mod merger;
pub mod notifier;
pub mod session_locks;
pub mod session_registry;

/// Error taxonomy for the upload engine.
///
/// Validation and ownership errors surface to the caller uncorrected.
/// `Sqlx`/`Io` are the retryable storage failures; chunk accepts are
/// idempotent, so a caller can simply resend after one.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("upload session `{0}` not found")]
    SessionNotFound(Uuid),

    #[error("upload session `{0}` does not belong to the caller")]
    Forbidden(Uuid),

    #[error("chunk index {index} out of range for {total_chunks} chunks")]
    OutOfRange { index: i64, total_chunks: i64 },

    #[error("chunk {index} was already stored with different content")]
    ChecksumConflict { index: i64 },

    #[error("upload session `{0}` is already completed")]
    SessionAlreadyCompleted(Uuid),

    #[error("upload `{id}` is incomplete: {reason}")]
    IncompleteUpload { id: Uuid, reason: String },

    #[error("status transition `{from}` -> `{to}` is not allowed")]
    InvalidTransition {
        from: SessionStatus,
        to: SessionStatus,
    },

    #[error("merge of session `{0}` timed out")]
    MergeTimeout(Uuid),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type UploadResult<T> = Result<T, UploadError>;
