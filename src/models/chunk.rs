//! Represents a single received chunk of an upload session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Metadata for one stored chunk.
///
/// The row set for a session is the completion bitmap: a row exists iff
/// that index has been durably received. Rows are never mutated; the
/// whole set is deleted after merge or on session deletion.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct ChunkRecord {
    /// Parent session.
    pub session_id: Uuid,

    /// 0-based position within the file, `< total_chunks`.
    pub chunk_index: i64,

    /// md5 hex digest of the chunk payload, verified at accept time.
    pub checksum: String,

    /// Payload size in bytes.
    pub size_bytes: i64,

    /// Timestamp when this chunk was accepted.
    pub uploaded_at: DateTime<Utc>,
}
