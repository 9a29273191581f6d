//! src/services/session_registry.rs
//!
//! SessionRegistry — durable record of upload sessions and their chunk
//! bitmap, backed by SQLite. The chunk row set is the single source of
//! truth for "is this session complete"; `uploaded_chunks` is a cached
//! counter bumped in the same transaction that inserts the chunk row.

use crate::models::{ChunkRecord, SessionStatus, UploadSession};
use crate::services::{UploadError, UploadResult};
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

const SESSION_COLUMNS: &str = "id, owner_id, content_hash, original_name, declared_size, \
     declared_media_type, total_chunks, uploaded_chunks, status, \
     final_object_key, created_at, updated_at";

/// Parameters for a new session row.
#[derive(Clone, Debug)]
pub struct NewSession {
    pub owner_id: String,
    pub content_hash: String,
    pub original_name: String,
    pub declared_size: i64,
    pub declared_media_type: Option<String>,
    pub total_chunks: i64,
}

#[derive(Clone)]
pub struct SessionRegistry {
    /// Shared SQLite pool used for all session and chunk metadata.
    pub db: Arc<SqlitePool>,
}

impl SessionRegistry {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Insert a fresh `pending` session and return the stored row.
    pub async fn insert_session(&self, new: NewSession) -> UploadResult<UploadSession> {
        let now = Utc::now();
        let session = UploadSession {
            id: Uuid::new_v4(),
            owner_id: new.owner_id,
            content_hash: new.content_hash,
            original_name: new.original_name,
            declared_size: new.declared_size,
            declared_media_type: new.declared_media_type,
            total_chunks: new.total_chunks,
            uploaded_chunks: 0,
            status: SessionStatus::Pending,
            final_object_key: None,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO upload_sessions (
                 id, owner_id, content_hash, original_name, declared_size,
                 declared_media_type, total_chunks, uploaded_chunks, status,
                 final_object_key, created_at, updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?, NULL, ?, ?)",
        )
        .bind(session.id)
        .bind(&session.owner_id)
        .bind(&session.content_hash)
        .bind(&session.original_name)
        .bind(session.declared_size)
        .bind(&session.declared_media_type)
        .bind(session.total_chunks)
        .bind(session.status)
        .bind(session.created_at)
        .bind(session.updated_at)
        .execute(&*self.db)
        .await?;

        Ok(session)
    }

    /// Fetch a session by id, or `SessionNotFound`.
    pub async fn fetch_session(&self, id: Uuid) -> UploadResult<UploadSession> {
        sqlx::query_as::<_, UploadSession>(&format!(
            "SELECT {SESSION_COLUMNS} FROM upload_sessions WHERE id = ?"
        ))
        .bind(id)
        .fetch_one(&*self.db)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => UploadError::SessionNotFound(id),
            other => UploadError::Sqlx(other),
        })
    }

    /// Find an open (pending / uploading / paused) session for the owner
    /// and content fingerprint. This is the dedup resume point.
    pub async fn find_resumable(
        &self,
        owner_id: &str,
        content_hash: &str,
    ) -> UploadResult<Option<UploadSession>> {
        let session = sqlx::query_as::<_, UploadSession>(&format!(
            "SELECT {SESSION_COLUMNS} FROM upload_sessions
             WHERE owner_id = ? AND content_hash = ?
               AND status IN ('pending', 'uploading', 'paused')
             ORDER BY created_at ASC LIMIT 1"
        ))
        .bind(owner_id)
        .bind(content_hash)
        .fetch_optional(&*self.db)
        .await?;
        Ok(session)
    }

    /// Find a completed session for the owner and fingerprint. Used by
    /// the explicit existence check a client runs before re-uploading.
    pub async fn find_completed(
        &self,
        owner_id: &str,
        content_hash: &str,
    ) -> UploadResult<Option<UploadSession>> {
        let session = sqlx::query_as::<_, UploadSession>(&format!(
            "SELECT {SESSION_COLUMNS} FROM upload_sessions
             WHERE owner_id = ? AND content_hash = ? AND status = 'completed'
             ORDER BY updated_at DESC LIMIT 1"
        ))
        .bind(owner_id)
        .bind(content_hash)
        .fetch_optional(&*self.db)
        .await?;
        Ok(session)
    }

    /// Look a session up by its published object key. Serving a
    /// published object uses this to recover the declared media type.
    pub async fn find_by_final_key(&self, key: &str) -> UploadResult<Option<UploadSession>> {
        let session = sqlx::query_as::<_, UploadSession>(&format!(
            "SELECT {SESSION_COLUMNS} FROM upload_sessions WHERE final_object_key = ?"
        ))
        .bind(key)
        .fetch_optional(&*self.db)
        .await?;
        Ok(session)
    }

    /// Metadata for one stored chunk, if that index was received.
    pub async fn fetch_chunk(
        &self,
        session_id: Uuid,
        index: i64,
    ) -> UploadResult<Option<ChunkRecord>> {
        let chunk = sqlx::query_as::<_, ChunkRecord>(
            "SELECT session_id, chunk_index, checksum, size_bytes, uploaded_at
             FROM upload_chunks WHERE session_id = ? AND chunk_index = ?",
        )
        .bind(session_id)
        .bind(index)
        .fetch_optional(&*self.db)
        .await?;
        Ok(chunk)
    }

    /// All stored chunk rows for a session in index order.
    pub async fn list_chunks(&self, session_id: Uuid) -> UploadResult<Vec<ChunkRecord>> {
        let chunks = sqlx::query_as::<_, ChunkRecord>(
            "SELECT session_id, chunk_index, checksum, size_bytes, uploaded_at
             FROM upload_chunks WHERE session_id = ?
             ORDER BY chunk_index ASC",
        )
        .bind(session_id)
        .fetch_all(&*self.db)
        .await?;
        Ok(chunks)
    }

    /// Re-read the bitmap cardinality. The merger trusts this count, not
    /// the caller's idea of completeness.
    pub async fn count_chunks(&self, session_id: Uuid) -> UploadResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM upload_chunks WHERE session_id = ?")
                .bind(session_id)
                .fetch_one(&*self.db)
                .await?;
        Ok(count)
    }

    /// Record a newly accepted chunk: insert the bitmap row, bump the
    /// counter, and move the session status in one transaction. Returns
    /// the new uploaded count.
    pub async fn record_chunk(
        &self,
        session_id: Uuid,
        index: i64,
        checksum: &str,
        size_bytes: i64,
        status: SessionStatus,
    ) -> UploadResult<i64> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        sqlx::query(
            "INSERT INTO upload_chunks (session_id, chunk_index, checksum, size_bytes, uploaded_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(session_id)
        .bind(index)
        .bind(checksum)
        .bind(size_bytes)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE upload_sessions
             SET uploaded_chunks = uploaded_chunks + 1, status = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(status)
        .bind(now)
        .bind(session_id)
        .execute(&mut *tx)
        .await?;

        let count: i64 = sqlx::query_scalar(
            "SELECT uploaded_chunks FROM upload_sessions WHERE id = ?",
        )
        .bind(session_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(count)
    }

    /// Overwrite the session status.
    pub async fn set_status(&self, session_id: Uuid, status: SessionStatus) -> UploadResult<()> {
        sqlx::query("UPDATE upload_sessions SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status)
            .bind(Utc::now())
            .bind(session_id)
            .execute(&*self.db)
            .await?;
        Ok(())
    }

    /// Write-once completion: set `completed` plus the published key.
    pub async fn mark_completed(&self, session_id: Uuid, final_key: &str) -> UploadResult<()> {
        sqlx::query(
            "UPDATE upload_sessions
             SET status = 'completed', final_object_key = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(final_key)
        .bind(Utc::now())
        .bind(session_id)
        .execute(&*self.db)
        .await?;
        Ok(())
    }

    /// Delete the chunk rows of a session (after merge publishes, or on
    /// session deletion).
    pub async fn delete_chunks(&self, session_id: Uuid) -> UploadResult<()> {
        sqlx::query("DELETE FROM upload_chunks WHERE session_id = ?")
            .bind(session_id)
            .execute(&*self.db)
            .await?;
        Ok(())
    }

    /// Delete a session and its chunk rows in one transaction.
    pub async fn delete_session(&self, session_id: Uuid) -> UploadResult<()> {
        let mut tx = self.db.begin().await?;
        sqlx::query("DELETE FROM upload_chunks WHERE session_id = ?")
            .bind(session_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM upload_sessions WHERE id = ?")
            .bind(session_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}
