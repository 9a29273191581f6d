//! src/services/coordinator.rs
//!
//! UploadCoordinator — the state machine in front of the registry and
//! chunk store. Creates and deduplicates sessions, accepts chunk writes
//! under a per-session lock, tracks progress, triggers the merger when
//! the bitmap fills, and exposes pause/resume/cancel to the owner.

use crate::models::{SessionStatus, UploadEvent, UploadSession};
use crate::services::{
    UploadError, UploadResult, chunk_store::ChunkStore, merger::Merger,
    notifier::ProgressNotifier, session_locks::SessionLocks, session_registry::NewSession,
    session_registry::SessionRegistry,
};
use serde::Serialize;
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};
use uuid::Uuid;

/// Caller-supplied parameters for session creation. The owner identity
/// comes from the auth layer, everything else from the client.
#[derive(Clone, Debug)]
pub struct InitSessionParams {
    pub owner_id: String,
    pub content_hash: String,
    pub original_name: String,
    pub declared_size: i64,
    pub declared_media_type: Option<String>,
    pub total_chunks: i64,
}

/// Read-only progress snapshot.
#[derive(Serialize, Clone, Debug)]
pub struct Progress {
    pub uploaded_chunks: i64,
    pub total_chunks: i64,
    pub percent: i64,
}

impl From<&UploadSession> for Progress {
    fn from(session: &UploadSession) -> Self {
        Self {
            uploaded_chunks: session.uploaded_chunks,
            total_chunks: session.total_chunks,
            percent: session.percent(),
        }
    }
}

#[derive(Clone)]
pub struct UploadCoordinator {
    registry: SessionRegistry,
    chunks: ChunkStore,
    merger: Merger,
    notifier: Arc<dyn ProgressNotifier>,
    locks: SessionLocks,
    merge_timeout: Duration,
}

impl UploadCoordinator {
    pub fn new(
        registry: SessionRegistry,
        chunks: ChunkStore,
        merger: Merger,
        notifier: Arc<dyn ProgressNotifier>,
        merge_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            chunks,
            merger,
            notifier,
            locks: SessionLocks::new(),
            merge_timeout,
        }
    }

    /// Create a session, or return the open one already tracking this
    /// `(owner, content hash)` pair so an interrupted client resumes
    /// instead of duplicating work. Completed sessions are never
    /// returned here; callers probe those with [`find_completed`].
    ///
    /// [`find_completed`]: UploadCoordinator::find_completed
    pub async fn init_session(&self, params: InitSessionParams) -> UploadResult<UploadSession> {
        if params.total_chunks <= 0 {
            return Err(UploadError::InvalidArgument(
                "total_chunks must be positive".into(),
            ));
        }
        if params.declared_size < 0 {
            return Err(UploadError::InvalidArgument(
                "declared_size must not be negative".into(),
            ));
        }
        if params.content_hash.trim().is_empty() {
            return Err(UploadError::InvalidArgument(
                "content_hash is required".into(),
            ));
        }

        if let Some(existing) = self
            .registry
            .find_resumable(&params.owner_id, &params.content_hash)
            .await?
        {
            info!(session = %existing.id, "resuming existing upload session");
            return Ok(existing);
        }

        let session = self
            .registry
            .insert_session(NewSession {
                owner_id: params.owner_id,
                content_hash: params.content_hash,
                original_name: params.original_name,
                declared_size: params.declared_size,
                declared_media_type: params.declared_media_type,
                total_chunks: params.total_chunks,
            })
            .await?;
        info!(session = %session.id, total_chunks = session.total_chunks, "created upload session");
        Ok(session)
    }

    /// The separate existence check for already-completed content.
    pub async fn find_completed(
        &self,
        owner_id: &str,
        content_hash: &str,
    ) -> UploadResult<Option<UploadSession>> {
        self.registry.find_completed(owner_id, content_hash).await
    }

    /// Accept one chunk. Serialized per session; returns the updated
    /// session record, which carries the final object key when this
    /// chunk completed the upload.
    ///
    /// Retrying an index with identical bytes is a no-op success.
    /// Different bytes at a stored index are a `ChecksumConflict` and
    /// leave the original chunk untouched.
    pub async fn accept_chunk(
        &self,
        owner_id: &str,
        session_id: Uuid,
        index: i64,
        checksum: &str,
        payload: &[u8],
    ) -> UploadResult<UploadSession> {
        let _guard = self.locks.lock(session_id).await;

        let mut session = self.registry.fetch_session(session_id).await?;
        if session.owner_id != owner_id {
            return Err(UploadError::Forbidden(session_id));
        }
        if session.status == SessionStatus::Completed {
            return Err(UploadError::SessionAlreadyCompleted(session_id));
        }
        if index < 0 || index >= session.total_chunks {
            return Err(UploadError::OutOfRange {
                index,
                total_chunks: session.total_chunks,
            });
        }

        let payload_checksum = format!("{:x}", md5::compute(payload));
        if !payload_checksum.eq_ignore_ascii_case(checksum) {
            return Err(UploadError::InvalidArgument(format!(
                "chunk {index} checksum does not match payload"
            )));
        }

        if let Some(stored) = self.registry.fetch_chunk(session_id, index).await? {
            if stored.checksum.eq_ignore_ascii_case(&payload_checksum) {
                // Idempotent retry. Re-stage the payload anyway: the
                // bitmap row can outlive the file (crash between merge
                // attempts), and identical content is safe to overwrite.
                // Falling through to the completion check lets a merge
                // that aborted on the missing chunk run again.
                self.chunks.put(session_id, index, payload).await?;
                if session.uploaded_chunks == session.total_chunks {
                    self.run_merge(&mut session).await?;
                }
                return Ok(session);
            }
            return Err(UploadError::ChecksumConflict { index });
        }

        self.chunks.put(session_id, index, payload).await?;

        // A paused session still takes in-flight chunks but stays paused.
        let next_status = if session.status == SessionStatus::Paused {
            SessionStatus::Paused
        } else {
            SessionStatus::Uploading
        };
        let uploaded = self
            .registry
            .record_chunk(session_id, index, &payload_checksum, payload.len() as i64, next_status)
            .await?;
        session.uploaded_chunks = uploaded;
        session.status = next_status;

        self.notifier.notify(UploadEvent::Progress {
            session_id,
            uploaded_chunks: uploaded,
            total_chunks: session.total_chunks,
        });

        if uploaded == session.total_chunks {
            self.run_merge(&mut session).await?;
        }
        Ok(session)
    }

    /// Idempotent completion re-check: returns the final key if already
    /// merged, merges now if the bitmap is full, and reports
    /// `IncompleteUpload` otherwise.
    pub async fn complete(&self, owner_id: &str, session_id: Uuid) -> UploadResult<UploadSession> {
        let _guard = self.locks.lock(session_id).await;

        let mut session = self.registry.fetch_session(session_id).await?;
        if session.owner_id != owner_id {
            return Err(UploadError::Forbidden(session_id));
        }
        if session.status == SessionStatus::Completed {
            return Ok(session);
        }

        let stored = self.registry.count_chunks(session_id).await?;
        if stored != session.total_chunks {
            return Err(UploadError::IncompleteUpload {
                id: session_id,
                reason: format!("{stored} of {} chunks uploaded", session.total_chunks),
            });
        }

        self.run_merge(&mut session).await?;
        Ok(session)
    }

    /// Owner-driven pause/resume. Only `pending | uploading <-> paused`
    /// is allowed; `completed` and `error` are engine-internal,
    /// write-once outcomes and can never be entered or left here.
    ///
    /// Serialized with chunk accepts: a pause racing the final chunk
    /// either lands before the merge (and the session completes while
    /// paused) or sees `completed` and is rejected. It can never
    /// overwrite a concurrent completion.
    pub async fn set_status(
        &self,
        owner_id: &str,
        session_id: Uuid,
        new_status: SessionStatus,
    ) -> UploadResult<UploadSession> {
        let _guard = self.locks.lock(session_id).await;

        let mut session = self.registry.fetch_session(session_id).await?;
        if session.owner_id != owner_id {
            return Err(UploadError::Forbidden(session_id));
        }

        let allowed = matches!(
            (session.status, new_status),
            (SessionStatus::Pending | SessionStatus::Uploading, SessionStatus::Paused)
                | (SessionStatus::Paused, SessionStatus::Pending | SessionStatus::Uploading)
        );
        if !allowed {
            return Err(UploadError::InvalidTransition {
                from: session.status,
                to: new_status,
            });
        }

        self.registry.set_status(session_id, new_status).await?;
        session.status = new_status;
        self.notifier.notify(UploadEvent::StatusChanged {
            session_id,
            status: new_status,
        });
        Ok(session)
    }

    /// Delete a session with everything it owns: staged chunks, bitmap
    /// rows, and the published object if one exists.
    pub async fn delete_session(&self, owner_id: &str, session_id: Uuid) -> UploadResult<()> {
        {
            let _guard = self.locks.lock(session_id).await;

            let session = self.registry.fetch_session(session_id).await?;
            if session.owner_id != owner_id {
                return Err(UploadError::Forbidden(session_id));
            }

            self.chunks.delete(session_id).await?;
            if let Some(key) = session.final_object_key.as_deref() {
                self.merger.delete_object(key).await?;
            }
            self.registry.delete_session(session_id).await?;
            info!(session = %session_id, "deleted upload session");
        }
        self.locks.release(session_id);
        Ok(())
    }

    /// Open a published object for reading, together with the media
    /// type its session declared. Pure read; keys are unguessable
    /// UUID-based paths, so no owner check applies here.
    pub async fn open_object(
        &self,
        key: &str,
    ) -> UploadResult<(Option<String>, tokio::fs::File)> {
        let media_type = self
            .registry
            .find_by_final_key(key)
            .await?
            .and_then(|s| s.declared_media_type);
        let file = self.merger.open_object(key).await?;
        Ok((media_type, file))
    }

    /// Fetch a session record. Pure read.
    pub async fn get_session(&self, session_id: Uuid) -> UploadResult<UploadSession> {
        self.registry.fetch_session(session_id).await
    }

    /// Progress snapshot for a session. Pure read.
    pub async fn get_progress(&self, session_id: Uuid) -> UploadResult<Progress> {
        let session = self.registry.fetch_session(session_id).await?;
        Ok(Progress::from(&session))
    }

    /// Run the merger for a session whose bitmap just filled. Called
    /// with the per-session lock held, so duplicate triggers collapse:
    /// a second caller sees `completed` before reaching this point.
    ///
    /// A missing chunk leaves the session in `uploading` so the client
    /// can re-supply it; any other failure (including the merge
    /// timeout) is unrecoverable and parks the session in `error`.
    async fn run_merge(&self, session: &mut UploadSession) -> UploadResult<()> {
        let merged = tokio::time::timeout(self.merge_timeout, self.merger.merge(session)).await;

        let key = match merged {
            Ok(Ok(key)) => key,
            Ok(Err(err @ UploadError::IncompleteUpload { .. })) => {
                warn!(session = %session.id, error = %err, "merge aborted, session recoverable");
                self.registry
                    .set_status(session.id, SessionStatus::Uploading)
                    .await?;
                session.status = SessionStatus::Uploading;
                return Err(err);
            }
            Ok(Err(err)) => {
                warn!(session = %session.id, error = %err, "merge failed");
                self.registry
                    .set_status(session.id, SessionStatus::Error)
                    .await?;
                session.status = SessionStatus::Error;
                return Err(err);
            }
            Err(_elapsed) => {
                warn!(session = %session.id, "merge timed out");
                // The dropped merge future never reached its own
                // cleanup, so remove the abandoned temp file here.
                self.merger.discard_tmp(session).await;
                self.registry
                    .set_status(session.id, SessionStatus::Error)
                    .await?;
                session.status = SessionStatus::Error;
                return Err(UploadError::MergeTimeout(session.id));
            }
        };

        self.registry.mark_completed(session.id, &key).await?;
        session.status = SessionStatus::Completed;
        session.final_object_key = Some(key.clone());
        self.merger.cleanup(session.id).await;

        self.notifier.notify(UploadEvent::Completed {
            session_id: session.id,
            final_object_key: key,
        });
        Ok(())
    }
}
