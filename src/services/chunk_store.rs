//! src/services/chunk_store.rs
//!
//! ChunkStore — durable on-disk storage for individual chunk payloads,
//! addressed by `(session id, chunk index)`. Payloads live under
//! `base_path/staging/{session}/{index}.part` until the session merges
//! or is deleted. Writes go through a temp file with an fsync before the
//! final rename, so a chunk acknowledged to the client survives a crash.

use crate::services::{UploadError, UploadResult};
use std::{
    io::{self, ErrorKind},
    path::PathBuf,
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

const STAGING_DIR: &str = "staging";

/// Keyed store for staged chunk payloads.
///
/// Distinct `(session, index)` keys map to distinct files, so concurrent
/// `put` calls for different indices never share mutable state.
#[derive(Clone, Debug)]
pub struct ChunkStore {
    base_path: PathBuf,
}

impl ChunkStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Directory holding all staged chunks of one session.
    pub fn session_dir(&self, session_id: Uuid) -> PathBuf {
        self.base_path
            .join(STAGING_DIR)
            .join(session_id.to_string())
    }

    fn chunk_path(&self, session_id: Uuid, index: i64) -> PathBuf {
        self.session_dir(session_id).join(format!("{index}.part"))
    }

    /// Durably persist one chunk payload.
    ///
    /// Writes to a temp file, flushes, fsyncs, then renames into place.
    /// The caller is responsible for index-level dedup; an existing file
    /// at the destination is replaced (rename semantics), which only
    /// happens on an idempotent retry of identical content.
    pub async fn put(&self, session_id: Uuid, index: i64, bytes: &[u8]) -> UploadResult<()> {
        let dest = self.chunk_path(session_id, index);
        let parent = dest
            .parent()
            .map(PathBuf::from)
            .ok_or_else(|| io::Error::other("chunk path missing parent directory"))
            .map_err(UploadError::Io)?;
        fs::create_dir_all(&parent).await?;

        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut file = File::create(&tmp_path).await?;
        if let Err(err) = write_all_durable(&mut file, bytes).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(UploadError::Io(err));
        }
        drop(file);

        if let Err(err) = fs::rename(&tmp_path, &dest).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(UploadError::Io(err));
        }
        debug!(session = %session_id, index, len = bytes.len(), "staged chunk");
        Ok(())
    }

    /// Read one staged chunk back.
    ///
    /// A missing file surfaces as `ErrorKind::NotFound`; the merger maps
    /// that to `IncompleteUpload`.
    pub async fn get(&self, session_id: Uuid, index: i64) -> UploadResult<Vec<u8>> {
        let path = self.chunk_path(session_id, index);
        Ok(fs::read(&path).await?)
    }

    /// Purge every staged chunk of a session.
    ///
    /// Missing directory is fine (already cleaned, or nothing was ever
    /// staged).
    pub async fn delete(&self, session_id: Uuid) -> UploadResult<()> {
        let dir = self.session_dir(session_id);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(UploadError::Io(err)),
        }
    }
}

/// Write, flush, and fsync the payload.
async fn write_all_durable(file: &mut File, bytes: &[u8]) -> io::Result<()> {
    file.write_all(bytes).await?;
    file.flush().await?;
    file.sync_all().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn put_then_get_roundtrip() {
        let dir = tempdir().unwrap();
        let store = ChunkStore::new(dir.path());
        let id = Uuid::new_v4();

        store.put(id, 0, b"hello").await.unwrap();
        store.put(id, 7, b"world").await.unwrap();

        assert_eq!(store.get(id, 0).await.unwrap(), b"hello");
        assert_eq!(store.get(id, 7).await.unwrap(), b"world");
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let dir = tempdir().unwrap();
        let store = ChunkStore::new(dir.path());

        let err = store.get(Uuid::new_v4(), 0).await.unwrap_err();
        match err {
            UploadError::Io(io) => assert_eq!(io.kind(), ErrorKind::NotFound),
            other => panic!("expected Io(NotFound), got {other:?}"),
        }
    }

    #[tokio::test]
    async fn delete_purges_session_dir_and_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = ChunkStore::new(dir.path());
        let id = Uuid::new_v4();

        store.put(id, 0, b"x").await.unwrap();
        store.delete(id).await.unwrap();
        assert!(!store.session_dir(id).exists());

        // second delete is a no-op
        store.delete(id).await.unwrap();
    }
}
