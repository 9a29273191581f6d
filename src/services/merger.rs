//! src/services/merger.rs
//!
//! Merger — assembles a completed chunk set into the final object.
//! Chunks are read strictly in index order and concatenated into a temp
//! file, the byte count is checked against the stored chunk sizes, and
//! the result is atomically renamed into the published objects tree so
//! readers never observe a partial object. Publish is the point of no
//! return; chunk cleanup afterwards is best-effort.

use crate::models::UploadSession;
use crate::services::{
    UploadError, UploadResult, chunk_store::ChunkStore, session_registry::SessionRegistry,
};
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::{debug, warn};
use uuid::Uuid;

const OBJECTS_DIR: &str = "objects";

#[derive(Clone)]
pub struct Merger {
    chunks: ChunkStore,
    registry: SessionRegistry,
    base_path: PathBuf,
}

impl Merger {
    pub fn new(
        chunks: ChunkStore,
        registry: SessionRegistry,
        base_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            chunks,
            registry,
            base_path: base_path.into(),
        }
    }

    /// Two-level shard identifiers for a published object, derived from
    /// the owning session. Keeps the file count per directory low.
    fn object_shards(session: &UploadSession) -> (String, String) {
        let digest = md5::compute(format!("{}/{}", session.owner_id, session.content_hash));
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    /// Absolute path of a published object key.
    pub fn object_path(&self, key: &str) -> PathBuf {
        self.base_path.join(OBJECTS_DIR).join(key)
    }

    /// Concatenate the session's chunks and publish the final object.
    ///
    /// Re-reads the bitmap from the registry first: the caller's claim
    /// that the upload is complete is never trusted. Returns the final
    /// object key on success. A chunk missing from the store is
    /// `IncompleteUpload` and leaves nothing published.
    pub async fn merge(&self, session: &UploadSession) -> UploadResult<String> {
        let stored = self.registry.count_chunks(session.id).await?;
        if stored != session.total_chunks {
            return Err(UploadError::IncompleteUpload {
                id: session.id,
                reason: format!("bitmap holds {stored} of {} chunks", session.total_chunks),
            });
        }

        let records = self.registry.list_chunks(session.id).await?;
        let expected_size: i64 = records.iter().map(|c| c.size_bytes).sum();
        if expected_size != session.declared_size {
            warn!(
                session = %session.id,
                declared = session.declared_size,
                actual = expected_size,
                "declared size does not match stored chunks"
            );
        }

        let key = Self::final_key(session);
        let dest = self.object_path(&key);
        let parent = dest
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| io::Error::other("object path missing parent directory"))
            .map_err(UploadError::Io)?;
        fs::create_dir_all(&parent).await?;

        // One temp file per session; merges are serialized per session,
        // so a deterministic name lets an abandoned run be swept later.
        let tmp_path = parent.join(Self::tmp_name(session.id));
        let result = self
            .concat_chunks(session, &tmp_path, expected_size)
            .await;
        if let Err(err) = result {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err);
        }

        if let Err(err) = fs::rename(&tmp_path, &dest).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(UploadError::Io(err));
        }

        debug!(session = %session.id, key = %key, size = expected_size, "published object");
        Ok(key)
    }

    /// Best-effort removal of a session's merge temp file. Used when a
    /// merge future is abandoned mid-flight (timeout) and its own error
    /// paths never ran.
    pub async fn discard_tmp(&self, session: &UploadSession) {
        let (shard_a, shard_b) = Self::object_shards(session);
        let path = self
            .base_path
            .join(OBJECTS_DIR)
            .join(shard_a)
            .join(shard_b)
            .join(Self::tmp_name(session.id));
        if let Err(err) = fs::remove_file(&path).await {
            if err.kind() != ErrorKind::NotFound {
                warn!(session = %session.id, error = %err, "failed to remove abandoned merge temp file");
            }
        }
    }

    fn tmp_name(session_id: Uuid) -> String {
        format!(".tmp-{session_id}")
    }

    /// Remove the staged chunk files and bitmap rows after a successful
    /// publish. Failures are logged for a later sweep and never undo the
    /// published object.
    pub async fn cleanup(&self, session_id: Uuid) {
        if let Err(err) = self.chunks.delete(session_id).await {
            warn!(session = %session_id, error = %err, "failed to remove staged chunks");
        }
        if let Err(err) = self.registry.delete_chunks(session_id).await {
            warn!(session = %session_id, error = %err, "failed to remove chunk rows");
        }
    }

    /// Open a published object for streaming out.
    ///
    /// Rejects malformed keys outright to avoid path traversal; a
    /// missing file surfaces as `ErrorKind::NotFound`.
    pub async fn open_object(&self, key: &str) -> UploadResult<File> {
        ensure_key_safe(key)?;
        Ok(File::open(self.object_path(key)).await?)
    }

    /// Delete a published object, if any. Used by session deletion.
    pub async fn delete_object(&self, key: &str) -> UploadResult<()> {
        let path = self.object_path(key);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(UploadError::Io(err)),
        }
    }

    async fn concat_chunks(
        &self,
        session: &UploadSession,
        tmp_path: &Path,
        expected_size: i64,
    ) -> UploadResult<()> {
        let mut file = File::create(tmp_path).await?;
        let mut written: i64 = 0;

        for index in 0..session.total_chunks {
            let bytes = match self.chunks.get(session.id, index).await {
                Ok(bytes) => bytes,
                Err(UploadError::Io(err)) if err.kind() == ErrorKind::NotFound => {
                    return Err(UploadError::IncompleteUpload {
                        id: session.id,
                        reason: format!("chunk {index} missing from store"),
                    });
                }
                Err(err) => return Err(err),
            };
            written += bytes.len() as i64;
            file.write_all(&bytes).await?;
        }

        if written != expected_size {
            return Err(UploadError::Io(io::Error::other(format!(
                "assembled {written} bytes, chunk records sum to {expected_size}"
            ))));
        }

        file.flush().await?;
        file.sync_all().await?;
        Ok(())
    }

    /// Key for the published object: sharded directories plus a fresh
    /// UUID, keeping the original extension so the photo subsystem can
    /// serve it with a sensible name.
    fn final_key(session: &UploadSession) -> String {
        let (shard_a, shard_b) = Self::object_shards(session);
        let object_id = Uuid::new_v4();
        match Path::new(&session.original_name)
            .extension()
            .and_then(|ext| ext.to_str())
        {
            Some(ext) => format!("{shard_a}/{shard_b}/{object_id}.{ext}"),
            None => format!("{shard_a}/{shard_b}/{object_id}"),
        }
    }
}

/// Basic key validation to avoid trivial path traversal vectors.
fn ensure_key_safe(key: &str) -> UploadResult<()> {
    if key.is_empty()
        || key.starts_with('/')
        || key.contains("..")
        || key
            .bytes()
            .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
    {
        return Err(UploadError::InvalidArgument("invalid object key".into()));
    }
    Ok(())
}
