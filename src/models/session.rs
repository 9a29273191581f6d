//! Represents one resumable upload session and its lifecycle status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

/// Lifecycle status of an upload session.
///
/// Happy path is `pending -> uploading -> completed`. `uploading` and
/// `paused` may alternate any number of times. `completed` is write-once
/// and no transition ever leaves it; `error` is terminal but the session
/// remains deletable by its owner.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum SessionStatus {
    Pending,
    Uploading,
    Paused,
    Completed,
    Error,
}

impl SessionStatus {
    /// True for statuses a fresh `init_session` call may resume.
    pub fn is_resumable(self) -> bool {
        matches!(self, Self::Pending | Self::Uploading | Self::Paused)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Uploading => "uploading",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Error => "error",
        };
        write!(f, "{}", s)
    }
}

/// A resumable chunked upload session.
///
/// The session is the unit of deduplication (`owner_id` + `content_hash`)
/// and exclusively owns its staged chunks: chunk lifetime never exceeds
/// session lifetime.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct UploadSession {
    /// Internal UUID, allocated at creation.
    pub id: Uuid,

    /// Opaque identity of the uploading principal, supplied by the
    /// auth layer. The engine only ever compares it, never mints it.
    pub owner_id: String,

    /// Caller-supplied fingerprint of the complete file. Required;
    /// drives session deduplication.
    pub content_hash: String,

    /// Original filename of the uploaded file.
    pub original_name: String,

    /// Declared total size in bytes. Compared against the assembled
    /// byte count at merge time; a mismatch is logged, not fatal.
    pub declared_size: i64,

    /// Declared content type (MIME type).
    pub declared_media_type: Option<String>,

    /// Number of chunks fixed at creation; immutable thereafter.
    pub total_chunks: i64,

    /// Count of distinct chunk indices received so far. Monotonically
    /// non-decreasing while the session is open.
    pub uploaded_chunks: i64,

    /// Current lifecycle status.
    pub status: SessionStatus,

    /// Key of the published object. Non-null iff `status == completed`.
    pub final_object_key: Option<String>,

    /// Timestamp when the session was created.
    pub created_at: DateTime<Utc>,

    /// Timestamp of the last mutation.
    pub updated_at: DateTime<Utc>,
}

impl UploadSession {
    /// Integer completion percentage. `total_chunks == 0` is rejected at
    /// creation, but guard anyway rather than divide by zero.
    pub fn percent(&self) -> i64 {
        if self.total_chunks <= 0 {
            return 0;
        }
        self.uploaded_chunks * 100 / self.total_chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_rounds_down() {
        let mut s = sample();
        s.uploaded_chunks = 1;
        s.total_chunks = 3;
        assert_eq!(s.percent(), 33);
        s.uploaded_chunks = 3;
        assert_eq!(s.percent(), 100);
    }

    #[test]
    fn zero_total_does_not_divide() {
        let mut s = sample();
        s.total_chunks = 0;
        assert_eq!(s.percent(), 0);
    }

    fn sample() -> UploadSession {
        UploadSession {
            id: Uuid::new_v4(),
            owner_id: "u1".into(),
            content_hash: "h".into(),
            original_name: "p.jpg".into(),
            declared_size: 10,
            declared_media_type: None,
            total_chunks: 1,
            uploaded_chunks: 0,
            status: SessionStatus::Pending,
            final_object_key: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}
