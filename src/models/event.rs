//! Events emitted to the external progress observer.

use crate::models::session::SessionStatus;
use serde::Serialize;
use uuid::Uuid;

/// Fire-and-forget notifications about upload lifecycle changes.
///
/// Payloads are deliberately minimal: the observer (push transport,
/// websocket fan-out, ...) looks up anything else it needs.
#[derive(Serialize, Clone, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UploadEvent {
    /// A new chunk was durably accepted.
    Progress {
        session_id: Uuid,
        uploaded_chunks: i64,
        total_chunks: i64,
    },

    /// The session merged and published its final object.
    Completed {
        session_id: Uuid,
        final_object_key: String,
    },

    /// The owner paused or resumed the session.
    StatusChanged {
        session_id: Uuid,
        status: SessionStatus,
    },
}

impl UploadEvent {
    /// Session this event belongs to.
    pub fn session_id(&self) -> Uuid {
        match self {
            Self::Progress { session_id, .. }
            | Self::Completed { session_id, .. }
            | Self::StatusChanged { session_id, .. } => *session_id,
        }
    }
}
