//! Outbound progress notification capability.
//!
//! The coordinator is handed a `ProgressNotifier` at construction and
//! calls it after each accepted chunk, each completion, and each owner
//! status change. Delivery is fire-and-forget: implementations must not
//! block and have no way to fail the upload operation that triggered
//! the event.

use crate::models::UploadEvent;
use tracing::info;

/// Observer for upload lifecycle events.
pub trait ProgressNotifier: Send + Sync {
    fn notify(&self, event: UploadEvent);
}

/// Default notifier: structured log lines only. The real push transport
/// (websocket fan-out to the photo app's clients) plugs in here.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

impl ProgressNotifier for LogNotifier {
    fn notify(&self, event: UploadEvent) {
        match &event {
            UploadEvent::Progress {
                session_id,
                uploaded_chunks,
                total_chunks,
            } => info!(
                session = %session_id,
                uploaded = uploaded_chunks,
                total = total_chunks,
                "upload progress"
            ),
            UploadEvent::Completed {
                session_id,
                final_object_key,
            } => info!(session = %session_id, key = %final_object_key, "upload completed"),
            UploadEvent::StatusChanged { session_id, status } => {
                info!(session = %session_id, status = %status, "upload status changed")
            }
        }
    }
}
