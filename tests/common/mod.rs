//! Shared setup for integration tests: a temp storage root, a fresh
//! SQLite database with the schema applied, and a notifier that records
//! every event for assertions.

use sqlx::sqlite::SqlitePoolOptions;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use upload_engine::models::UploadEvent;
use upload_engine::services::notifier::ProgressNotifier;
use upload_engine::{AppState, build_state};

/// Captures every emitted event.
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<UploadEvent>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<UploadEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn completed_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, UploadEvent::Completed { .. }))
            .count()
    }
}

impl ProgressNotifier for RecordingNotifier {
    fn notify(&self, event: UploadEvent) {
        self.events.lock().unwrap().push(event);
    }
}

pub struct TestEngine {
    pub state: AppState,
    pub notifier: Arc<RecordingNotifier>,
    // keeps the storage root alive for the duration of the test
    pub _dir: TempDir,
}

pub async fn setup() -> TestEngine {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("meta.db");
    let db = Arc::new(
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&format!("sqlite://{}?mode=rwc", db_path.display()))
            .await
            .unwrap(),
    );

    for stmt in include_str!("../../migrations/0001_init.sql")
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        sqlx::query(stmt).execute(&*db).await.unwrap();
    }

    let notifier = Arc::new(RecordingNotifier::default());
    let state = build_state(
        db,
        dir.path(),
        notifier.clone(),
        Duration::from_secs(30),
    );

    TestEngine {
        state,
        notifier,
        _dir: dir,
    }
}

pub fn md5_hex(bytes: &[u8]) -> String {
    format!("{:x}", md5::compute(bytes))
}
