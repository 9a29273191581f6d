//! Resumable chunked upload engine.
//!
//! Large files arrive as independently transmitted chunks, survive
//! retries and out-of-order delivery, deduplicate against in-progress
//! sessions by content fingerprint, and materialize exactly one final
//! object per completed session.

use crate::services::{
    chunk_store::ChunkStore, coordinator::UploadCoordinator, merger::Merger,
    notifier::ProgressNotifier, session_registry::SessionRegistry,
};
use axum::Router;
use sqlx::SqlitePool;
use std::{path::PathBuf, sync::Arc, time::Duration};

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: UploadCoordinator,
    pub db: Arc<SqlitePool>,
    pub storage_root: PathBuf,
}

/// Wire the engine together: registry and merger over the shared pool,
/// chunk store and published objects under `storage_root`, events to
/// the injected notifier.
pub fn build_state(
    db: Arc<SqlitePool>,
    storage_root: impl Into<PathBuf>,
    notifier: Arc<dyn ProgressNotifier>,
    merge_timeout: Duration,
) -> AppState {
    let storage_root = storage_root.into();
    let registry = SessionRegistry::new(db.clone());
    let chunks = ChunkStore::new(&storage_root);
    let merger = Merger::new(chunks.clone(), registry.clone(), &storage_root);
    let coordinator = UploadCoordinator::new(registry, chunks, merger, notifier, merge_timeout);

    AppState {
        coordinator,
        db,
        storage_root,
    }
}

/// Build the full application router over the given state.
pub fn create_app(state: AppState) -> Router {
    routes::routes::routes().with_state(state)
}
