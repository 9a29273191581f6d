//! Defines routes for the resumable upload engine.
//!
//! ## Structure
//! - **Session-level endpoints**
//!   - `POST   /uploads` — create or resume a session
//!   - `GET    /uploads?content_hash=` — completed-content existence check
//!   - `GET    /uploads/{id}` — session record + progress
//!   - `PATCH  /uploads/{id}/status` — pause/resume
//!   - `DELETE /uploads/{id}` — purge session, chunks, final object
//!   - `POST   /uploads/{id}/complete` — idempotent completion re-check
//!
//! - **Chunk-level endpoint**
//!   - `PUT    /uploads/{id}/chunks/{index}` — accept one chunk body
//!
//! - **Published objects**
//!   - `GET    /objects/{*key}` — stream a published object back
//!
//! All mutating routes require the caller's identity in `X-Owner-Id`.
//! The wildcard `*key` allows the sharded keys like `ab/cd/uuid.jpg`.

use crate::{
    AppState,
    handlers::{
        health_handlers::{healthz, readyz},
        upload_handlers::{
            complete_session, delete_session, get_object, get_session, init_session,
            lookup_completed, put_chunk, set_status,
        },
    },
};
use axum::{
    Router,
    routing::{get, patch, post, put},
};

/// Build and return the router for all upload-engine routes.
///
/// The router carries shared state (`AppState`) to all handlers.
pub fn routes() -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // session-level routes
        .route("/uploads", post(init_session).get(lookup_completed))
        .route("/uploads/{id}", get(get_session).delete(delete_session))
        .route("/uploads/{id}/status", patch(set_status))
        .route("/uploads/{id}/complete", post(complete_session))
        // chunk-level route
        .route("/uploads/{id}/chunks/{index}", put(put_chunk))
        // published-object read-back
        .route("/objects/{*key}", get(get_object))
}
