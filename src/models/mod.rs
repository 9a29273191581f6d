//! Core data models for the chunked upload engine.
//!
//! Sessions and chunks map to database tables via `sqlx::FromRow` and
//! serialize naturally as JSON via `serde`; events are the outbound
//! notification payloads.

pub mod chunk;
pub mod event;
pub mod session;

pub use chunk::ChunkRecord;
pub use event::UploadEvent;
pub use session::{SessionStatus, UploadSession};
