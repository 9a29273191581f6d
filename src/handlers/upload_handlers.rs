//! HTTP handlers for the resumable upload endpoints.
//!
//! Thin adapters over `UploadCoordinator`: they extract the caller's
//! identity from the `X-Owner-Id` header (placed there by the auth
//! layer upstream), deserialize the request, and shape JSON responses.

use crate::{
    AppState,
    errors::AppError,
    models::{SessionStatus, UploadSession},
    services::{UploadError, coordinator::InitSessionParams},
};
use axum::{
    Json,
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

const OWNER_HEADER: &str = "x-owner-id";
const CHECKSUM_HEADER: &str = "x-chunk-checksum";

/// Body of `POST /uploads`.
#[derive(Debug, Deserialize)]
pub struct InitSessionRequest {
    pub content_hash: String,
    pub original_name: String,
    pub declared_size: i64,
    pub declared_media_type: Option<String>,
    pub total_chunks: i64,
}

/// Query of `GET /uploads` (completed-content existence check).
#[derive(Debug, Deserialize)]
pub struct LookupQuery {
    pub content_hash: String,
}

/// Body of `PATCH /uploads/{id}/status`.
#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    pub status: SessionStatus,
}

/// Session record plus derived progress, the standard response shape.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    #[serde(flatten)]
    pub session: UploadSession,
    pub percent: i64,
}

impl From<UploadSession> for SessionResponse {
    fn from(session: UploadSession) -> Self {
        let percent = session.percent();
        Self { session, percent }
    }
}

/// Response of a chunk write: updated progress, and the final key when
/// this chunk completed the session.
#[derive(Debug, Serialize)]
pub struct ChunkAcceptResponse {
    pub uploaded_chunks: i64,
    pub total_chunks: i64,
    pub percent: i64,
    pub status: SessionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_object_key: Option<String>,
}

/// POST `/uploads` — create or resume a session.
pub async fn init_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<InitSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let owner = owner_id(&headers)?;
    let session = state
        .coordinator
        .init_session(InitSessionParams {
            owner_id: owner,
            content_hash: req.content_hash,
            original_name: req.original_name,
            declared_size: req.declared_size,
            declared_media_type: req.declared_media_type,
            total_chunks: req.total_chunks,
        })
        .await?;
    Ok((StatusCode::OK, Json(SessionResponse::from(session))))
}

/// GET `/uploads?content_hash=` — does completed content already exist?
///
/// Clients call this before re-uploading a file; a hit carries the
/// final object key, so no new session is needed.
pub async fn lookup_completed(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<LookupQuery>,
) -> Result<Json<SessionResponse>, AppError> {
    let owner = owner_id(&headers)?;
    match state
        .coordinator
        .find_completed(&owner, &q.content_hash)
        .await?
    {
        Some(session) => Ok(Json(SessionResponse::from(session))),
        None => Err(AppError::not_found(format!(
            "no completed upload for content hash `{}`",
            q.content_hash
        ))),
    }
}

/// PUT `/uploads/{id}/chunks/{index}` — accept one chunk body.
pub async fn put_chunk(
    State(state): State<AppState>,
    Path((id, index)): Path<(Uuid, i64)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ChunkAcceptResponse>, AppError> {
    let owner = owner_id(&headers)?;
    let checksum = headers
        .get(CHECKSUM_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::bad_request("missing X-Chunk-Checksum header"))?
        .to_string();

    let session = state
        .coordinator
        .accept_chunk(&owner, id, index, &checksum, &body)
        .await?;

    Ok(Json(ChunkAcceptResponse {
        uploaded_chunks: session.uploaded_chunks,
        total_chunks: session.total_chunks,
        percent: session.percent(),
        status: session.status,
        final_object_key: session.final_object_key,
    }))
}

/// POST `/uploads/{id}/complete` — idempotent completion re-check.
pub async fn complete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<SessionResponse>, AppError> {
    let owner = owner_id(&headers)?;
    let session = state.coordinator.complete(&owner, id).await?;
    Ok(Json(SessionResponse::from(session)))
}

/// GET `/uploads/{id}` — session record + progress.
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResponse>, AppError> {
    let session = state.coordinator.get_session(id).await?;
    Ok(Json(SessionResponse::from(session)))
}

/// PATCH `/uploads/{id}/status` — pause or resume.
pub async fn set_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(req): Json<SetStatusRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let owner = owner_id(&headers)?;
    let session = state.coordinator.set_status(&owner, id, req.status).await?;
    Ok(Json(SessionResponse::from(session)))
}

/// DELETE `/uploads/{id}` — purge session, chunks, and final object.
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let owner = owner_id(&headers)?;
    state.coordinator.delete_session(&owner, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET `/objects/{*key}` — stream a published object.
///
/// The key is only ever handed out through a completed session, so this
/// is how the photo subsystem (or a client that kept the key) reads the
/// final artifact back.
pub async fn get_object(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, AppError> {
    let (media_type, file) = match state.coordinator.open_object(&key).await {
        Ok(opened) => opened,
        Err(UploadError::Io(err)) if err.kind() == ErrorKind::NotFound => {
            return Err(AppError::not_found(format!("object `{key}` not found")));
        }
        Err(err) => return Err(err.into()),
    };

    let body = Body::from_stream(ReaderStream::new(file));
    let mut response = Response::new(body);
    let content_type = media_type.unwrap_or_else(|| "application/octet-stream".into());
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    Ok(response)
}

fn owner_id(headers: &HeaderMap) -> Result<String, AppError> {
    headers
        .get(OWNER_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::new(StatusCode::UNAUTHORIZED, "missing X-Owner-Id header"))
}
