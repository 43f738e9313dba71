use std::path::Path;
use std::sync::Arc;

use axum::{
    Json,
    body::Body,
    extract::{Query, State, WebSocketUpgrade},
    http::StatusCode,
    response::IntoResponse,
};
use futures_util::StreamExt;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use lanchat_gateway::connection;
use lanchat_gateway::engine::Engine;
use lanchat_types::api::{CheckRoomQuery, CheckRoomResponse, HandshakeParams, UploadQuery, UploadResponse};

use crate::storage::{Storage, sanitize_file_name};

/// Shared application state for all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Engine,
    pub storage: Arc<Storage>,
    /// Upload size limit in bytes.
    pub max_file_size: u64,
}

// ── Handlers ────────────────────────────────────────────────────────────

/// GET /gateway: WebSocket upgrade. Room and credentials ride on the query
/// string; admission is decided by the engine once the socket is open.
pub async fn gateway(
    State(state): State<AppState>,
    Query(params): Query<HandshakeParams>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| connection::handle_connection(socket, state.engine, params))
}

/// GET /api/checkRoom?roomId=: does the room exist, and does it need a password.
pub async fn check_room(
    State(state): State<AppState>,
    Query(query): Query<CheckRoomQuery>,
) -> Result<Json<CheckRoomResponse>, StatusCode> {
    let status = state
        .engine
        .check_room(query.room_id)
        .await
        .ok_or(StatusCode::SERVICE_UNAVAILABLE)?;

    Ok(Json(CheckRoomResponse {
        exists: status.exists,
        need_password: status.needs_password,
    }))
}

/// POST /upload?filename=: streaming upload of the raw request body.
///
/// A partially written file is removed if the body fails or runs past the
/// size limit.
pub async fn upload(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    body: Body,
) -> Result<Json<UploadResponse>, StatusCode> {
    let Some(filename) = sanitize_file_name(&query.filename).map(str::to_string) else {
        warn!("Rejected upload with unsafe file name {:?}", query.filename);
        return Err(StatusCode::BAD_REQUEST);
    };
    let path = state.storage.dir().join(&filename);

    let written = match write_body(&path, body, state.max_file_size).await {
        Ok(written) => written,
        Err(status) => {
            if let Err(e) = state.storage.delete_file(&path).await {
                warn!("Failed to remove partial upload {}: {}", path.display(), e);
            }
            return Err(status);
        }
    };

    info!("Upload {} stored ({} bytes)", filename, written);
    Ok(Json(UploadResponse {
        path: format!("/uploads/{filename}"),
        filename,
    }))
}

pub async fn health() -> &'static str {
    "ok"
}

// ── Helpers ─────────────────────────────────────────────────────────────

async fn write_body(path: &Path, body: Body, limit: u64) -> Result<u64, StatusCode> {
    let mut file = fs::File::create(path).await.map_err(|e| {
        warn!("Failed to create {}: {}", path.display(), e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let mut stream = http_body_util::BodyStream::new(body);
    let mut written: u64 = 0;

    while let Some(frame_result) = stream.next().await {
        let frame = frame_result.map_err(|e| {
            warn!("Upload body error: {}", e);
            StatusCode::BAD_REQUEST
        })?;
        let Ok(data) = frame.into_data() else { continue };

        written += data.len() as u64;
        if written > limit {
            warn!("Upload exceeded limit of {} bytes", limit);
            return Err(StatusCode::PAYLOAD_TOO_LARGE);
        }
        file.write_all(&data).await.map_err(|e| {
            warn!("Failed to write {}: {}", path.display(), e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    }

    file.flush().await.map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(written)
}
