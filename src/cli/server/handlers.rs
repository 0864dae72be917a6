//! HTTP request handlers for the edit server.
//!
//! `POST /edit` is the only endpoint that touches editors; the other two are
//! read-only views used by the browser extension and for debugging.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tokio_util::sync::CancellationToken;

use super::types::*;
use crate::cli::runner::remove_temp_file;
use crate::error::EditServerError;
use crate::filter;
use crate::session::{Checkpoint, EditorSession, SessionManager};

/// Application state shared across all handlers
pub struct AppState {
    /// Registry of open editor sessions
    pub session_manager: Arc<SessionManager>,
    /// Shutdown token for graceful server shutdown; also stops in-flight waits
    pub shutdown_token: CancellationToken,
}

impl AppState {
    pub fn new(session_manager: Arc<SessionManager>) -> (Arc<Self>, CancellationToken) {
        let shutdown_token = CancellationToken::new();
        let state = Arc::new(Self {
            session_manager,
            shutdown_token: shutdown_token.clone(),
        });
        (state, shutdown_token)
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Liveness check used by the browser extension.
pub async fn status() -> &'static str {
    STATUS_BODY
}

/// List open sessions, oldest first.
pub async fn list_sessions(State(state): State<Arc<AppState>>) -> Json<ListSessionsResponse> {
    let sessions = state.session_manager.list_sessions();
    Json(ListSessionsResponse {
        count: sessions.len(),
        max_sessions: state.session_manager.max_sessions,
        sessions,
    })
}

/// Open an editor on the request body, or resume the session named by
/// `x-file`, and answer at the next checkpoint.
///
/// # Response
///
/// - `200 OK`: current contents; `x-file` names the session, `x-open` says
///   whether to call again with that `x-file`
/// - `400 Bad Request`: unknown filter or malformed header
/// - `404 Not Found`: `x-file` is not an open session
/// - `500 Internal Server Error`: lossy filter, spawn failure, or the editor
///   exited unsuccessfully (body is the reason; the temp file is kept)
/// - `503 Service Unavailable`: session limit reached, or server shutting down
pub async fn edit(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let session = match header_str(&headers, FILE_HEADER)? {
        Some(path) => state
            .session_manager
            .require(&PathBuf::from(path))
            .map_err(error_response)?,
        None => {
            let filter_name = header_str(&headers, FILTER_HEADER)?.unwrap_or_default();
            let filter = filter::by_name(filter_name).map_err(error_response)?;
            let manager = state.session_manager.clone();
            tokio::task::spawn_blocking(move || manager.open(&body, filter))
                .await
                .map_err(join_error)?
                .map_err(error_response)?
        }
    };

    // Dropping the request (client went away) cancels the wait
    let cancel = state.shutdown_token.child_token();
    let _guard = cancel.clone().drop_guard();
    let watcher = session.clone();
    let checkpoint = tokio::task::spawn_blocking(move || watcher.wait_for_edit_until(&cancel))
        .await
        .map_err(join_error)?
        .map_err(error_response)?;

    match checkpoint {
        Checkpoint::Cancelled => Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse::with_code(
                "Server is shutting down",
                "SHUTTING_DOWN",
            )),
        )),
        Checkpoint::Exited(_) if !session.success() => {
            let message = session.error().unwrap_or_default();
            tracing::error!(
                "{} ({} kept)",
                message,
                session.path().display()
            );
            Ok((StatusCode::INTERNAL_SERVER_ERROR, message).into_response())
        }
        Checkpoint::Changed | Checkpoint::Exited(_) => {
            let response = contents_response(&session, !checkpoint.is_terminal())?;
            if checkpoint.is_terminal() {
                remove_temp_file(session.path()).await;
            }
            Ok(response)
        }
    }
}

fn contents_response(session: &EditorSession, open: bool) -> Result<Response, ApiError> {
    let contents = session.contents().map_err(error_response)?;
    let path = session.path().to_string_lossy();
    let file = HeaderValue::from_str(&path).map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::with_code(
                format!("Temp file path {} is not a valid header: {}", path, e),
                "INTERNAL_ERROR",
            )),
        )
    })?;

    let mut response = (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        contents,
    )
        .into_response();
    let headers = response.headers_mut();
    headers.insert(FILE_HEADER, file);
    headers.insert(
        OPEN_HEADER,
        HeaderValue::from_static(if open { "true" } else { "false" }),
    );
    Ok(response)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Result<Option<&'a str>, ApiError> {
    match headers.get(name) {
        None => Ok(None),
        Some(value) => value.to_str().map(Some).map_err(|_| {
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::with_code(
                    format!("Header '{}' is not valid text", name),
                    "BAD_HEADER",
                )),
            )
        }),
    }
}

/// Map a library error to its HTTP status and error code.
fn error_response(err: EditServerError) -> ApiError {
    let (status, code) = match &err {
        EditServerError::UnknownFilter(_) => (StatusCode::BAD_REQUEST, "UNKNOWN_FILTER"),
        EditServerError::SessionNotFound(_) => (StatusCode::NOT_FOUND, "SESSION_NOT_FOUND"),
        EditServerError::SessionLimitReached(_) => {
            (StatusCode::SERVICE_UNAVAILABLE, "SESSION_LIMIT_REACHED")
        }
        EditServerError::LossyFilter { .. } | EditServerError::FilterRoundTrip { .. } => {
            (StatusCode::INTERNAL_SERVER_ERROR, "LOSSY_FILTER")
        }
        EditServerError::Spawn { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "SPAWN_FAILED"),
        EditServerError::Io(_) | EditServerError::Config(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
        }
    };

    if status.is_server_error() {
        tracing::error!("Edit request failed: {}", err);
    } else {
        tracing::warn!("Edit request rejected: {}", err);
    }
    (status, Json(ErrorResponse::with_code(err.to_string(), code)))
}

fn join_error(err: tokio::task::JoinError) -> ApiError {
    tracing::error!("Blocking task failed: {}", err);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::with_code(err.to_string(), "INTERNAL_ERROR")),
    )
}
