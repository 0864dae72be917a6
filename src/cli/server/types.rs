//! Request/Response types for the HTTP server.
//!
//! `/edit` carries raw text both ways; session data travels in the
//! `x-filter`, `x-file` and `x-open` headers. Everything else is JSON.

use serde::{Deserialize, Serialize};

use crate::session::SessionInfo;

/// Request header naming the content filter.
pub const FILTER_HEADER: &str = "x-filter";

/// Request and response header carrying the session temp file path.
pub const FILE_HEADER: &str = "x-file";

/// Response header: `true` while the editor is still running.
pub const OPEN_HEADER: &str = "x-open";

/// Body of `GET /status`.
pub const STATUS_BODY: &str = "edit-server is running.\n";

/// Response listing all sessions
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ListSessionsResponse {
    /// Open sessions, oldest first
    pub sessions: Vec<SessionInfo>,
    /// Current session count
    pub count: usize,
    /// Maximum allowed sessions
    pub max_sessions: usize,
}

/// Error response body
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// Error code for programmatic handling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ErrorResponse {
    /// Create an error response with a message and code
    pub fn with_code(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            code: Some(code.into()),
        }
    }
}
