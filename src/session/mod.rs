//! Editor sessions: one temp file, one external editor process.
//!
//! # Lifecycle
//!
//! ```text
//!   spawn ──> RUNNING ──(file mtime changed)──> CHANGED ──> RUNNING ...
//!                │
//!                └────────(process exited)────> EXITED (terminal)
//! ```
//!
//! [`EditorSession::spawn`] decodes the contents, checks the filter, writes
//! the temp file and launches the editor. [`EditorSession::wait_for_edit`]
//! blocks until the next checkpoint. [`EditorSession::contents`] reads the
//! file back through the filter at any time.
//!
//! Sessions opened through a [`SessionManager`] are registered by temp file
//! path and remove themselves once their editor exits.

mod editor;
mod manager;
mod watch;

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

pub use editor::{describe_exit_status, EditorSession};
pub use manager::{SessionManager, DEFAULT_MAX_SESSIONS};
pub use watch::Checkpoint;

/// Default editor invocation when nothing is configured.
pub const DEFAULT_EDITOR_COMMAND: &str = "gvim -f";

/// Temp file name prefix identifying files created for browser edits.
pub const DEFAULT_TEMP_PREFIX: &str = "chrome_";

/// Temp file suffix.
pub const TEMP_SUFFIX: &str = ".txt";

/// Delay between two polls of the editor process and file.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Resolved runtime configuration for new sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorConfig {
    /// Program and leading arguments. The temp file path is appended.
    pub command: Vec<String>,
    /// Parent directory for temp files (system temp dir when `None`)
    pub temp_dir: Option<PathBuf>,
    pub prefix: String,
    /// Return from `wait_for_edit` on every save, not only on exit
    pub incremental: bool,
    /// Verify filter round trips before editing
    pub careful_filtering: bool,
    pub poll_interval: Duration,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            command: DEFAULT_EDITOR_COMMAND
                .split_whitespace()
                .map(str::to_string)
                .collect(),
            temp_dir: None,
            prefix: DEFAULT_TEMP_PREFIX.to_string(),
            incremental: true,
            careful_filtering: true,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Snapshot of a session for listings and responses.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SessionInfo {
    pub path: PathBuf,
    pub pid: u32,
    pub filter: Option<String>,
    pub open: bool,
    pub exit_status: Option<i32>,
    /// RFC 3339
    pub opened_at: String,
}
