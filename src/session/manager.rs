//! Registry of live editor sessions.
//!
//! # Thread Safety
//!
//! - One coarse `parking_lot::Mutex` guards the path → session map
//! - Sessions hold a `Weak` back-reference and remove themselves when
//!   their editor exits, so the map never keeps a session alive by itself
//!   once it is finished

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use super::editor::EditorSession;
use super::{EditorConfig, SessionInfo};
use crate::error::{EditServerError, Result};
use crate::filter::ContentFilter;

/// Maximum concurrent sessions to prevent runaway editor spawning (default)
pub const DEFAULT_MAX_SESSIONS: usize = 16;

/// Owns the map of open sessions keyed by temp file path.
///
/// Create one at startup, wrap it in an `Arc` and hand it to whatever opens
/// sessions.
pub struct SessionManager {
    sessions: Mutex<HashMap<PathBuf, Arc<EditorSession>>>,
    config: EditorConfig,
    /// Maximum allowed concurrent sessions
    pub max_sessions: usize,
}

impl SessionManager {
    pub fn new(config: EditorConfig, max_sessions: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            config,
            max_sessions,
        }
    }

    /// Spawn a session with this manager's config and register it.
    ///
    /// The lock is held across the spawn so concurrent opens cannot exceed
    /// `max_sessions`.
    pub fn open(
        self: &Arc<Self>,
        contents: &[u8],
        filter: Option<Arc<dyn ContentFilter>>,
    ) -> Result<Arc<EditorSession>> {
        let mut sessions = self.sessions.lock();
        reap_exited(&mut sessions);
        if sessions.len() >= self.max_sessions {
            return Err(EditServerError::SessionLimitReached(self.max_sessions));
        }

        let session = Arc::new(EditorSession::spawn_with_manager(
            contents,
            filter,
            &self.config,
            Arc::downgrade(self),
        )?);
        sessions.insert(session.path().to_path_buf(), session.clone());

        tracing::info!(
            "Opened session {} (pid {}, {} open)",
            session.path().display(),
            session.pid(),
            sessions.len()
        );
        Ok(session)
    }

    pub fn get(&self, path: &Path) -> Option<Arc<EditorSession>> {
        self.sessions.lock().get(path).cloned()
    }

    /// Like [`get`](Self::get) but an error for unknown paths.
    pub fn require(&self, path: &Path) -> Result<Arc<EditorSession>> {
        self.get(path)
            .ok_or_else(|| EditServerError::SessionNotFound(path.to_path_buf()))
    }

    pub fn remove(&self, path: &Path) -> Option<Arc<EditorSession>> {
        let removed = self.sessions.lock().remove(path);
        if removed.is_some() {
            tracing::info!("Removed session {}", path.display());
        }
        removed
    }

    pub fn count(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.sessions.lock().contains_key(path)
    }

    pub fn list_sessions(&self) -> Vec<SessionInfo> {
        let mut sessions = self.sessions.lock();
        reap_exited(&mut sessions);
        let mut infos: Vec<SessionInfo> = sessions.values().map(|s| s.info()).collect();
        infos.sort_by(|a, b| a.opened_at.cmp(&b.opened_at));
        infos
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }
}

/// Drop sessions whose editor exited without anyone waiting on them, e.g.
/// a client that took a `Changed` response and never came back. Their temp
/// files stay on disk.
fn reap_exited(sessions: &mut HashMap<PathBuf, Arc<EditorSession>>) {
    sessions.retain(|path, session| match session.poll_exit() {
        Some(status) => {
            tracing::info!(
                "Reaped abandoned session {} (status {})",
                path.display(),
                status
            );
            false
        }
        None => true,
    });
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("count", &self.count())
            .field("max_sessions", &self.max_sessions)
            .field("config", &self.config)
            .finish()
    }
}
