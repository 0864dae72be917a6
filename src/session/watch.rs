//! Checkpoint detection for a running editor.
//!
//! Uses plain polling: every `poll_interval` the process is checked for exit
//! and the temp file for a new modification time. No file-watch APIs.

use std::io::ErrorKind;
use std::process::ExitStatus;
use std::time::SystemTime;

use tokio_util::sync::CancellationToken;

use super::editor::EditorSession;
use crate::error::Result;

/// Why `wait_for_edit` returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkpoint {
    /// The file was saved while the editor keeps running. Read the contents,
    /// then wait again.
    Changed,
    /// The editor is gone. Terminal.
    Exited(i32),
    /// The token fired before anything happened. The session stays open.
    Cancelled,
}

impl Checkpoint {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Checkpoint::Exited(_))
    }
}

impl EditorSession {
    /// Block until the next checkpoint.
    ///
    /// In incremental mode this returns `Changed` whenever the file's
    /// modification time moves, otherwise only when the editor exits.
    pub fn wait_for_edit(&self) -> Result<Checkpoint> {
        self.wait_for_edit_until(&CancellationToken::new())
    }

    /// [`wait_for_edit`](Self::wait_for_edit) that gives up with
    /// `Checkpoint::Cancelled` once `cancel` fires.
    ///
    /// The token is checked between polls. A non-incremental wait blocks in
    /// `Child::wait` and only sees the token before it starts.
    pub fn wait_for_edit_until(&self, cancel: &CancellationToken) -> Result<Checkpoint> {
        if let Some(status) = self.exit_status() {
            return Ok(Checkpoint::Exited(status));
        }
        if cancel.is_cancelled() {
            return Ok(Checkpoint::Cancelled);
        }

        if !self.incremental {
            let status = self.child.lock().wait()?;
            return Ok(self.finish(status));
        }

        loop {
            std::thread::sleep(self.poll_interval);

            let exited = self.child.lock().try_wait()?;
            if let Some(status) = exited {
                return Ok(self.finish(status));
            }
            if cancel.is_cancelled() {
                tracing::debug!("Wait on {} cancelled", self.path.display());
                return Ok(Checkpoint::Cancelled);
            }

            let Some(modified) = self.modified_time()? else {
                continue;
            };
            let mut last_modified = self.last_modified.lock();
            if modified != *last_modified {
                tracing::info!(
                    "new mod time: {:?}, last: {:?} ({})",
                    modified,
                    *last_modified,
                    self.path.display()
                );
                *last_modified = modified;
                return Ok(Checkpoint::Changed);
            }
        }
    }

    /// `None` while the file is briefly missing (save by rename).
    fn modified_time(&self) -> Result<Option<SystemTime>> {
        match std::fs::metadata(&self.path).and_then(|m| m.modified()) {
            Ok(modified) => Ok(Some(modified)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Non-blocking exit check for the registry.
    ///
    /// `None` while the editor runs, or while another thread is blocked in a
    /// wait on it. Does not touch the registry.
    pub(super) fn poll_exit(&self) -> Option<i32> {
        if let Some(status) = self.exit_status() {
            return Some(status);
        }
        let exited = {
            let mut child = self.child.try_lock()?;
            child.try_wait()
        };
        match exited {
            Ok(Some(status)) => Some(self.record_exit(status)),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("Failed to poll editor for {}: {}", self.path.display(), e);
                None
            }
        }
    }

    /// Record the exit status and leave the registry.
    fn finish(&self, status: ExitStatus) -> Checkpoint {
        let code = self.record_exit(status);
        if let Some(manager) = self.manager.upgrade() {
            manager.remove(&self.path);
        }
        Checkpoint::Exited(code)
    }

    fn record_exit(&self, status: ExitStatus) -> i32 {
        let code = exit_code(status);
        if self.exit_status.set(code).is_err() {
            tracing::warn!("Exit status for {} already recorded", self.path.display());
        }
        let code = self.exit_status().unwrap_or(code);

        tracing::info!(
            "Editor for {} exited with status {}",
            self.path.display(),
            code
        );
        code
    }
}

/// Exit code, or the negated signal number for killed processes.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    -1
}
