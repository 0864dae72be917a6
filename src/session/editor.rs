use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command};
use std::sync::{Arc, OnceLock, Weak};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::manager::SessionManager;
use super::{EditorConfig, SessionInfo, TEMP_SUFFIX};
use crate::error::{EditServerError, Result};
use crate::filter::ContentFilter;

/// A temp file being edited by one external editor process.
///
/// Shared as `Arc<EditorSession>`: every method takes `&self`. The exit
/// status is written once and never changes afterwards.
pub struct EditorSession {
    pub(super) path: PathBuf,
    /// Cleared at construction if decoding failed, fixed afterwards
    pub(super) filter: Option<Arc<dyn ContentFilter>>,
    pub(super) child: Mutex<Child>,
    pub(super) pid: u32,
    pub(super) exit_status: OnceLock<i32>,
    pub(super) last_modified: Mutex<SystemTime>,
    pub(super) incremental: bool,
    pub(super) poll_interval: Duration,
    pub(super) opened_at: DateTime<Utc>,
    pub(super) manager: Weak<SessionManager>,
}

impl EditorSession {
    /// Write `contents` to a new temp file and open it in the editor.
    ///
    /// With a filter, the editor sees `filter.decode(contents)`. A filter
    /// that cannot decode the contents is dropped and the raw bytes are
    /// edited instead. When `config.careful_filtering` is set, a filter that
    /// does not survive `decode(encode(decoded)) == decoded` is a hard
    /// error and nothing is written or spawned.
    pub fn spawn(
        contents: &[u8],
        filter: Option<Arc<dyn ContentFilter>>,
        config: &EditorConfig,
    ) -> Result<Self> {
        Self::spawn_with_manager(contents, filter, config, Weak::new())
    }

    pub(super) fn spawn_with_manager(
        contents: &[u8],
        filter: Option<Arc<dyn ContentFilter>>,
        config: &EditorConfig,
        manager: Weak<SessionManager>,
    ) -> Result<Self> {
        tracing::info!(
            "Editor using filter: {:?}",
            filter.as_ref().map(|f| f.name())
        );

        let (program, args) = config.command.split_first().ok_or_else(|| {
            EditServerError::Config("editor command is empty".to_string())
        })?;

        let (text, filter) = prepare_contents(contents, filter, config.careful_filtering)?;
        let path = write_temp_file(&text, config)?;
        // Taken before the editor can touch the file
        let last_modified = std::fs::metadata(&path)?.modified()?;

        tracing::info!("Spawning editor: {:?} {}", config.command, path.display());
        let child = match Command::new(program).args(args).arg(&path).spawn() {
            Ok(child) => child,
            Err(source) => {
                // Nobody else will ever own this file
                if let Err(e) = std::fs::remove_file(&path) {
                    tracing::warn!("Failed to remove {}: {}", path.display(), e);
                }
                return Err(EditServerError::Spawn {
                    command: program.clone(),
                    source,
                });
            }
        };

        Ok(Self {
            pid: child.id(),
            path,
            filter,
            child: Mutex::new(child),
            exit_status: OnceLock::new(),
            last_modified: Mutex::new(last_modified),
            incremental: config.incremental,
            poll_interval: config.poll_interval,
            opened_at: Utc::now(),
            manager,
        })
    }

    /// The editor has not been seen to exit yet.
    pub fn still_open(&self) -> bool {
        self.exit_status.get().is_none()
    }

    pub fn finished(&self) -> bool {
        self.exit_status.get().is_some()
    }

    /// Running editors get the benefit of the doubt.
    pub fn success(&self) -> bool {
        self.still_open() || self.exit_status() == Some(0)
    }

    /// Message for an editor that finished unsuccessfully.
    pub fn error(&self) -> Option<String> {
        self.exit_status().and_then(describe_exit_status)
    }

    /// Positive exit code, or the negated signal number.
    pub fn exit_status(&self) -> Option<i32> {
        self.exit_status.get().copied()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn filter_name(&self) -> Option<&str> {
        self.filter.as_deref().map(|f| f.name())
    }

    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    /// Current file contents, encoded by the filter when one is active.
    ///
    /// If encoding fails the raw file bytes are returned for this read; the
    /// filter stays active for the next one.
    pub fn contents(&self) -> Result<Vec<u8>> {
        let raw = std::fs::read(&self.path)?;
        let Some(filter) = self.filter.as_deref() else {
            return Ok(raw);
        };

        let encoded = match std::str::from_utf8(&raw) {
            Ok(text) => filter.encode(text),
            Err(e) => Err(crate::filter::FilterError::InvalidUtf8(e.to_string())),
        };

        match encoded {
            Ok(bytes) => Ok(bytes),
            Err(e) => {
                tracing::error!(
                    filter = filter.name(),
                    path = %self.path.display(),
                    contents = %String::from_utf8_lossy(&raw),
                    "Failed to encode contents: {}",
                    e
                );
                Ok(raw)
            }
        }
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            path: self.path.clone(),
            pid: self.pid,
            filter: self.filter_name().map(str::to_string),
            open: self.still_open(),
            exit_status: self.exit_status(),
            opened_at: self.opened_at.to_rfc3339(),
        }
    }
}

impl std::fmt::Debug for EditorSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorSession")
            .field("path", &self.path)
            .field("pid", &self.pid)
            .field("filter", &self.filter_name())
            .field("exit_status", &self.exit_status())
            .field("incremental", &self.incremental)
            .finish_non_exhaustive()
    }
}

/// `None` for success, otherwise why the editor failed.
pub fn describe_exit_status(status: i32) -> Option<String> {
    match status {
        0 => None,
        s if s > 0 => Some(format!("text editor returned {}", s)),
        s => Some(format!("text editor died on signal {}", -(s as i64))),
    }
}

/// Decode through the filter and run the round-trip check.
///
/// Returns the bytes to put in front of the editor and the filter that
/// stays active for the rest of the session.
fn prepare_contents(
    contents: &[u8],
    filter: Option<Arc<dyn ContentFilter>>,
    careful_filtering: bool,
) -> Result<(Vec<u8>, Option<Arc<dyn ContentFilter>>)> {
    let Some(filter) = filter else {
        return Ok((contents.to_vec(), None));
    };

    let decoded = match filter.decode(contents) {
        Ok(decoded) => decoded,
        Err(e) => {
            tracing::error!(
                filter = filter.name(),
                contents = %String::from_utf8_lossy(contents),
                "Failed to decode contents, editing unfiltered: {}",
                e
            );
            return Ok((contents.to_vec(), None));
        }
    };

    if careful_filtering {
        verify_round_trip(filter.as_ref(), &decoded)?;
    }

    Ok((decoded.into_bytes(), Some(filter)))
}

fn verify_round_trip(filter: &dyn ContentFilter, decoded: &str) -> Result<()> {
    let round_trip_error = |source| EditServerError::FilterRoundTrip {
        filter: filter.name().to_string(),
        source,
    };

    let derived = filter.encode(decoded).map_err(round_trip_error)?;
    let redecoded = filter.decode(&derived).map_err(round_trip_error)?;

    if redecoded != decoded {
        return Err(EditServerError::LossyFilter {
            filter: filter.name().to_string(),
            decoded: decoded.to_string(),
            redecoded,
        });
    }
    Ok(())
}

/// Create a uniquely named file that outlives this process's handle to it.
fn write_temp_file(text: &[u8], config: &EditorConfig) -> Result<PathBuf> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(&config.prefix).suffix(TEMP_SUFFIX);

    let mut file = match &config.temp_dir {
        Some(dir) => builder.tempfile_in(dir)?,
        None => builder.tempfile()?,
    };
    file.write_all(text)?;
    file.flush()?;

    let (_, path) = file.keep().map_err(|e| e.error)?;
    Ok(path)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::session::testing::*;
    use crate::session::Checkpoint;
    use tempfile::TempDir;

    fn spawn(
        contents: &[u8],
        filter: Option<Arc<dyn ContentFilter>>,
        config: &EditorConfig,
    ) -> EditorSession {
        EditorSession::spawn(contents, filter, config).expect("session should spawn")
    }

    fn count_files(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn test_spawn_writes_temp_file() {
        let dir = TempDir::new().unwrap();
        let config = sh_config("exit 0", dir.path(), true);
        let session = spawn(b"hello", None, &config);

        let name = session.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("chrome_"), "unexpected name {}", name);
        assert!(name.ends_with(".txt"), "unexpected name {}", name);
        assert_eq!(session.path().parent().unwrap(), dir.path());
        assert_eq!(std::fs::read(session.path()).unwrap(), b"hello");
        assert!(session.pid() > 0);
    }

    #[test]
    fn test_temp_files_are_unique() {
        let dir = TempDir::new().unwrap();
        let config = sh_config("exit 0", dir.path(), true);
        let a = spawn(b"a", None, &config);
        let b = spawn(b"b", None, &config);
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn test_new_session_is_open_and_successful() {
        let dir = TempDir::new().unwrap();
        let config = sh_config("exit 7", dir.path(), true);
        let session = spawn(b"x", None, &config);

        // The exit has not been observed yet
        assert!(session.still_open());
        assert!(!session.finished());
        assert!(session.success());
        assert_eq!(session.error(), None);
        assert_eq!(session.exit_status(), None);
    }

    #[test]
    fn test_decode_failure_falls_back_to_raw() {
        let dir = TempDir::new().unwrap();
        let config = sh_config(WAIT_FOR_DONE, dir.path(), true);
        let session = spawn(b"<raw> & bytes", Some(Arc::new(BrokenDecode)), &config);

        assert_eq!(session.filter_name(), None);
        assert_eq!(std::fs::read(session.path()).unwrap(), b"<raw> & bytes");
        assert_eq!(session.contents().unwrap(), b"<raw> & bytes");
        assert_eq!(session.contents().unwrap(), b"<raw> & bytes");

        release_and_wait(&session);
    }

    #[test]
    fn test_lossy_filter_is_fatal() {
        let dir = TempDir::new().unwrap();
        let config = sh_config("exit 0", dir.path(), true);

        let err = EditorSession::spawn(b"hello", Some(Arc::new(Uppercasing)), &config).unwrap_err();
        match err {
            EditServerError::LossyFilter {
                filter,
                decoded,
                redecoded,
            } => {
                assert_eq!(filter, "uppercasing");
                assert_eq!(decoded, "hello");
                assert_eq!(redecoded, "HELLO");
            }
            other => panic!("expected LossyFilter, got {:?}", other),
        }
        // Nothing was written
        assert_eq!(count_files(dir.path()), 0);
    }

    #[test]
    fn test_lossy_filter_allowed_without_careful_filtering() {
        let dir = TempDir::new().unwrap();
        let config = EditorConfig {
            careful_filtering: false,
            ..sh_config(WAIT_FOR_DONE, dir.path(), true)
        };
        let session = spawn(b"hello", Some(Arc::new(Uppercasing)), &config);

        assert_eq!(session.filter_name(), Some("uppercasing"));
        assert_eq!(session.contents().unwrap(), b"HELLO");

        release_and_wait(&session);
    }

    #[test]
    fn test_round_trip_encode_failure_is_fatal() {
        let dir = TempDir::new().unwrap();
        let config = sh_config("exit 0", dir.path(), true);

        let err = EditorSession::spawn(b"hi!", Some(Arc::new(NoBang)), &config).unwrap_err();
        assert!(matches!(err, EditServerError::FilterRoundTrip { .. }));
        assert!(err.is_filter_defect());
    }

    #[test]
    fn test_html_filter_round_trip() {
        let dir = TempDir::new().unwrap();
        let config = sh_config(WAIT_FOR_DONE, dir.path(), true);
        let filter = crate::filter::by_name("html").unwrap();
        let session = spawn(b"a &lt; b<br>c", filter, &config);

        assert_eq!(std::fs::read_to_string(session.path()).unwrap(), "a < b\nc");
        simulate_save(session.path(), "a < b\nc & d");
        assert_eq!(session.contents().unwrap(), b"a &lt; b<br>c &amp; d");

        release_and_wait(&session);
    }

    #[test]
    fn test_encode_failure_returns_raw_for_that_read() {
        let dir = TempDir::new().unwrap();
        let config = sh_config(WAIT_FOR_DONE, dir.path(), true);
        let session = spawn(b"calm", Some(Arc::new(NoBang)), &config);

        simulate_save(session.path(), "loud!");
        assert_eq!(session.contents().unwrap(), b"loud!");
        // Filter is still active
        assert_eq!(session.filter_name(), Some("no-bang"));

        simulate_save(session.path(), "calm again");
        assert_eq!(session.contents().unwrap(), b"calm again");

        release_and_wait(&session);
    }

    #[test]
    fn test_invalid_utf8_on_read_returns_raw() {
        let dir = TempDir::new().unwrap();
        let config = sh_config(WAIT_FOR_DONE, dir.path(), true);
        let filter = crate::filter::by_name("plain").unwrap();
        let session = spawn(b"ok", filter, &config);

        std::fs::write(session.path(), [b'o', 0xff]).unwrap();
        assert_eq!(session.contents().unwrap(), vec![b'o', 0xff]);

        release_and_wait(&session);
    }

    #[test]
    fn test_spawn_failure_removes_temp_file() {
        let dir = TempDir::new().unwrap();
        let config = EditorConfig {
            command: vec!["/nonexistent/editor-binary".to_string()],
            temp_dir: Some(dir.path().to_path_buf()),
            ..EditorConfig::default()
        };

        let err = EditorSession::spawn(b"x", None, &config).unwrap_err();
        assert!(matches!(err, EditServerError::Spawn { ref command, .. } if command == "/nonexistent/editor-binary"));
        assert_eq!(count_files(dir.path()), 0);
    }

    #[test]
    fn test_empty_command_is_config_error() {
        let dir = TempDir::new().unwrap();
        let config = EditorConfig {
            command: Vec::new(),
            temp_dir: Some(dir.path().to_path_buf()),
            ..EditorConfig::default()
        };

        let err = EditorSession::spawn(b"x", None, &config).unwrap_err();
        assert!(matches!(err, EditServerError::Config(_)));
        assert_eq!(count_files(dir.path()), 0);
    }

    #[test]
    fn test_describe_exit_status() {
        assert_eq!(describe_exit_status(0), None);
        assert_eq!(describe_exit_status(3).as_deref(), Some("text editor returned 3"));
        assert_eq!(
            describe_exit_status(-9).as_deref(),
            Some("text editor died on signal 9")
        );
    }

    #[test]
    fn test_error_after_nonzero_exit() {
        let dir = TempDir::new().unwrap();
        let config = sh_config("exit 3", dir.path(), false);
        let session = spawn(b"x", None, &config);

        assert_eq!(session.wait_for_edit().unwrap(), Checkpoint::Exited(3));
        assert!(!session.success());
        assert_eq!(session.error().as_deref(), Some("text editor returned 3"));
    }

    #[test]
    fn test_info_snapshot() {
        let dir = TempDir::new().unwrap();
        let config = sh_config("exit 0", dir.path(), false);
        let session = spawn(b"x", crate::filter::by_name("plain").unwrap(), &config);

        let info = session.info();
        assert_eq!(info.path, session.path());
        assert_eq!(info.filter.as_deref(), Some("plain"));
        assert!(info.open);
        assert_eq!(info.exit_status, None);

        session.wait_for_edit().unwrap();
        let info = session.info();
        assert!(!info.open);
        assert_eq!(info.exit_status, Some(0));
    }
}
