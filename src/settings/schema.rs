//! Settings schema definitions for edit-server configuration.
//!
//! All settings structs use `#[serde(default)]` to allow partial configuration files.
//! Missing fields are filled with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::loader::get_with_env_fallback;
use crate::error::{EditServerError, Result};
use crate::session::{
    EditorConfig, DEFAULT_EDITOR_COMMAND, DEFAULT_MAX_SESSIONS, DEFAULT_TEMP_PREFIX,
};

/// Environment variable consulted when no editor command is configured.
pub const EDITOR_ENV_VAR: &str = "EDIT_SERVER_EDITOR";

/// Root settings structure.
///
/// Loaded from `~/.edit-server/settings.toml` with environment variable interpolation support.
/// Version field enables future migrations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EditServerSettings {
    /// Schema version for migrations
    pub version: u32,

    /// External editor and session behaviour
    pub editor: EditorSettings,

    /// HTTP listener
    pub server: ServerSettings,

    pub logging: LoggingSettings,
}

/// External editor configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EditorSettings {
    /// Editor command line; the temp file path is appended (supports $ENV_VAR syntax)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    /// Directory for temp files (default: system temp dir)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_dir: Option<PathBuf>,

    /// Temp file name prefix
    pub prefix: String,

    /// Report every save, not only editor exit
    pub incremental: bool,

    /// Refuse filters that do not round-trip the content
    pub careful_filtering: bool,

    /// How often the editor and file are polled
    pub poll_interval_ms: u64,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Maximum concurrently open editors
    pub max_sessions: usize,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingSettings {
    /// `tracing_subscriber::EnvFilter` directives, overridden by RUST_LOG
    pub filter: String,
}

impl Default for EditServerSettings {
    fn default() -> Self {
        Self {
            version: 1,
            editor: EditorSettings::default(),
            server: ServerSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            command: None,
            temp_dir: None,
            prefix: DEFAULT_TEMP_PREFIX.to_string(),
            incremental: true,
            careful_filtering: true,
            poll_interval_ms: 1000,
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9292,
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "edit_server=info".to_string(),
        }
    }
}

impl EditorSettings {
    /// The command line to run, before tokenizing.
    ///
    /// Priority: settings value, then `$EDIT_SERVER_EDITOR`, then `gvim -f`.
    pub fn command_line(&self) -> String {
        get_with_env_fallback(
            &self.command,
            &[EDITOR_ENV_VAR],
            Some(DEFAULT_EDITOR_COMMAND.to_string()),
        )
        .unwrap_or_else(|| DEFAULT_EDITOR_COMMAND.to_string())
    }

    /// Build the runtime session config.
    pub fn resolve(&self) -> Result<EditorConfig> {
        let line = self.command_line();
        let command = shell_words::split(&line)
            .map_err(|e| EditServerError::Config(format!("editor command '{}': {}", line, e)))?;
        if command.is_empty() {
            return Err(EditServerError::Config("editor command is empty".to_string()));
        }
        if self.poll_interval_ms == 0 {
            return Err(EditServerError::Config(
                "editor.poll_interval_ms must be positive".to_string(),
            ));
        }

        Ok(EditorConfig {
            command,
            temp_dir: self.temp_dir.clone(),
            prefix: self.prefix.clone(),
            incremental: self.incremental,
            careful_filtering: self.careful_filtering,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        })
    }
}
