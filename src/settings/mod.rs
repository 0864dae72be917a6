//! TOML-based settings for edit-server.
//!
//! Settings are loaded from `~/.edit-server/settings.toml` with environment
//! variable interpolation support. The editor command keeps working through
//! the `EDIT_SERVER_EDITOR` variable when the file does not set one.
//!
//! # Usage
//!
//! ```rust,ignore
//! use edit_server::settings::SettingsManager;
//!
//! let manager = SettingsManager::new().await?;
//! let settings = manager.get().await;
//! let config = settings.editor.resolve()?;
//! ```

pub mod loader;
pub mod schema;

pub use loader::{get_with_env_fallback, lookup, settings_path, SettingsManager};
pub use schema::{EditServerSettings, EditorSettings, LoggingSettings, ServerSettings};
