//! edit-server: edit text from elsewhere (typically a browser text field) in
//! an external text editor.
//!
//! The core is [`session::EditorSession`]: contents go into a temp file, an
//! editor is launched on it, and the caller waits for saves and for the
//! editor to exit. Optional [`filter`]s convert between the caller's
//! representation (e.g. HTML) and the plain text the editor sees.
//!
//! With the `cli` feature the crate also provides the `edit-server` binary;
//! `server` (on by default) adds the HTTP front end used by the browser
//! extension.

pub mod error;
pub mod filter;
pub mod session;
pub mod settings;

#[cfg(feature = "cli")]
pub mod cli;

pub use error::{EditServerError, Result};
pub use filter::{ContentFilter, FilterError};
pub use session::{Checkpoint, EditorConfig, EditorSession, SessionInfo, SessionManager};
