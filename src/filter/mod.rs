//! Content filters between the wire representation and the editable text.
//!
//! A filter turns the raw bytes a client sends into the text shown in the
//! editor (`decode`) and turns the edited text back into wire bytes
//! (`encode`). Sessions only trust a filter whose pair is lossless for the
//! content at hand; see [`crate::session::EditorSession::spawn`].
//!
//! # Available filters
//!
//! | Name | Filter |
//! |------|--------|
//! | `none` | no filtering, the raw bytes are edited |
//! | `plain` | [`PlainFilter`], strict UTF-8 |
//! | `html` | [`HtmlFilter`], `<br>` and character references |

mod html;
mod plain;

use std::fmt::Debug;
use std::sync::Arc;

use thiserror::Error;

use crate::error::{EditServerError, Result};

pub use html::HtmlFilter;
pub use plain::PlainFilter;

/// Failure of a single `decode` or `encode` call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("contents are not valid UTF-8: {0}")]
    InvalidUtf8(String),

    #[error("unsupported markup: <{0}>")]
    UnsupportedMarkup(String),

    #[error("unknown character reference: &{0};")]
    UnknownEntity(String),

    #[error("unterminated {0}")]
    Unterminated(&'static str),

    #[error("{0}")]
    Other(String),
}

/// Pluggable transformer between wire bytes and editable text.
pub trait ContentFilter: Send + Sync + Debug {
    /// Short name used in logs and in the `x-filter` request header.
    fn name(&self) -> &str;

    /// Wire bytes to editor text.
    fn decode(&self, raw: &[u8]) -> std::result::Result<String, FilterError>;

    /// Editor text to wire bytes.
    fn encode(&self, text: &str) -> std::result::Result<Vec<u8>, FilterError>;
}

/// Look up a filter by name. `none` and the empty string select no filter.
pub fn by_name(name: &str) -> Result<Option<Arc<dyn ContentFilter>>> {
    match name.trim().to_ascii_lowercase().as_str() {
        "" | "none" => Ok(None),
        "plain" | "text" => Ok(Some(Arc::new(PlainFilter))),
        "html" => Ok(Some(Arc::new(HtmlFilter))),
        other => Err(EditServerError::UnknownFilter(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_by_name_known_filters() {
        assert_eq!(by_name("html").unwrap().unwrap().name(), "html");
        assert_eq!(by_name(" HTML ").unwrap().unwrap().name(), "html");
        assert_eq!(by_name("plain").unwrap().unwrap().name(), "plain");
        assert_eq!(by_name("text").unwrap().unwrap().name(), "plain");
    }

    #[test]
    fn test_by_name_none() {
        assert!(by_name("none").unwrap().is_none());
        assert!(by_name("").unwrap().is_none());
    }

    #[test]
    fn test_by_name_unknown() {
        let err = by_name("markdown").unwrap_err();
        assert!(matches!(err, EditServerError::UnknownFilter(ref n) if n == "markdown"));
    }
}
