use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::filter::FilterError;

#[derive(Debug, Error)]
pub enum EditServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to launch text editor '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    /// The filter does not reproduce its own output. Never recovered from.
    #[error("filter '{filter}' is lossy. decoded:\n{decoded}\n\nre-decoded:\n{redecoded}")]
    LossyFilter {
        filter: String,
        decoded: String,
        redecoded: String,
    },

    #[error("filter '{filter}' failed its round-trip check: {source}")]
    FilterRoundTrip {
        filter: String,
        #[source]
        source: FilterError,
    },

    #[error("Unknown filter: {0}")]
    UnknownFilter(String),

    #[error("Session not found: {}", .0.display())]
    SessionNotFound(PathBuf),

    #[error("Maximum session limit ({0}) reached")]
    SessionLimitReached(usize),
}

impl EditServerError {
    /// True for errors that point at a defective filter rather than bad input.
    pub fn is_filter_defect(&self) -> bool {
        matches!(
            self,
            EditServerError::LossyFilter { .. } | EditServerError::FilterRoundTrip { .. }
        )
    }
}

// Serialized as its message for HTTP error bodies
impl Serialize for EditServerError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EditServerError>;
