use super::{ContentFilter, FilterError};

/// Passes text through unchanged but refuses bytes that are not UTF-8.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainFilter;

impl ContentFilter for PlainFilter {
    fn name(&self) -> &str {
        "plain"
    }

    fn decode(&self, raw: &[u8]) -> Result<String, FilterError> {
        String::from_utf8(raw.to_vec()).map_err(|e| FilterError::InvalidUtf8(e.to_string()))
    }

    fn encode(&self, text: &str) -> Result<Vec<u8>, FilterError> {
        Ok(text.as_bytes().to_vec())
    }
}
