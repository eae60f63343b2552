//! Decoder implementations

use super::types::{CursorSource, DecoderConfig, EnvelopeDecoder};
use crate::error::{Error, Result};
use crate::types::{Cursor, Envelope, OptionStringExt};
use reqwest::header::{HeaderMap, LINK};
use serde_json::Value;

// ============================================================================
// JSON Envelope Decoder
// ============================================================================

/// JSON decoder producing one envelope per response
#[derive(Debug, Clone, Default)]
pub struct JsonEnvelopeDecoder {
    config: DecoderConfig,
}

impl JsonEnvelopeDecoder {
    /// Create a decoder for a bare JSON array without pagination
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a decoder from a config
    pub fn from_config(config: DecoderConfig) -> Self {
        Self { config }
    }

    /// Create a decoder with an items path
    pub fn with_items_path(path: impl Into<String>) -> Self {
        Self::from_config(DecoderConfig::new().with_items_path(path))
    }

    /// Set the cursor source
    #[must_use]
    pub fn with_cursor(mut self, cursor: CursorSource) -> Self {
        self.config.cursor = cursor;
        self
    }

    /// Decoder configuration
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Extract the page's items from a JSON value
    fn extract_items(&self, value: &Value) -> Result<Vec<Value>> {
        match &self.config.items_path {
            Some(path) => {
                // Only reach for jsonpath-rust on wildcards
                if path.contains('*') && !path.contains("[-") {
                    extract_with_jsonpath(value, path)
                } else {
                    match extract_value(value, path) {
                        Some(Value::Array(arr)) => Ok(arr),
                        Some(Value::Null) | None => Ok(vec![]),
                        Some(v) => Ok(vec![v]),
                    }
                }
            }
            None => match value {
                Value::Array(arr) => Ok(arr.clone()),
                _ => Err(Error::decode(
                    "Expected a JSON array when no items_path is configured",
                )),
            },
        }
    }

    /// Extract the next-page cursor; absent, null or empty means last page
    fn extract_cursor(&self, value: &Value, headers: &HeaderMap) -> Option<Cursor> {
        match &self.config.cursor {
            CursorSource::None => None,
            CursorSource::NextUrl { path } => extract_string(value, path)
                .none_if_empty()
                .map(Cursor::from),
            CursorSource::LinkHeader { rel } => headers
                .get(LINK)
                .and_then(|v| v.to_str().ok())
                .and_then(|header| parse_link_header(header, rel))
                .map(Cursor::from),
        }
    }
}

impl EnvelopeDecoder for JsonEnvelopeDecoder {
    fn decode(&self, body: &str, headers: &HeaderMap) -> Result<Envelope<Value>> {
        let value: Value = serde_json::from_str(body)
            .map_err(|e| Error::decode(format!("Failed to parse JSON: {e}")))?;
        let items = self.extract_items(&value)?;
        let cursor = self.extract_cursor(&value, headers);
        Ok(Envelope::new(items, cursor))
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Extract a value using simple dot-notation path
///
/// Supports `$.`-prefixed paths and array indexing such as `data[0]` or
/// `items[-1]`.
pub fn extract_value(value: &Value, path: &str) -> Option<Value> {
    let path = path.strip_prefix("$.").unwrap_or(path);
    let parts: Vec<&str> = path.split('.').collect();

    let mut current = value;
    for part in parts {
        if let Some(bracket_pos) = part.find('[') {
            let name = &part[..bracket_pos];
            let index_str = part[bracket_pos + 1..].strip_suffix(']')?;

            if !name.is_empty() {
                current = current.get(name)?;
            }

            if index_str == "*" {
                return Some(current.clone());
            }

            let index = index_str.parse::<i64>().ok()?;
            let Value::Array(arr) = current else {
                return None;
            };
            #[allow(clippy::cast_possible_wrap)]
            let idx = if index < 0 {
                arr.len() as i64 + index
            } else {
                index
            };
            current = arr.get(usize::try_from(idx).ok()?)?;
        } else {
            current = current.get(part)?;
        }
    }

    Some(current.clone())
}

/// Extract a scalar at a path as a string
pub fn extract_string(value: &Value, path: &str) -> Option<String> {
    match extract_value(value, path)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Extract items using jsonpath-rust
fn extract_with_jsonpath(value: &Value, path: &str) -> Result<Vec<Value>> {
    use jsonpath_rust::JsonPath;

    let jp = JsonPath::try_from(path)
        .map_err(|e| Error::json_path(format!("Invalid JSONPath: {e}")))?;

    match jp.find(value) {
        Value::Array(arr) => Ok(arr),
        Value::Null => Ok(vec![]),
        other => Ok(vec![other]),
    }
}

/// Parse a Link header and extract the URL for the given rel
pub fn parse_link_header(header: &str, target_rel: &str) -> Option<String> {
    // <url>; rel="next", <url>; rel="prev"
    for part in header.split(',') {
        let mut url = None;
        let mut rel = None;

        for segment in part.trim().split(';') {
            let segment = segment.trim();
            if segment.starts_with('<') && segment.ends_with('>') {
                url = Some(&segment[1..segment.len() - 1]);
            } else if let Some(stripped) = segment.strip_prefix("rel=") {
                rel = Some(stripped.trim_matches('"').trim_matches('\''));
            }
        }

        if let (Some(u), Some(r)) = (url, rel) {
            if r.split_whitespace().any(|r| r == target_rel) {
                return Some(u.to_string());
            }
        }
    }

    None
}
