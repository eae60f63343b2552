//! Decoder types and traits
//!
//! Defines where a page's items and its next-page cursor live in a response.

use crate::error::Result;
use crate::types::Envelope;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Where the next-page cursor comes from
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CursorSource {
    /// Single-page feed
    #[default]
    None,

    /// URL (or token) at a path in the response body
    ///
    /// Common patterns:
    /// - `{ "next": "https://api.example.com/items?page=2" }`
    /// - `{ "urls": { "api": { "more_updates": "..." } } }`
    NextUrl {
        /// Dot path to the cursor
        path: String,
    },

    /// RFC 5988 `Link` header
    LinkHeader {
        /// Rel value to follow
        #[serde(default = "default_rel")]
        rel: String,
    },
}

fn default_rel() -> String {
    "next".to_string()
}

impl CursorSource {
    /// Cursor at a body path
    pub fn next_url(path: impl Into<String>) -> Self {
        Self::NextUrl { path: path.into() }
    }

    /// Cursor in the `Link` header
    pub fn link_header(rel: impl Into<String>) -> Self {
        Self::LinkHeader { rel: rel.into() }
    }
}

/// Configuration for decoding page responses
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Path to the items array (JSON body is the array when unset)
    pub items_path: Option<String>,
    /// Where to find the next cursor
    pub cursor: CursorSource,
}

impl DecoderConfig {
    /// Create a decoder config for a bare JSON array
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the items path
    #[must_use]
    pub fn with_items_path(mut self, path: impl Into<String>) -> Self {
        self.items_path = Some(path.into());
        self
    }

    /// Set the cursor source
    #[must_use]
    pub fn with_cursor(mut self, cursor: CursorSource) -> Self {
        self.cursor = cursor;
        self
    }
}

/// Trait for decoding a page response into an envelope
pub trait EnvelopeDecoder: Send + Sync {
    /// Decode a response body (plus its headers) into items and cursor
    fn decode(&self, body: &str, headers: &HeaderMap) -> Result<Envelope<Value>>;
}
