//! Common types used throughout feed-paginator
//!
//! This module contains shared type definitions, type aliases,
//! and utility types used across multiple modules.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// Ordered key-value map with string keys and values
pub type StringMap = BTreeMap<String, String>;

// ============================================================================
// Cursor
// ============================================================================

/// Opaque continuation token pointing at the next page.
///
/// Usually a "more items" URL taken verbatim from a previous response; the
/// paginator never looks inside it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    /// Create a cursor from any string
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the raw cursor value
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Take the raw cursor value
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Cursor {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Cursor {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

// ============================================================================
// Envelope
// ============================================================================

/// One decoded page: its items plus the cursor for the page after it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// Items on this page, in response order
    pub items: Vec<T>,
    /// Continuation for the next page; `None` on the last page
    #[serde(default)]
    pub cursor: Option<Cursor>,
}

impl<T> Envelope<T> {
    /// Create an envelope
    pub fn new(items: Vec<T>, cursor: Option<Cursor>) -> Self {
        Self { items, cursor }
    }

    /// Create the envelope of a last page
    pub fn last_page(items: Vec<T>) -> Self {
        Self {
            items,
            cursor: None,
        }
    }

    /// Create an envelope with a next-page cursor
    pub fn with_cursor(items: Vec<T>, cursor: impl Into<Cursor>) -> Self {
        Self {
            items,
            cursor: Some(cursor.into()),
        }
    }

    /// Whether another page follows this one
    pub fn has_more(&self) -> bool {
        self.cursor.is_some()
    }

    /// Split into items and cursor
    pub fn into_parts(self) -> (Vec<T>, Option<Cursor>) {
        (self.items, self.cursor)
    }
}

impl<T> Default for Envelope<T> {
    fn default() -> Self {
        Self::last_page(Vec::new())
    }
}

// ============================================================================
// Backoff Type
// ============================================================================

/// Type of backoff for retries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffType {
    /// Constant delay between retries
    Constant,
    /// Linear increase in delay
    Linear,
    /// Exponential increase in delay
    #[default]
    Exponential,
}

// ============================================================================
// Utilities
// ============================================================================

/// Extension trait for Option<String> to handle empty strings
pub trait OptionStringExt {
    /// Returns None if the string is empty
    fn none_if_empty(self) -> Option<String>;
}

impl OptionStringExt for Option<String> {
    fn none_if_empty(self) -> Option<String> {
        self.filter(|s| !s.is_empty())
    }
}

impl OptionStringExt for String {
    fn none_if_empty(self) -> Option<String> {
        if self.is_empty() {
            None
        } else {
            Some(self)
        }
    }
}
