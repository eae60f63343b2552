//! Root query params for an HTTP feed

use crate::error::{Error, Result};
use crate::types::StringMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Query parameters that define one pagination generation
///
/// Ordered, so equal params always render to the same query string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeedParams(StringMap);

impl FeedParams {
    /// Create empty params
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert a parameter, replacing any previous value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Look up a parameter
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Overlay these params on a set of defaults; params win
    pub fn merged_over(&self, defaults: &StringMap) -> StringMap {
        let mut merged = defaults.clone();
        merged.extend(self.0.clone());
        merged
    }
}

/// Parse a single `key=value` pair
pub fn parse_param(s: &str) -> Result<(String, String)> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| Error::invalid_value("param", format!("expected key=value, got '{s}'")))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(Error::invalid_value("param", format!("empty key in '{s}'")));
    }
    Ok((key.to_string(), value.to_string()))
}

impl FromStr for FeedParams {
    type Err = Error;

    /// Parses `k1=v1&k2=v2`; an empty string is empty params
    fn from_str(s: &str) -> Result<Self> {
        s.split('&')
            .filter(|pair| !pair.is_empty())
            .map(parse_param)
            .collect()
    }
}

impl fmt::Display for FeedParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (k, v)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("&")?;
            }
            write!(f, "{k}={v}")?;
        }
        Ok(())
    }
}

impl FromIterator<(String, String)> for FeedParams {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<StringMap> for FeedParams {
    fn from(map: StringMap) -> Self {
        Self(map)
    }
}
