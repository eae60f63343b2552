//! HTTP feeds
//!
//! Glue between a YAML feed definition and the pagination engine: an
//! `HttpFeedLoader` that fetches and decodes pages, `FeedParams` as the
//! restart value, and `build_paginator` to wire them together.

mod loader;
mod params;

pub use loader::HttpFeedLoader;
pub use params::{parse_param, FeedParams};

use crate::config::FeedConfig;
use crate::decode::extract_value;
use crate::error::Result;
use crate::pagination::{merge, ApiPaginator};
use crate::types::Envelope;
use serde_json::Value;

/// Build a paginator over the feed described by `config`
///
/// Must be called inside a tokio runtime. With a `dedup_key`, pages merge
/// distinct by that key (items lacking it are compared whole); otherwise
/// pages are concatenated.
pub fn build_paginator(config: &FeedConfig) -> Result<ApiPaginator<FeedParams, Value>> {
    config.validate()?;
    let loader = HttpFeedLoader::from_config(config)?;

    let builder = ApiPaginator::<FeedParams, Value>::builder::<Envelope<Value>>()
        .loader(loader)
        .with_envelope_extractors()
        .options(config.pagination);

    let builder = match config.dedup_key.clone() {
        Some(key) => builder.merge(merge::concat_distinct_by_key(move |item: &Value| {
            extract_value(item, &key)
                .unwrap_or_else(|| item.clone())
                .to_string()
        })),
        None => builder.merge(merge::concat),
    };

    builder.build()
}
