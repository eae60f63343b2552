// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::unused_self)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # feed-paginator
//!
//! Incremental pagination over cursor-paged sources.
//!
//! An `ApiPaginator` turns two signals, *restart* (start over with new
//! params) and *advance* (load the next page), into an accumulated,
//! de-duplicated list of items plus a loading flag and an error stream.
//! Results of a superseded restart never reach the list.
//!
//! ## Features
//!
//! - **Generation tracking**: every restart invalidates in-flight fetches
//! - **Pluggable merge**: concat, distinct, distinct-by-key, or your own
//! - **Single flight**: repeated advances while loading are ignored
//! - **HTTP feeds**: YAML-defined JSON feeds with next-URL or `Link` cursors
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use feed_paginator::pagination::{merge, ApiPaginator};
//! use feed_paginator::{Envelope, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let paginator = ApiPaginator::<String, u32>::builder::<Envelope<u32>>()
//!         .load_with_params(|query: String| async move { fetch_first(&query).await })
//!         .load_with_cursor(|cursor| async move { fetch_next(cursor).await })
//!         .with_envelope_extractors()
//!         .merge(merge::concat_distinct)
//!         .build()?;
//!
//!     paginator.restart("rust".to_string())?;
//!     paginator.advance()?;
//!     let items = paginator.idle().await?;
//!     println!("{} items", items.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! restart(P) ─┐                      ┌─> items: Arc<Vec<T>>
//!             ├─> event loop ─> FeedState ─> loading: bool
//! advance()  ─┘        │             └─> errors: FetchFailed
//!                      v
//!                PageLoader ── HttpFeedLoader ── HttpClient + JsonEnvelopeDecoder
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// Pagination engine
pub mod pagination;

/// HTTP client with retry and rate limiting
pub mod http;

/// Response decoders
pub mod decode;

/// HTTP feed loader and params
pub mod feed;

/// Feed definitions
pub mod config;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

// Re-export commonly used types
pub use config::{load_feed_config, load_feed_config_from_str, FeedConfig};
pub use feed::{build_paginator, FeedParams, HttpFeedLoader};
pub use pagination::{ApiPaginator, PageLoader, PaginatorHandle};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
