//! Pagination module
//!
//! Incremental pagination over a cursor-paged source.
//!
//! # Overview
//!
//! The pagination module turns two input signals, *restart* (start over
//! with new params) and *advance* (fetch the next page), into an
//! accumulated list of items and a loading flag:
//!
//! - `FeedState` - the pure state machine: generations, cursor, merge
//! - `ApiPaginator` - a tokio event loop driving `FeedState` and a loader
//! - `PageLoader` - the fetch abstraction (`FnLoader` wraps closures)
//! - `merge` - policies for combining pages (`concat_distinct` and friends)

pub mod merge;

mod loader;
mod paginator;
mod state;
mod types;

pub use loader::{cursor_fn, params_fn, CursorLoadFn, FnLoader, PageLoader, ParamsLoadFn};
pub use merge::MergeFn;
pub use paginator::{
    ApiPaginator, CursorFn, ItemsFn, PageTransformFn, PaginatorBuilder, PaginatorHandle,
};
pub use state::FeedState;
pub use types::{
    CursorState, FetchKind, FetchRequest, Generation, PaginationStatus, PaginatorOptions,
    PaginatorStats,
};

#[cfg(test)]
mod tests;
