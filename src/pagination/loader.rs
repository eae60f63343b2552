//! Page loader abstraction
//!
//! The paginator never performs I/O itself. It goes through a `PageLoader`,
//! which knows how to fetch page 1 from structured params and any later page
//! from an opaque cursor. Retries, timeouts and backoff are the loader's
//! business.

use crate::error::Result;
use crate::types::Cursor;
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use std::future::Future;
use std::sync::Arc;

/// Source of pages for a paginator
#[async_trait]
pub trait PageLoader<P, E>: Send + Sync
where
    P: Send + 'static,
    E: Send + 'static,
{
    /// Load page 1 for the given params
    async fn load_by_params(&self, params: P) -> Result<E>;

    /// Load the page a cursor points at
    async fn load_by_cursor(&self, cursor: Cursor) -> Result<E>;
}

/// Boxed page-1 loader function
pub type ParamsLoadFn<P, E> = Arc<dyn Fn(P) -> BoxFuture<'static, Result<E>> + Send + Sync>;

/// Boxed cursor loader function
pub type CursorLoadFn<E> = Arc<dyn Fn(Cursor) -> BoxFuture<'static, Result<E>> + Send + Sync>;

/// Box an async params loader
pub fn params_fn<P, E, F, Fut>(f: F) -> ParamsLoadFn<P, E>
where
    F: Fn(P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<E>> + Send + 'static,
{
    Arc::new(move |params| f(params).boxed())
}

/// Box an async cursor loader
pub fn cursor_fn<E, F, Fut>(f: F) -> CursorLoadFn<E>
where
    F: Fn(Cursor) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<E>> + Send + 'static,
{
    Arc::new(move |cursor| f(cursor).boxed())
}

/// `PageLoader` made of two async functions
pub struct FnLoader<P, E> {
    by_params: ParamsLoadFn<P, E>,
    by_cursor: CursorLoadFn<E>,
}

impl<P, E> FnLoader<P, E> {
    /// Create a loader from already-boxed functions
    pub fn from_parts(by_params: ParamsLoadFn<P, E>, by_cursor: CursorLoadFn<E>) -> Self {
        Self {
            by_params,
            by_cursor,
        }
    }

    /// Create a loader from two async functions
    pub fn new<FP, FutP, FC, FutC>(by_params: FP, by_cursor: FC) -> Self
    where
        FP: Fn(P) -> FutP + Send + Sync + 'static,
        FutP: Future<Output = Result<E>> + Send + 'static,
        FC: Fn(Cursor) -> FutC + Send + Sync + 'static,
        FutC: Future<Output = Result<E>> + Send + 'static,
    {
        Self::from_parts(params_fn(by_params), cursor_fn(by_cursor))
    }
}

#[async_trait]
impl<P, E> PageLoader<P, E> for FnLoader<P, E>
where
    P: Send + 'static,
    E: Send + 'static,
{
    async fn load_by_params(&self, params: P) -> Result<E> {
        (self.by_params)(params).await
    }

    async fn load_by_cursor(&self, cursor: Cursor) -> Result<E> {
        (self.by_cursor)(cursor).await
    }
}

impl<P, E> Clone for FnLoader<P, E> {
    fn clone(&self) -> Self {
        Self {
            by_params: Arc::clone(&self.by_params),
            by_cursor: Arc::clone(&self.by_cursor),
        }
    }
}

impl<P, E> std::fmt::Debug for FnLoader<P, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnLoader").finish_non_exhaustive()
    }
}
