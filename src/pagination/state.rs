//! Pagination state machine
//!
//! `FeedState` is the single owned record of a feed's progress. It performs
//! no I/O: every transition returns what the caller has to do next (issue a
//! fetch, publish items) and the event loop carries it out.

use super::merge::MergeFn;
use super::types::{
    CursorState, FetchRequest, Generation, PaginationStatus, PaginatorOptions, PaginatorStats,
};
use crate::types::Cursor;
use std::sync::Arc;
use tracing::trace;

/// Accumulated state of one feed
pub struct FeedState<P, T> {
    options: PaginatorOptions,
    merge: MergeFn<T>,
    generation: Generation,
    params: Option<P>,
    items: Arc<Vec<T>>,
    cursor: CursorState,
    /// Page number of the fetch in flight for `generation`
    in_flight: Option<u32>,
    /// Highest page merged in `generation`
    pages_loaded: u32,
    status: PaginationStatus,
    stats: PaginatorStats,
}

impl<P, T> FeedState<P, T>
where
    P: Clone + PartialEq,
{
    /// Create an empty state
    pub fn new(options: PaginatorOptions, merge: MergeFn<T>) -> Self {
        Self {
            options,
            merge,
            generation: Generation::INITIAL,
            params: None,
            items: Arc::new(Vec::new()),
            cursor: CursorState::Unknown,
            in_flight: None,
            pages_loaded: 0,
            status: PaginationStatus::Idle,
            stats: PaginatorStats::default(),
        }
    }

    /// Start a new generation for `params`
    ///
    /// Returns the page-1 fetch to issue, or `None` when the restart is
    /// skipped by distinct-until-changed. Any fetch still in flight belongs
    /// to the old generation from here on and its result will be discarded.
    pub fn restart(&mut self, params: P) -> Option<FetchRequest<P>> {
        if self.options.distinct_until_changed
            && self.params.as_ref() == Some(&params)
            && !matches!(self.status, PaginationStatus::Failed { .. })
        {
            trace!(generation = %self.generation, "restart skipped, params unchanged");
            self.stats.restarts_skipped += 1;
            return None;
        }

        self.generation = self.generation.next();
        self.params = Some(params.clone());
        self.cursor = CursorState::Unknown;
        self.pages_loaded = 0;
        self.in_flight = Some(1);
        self.status = PaginationStatus::Loading { page: 1 };
        self.stats.fetches_issued += 1;

        Some(FetchRequest::Params {
            generation: self.generation,
            params,
        })
    }

    /// Request the next page
    ///
    /// Returns `None` while a fetch is in flight, before page 1 of the
    /// generation has loaded, and once the last page has loaded.
    pub fn advance(&mut self) -> Option<FetchRequest<P>> {
        if self.in_flight.is_some() {
            trace!(generation = %self.generation, "advance ignored, fetch in flight");
            self.stats.advances_ignored += 1;
            return None;
        }

        let Some(cursor) = self.cursor.cursor().cloned() else {
            trace!(generation = %self.generation, cursor = ?self.cursor, "advance ignored, no cursor");
            self.stats.advances_ignored += 1;
            return None;
        };

        let page = self.pages_loaded + 1;
        self.in_flight = Some(page);
        self.status = PaginationStatus::Loading { page };
        self.stats.fetches_issued += 1;

        Some(FetchRequest::Cursor {
            generation: self.generation,
            page,
            cursor,
        })
    }

    /// Merge a fetched page into the accumulation
    ///
    /// Returns the new snapshot to publish, or `None` when the result
    /// belongs to a superseded generation.
    pub fn apply_page(
        &mut self,
        generation: Generation,
        page_items: Vec<T>,
        cursor: Option<Cursor>,
    ) -> Option<Arc<Vec<T>>> {
        let Some(page) = self.take_in_flight(generation) else {
            self.stats.stale_discarded += 1;
            return None;
        };

        let merged = if page == 1 && self.options.clear_on_restart {
            (self.merge)(&[], page_items)
        } else {
            (self.merge)(&self.items, page_items)
        };

        self.items = Arc::new(merged);
        self.cursor = CursorState::from_cursor(cursor);
        self.pages_loaded = page;
        self.status = PaginationStatus::Ready {
            has_more: !self.cursor.is_exhausted(),
        };
        self.stats.pages_loaded += 1;

        Some(Arc::clone(&self.items))
    }

    /// Record a failed fetch
    ///
    /// Items and cursor are left untouched, so a failed page 2+ can be
    /// retried with another advance. Returns the failed page number, or
    /// `None` for a superseded generation.
    pub fn apply_failure(&mut self, generation: Generation) -> Option<u32> {
        let Some(page) = self.take_in_flight(generation) else {
            self.stats.stale_discarded += 1;
            return None;
        };

        self.status = PaginationStatus::Failed { page };
        self.stats.failures += 1;
        Some(page)
    }

    fn take_in_flight(&mut self, generation: Generation) -> Option<u32> {
        if generation != self.generation {
            return None;
        }
        self.in_flight.take()
    }

    /// Current generation
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Params of the current generation
    pub fn params(&self) -> Option<&P> {
        self.params.as_ref()
    }

    /// Accumulated items
    pub fn items(&self) -> &Arc<Vec<T>> {
        &self.items
    }

    /// Next-page knowledge
    pub fn cursor(&self) -> &CursorState {
        &self.cursor
    }

    /// Lifecycle status
    pub fn status(&self) -> PaginationStatus {
        self.status
    }

    /// Check if a fetch is in flight
    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Counters
    pub fn stats(&self) -> &PaginatorStats {
        &self.stats
    }

    /// Options in effect
    pub fn options(&self) -> PaginatorOptions {
        self.options
    }
}

impl<P, T> std::fmt::Debug for FeedState<P, T>
where
    P: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedState")
            .field("generation", &self.generation)
            .field("params", &self.params)
            .field("items", &self.items.len())
            .field("cursor", &self.cursor)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}
