//! Pagination types
//!
//! Defines the bookkeeping values shared by the state machine and the
//! event loop.

use crate::types::Cursor;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Generation
// ============================================================================

/// Lineage of one restart. Later generations invalidate earlier fetches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    /// The generation before the first restart
    pub const INITIAL: Generation = Generation(0);

    /// The generation following this one
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Raw counter value
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Fetch Kind
// ============================================================================

/// Which loader a fetch goes through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    /// Page 1, loaded from params
    FirstPage,
    /// Page 2 and later, loaded from a cursor
    NextPage,
}

/// A fetch the state machine wants issued
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchRequest<P> {
    /// Load page 1 for these params
    Params {
        /// Generation the result belongs to
        generation: Generation,
        /// Root query
        params: P,
    },
    /// Load the page behind this cursor
    Cursor {
        /// Generation the result belongs to
        generation: Generation,
        /// Page number being loaded (2 or more)
        page: u32,
        /// Continuation taken from the previous page
        cursor: Cursor,
    },
}

impl<P> FetchRequest<P> {
    /// Generation this fetch belongs to
    pub fn generation(&self) -> Generation {
        match self {
            Self::Params { generation, .. } | Self::Cursor { generation, .. } => *generation,
        }
    }

    /// Page number this fetch loads
    pub fn page(&self) -> u32 {
        match self {
            Self::Params { .. } => 1,
            Self::Cursor { page, .. } => *page,
        }
    }

    /// Loader this fetch goes through
    pub fn kind(&self) -> FetchKind {
        match self {
            Self::Params { .. } => FetchKind::FirstPage,
            Self::Cursor { .. } => FetchKind::NextPage,
        }
    }
}

// ============================================================================
// Cursor State
// ============================================================================

/// What is known about the next page of the current generation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CursorState {
    /// No page has loaded yet in this generation
    #[default]
    Unknown,
    /// More pages exist behind this cursor
    More(Cursor),
    /// The last page has been loaded
    Exhausted,
}

impl CursorState {
    /// Build from an extracted cursor
    pub fn from_cursor(cursor: Option<Cursor>) -> Self {
        match cursor {
            Some(cursor) => Self::More(cursor),
            None => Self::Exhausted,
        }
    }

    /// The cursor to advance with, if any
    pub fn cursor(&self) -> Option<&Cursor> {
        match self {
            Self::More(cursor) => Some(cursor),
            _ => None,
        }
    }

    /// Check if the last page has been loaded
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted)
    }
}

// ============================================================================
// Status
// ============================================================================

/// Where the current generation is in its lifecycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PaginationStatus {
    /// Never restarted
    #[default]
    Idle,
    /// A fetch for this page is in flight
    Loading {
        /// Page being loaded
        page: u32,
    },
    /// Last fetch succeeded
    Ready {
        /// Whether a cursor for another page is known
        has_more: bool,
    },
    /// Last fetch failed
    Failed {
        /// Page whose fetch failed
        page: u32,
    },
}

impl PaginationStatus {
    /// Check if a fetch is in flight
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading { .. })
    }

    /// Check if the feed has been read to the end
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Ready { has_more: false })
    }

    /// Page being loaded, if any
    pub fn loading_page(&self) -> Option<u32> {
        match self {
            Self::Loading { page } => Some(*page),
            _ => None,
        }
    }
}

// ============================================================================
// Options
// ============================================================================

/// Behavioural switches for a paginator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginatorOptions {
    /// Drop accumulated items when page 1 of a new generation arrives
    #[serde(default)]
    pub clear_on_restart: bool,
    /// Ignore a restart whose params equal the current generation's
    #[serde(default)]
    pub distinct_until_changed: bool,
}

impl PaginatorOptions {
    /// Create default options
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set clear-on-restart
    #[must_use]
    pub fn with_clear_on_restart(mut self, clear: bool) -> Self {
        self.clear_on_restart = clear;
        self
    }

    /// Set distinct-until-changed
    #[must_use]
    pub fn with_distinct_until_changed(mut self, distinct: bool) -> Self {
        self.distinct_until_changed = distinct;
        self
    }
}

// ============================================================================
// Stats
// ============================================================================

/// Counters describing what a paginator has done
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaginatorStats {
    /// Loader calls made
    pub fetches_issued: u64,
    /// Pages merged into the accumulation
    pub pages_loaded: u64,
    /// Loader calls that failed for a live generation
    pub failures: u64,
    /// Results dropped because a restart superseded them
    pub stale_discarded: u64,
    /// Advance signals that did not lead to a fetch
    pub advances_ignored: u64,
    /// Restarts skipped by distinct-until-changed
    pub restarts_skipped: u64,
}

impl PaginatorStats {
    /// Create new stats
    pub fn new() -> Self {
        Self::default()
    }
}
