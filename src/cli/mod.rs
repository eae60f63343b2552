//! CLI module
//!
//! Command-line interface for paging through feeds.
//!
//! # Commands
//!
//! - `fetch` - Restart with the given params and advance until exhausted
//! - `validate` - Check a feed definition

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputFormat};
pub use runner::{fetch_feed, render_items, FetchOutcome, Runner};
