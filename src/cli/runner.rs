//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands, OutputFormat};
use crate::config::{load_feed_config, FeedConfig};
use crate::error::{Error, Result};
use crate::feed::{build_paginator, FeedParams};
use crate::pagination::{PaginationStatus, PaginatorStats};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Items and counters from one `fetch` run
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    /// Accumulated items
    pub items: Arc<Vec<Value>>,
    /// Paginator counters at the end of the run
    pub stats: PaginatorStats,
    /// Whether the feed has pages left
    pub has_more: bool,
    /// Wall-clock time
    pub elapsed: Duration,
}

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Fetch {
                params,
                max_pages,
                format,
            } => {
                let params = params.iter().cloned().collect();
                self.fetch(params, *max_pages, *format).await
            }
            Commands::Validate => self.validate(),
        }
    }

    /// Load feed definition
    fn load_feed(&self) -> Result<FeedConfig> {
        let path = self
            .cli
            .feed
            .as_ref()
            .ok_or_else(|| Error::config("Feed file not specified (use --feed)"))?;
        load_feed_config(path)
    }

    fn validate(&self) -> Result<()> {
        let feed = self.load_feed()?;
        let first_page = format!(
            "{}/{}",
            feed.base_url.trim_end_matches('/'),
            feed.path.trim_start_matches('/')
        );
        println!(
            "Feed '{}' is valid: {} (items: {}, dedup: {})",
            feed.name,
            first_page.trim_end_matches('/'),
            feed.items_path.as_deref().unwrap_or("<body>"),
            feed.dedup_key.as_deref().unwrap_or("none"),
        );
        Ok(())
    }

    async fn fetch(
        &self,
        params: FeedParams,
        max_pages: Option<u32>,
        format: OutputFormat,
    ) -> Result<()> {
        let feed = self.load_feed()?;
        info!("Fetching feed '{}' with params '{}'", feed.name, params);

        let outcome = fetch_feed(&feed, params, max_pages).await?;
        print!("{}", render_items(&outcome.items, format)?);

        eprintln!(
            "{} items from {} pages in {:.2?}{}",
            outcome.items.len(),
            outcome.stats.pages_loaded,
            outcome.elapsed,
            if outcome.has_more {
                " (more pages available)"
            } else {
                ""
            }
        );
        Ok(())
    }
}

/// Restart a feed with `params` and advance until exhausted or `max_pages`
///
/// The first fetch failure aborts the run.
pub async fn fetch_feed(
    feed: &FeedConfig,
    params: FeedParams,
    max_pages: Option<u32>,
) -> Result<FetchOutcome> {
    let started = Instant::now();
    let paginator = build_paginator(feed)?;
    let mut errors = paginator.errors();

    paginator.restart(params)?;
    let has_more = loop {
        paginator.idle().await?;
        let status = *paginator.status().borrow();
        let pages = paginator.stats().borrow().pages_loaded;

        match status {
            PaginationStatus::Failed { .. } => {
                let err = errors.recv().await.map_err(|_| Error::Closed)?;
                paginator.shutdown().await;
                return Err(match &*err {
                    Error::FetchFailed { page, source } => Error::FetchFailed {
                        page: *page,
                        source: Arc::clone(source),
                    },
                    other => Error::Other(other.to_string()),
                });
            }
            PaginationStatus::Ready { has_more: true }
                if max_pages.map_or(true, |max| pages < u64::from(max)) =>
            {
                debug!("Page {} loaded, advancing", pages);
                paginator.advance()?;
            }
            PaginationStatus::Ready { has_more } => break has_more,
            PaginationStatus::Idle | PaginationStatus::Loading { .. } => break false,
        }
    };

    let outcome = FetchOutcome {
        items: paginator.current_items(),
        stats: paginator.stats().borrow().clone(),
        has_more,
        elapsed: started.elapsed(),
    };
    paginator.shutdown().await;
    Ok(outcome)
}

/// Render items for stdout
pub fn render_items(items: &[Value], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => {
            let mut out = String::new();
            for item in items {
                out.push_str(&serde_json::to_string(item)?);
                out.push('\n');
            }
            Ok(out)
        }
        OutputFormat::Pretty => {
            let mut out = serde_json::to_string_pretty(items)?;
            out.push('\n');
            Ok(out)
        }
    }
}
