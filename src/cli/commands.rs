//! CLI commands and argument parsing

use crate::feed::parse_param;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Incremental paginator for cursor-paged JSON feeds
#[derive(Parser, Debug)]
#[command(name = "feed-paginator")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Feed definition file (YAML)
    #[arg(short, long, global = true)]
    pub feed: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch pages until the feed is exhausted
    Fetch {
        /// Query parameter for the first page (repeatable)
        #[arg(short, long = "param", value_name = "KEY=VALUE", value_parser = parse_param)]
        params: Vec<(String, String)>,

        /// Stop after this many pages
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        max_pages: Option<u32>,

        /// Output format
        #[arg(long, default_value = "json")]
        format: OutputFormat,
    },

    /// Validate the feed definition
    Validate,
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// One JSON item per line
    Json,
    /// Pretty-printed JSON array
    Pretty,
}
