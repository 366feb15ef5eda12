//! Command-line interface definitions for dupelink.
//!
//! This module defines all CLI arguments, subcommands, and options using the clap derive API.
//! Global options (verbosity, config file, profile) apply to every subcommand.
//!
//! # Example
//!
//! ```bash
//! # Replace duplicates under a directory with hard links
//! dupelink link ~/Photos
//!
//! # Only report what would be linked, as JSON
//! dupelink link ~/Photos --dry-run --output json
//!
//! # Remove temp links left behind by an interrupted run
//! dupelink clean ~/Photos
//!
//! # Verbose mode for debugging
//! dupelink -v link ~/Photos --min-age 60
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Replace duplicate files with hard links.
///
/// dupelink walks a directory tree, finds files with identical content and
/// consolidates them into a single inode, reclaiming the space of every
/// redundant copy.
#[derive(Debug, Parser)]
#[command(name = "dupelink")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Path to a configuration file (default: platform config directory)
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Named configuration profile to apply ([profile.NAME] table)
    #[arg(long, value_name = "NAME", global = true)]
    pub profile: Option<String>,

    /// Print fatal errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands for dupelink.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Find duplicate files and replace them with hard links
    Link(LinkArgs),
    /// Remove temp links left behind by an interrupted run
    Clean(CleanArgs),
}

/// Arguments for the link subcommand.
#[derive(Debug, Args)]
pub struct LinkArgs {
    /// Directory tree to deduplicate
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Skip files whose status changed less than SECS seconds ago (0 disables)
    #[arg(long, value_name = "SECS")]
    pub min_age: Option<u64>,

    /// Compare sampled blocks for files larger than SIZE (e.g., 10MiB)
    ///
    /// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub large_file_threshold: Option<u64>,

    /// Number of size buckets processed in parallel (default: 4)
    ///
    /// Lower values reduce disk thrashing on HDDs.
    #[arg(long, value_name = "N")]
    pub io_threads: Option<usize>,

    /// Glob patterns to ignore (can be specified multiple times)
    ///
    /// These patterns are added to any .gitignore patterns found.
    #[arg(short, long = "ignore", value_name = "PATTERN")]
    pub ignore_patterns: Vec<String>,

    /// Log the links that would be made without changing anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Output format for the run summary
    #[arg(short, long, value_enum)]
    pub output: Option<OutputFormat>,

    /// Hash large files through memory maps
    ///
    /// Only safe on trees nothing else is writing to: a file truncated while
    /// it is mapped kills the process with SIGBUS.
    #[arg(long, overrides_with = "no_mmap")]
    pub mmap: bool,

    /// Hash large files with buffered reads
    #[arg(long, overrides_with = "mmap")]
    pub no_mmap: bool,

    /// Leave orphaned temp links from earlier runs in place
    #[arg(long)]
    pub keep_orphans: bool,
}

impl LinkArgs {
    /// Explicit `--mmap` / `--no-mmap` choice, if any.
    #[must_use]
    pub fn mmap_override(&self) -> Option<bool> {
        if self.mmap {
            Some(true)
        } else if self.no_mmap {
            Some(false)
        } else {
            None
        }
    }
}

/// Arguments for the clean subcommand.
#[derive(Debug, Args)]
pub struct CleanArgs {
    /// Directory tree to clean
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Log the temp files that would be removed without removing them
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Output format for the cleanup summary
    #[arg(short, long, value_enum)]
    pub output: Option<OutputFormat>,
}

/// Output format for run summaries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable summary
    #[default]
    Text,
    /// JSON output for scripting
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Parse a human-readable size string into bytes.
///
/// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB
/// Case-insensitive. Numbers without suffix are treated as bytes.
///
/// # Examples
///
/// ```
/// use dupelink::cli::parse_size;
///
/// assert_eq!(parse_size("1024").unwrap(), 1024);
/// assert_eq!(parse_size("1KB").unwrap(), 1000);
/// assert_eq!(parse_size("1KiB").unwrap(), 1024);
/// assert_eq!(parse_size("10MiB").unwrap(), 10_485_760);
/// ```
/// # Errors
///
/// Returns an error if the string is empty, contains an invalid number,
/// a negative number, or an unknown size suffix.
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Size cannot be empty".to_string());
    }

    // Find where the number ends and the suffix begins
    let (num_str, suffix) = match s.find(|c: char| !c.is_ascii_digit() && c != '.') {
        Some(idx) => (&s[..idx], s[idx..].trim().to_uppercase()),
        None => (s, String::new()),
    };

    let num: f64 = num_str
        .parse()
        .map_err(|_| format!("Invalid number: '{num_str}'"))?;

    if num < 0.0 {
        return Err("Size cannot be negative".to_string());
    }

    let multiplier: u64 = match suffix.as_str() {
        "" | "B" => 1,
        "KB" | "K" => 1_000,
        "KIB" => 1_024,
        "MB" | "M" => 1_000_000,
        "MIB" => 1_048_576,
        "GB" | "G" => 1_000_000_000,
        "GIB" => 1_073_741_824,
        "TB" | "T" => 1_000_000_000_000,
        "TIB" => 1_099_511_627_776,
        _ => return Err(format!("Unknown size suffix: '{suffix}'")),
    };

    Ok((num * multiplier as f64) as u64)
}
