//! dupelink - hard-link deduplication
//!
//! Walks a directory tree, proves which files have identical content through
//! a cheap-to-expensive filter pipeline, and replaces every redundant copy
//! with a hard link to a single surviving inode.
//!
//! The pipeline for one run:
//!
//! 1. [`scanner::Walker`] lists regular files (and orphaned temp links)
//! 2. [`duplicates::group_by_size`] buckets them by exact size
//! 3. Each bucket becomes a [`duplicates::CandidateBundle`] of all pairs
//! 4. [`duplicates::Pipeline`] removes pairs that cannot be merged
//! 5. [`actions::Replacer`] links the survivors with link-then-rename

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, Result};

pub mod actions;
pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod logging;
pub mod output;
pub mod progress;
pub mod scanner;
pub mod signal;

use cli::{Cli, Commands, OutputFormat};
use config::Config;
use duplicates::{DuplicateFinder, FinderConfig};
use error::ExitCode;
use output::{JsonOutput, TextOutput};
use progress::Progress;
use signal::ShutdownHandler;

/// Run the application for already parsed arguments.
///
/// # Errors
///
/// Returns an error for fatal conditions only: an unusable root, an
/// unsupported platform, a failed signal hook or an unwritable stdout.
/// Per-file and per-pair problems are reflected in the returned exit code.
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);

    let mut config = Config::load(cli.config.as_deref(), cli.profile.as_deref());
    let handler = signal::install_handler().context("Failed to install Ctrl+C handler")?;

    match cli.command {
        Commands::Link(ref args) => {
            config.merge_link_args(args);
            log::debug!("Effective configuration: {:?}", config);
            let finder = DuplicateFinder::new(engine_config(&config, &handler, cli.quiet));
            let summary = finder
                .run(&args.path)
                .with_context(|| format!("Cannot deduplicate {}", args.path.display()))?;

            let code = ExitCode::from_run(&summary);
            match config.output {
                OutputFormat::Text => write_stdout(&TextOutput::run(&summary).to_string())?,
                OutputFormat::Json => write_json(&JsonOutput::new(&summary, code))?,
            }
            Ok(code)
        }
        Commands::Clean(ref args) => {
            config.merge_clean_args(args);
            let finder = DuplicateFinder::new(engine_config(&config, &handler, cli.quiet));
            let summary = finder
                .clean(&args.path)
                .with_context(|| format!("Cannot clean {}", args.path.display()))?;

            let code = ExitCode::from_clean(&summary);
            match config.output {
                OutputFormat::Text => write_stdout(&TextOutput::clean(&summary).to_string())?,
                OutputFormat::Json => write_json(&JsonOutput::new(&summary, code))?,
            }
            Ok(code)
        }
    }
}

fn engine_config(config: &Config, handler: &ShutdownHandler, quiet: bool) -> FinderConfig {
    let mut finder_config = config.finder_config().with_shutdown_flag(handler.get_flag());
    if !quiet {
        finder_config = finder_config.with_progress_callback(Arc::new(Progress::new(false)));
    }
    finder_config
}

fn write_stdout(text: &str) -> Result<()> {
    let mut stdout = io::stdout().lock();
    stdout
        .write_all(text.as_bytes())
        .context("Failed to write summary")?;
    stdout.flush().context("Failed to write summary")
}

fn write_json<S: serde::Serialize>(output: &JsonOutput<'_, S>) -> Result<()> {
    let mut stdout = io::stdout().lock();
    output
        .write_to(&mut stdout, true)
        .context("Failed to write JSON summary")
}
