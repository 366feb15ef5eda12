//! Run orchestration: walk, bucket, filter, link.
//!
//! # Overview
//!
//! [`DuplicateFinder::run`] drives one complete deduplication pass:
//! 1. **Walk** the tree, collecting regular files and orphaned temp links
//! 2. **Clean** orphaned temp links (optional)
//! 3. **Bucket** files by exact size
//! 4. **Filter and link** each bucket on a bounded worker pool; a bucket runs
//!    the whole pipeline and then replaces its surviving pairs, sequentially
//!
//! Buckets never share a path, so workers never touch the same file.
//!
//! # Example
//!
//! ```no_run
//! use dupelink::duplicates::{DuplicateFinder, FinderConfig};
//! use std::path::Path;
//!
//! let config = FinderConfig::default().with_io_threads(4).with_dry_run(true);
//! let finder = DuplicateFinder::new(config);
//!
//! let summary = finder.run(Path::new("/srv/photos")).unwrap();
//! println!("{} pairs would be linked", summary.links.would_link);
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytesize::ByteSize;
use rayon::prelude::*;
use serde::Serialize;

use super::filters::{FilterConfig, Pipeline, StageStats};
use super::groups::{group_by_size, CandidateBundle, SizeBucket};
use crate::actions::link::{clean_orphans, CleanupStats, LinkStats, Replacer};
use crate::progress::{ProgressCallback, PHASE_BUCKETS, PHASE_WALKING};
use crate::scanner::{FileEntry, FileIdentity, Hasher, ScanError, WalkItem, Walker, WalkerConfig};

/// Configuration for a deduplication run.
#[derive(Clone)]
pub struct FinderConfig {
    /// Number of bucket workers.
    /// Default is 4 to prevent disk thrashing.
    pub io_threads: usize,
    /// Filter pipeline tuning.
    pub filter: FilterConfig,
    /// Walker configuration for directory traversal.
    pub walker_config: WalkerConfig,
    /// Log links instead of performing them.
    pub dry_run: bool,
    /// Use memory-mapped full hashing for large files.
    pub use_mmap: bool,
    /// Remove orphaned temp links found by the walk.
    pub clean_orphans: bool,
    /// Optional shutdown flag for graceful termination.
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress callback for reporting.
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for FinderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinderConfig")
            .field("io_threads", &self.io_threads)
            .field("filter", &self.filter)
            .field("walker_config", &self.walker_config)
            .field("dry_run", &self.dry_run)
            .field("use_mmap", &self.use_mmap)
            .field("clean_orphans", &self.clean_orphans)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            io_threads: 4,
            filter: FilterConfig::default(),
            walker_config: WalkerConfig::default(),
            dry_run: false,
            use_mmap: false,
            clean_orphans: true,
            shutdown_flag: None,
            progress_callback: None,
        }
    }
}

impl FinderConfig {
    /// Set the number of bucket workers (at least 1).
    #[must_use]
    pub fn with_io_threads(mut self, threads: usize) -> Self {
        self.io_threads = threads.max(1);
        self
    }

    /// Set the freshness window. Zero disables the check.
    #[must_use]
    pub fn with_min_age(mut self, min_age: Duration) -> Self {
        self.filter.min_age = min_age;
        self
    }

    /// Set the size above which sampled blocks are compared.
    #[must_use]
    pub fn with_large_file_threshold(mut self, threshold: u64) -> Self {
        self.filter.large_file_threshold = threshold;
        self
    }

    /// Set the walker configuration.
    #[must_use]
    pub fn with_walker_config(mut self, config: WalkerConfig) -> Self {
        self.walker_config = config;
        self
    }

    /// Enable dry-run mode.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Enable memory-mapped hashing.
    #[must_use]
    pub fn with_mmap(mut self, enabled: bool) -> Self {
        self.use_mmap = enabled;
        self
    }

    /// Enable or disable orphaned temp cleanup before linking.
    #[must_use]
    pub fn with_clean_orphans(mut self, enabled: bool) -> Self {
        self.clean_orphans = enabled;
        self
    }

    /// Set the shutdown flag for graceful termination.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Check if shutdown has been requested.
    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }
}

/// Statistics for one complete run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    /// Root that was scanned
    pub root: PathBuf,
    /// Whether links were only logged
    pub dry_run: bool,
    /// Regular, non-empty files found
    pub total_files: usize,
    /// Walk errors (logged and skipped)
    pub scan_errors: usize,
    /// Orphaned temp links found by the walk
    pub orphans_found: usize,
    /// Orphan cleanup results
    pub orphans: CleanupStats,
    /// Size buckets with 2+ files
    pub buckets: usize,
    /// Buckets not processed because of a shutdown request
    pub buckets_skipped: usize,
    /// Pairs generated across all processed buckets
    pub candidate_pairs: usize,
    /// Pair counts per filter stage, in pipeline order
    pub stages: Vec<StageStats>,
    /// Pairs that survived every stage
    pub verified_pairs: usize,
    /// Replacement results
    pub links: LinkStats,
    /// Whether the run stopped early
    pub interrupted: bool,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
}

impl RunSummary {
    /// Whether any duplicate content was found, linked or not.
    #[must_use]
    pub fn found_duplicates(&self) -> bool {
        self.links.linked + self.links.would_link + self.links.already_linked > 0
    }

    /// Whether any per-file or per-pair error occurred.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.scan_errors > 0 || self.links.failed > 0 || self.orphans.failed > 0
    }

    /// Reclaimed space as a human-readable string.
    #[must_use]
    pub fn reclaimed_display(&self) -> String {
        ByteSize::b(self.links.bytes_reclaimed).to_string()
    }

    fn add_stages(&mut self, stages: &[StageStats]) {
        for stage in stages {
            match self.stages.iter_mut().find(|s| s.name == stage.name) {
                Some(total) => {
                    total.input += stage.input;
                    total.output += stage.output;
                }
                None => self.stages.push(stage.clone()),
            }
        }
    }
}

/// Statistics for a cleanup-only run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanSummary {
    /// Root that was scanned
    pub root: PathBuf,
    /// Whether removals were only logged
    pub dry_run: bool,
    /// Orphaned temp links found
    pub orphans_found: usize,
    /// Cleanup results
    pub orphans: CleanupStats,
    /// Walk errors (logged and skipped)
    pub scan_errors: usize,
    /// Whether the walk stopped early
    pub interrupted: bool,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
}

/// Errors that end a run before any linking happens.
#[derive(thiserror::Error, Debug)]
pub enum FinderError {
    /// The run was interrupted by user (Ctrl+C or shutdown signal).
    #[error("Run interrupted by user")]
    Interrupted,

    /// The provided path does not exist.
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// The provided path is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// The platform lacks the inode metadata hard linking relies on.
    #[error("Hard-link deduplication is not supported on this platform")]
    Unsupported,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// An I/O error occurred with a specific path.
    #[error("I/O error for {path}: {source}")]
    IoWithPath {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// A scan error occurred.
    #[error(transparent)]
    ScanError(#[from] ScanError),
}

/// Result of walking the root.
#[derive(Debug, Default)]
struct WalkResult {
    files: Vec<FileEntry>,
    orphans: Vec<PathBuf>,
    errors: usize,
}

/// Result of processing one bucket.
#[derive(Debug, Default)]
struct BucketReport {
    pairs: usize,
    stages: Vec<StageStats>,
    verified: usize,
    links: LinkStats,
    skipped: bool,
}

/// Deduplication engine tying the scanner, pipeline and replacer together.
///
/// # Example
///
/// ```no_run
/// use dupelink::duplicates::DuplicateFinder;
/// use std::path::Path;
///
/// let finder = DuplicateFinder::with_defaults();
/// match finder.run(Path::new(".")) {
///     Ok(summary) => println!("Linked {} pairs", summary.links.linked),
///     Err(e) => eprintln!("Run failed: {}", e),
/// }
/// ```
pub struct DuplicateFinder {
    config: FinderConfig,
    pipeline: Pipeline,
    replacer: Replacer,
}

impl DuplicateFinder {
    /// Create a new finder with the given configuration.
    #[must_use]
    pub fn new(config: FinderConfig) -> Self {
        let hasher = Arc::new(Hasher::new().with_mmap(config.use_mmap));
        let pipeline = Pipeline::standard(config.filter, hasher);
        let replacer = Replacer::new().with_dry_run(config.dry_run);
        Self {
            config,
            pipeline,
            replacer,
        }
    }

    /// Create a new finder with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(FinderConfig::default())
    }

    /// The configuration this finder runs with.
    #[must_use]
    pub fn config(&self) -> &FinderConfig {
        &self.config
    }

    /// The filter pipeline every bucket goes through.
    #[must_use]
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Deduplicate every file under `path`.
    ///
    /// # Errors
    ///
    /// Returns `FinderError` if:
    /// - The platform does not support hard-link deduplication
    /// - The path does not exist, is not a directory or cannot be read
    /// - Shutdown was requested before the run started
    ///
    /// Per-file and per-pair failures are logged and counted in the
    /// returned summary instead. A shutdown request during the run yields a
    /// summary with `interrupted` set.
    pub fn run(&self, path: &Path) -> Result<RunSummary, FinderError> {
        let start_time = Instant::now();
        let mut summary = RunSummary {
            root: path.to_path_buf(),
            dry_run: self.config.dry_run,
            stages: self
                .pipeline
                .stage_names()
                .into_iter()
                .map(|name| StageStats {
                    name,
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };

        self.preflight(path)?;
        log::info!("Starting deduplication of {}", path.display());

        let walked = self.walk(path);
        summary.total_files = walked.files.len();
        summary.scan_errors = walked.errors;
        summary.orphans_found = walked.orphans.len();

        if self.config.is_shutdown_requested() {
            log::warn!("Shutdown requested during walk, nothing was linked");
            summary.interrupted = true;
            summary.duration_ms = elapsed_ms(start_time);
            return Ok(summary);
        }

        if self.config.clean_orphans && !walked.orphans.is_empty() {
            summary.orphans = clean_orphans(&walked.orphans, self.config.dry_run);
        } else if !walked.orphans.is_empty() {
            log::info!(
                "Leaving {} orphaned temp file(s) in place",
                walked.orphans.len()
            );
        }

        let (buckets, size_stats) = group_by_size(walked.files);
        summary.buckets = buckets.len();
        log::info!(
            "Size grouping: {} files -> {} buckets ({:.1}% eliminated)",
            size_stats.total_files,
            size_stats.bucket_count,
            size_stats.elimination_rate()
        );

        if !buckets.is_empty() {
            for report in self.process_buckets(&buckets) {
                if report.skipped {
                    summary.buckets_skipped += 1;
                    continue;
                }
                summary.candidate_pairs += report.pairs;
                summary.verified_pairs += report.verified;
                summary.add_stages(&report.stages);
                summary.links.merge(&report.links);
            }
        }

        summary.interrupted = summary.buckets_skipped > 0;
        summary.duration_ms = elapsed_ms(start_time);

        log::info!(
            "Run complete: {} linked, {} already linked, {} failed, {} reclaimed",
            summary.links.linked + summary.links.would_link,
            summary.links.already_linked,
            summary.links.failed,
            summary.reclaimed_display()
        );

        Ok(summary)
    }

    /// Only remove orphaned temp links under `path`.
    ///
    /// # Errors
    ///
    /// Same fatal conditions as [`DuplicateFinder::run`].
    pub fn clean(&self, path: &Path) -> Result<CleanSummary, FinderError> {
        let start_time = Instant::now();
        self.preflight(path)?;
        log::info!("Looking for orphaned temp files under {}", path.display());

        let walked = self.walk(path);
        let interrupted = self.config.is_shutdown_requested();
        let orphans = if interrupted {
            CleanupStats::default()
        } else {
            clean_orphans(&walked.orphans, self.config.dry_run)
        };

        Ok(CleanSummary {
            root: path.to_path_buf(),
            dry_run: self.config.dry_run,
            orphans_found: walked.orphans.len(),
            orphans,
            scan_errors: walked.errors,
            interrupted,
            duration_ms: elapsed_ms(start_time),
        })
    }

    /// Checks that make the whole run impossible.
    fn preflight(&self, path: &Path) -> Result<(), FinderError> {
        if !FileIdentity::is_supported() {
            return Err(FinderError::Unsupported);
        }
        if self.config.is_shutdown_requested() {
            return Err(FinderError::Interrupted);
        }
        validate_root(path)
    }

    fn walk(&self, path: &Path) -> WalkResult {
        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_start(PHASE_WALKING, 0);
            callback.on_message(&format!("Walking {}", path.display()));
        }

        let mut walker = Walker::new(path, self.config.walker_config.clone());
        if let Some(ref flag) = self.config.shutdown_flag {
            walker = walker.with_shutdown_flag(flag.clone());
        }

        let mut result = WalkResult::default();
        for item in walker.walk() {
            match item {
                Ok(WalkItem::File(file)) => {
                    if let Some(ref callback) = self.config.progress_callback {
                        callback.on_progress(
                            result.files.len() + 1,
                            file.path.to_string_lossy().as_ref(),
                        );
                    }
                    result.files.push(file);
                }
                Ok(WalkItem::OrphanedTemp(temp)) => {
                    log::info!("Found orphaned temp file {}", temp.display());
                    result.orphans.push(temp);
                }
                Err(e) => {
                    // The walker already logged the cause
                    log::debug!("Counting scan error for {}", e.path().display());
                    result.errors += 1;
                }
            }
        }

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_end(PHASE_WALKING);
        }

        log::info!(
            "Found {} files, {} orphaned temp files, {} errors",
            result.files.len(),
            result.orphans.len(),
            result.errors
        );
        result
    }

    /// Process every bucket on a pool of `io_threads` workers.
    fn process_buckets(&self, buckets: &[SizeBucket]) -> Vec<BucketReport> {
        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_start(PHASE_BUCKETS, buckets.len());
        }

        let done = AtomicUsize::new(0);
        let work = || {
            buckets
                .par_iter()
                .map(|bucket| {
                    let report = self.process_bucket(bucket);
                    let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
                    if let Some(ref callback) = self.config.progress_callback {
                        callback.on_progress(finished, &format!("{} bytes", bucket.size));
                        callback.on_item_completed(bucket.size * bucket.len() as u64);
                    }
                    report
                })
                .collect::<Vec<_>>()
        };

        let reports = match rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.io_threads)
            .build()
        {
            Ok(pool) => pool.install(work),
            Err(e) => {
                log::warn!(
                    "Failed to create worker pool ({}), using global pool with {} threads",
                    e,
                    rayon::current_num_threads()
                );
                work()
            }
        };

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_end(PHASE_BUCKETS);
        }

        reports
    }

    /// Filter one bucket and link its surviving pairs.
    fn process_bucket(&self, bucket: &SizeBucket) -> BucketReport {
        if self.config.is_shutdown_requested() {
            log::debug!("Shutdown requested, skipping bucket of size {}", bucket.size);
            return BucketReport {
                skipped: true,
                ..Default::default()
            };
        }

        let bundle = CandidateBundle::from_bucket(bucket);
        let pairs = bucket.pair_count();
        log::debug!(
            "Bucket of size {}: {} files, {} pairs, up to {} reclaimable",
            bucket.size,
            bucket.len(),
            pairs,
            ByteSize::b(bucket.potential_savings())
        );

        let (survivors, stages) = self.pipeline.run(bundle);
        let links = self.replacer.replace_bundle(&survivors);

        BucketReport {
            pairs,
            stages,
            verified: survivors.len(),
            links,
            skipped: false,
        }
    }
}

/// The root must exist, be a directory and be readable.
fn validate_root(path: &Path) -> Result<(), FinderError> {
    let metadata = fs::metadata(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            FinderError::PathNotFound(path.to_path_buf())
        } else {
            FinderError::IoWithPath {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    if !metadata.is_dir() {
        return Err(FinderError::NotADirectory(path.to_path_buf()));
    }

    fs::read_dir(path).map_err(|source| FinderError::IoWithPath {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
