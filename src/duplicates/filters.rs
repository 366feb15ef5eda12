//! The duplicate filter pipeline.
//!
//! # Overview
//!
//! A [`CandidateBundle`] of same-size pairs is passed through five stages,
//! cheapest first. Each stage returns a bundle with the pairs it could not
//! disprove; the [`Pipeline`] stops as soon as a bundle is empty.
//!
//! 1. [`PropertiesFilter`] - `stat` both files: freshness, device, inode, owner
//! 2. [`FileTypeFilter`] - extensions must match (no I/O)
//! 3. [`FirstBlockFilter`] - hash of the first 4 KiB
//! 4. [`SampledBlockFilter`] - hashes of four spread-out blocks (large files only)
//! 5. [`FullHashFilter`] - hash of the whole content (authoritative)
//!
//! A stat or read failure on either member of a pair only removes that pair.
//! Nothing in this module aborts a bundle or the run.

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use serde::Serialize;

use super::groups::{CandidateBundle, CandidatePair};
use crate::scanner::{hash_to_hex, FileIdentity, Hash, HashError, Hasher, PREHASH_SIZE};

/// Default minimum age of a file's last status change before it may be linked.
pub const DEFAULT_MIN_AGE: Duration = Duration::from_secs(10);

/// Default size above which the sampled-block stage runs.
pub const DEFAULT_LARGE_FILE_THRESHOLD: u64 = 10 * 1024 * 1024;

/// Number of equal parts a large file is divided into to size a sample block.
pub const SAMPLE_BLOCK_DIVISOR: u64 = 100;

/// One stage of the pipeline.
pub trait Filter: Send + Sync {
    /// Short stage name used in logs and statistics.
    fn name(&self) -> &'static str;

    /// Return the pairs of `bundle` this stage could not rule out.
    fn apply(&self, bundle: CandidateBundle) -> CandidateBundle;
}

/// Tuning for the standard pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterConfig {
    /// Files changed more recently than this are left alone
    pub min_age: Duration,
    /// Files strictly larger than this get the sampled-block check
    pub large_file_threshold: u64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_age: DEFAULT_MIN_AGE,
            large_file_threshold: DEFAULT_LARGE_FILE_THRESHOLD,
        }
    }
}

/// Pair counts before and after one stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StageStats {
    /// Stage name
    pub name: &'static str,
    /// Pairs entering the stage
    pub input: usize,
    /// Pairs surviving the stage
    pub output: usize,
}

impl StageStats {
    /// Pairs removed by the stage.
    #[must_use]
    pub fn removed(&self) -> usize {
        self.input - self.output
    }
}

/// Ordered chain of filters.
pub struct Pipeline {
    stages: Vec<Box<dyn Filter>>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.stages.iter().map(|s| s.name()))
            .finish()
    }
}

impl Pipeline {
    /// Build a pipeline from explicit stages.
    #[must_use]
    pub fn new(stages: Vec<Box<dyn Filter>>) -> Self {
        Self { stages }
    }

    /// The five standard stages in their fixed order.
    #[must_use]
    pub fn standard(config: FilterConfig, hasher: Arc<Hasher>) -> Self {
        Self::new(vec![
            Box::new(PropertiesFilter::new(config.min_age)),
            Box::new(FileTypeFilter),
            Box::new(FirstBlockFilter::new(hasher.clone())),
            Box::new(SampledBlockFilter::new(
                hasher.clone(),
                config.large_file_threshold,
            )),
            Box::new(FullHashFilter::new(hasher)),
        ])
    }

    /// Stage names in execution order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run the bundle through every stage, stopping once it is empty.
    ///
    /// Returns the surviving bundle and statistics for the stages that ran.
    #[must_use]
    pub fn run(&self, mut bundle: CandidateBundle) -> (CandidateBundle, Vec<StageStats>) {
        let mut stats = Vec::with_capacity(self.stages.len());

        for stage in &self.stages {
            if bundle.is_empty() {
                break;
            }
            let input = bundle.len();
            bundle = stage.apply(bundle);
            log::debug!(
                "size {}: {} kept {}/{} pairs",
                bundle.filesize,
                stage.name(),
                bundle.len(),
                input
            );
            stats.push(StageStats {
                name: stage.name(),
                input,
                output: bundle.len(),
            });
        }

        (bundle, stats)
    }
}

/// Why two files may not be merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// One of the files changed within the freshness window
    Fresh,
    /// The files live on different devices
    CrossDevice,
    /// The files already share an inode
    AlreadyLinked,
    /// Same inode but a link count of 1: two names for one entry, or a race
    InodeCollision,
    /// Owner uid or gid differ
    OwnerMismatch,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::Fresh => "changed too recently",
            Self::CrossDevice => "on different devices",
            Self::AlreadyLinked => "already hard linked",
            Self::InodeCollision => "same inode with a single link",
            Self::OwnerMismatch => "owner differs",
        };
        f.write_str(reason)
    }
}

/// Decide whether two stat snapshots allow linking.
///
/// # Errors
///
/// Returns the first [`Rejection`] that applies, checked in the order
/// freshness, device, inode, owner.
pub fn check_properties(
    a: &FileIdentity,
    b: &FileIdentity,
    now: SystemTime,
    min_age: Duration,
) -> Result<(), Rejection> {
    if a.is_fresh(now, min_age) || b.is_fresh(now, min_age) {
        return Err(Rejection::Fresh);
    }
    if a.dev != b.dev {
        return Err(Rejection::CrossDevice);
    }
    if a.ino == b.ino {
        return Err(if a.nlink == 1 {
            Rejection::InodeCollision
        } else {
            Rejection::AlreadyLinked
        });
    }
    if a.uid != b.uid || a.gid != b.gid {
        return Err(Rejection::OwnerMismatch);
    }
    Ok(())
}

/// Stage 1: filesystem properties.
#[derive(Debug, Clone)]
pub struct PropertiesFilter {
    min_age: Duration,
}

impl PropertiesFilter {
    /// Create the stage with the given freshness window.
    #[must_use]
    pub fn new(min_age: Duration) -> Self {
        Self { min_age }
    }
}

impl Filter for PropertiesFilter {
    fn name(&self) -> &'static str {
        "properties"
    }

    fn apply(&self, bundle: CandidateBundle) -> CandidateBundle {
        // "now" is sampled once per invocation
        let now = SystemTime::now();
        let mut identities: HashMap<PathBuf, Option<FileIdentity>> = HashMap::new();
        let mut stat = |path: &Path| -> Option<FileIdentity> {
            *identities
                .entry(path.to_path_buf())
                .or_insert_with(|| match FileIdentity::stat(path) {
                    Ok(identity) => Some(identity),
                    Err(e) => {
                        log::warn!("Cannot stat {} (removing): {}", path.display(), e);
                        None
                    }
                })
        };

        bundle.retain(|pair| {
            let a = stat(pair.first.as_path());
            let b = stat(pair.second.as_path());
            let (Some(a), Some(b)) = (a, b) else {
                return false;
            };
            match check_properties(&a, &b, now, self.min_age) {
                Ok(()) => true,
                Err(Rejection::InodeCollision) => {
                    log::warn!(
                        "Inodes equal with a single link: {} = {}",
                        pair.first.display(),
                        pair.second.display()
                    );
                    false
                }
                Err(reason) => {
                    log::debug!(
                        "Skipping {} / {}: {}",
                        pair.first.display(),
                        pair.second.display(),
                        reason
                    );
                    false
                }
            }
        })
    }
}

/// Stage 2: file extensions must match exactly (case-sensitive).
#[derive(Debug, Clone, Copy, Default)]
pub struct FileTypeFilter;

impl Filter for FileTypeFilter {
    fn name(&self) -> &'static str {
        "file-type"
    }

    fn apply(&self, bundle: CandidateBundle) -> CandidateBundle {
        bundle.retain(|pair| {
            let same = pair.first.extension() == pair.second.extension();
            if !same {
                log::trace!(
                    "Extension mismatch: {} / {}",
                    pair.first.display(),
                    pair.second.display()
                );
            }
            same
        })
    }
}

/// Memoize a per-path digest for the duration of one stage invocation.
///
/// Failures are cached as `None` so an unreadable file is reported once and
/// removes every pair it belongs to.
fn cached_digest<F>(
    cache: &mut HashMap<PathBuf, Option<Hash>>,
    path: &Path,
    stage: &str,
    compute: F,
) -> Option<Hash>
where
    F: FnOnce(&Path) -> Result<Hash, HashError>,
{
    if let Some(cached) = cache.get(path) {
        return *cached;
    }
    let digest = match compute(path) {
        Ok(hash) => {
            log::trace!("{}: {} {}", stage, hash_to_hex(&hash), path.display());
            Some(hash)
        }
        Err(e) => {
            log::warn!("{}: {} (removing)", stage, e);
            None
        }
    };
    cache.insert(path.to_path_buf(), digest);
    digest
}

/// Stage 3: hash of the first `min(4096, filesize)` bytes.
#[derive(Debug, Clone)]
pub struct FirstBlockFilter {
    hasher: Arc<Hasher>,
}

impl FirstBlockFilter {
    /// Create the stage.
    #[must_use]
    pub fn new(hasher: Arc<Hasher>) -> Self {
        Self { hasher }
    }
}

impl Filter for FirstBlockFilter {
    fn name(&self) -> &'static str {
        "first-block"
    }

    fn apply(&self, bundle: CandidateBundle) -> CandidateBundle {
        let filesize = bundle.filesize;
        let mut cache = HashMap::new();
        let mut digest = |path: &Path| {
            cached_digest(&mut cache, path, self.name(), |p| {
                self.hasher.prehash(p, filesize)
            })
        };

        log::trace!(
            "size {}: comparing first {} bytes",
            filesize,
            filesize.min(PREHASH_SIZE as u64)
        );
        bundle.retain(|pair| {
            let a = digest(pair.first.as_path());
            let b = digest(pair.second.as_path());
            matches!((a, b), (Some(a), Some(b)) if a == b)
        })
    }
}

/// Stage 4: hashes of four sample blocks, for files above a size threshold.
#[derive(Debug, Clone)]
pub struct SampledBlockFilter {
    hasher: Arc<Hasher>,
    threshold: u64,
}

impl SampledBlockFilter {
    /// Create the stage; bundles at or below `threshold` bytes pass untouched.
    #[must_use]
    pub fn new(hasher: Arc<Hasher>, threshold: u64) -> Self {
        Self { hasher, threshold }
    }

    /// Sample block length and offsets for a file of `filesize` bytes.
    ///
    /// Offsets are start, quarter, half and `filesize - block`.
    #[must_use]
    pub fn sample_layout(filesize: u64) -> (u64, [u64; 4]) {
        let block = (filesize / SAMPLE_BLOCK_DIVISOR).min(filesize);
        let offsets = [0, filesize / 4, filesize / 2, filesize - block];
        (block, offsets)
    }

    fn samples_match(&self, pair: &CandidatePair, filesize: u64) -> Result<bool, HashError> {
        let open = |path: &Path| File::open(path).map_err(|e| HashError::from_io(path, e));
        let file_a = open(pair.first.as_path())?;
        let file_b = open(pair.second.as_path())?;

        let (block, offsets) = Self::sample_layout(filesize);
        for offset in offsets {
            let a = self.hasher.hash_range(&file_a, &pair.first, offset, block)?;
            let b = self.hasher.hash_range(&file_b, &pair.second, offset, block)?;
            if a != b {
                log::trace!(
                    "Sample mismatch at offset {}: {} / {}",
                    offset,
                    pair.first.display(),
                    pair.second.display()
                );
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl Filter for SampledBlockFilter {
    fn name(&self) -> &'static str {
        "sampled-block"
    }

    fn apply(&self, bundle: CandidateBundle) -> CandidateBundle {
        let filesize = bundle.filesize;
        if filesize <= self.threshold {
            return bundle;
        }

        bundle.retain(|pair| match self.samples_match(pair, filesize) {
            Ok(same) => same,
            Err(e) => {
                log::warn!("{}: {} (removing)", self.name(), e);
                false
            }
        })
    }
}

/// Stage 5: hash of the entire content.
#[derive(Debug, Clone)]
pub struct FullHashFilter {
    hasher: Arc<Hasher>,
}

impl FullHashFilter {
    /// Create the stage.
    #[must_use]
    pub fn new(hasher: Arc<Hasher>) -> Self {
        Self { hasher }
    }
}

impl Filter for FullHashFilter {
    fn name(&self) -> &'static str {
        "full-hash"
    }

    fn apply(&self, bundle: CandidateBundle) -> CandidateBundle {
        let filesize = bundle.filesize;
        let mut cache = HashMap::new();
        let mut digest = |path: &Path| {
            cached_digest(&mut cache, path, self.name(), |p| {
                self.hasher.full_hash_sized(p, filesize)
            })
        };

        bundle.retain(|pair| {
            let a = digest(pair.first.as_path());
            let b = digest(pair.second.as_path());
            matches!((a, b), (Some(a), Some(b)) if a == b)
        })
    }
}
