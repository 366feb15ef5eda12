//! Size bucketing and candidate pair generation.
//!
//! # Overview
//!
//! Files of different sizes can never be duplicates, so the first step is to
//! group scanned files by exact byte size. Sizes with a single member are
//! discarded. Every remaining bucket is expanded into the set of unordered
//! pairs that the filter pipeline will try to disprove.
//!
//! Pair generation is `C(N, 2)` per bucket. A bucket of thousands of
//! identically-sized files therefore yields millions of pairs; this quadratic
//! growth is a known limitation of pairwise comparison.
//!
//! # Example
//!
//! ```
//! use dupelink::duplicates::{group_by_size, CandidateBundle};
//! use dupelink::scanner::FileEntry;
//! use std::path::PathBuf;
//!
//! let files = vec![
//!     FileEntry::new(PathBuf::from("/d/a.txt"), 10),
//!     FileEntry::new(PathBuf::from("/d/b.txt"), 10),
//!     FileEntry::new(PathBuf::from("/d/c.txt"), 10),
//!     FileEntry::new(PathBuf::from("/d/d.txt"), 20),
//! ];
//!
//! let (buckets, stats) = group_by_size(files);
//! assert_eq!(buckets.len(), 1);
//! assert_eq!(stats.eliminated_unique, 1);
//!
//! let bundle = CandidateBundle::from_bucket(&buckets[0]);
//! assert_eq!(bundle.len(), 3);
//! ```

use std::collections::HashMap;
use std::path::PathBuf;

use crate::scanner::FileEntry;

/// All scanned paths sharing one exact byte size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeBucket {
    /// File size in bytes (shared by every path at scan time)
    pub size: u64,
    /// Paths in this bucket, sorted
    pub paths: Vec<PathBuf>,
}

impl SizeBucket {
    /// Create a bucket. Paths are sorted so pair order is deterministic.
    #[must_use]
    pub fn new(size: u64, mut paths: Vec<PathBuf>) -> Self {
        paths.sort();
        Self { size, paths }
    }

    /// Number of paths in this bucket.
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Check if this bucket is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Number of unordered pairs this bucket expands to.
    #[must_use]
    pub fn pair_count(&self) -> usize {
        let n = self.paths.len();
        n * n.saturating_sub(1) / 2
    }

    /// Upper bound of bytes reclaimable if every member were a duplicate.
    #[must_use]
    pub fn potential_savings(&self) -> u64 {
        self.size * (self.paths.len() as u64).saturating_sub(1)
    }
}

/// Statistics from size bucketing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupingStats {
    /// Files fed into bucketing
    pub total_files: usize,
    /// Files whose size no other file shares
    pub eliminated_unique: usize,
    /// Files that landed in a bucket with 2+ members
    pub potential_duplicates: usize,
    /// Number of buckets with 2+ members
    pub bucket_count: usize,
}

impl GroupingStats {
    /// Percentage of files eliminated by size alone.
    #[must_use]
    pub fn elimination_rate(&self) -> f64 {
        if self.total_files == 0 {
            0.0
        } else {
            (self.eliminated_unique as f64 / self.total_files as f64) * 100.0
        }
    }
}

/// Group files by exact size, keeping only sizes shared by 2+ files.
///
/// Buckets are returned sorted by descending size so the largest potential
/// savings are claimed first by the worker pool.
#[must_use]
pub fn group_by_size(files: Vec<FileEntry>) -> (Vec<SizeBucket>, GroupingStats) {
    let mut stats = GroupingStats {
        total_files: files.len(),
        ..Default::default()
    };

    let mut by_size: HashMap<u64, Vec<PathBuf>> = HashMap::new();
    for file in files {
        by_size.entry(file.size).or_default().push(file.path);
    }

    let mut buckets: Vec<SizeBucket> = by_size
        .into_iter()
        .filter_map(|(size, paths)| {
            if paths.len() < 2 {
                stats.eliminated_unique += paths.len();
                None
            } else {
                stats.potential_duplicates += paths.len();
                Some(SizeBucket::new(size, paths))
            }
        })
        .collect();

    buckets.sort_by(|a, b| b.size.cmp(&a.size));
    stats.bucket_count = buckets.len();

    log::debug!(
        "Size bucketing: {} files -> {} buckets ({:.1}% eliminated)",
        stats.total_files,
        stats.bucket_count,
        stats.elimination_rate()
    );

    (buckets, stats)
}

/// Two distinct paths considered for duplicate testing.
///
/// `first` is the link source (its inode survives), `second` is the path
/// that gets replaced.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CandidatePair {
    /// Path whose inode is kept
    pub first: PathBuf,
    /// Path that becomes a hard link to `first`
    pub second: PathBuf,
}

impl CandidatePair {
    /// Create a pair.
    #[must_use]
    pub fn new(first: PathBuf, second: PathBuf) -> Self {
        debug_assert_ne!(first, second, "self-pairs are never generated");
        Self { first, second }
    }
}

/// Candidate pairs for one file size, threaded through the filter pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateBundle {
    /// Size shared by every file in the bundle
    pub filesize: u64,
    /// Remaining candidate pairs
    pub pairs: Vec<CandidatePair>,
}

impl CandidateBundle {
    /// Create a bundle from explicit pairs.
    #[must_use]
    pub fn new(filesize: u64, pairs: Vec<CandidatePair>) -> Self {
        Self { filesize, pairs }
    }

    /// Expand a bucket into every unordered pair of distinct paths, once each.
    #[must_use]
    pub fn from_bucket(bucket: &SizeBucket) -> Self {
        Self::new(bucket.size, candidate_pairs(&bucket.paths))
    }

    /// Number of pairs in the bundle.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// An empty bundle is the terminal "no duplicates" state.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Keep only pairs for which `keep` returns true.
    #[must_use]
    pub fn retain<F>(mut self, mut keep: F) -> Self
    where
        F: FnMut(&CandidatePair) -> bool,
    {
        self.pairs.retain(|pair| keep(pair));
        self
    }
}

/// Enumerate all `C(N, 2)` unordered pairs of `paths`.
///
/// Pair `(i, j)` is produced for every `i < j`, so no pair appears twice and
/// no path is paired with itself. Duplicate entries in `paths` are skipped.
#[must_use]
pub fn candidate_pairs(paths: &[PathBuf]) -> Vec<CandidatePair> {
    let n = paths.len();
    let mut pairs = Vec::with_capacity(n * n.saturating_sub(1) / 2);
    for i in 0..n {
        for j in (i + 1)..n {
            if paths[i] == paths[j] {
                continue;
            }
            pairs.push(CandidatePair::new(paths[i].clone(), paths[j].clone()));
        }
    }
    pairs
}
