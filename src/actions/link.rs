//! Hard-link replacement of verified duplicates.
//!
//! # Overview
//!
//! For a pair `(A, B)` that survived the whole filter pipeline, B's directory
//! entry is swapped for a hard link to A's inode:
//!
//! 1. pairs touching a temp path are refused
//! 2. both paths are re-stat'ed; a shared inode means there is nothing to do
//! 3. a stale `B.dupelink.tmp` from a crashed run is removed
//! 4. `A` is hard linked to `B.dupelink.tmp`
//! 5. `B.dupelink.tmp` is renamed over `B`
//!
//! Until step 5, B's original content is still reachable under its original
//! name. A crash between 4 and 5 leaves an orphaned temp link and an
//! untouched B. Such leftovers are picked up by [`clean_orphans`].
//!
//! # Example
//!
//! ```no_run
//! use dupelink::actions::link::{LinkOutcome, Replacer};
//! use std::path::Path;
//!
//! let replacer = Replacer::new();
//! match replacer.replace(Path::new("/d/a.txt"), Path::new("/d/b.txt"), 10) {
//!     Ok(LinkOutcome::Linked { reclaimed }) => println!("freed {reclaimed} bytes"),
//!     Ok(other) => println!("{other:?}"),
//!     Err(e) => eprintln!("{e}"),
//! }
//! ```

use std::collections::HashMap;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::duplicates::CandidateBundle;
use crate::scanner::walker::is_temp_path;
use crate::scanner::{FileIdentity, TEMP_SUFFIX};

/// Errors that can occur while replacing a file with a hard link.
#[derive(thiserror::Error, Debug)]
pub enum LinkError {
    /// One of the pair could not be stat'ed right before linking.
    #[error("Cannot stat {path}: {source}")]
    Stat {
        /// Path that failed
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// A leftover temp link could not be removed.
    #[error("Cannot remove stale temp file {path}: {source}")]
    RemoveStale {
        /// Temp path
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The hard link to the temp path could not be created.
    #[error("Cannot link {target} -> {link}: {source}")]
    CreateLink {
        /// Existing file whose inode is kept
        target: PathBuf,
        /// Temp path the link was meant to appear at
        link: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The temp link could not be renamed over the destination.
    #[error("Cannot rename {from} -> {to}: {source}")]
    Rename {
        /// Temp path
        from: PathBuf,
        /// Destination being replaced
        to: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

/// What happened to one pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    /// The second path now shares the first path's inode
    Linked {
        /// Bytes freed (0 if the replaced inode still has other names)
        reclaimed: u64,
    },
    /// Dry run: every check passed, nothing was changed
    WouldLink {
        /// Bytes that linking would free
        reclaimed: u64,
    },
    /// Both paths already share an inode
    AlreadyLinked,
    /// One of the paths is a replacer temp file
    SkippedTemp,
}

/// Counters for the replacements done on one or more bundles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LinkStats {
    /// Pairs linked
    pub linked: usize,
    /// Pairs that would have been linked (dry run)
    pub would_link: usize,
    /// Pairs found already sharing an inode
    pub already_linked: usize,
    /// Pairs refused because a path is a temp file
    pub skipped_temp: usize,
    /// Pairs whose replacement failed
    pub failed: usize,
    /// Bytes freed, or that would be freed in a dry run
    pub bytes_reclaimed: u64,
}

impl LinkStats {
    /// Record one outcome.
    pub fn record(&mut self, outcome: &Result<LinkOutcome, LinkError>) {
        match outcome {
            Ok(LinkOutcome::Linked { reclaimed }) => {
                self.linked += 1;
                self.bytes_reclaimed += reclaimed;
            }
            Ok(LinkOutcome::WouldLink { reclaimed }) => {
                self.would_link += 1;
                self.bytes_reclaimed += reclaimed;
            }
            Ok(LinkOutcome::AlreadyLinked) => self.already_linked += 1,
            Ok(LinkOutcome::SkippedTemp) => self.skipped_temp += 1,
            Err(_) => self.failed += 1,
        }
    }

    /// Add another set of counters to this one.
    pub fn merge(&mut self, other: &Self) {
        self.linked += other.linked;
        self.would_link += other.would_link;
        self.already_linked += other.already_linked;
        self.skipped_temp += other.skipped_temp;
        self.failed += other.failed;
        self.bytes_reclaimed += other.bytes_reclaimed;
    }
}

/// Temp path used while replacing `dest`.
#[must_use]
pub fn temp_path_for(dest: &Path) -> PathBuf {
    let mut name = OsString::from(dest.as_os_str());
    name.push(TEMP_SUFFIX);
    PathBuf::from(name)
}

/// Performs the link-then-rename substitution.
#[derive(Debug, Clone, Copy, Default)]
pub struct Replacer {
    dry_run: bool,
}

impl Replacer {
    /// Create a replacer that modifies the filesystem.
    #[must_use]
    pub fn new() -> Self {
        Self { dry_run: false }
    }

    /// Only log what would be linked.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Whether this replacer leaves the filesystem untouched.
    #[must_use]
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Replace `replace` with a hard link to `keep`.
    ///
    /// `filesize` is used for reclaimed-space accounting only.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError`] if a stat, the stale temp removal, the link or
    /// the rename fails. `replace` keeps its original content in every
    /// error case.
    pub fn replace(
        &self,
        keep: &Path,
        replace: &Path,
        filesize: u64,
    ) -> Result<LinkOutcome, LinkError> {
        self.replace_tracked(keep, replace, filesize, &mut DryRunLedger::default())
    }

    fn replace_tracked(
        &self,
        keep: &Path,
        replace: &Path,
        filesize: u64,
        ledger: &mut DryRunLedger,
    ) -> Result<LinkOutcome, LinkError> {
        if is_temp_path(keep) || is_temp_path(replace) {
            log::debug!(
                "Refusing temp path pair {} / {}",
                keep.display(),
                replace.display()
            );
            return Ok(LinkOutcome::SkippedTemp);
        }

        let stat = |path: &Path| {
            FileIdentity::stat(path).map_err(|source| LinkError::Stat {
                path: path.to_path_buf(),
                source,
            })
        };
        let keep_id = stat(keep)?;
        let replace_id = stat(replace)?;

        let keep_inode = ledger.inode_of(keep, &keep_id);
        let replace_inode = ledger.inode_of(replace, &replace_id);
        if keep_inode == replace_inode {
            log::debug!(
                "Already linked: {} = {}",
                keep.display(),
                replace.display()
            );
            return Ok(LinkOutcome::AlreadyLinked);
        }

        // The old inode is only freed when this was its last name
        let replace_links = ledger.links_of(replace_inode, replace_id.nlink);
        let reclaimed = if replace_links == 1 { filesize } else { 0 };

        if self.dry_run {
            ledger.record_link(replace, keep_inode, keep_id.nlink, replace_inode, replace_links);
            log::info!(
                "Would link {} -> {}",
                replace.display(),
                keep.display()
            );
            return Ok(LinkOutcome::WouldLink { reclaimed });
        }

        let temp = temp_path_for(replace);
        if fs::symlink_metadata(&temp).is_ok() {
            log::info!("Removing stale temp file {}", temp.display());
            fs::remove_file(&temp).map_err(|source| LinkError::RemoveStale {
                path: temp.clone(),
                source,
            })?;
        }

        log::debug!("Creating link {} -> {}", temp.display(), keep.display());
        fs::hard_link(keep, &temp).map_err(|source| LinkError::CreateLink {
            target: keep.to_path_buf(),
            link: temp.clone(),
            source,
        })?;

        if let Err(source) = fs::rename(&temp, replace) {
            if let Err(e) = fs::remove_file(&temp) {
                log::warn!("Could not remove temp link {}: {}", temp.display(), e);
            }
            return Err(LinkError::Rename {
                from: temp,
                to: replace.to_path_buf(),
                source,
            });
        }

        log::info!("Linked {} -> {}", replace.display(), keep.display());
        Ok(LinkOutcome::Linked { reclaimed })
    }

    /// Replace every pair of a fully filtered bundle, in order.
    ///
    /// Failures are logged and counted; the remaining pairs are still
    /// processed.
    pub fn replace_bundle(&self, bundle: &CandidateBundle) -> LinkStats {
        let mut stats = LinkStats::default();
        let mut ledger = DryRunLedger::default();
        for pair in &bundle.pairs {
            let outcome =
                self.replace_tracked(&pair.first, &pair.second, bundle.filesize, &mut ledger);
            if let Err(ref e) = outcome {
                log::error!("{}", e);
            }
            stats.record(&outcome);
        }
        stats
    }
}

/// `(dev, ino)` of a file.
type InodeKey = (u64, u64);

/// Links a dry run pretends to have made within one bundle.
///
/// Without it every pair of an N-way group would look unlinked, since
/// nothing on disk changes between pairs.
#[derive(Debug, Default)]
struct DryRunLedger {
    /// Paths whose entry would now point at another inode
    moved: HashMap<PathBuf, InodeKey>,
    /// Link counts of inodes touched so far
    links: HashMap<InodeKey, u64>,
}

impl DryRunLedger {
    fn inode_of(&self, path: &Path, identity: &FileIdentity) -> InodeKey {
        self.moved
            .get(path)
            .copied()
            .unwrap_or((identity.dev, identity.ino))
    }

    fn links_of(&self, inode: InodeKey, on_disk: u64) -> u64 {
        self.links.get(&inode).copied().unwrap_or(on_disk)
    }

    fn record_link(
        &mut self,
        replace: &Path,
        keep_inode: InodeKey,
        keep_on_disk: u64,
        replace_inode: InodeKey,
        replace_links: u64,
    ) {
        let keep_links = self.links_of(keep_inode, keep_on_disk);
        self.links.insert(keep_inode, keep_links + 1);
        self.links
            .insert(replace_inode, replace_links.saturating_sub(1));
        self.moved.insert(replace.to_path_buf(), keep_inode);
    }
}

/// Counters for orphaned temp cleanup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupStats {
    /// Temp links removed (or that would be removed in a dry run)
    pub removed: usize,
    /// Temp files kept because they are the only name of their content
    pub kept: usize,
    /// Temp files that could not be stat'ed or removed
    pub failed: usize,
}

/// Remove temp links left behind by an interrupted run.
///
/// A temp file is only removed while another name still refers to its inode
/// (link count above 1), so no content is ever dropped.
pub fn clean_orphans(paths: &[PathBuf], dry_run: bool) -> CleanupStats {
    let mut stats = CleanupStats::default();

    for path in paths {
        if !is_temp_path(path) {
            continue;
        }

        let identity = match FileIdentity::stat(path) {
            Ok(identity) => identity,
            Err(e) => {
                log::warn!("Cannot stat orphaned temp file {}: {}", path.display(), e);
                stats.failed += 1;
                continue;
            }
        };

        if identity.nlink < 2 {
            log::warn!(
                "Keeping orphaned temp file {}: it is the only name for its content",
                path.display()
            );
            stats.kept += 1;
            continue;
        }

        if dry_run {
            log::info!("Would remove orphaned temp file {}", path.display());
            stats.removed += 1;
            continue;
        }

        match fs::remove_file(path) {
            Ok(()) => {
                log::info!("Removed orphaned temp file {}", path.display());
                stats.removed += 1;
            }
            Err(e) => {
                log::error!("Cannot remove orphaned temp file {}: {}", path.display(), e);
                stats.failed += 1;
            }
        }
    }

    stats
}
