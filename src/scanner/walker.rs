//! Directory walker implementation using jwalk.
//!
//! # Overview
//!
//! This module provides the [`Walker`] struct, the Tree Scanner of the
//! pipeline. It yields every regular, non-empty file below a root that is
//! neither a symlink nor under a hidden (`.`-prefixed) path segment.
//!
//! # Features
//!
//! - Parallel directory reading with deterministic (name-sorted) output
//! - Symlinks are never followed and never reported
//! - Gitignore-style pattern matching via the `ignore` crate
//! - Leftover link temp files are reported as [`WalkItem::OrphanedTemp`]
//!   instead of as candidates
//! - Graceful shutdown via atomic flag
//!
//! # Example
//!
//! ```no_run
//! use dupelink::scanner::{WalkItem, Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("/backup"), WalkerConfig::default());
//! for item in walker.walk() {
//!     match item {
//!         Ok(WalkItem::File(file)) => println!("{}: {} bytes", file.path.display(), file.size),
//!         Ok(WalkItem::OrphanedTemp(path)) => println!("leftover: {}", path.display()),
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use jwalk::WalkDir;

use super::{FileEntry, ScanError, WalkerConfig, TEMP_SUFFIX};

/// One item produced by the walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkItem {
    /// A duplicate candidate
    File(FileEntry),
    /// A temp link left behind by an interrupted replacement
    OrphanedTemp(PathBuf),
}

/// Directory walker for file discovery.
#[derive(Debug)]
pub struct Walker {
    /// Root path to walk
    root: PathBuf,
    /// Walker configuration
    config: WalkerConfig,
    /// Optional shutdown flag for graceful termination
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Walker {
    /// Create a new walker for the given path.
    #[must_use]
    pub fn new(path: &Path, config: WalkerConfig) -> Self {
        Self {
            root: path.to_path_buf(),
            config,
            shutdown_flag: None,
        }
    }

    /// Set the shutdown flag for graceful termination.
    ///
    /// When the flag is set to `true`, the walker stops yielding items.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Build gitignore matcher from config patterns and a root `.gitignore`.
    fn build_gitignore(&self) -> Option<Gitignore> {
        let mut builder = GitignoreBuilder::new(&self.root);

        let gitignore_path = self.root.join(".gitignore");
        if gitignore_path.exists() {
            if let Some(e) = builder.add(&gitignore_path) {
                log::warn!(
                    "Failed to load .gitignore from {}: {}",
                    gitignore_path.display(),
                    e
                );
            } else {
                log::debug!("Loaded .gitignore from {}", gitignore_path.display());
            }
        }

        for pattern in &self.config.ignore_patterns {
            if let Err(e) = builder.add_line(None, pattern) {
                log::warn!("Invalid ignore pattern '{}': {}", pattern, e);
            }
        }

        match builder.build() {
            Ok(gitignore) if gitignore.is_empty() => None,
            Ok(gitignore) => Some(gitignore),
            Err(e) => {
                log::warn!("Failed to build ignore patterns: {}", e);
                None
            }
        }
    }

    /// Walk the directory tree, yielding files and orphaned temp links.
    ///
    /// Errors are yielded as [`ScanError`] values rather than stopping
    /// iteration; the caller decides whether to log and continue.
    pub fn walk(&self) -> impl Iterator<Item = Result<WalkItem, ScanError>> + '_ {
        let gitignore = self.build_gitignore();
        let root = self.root.clone();

        let walk_dir = WalkDir::new(&self.root)
            .follow_links(false)
            .skip_hidden(true)
            .process_read_dir(move |_depth, _path, _read_dir_state, children| {
                // Pruning ignored directories here keeps jwalk from descending into them
                if let Some(ref gi) = gitignore {
                    children.retain(|entry| match entry {
                        Ok(e) => !is_ignored(&root, gi, &e.path(), e.file_type().is_dir()),
                        Err(_) => true,
                    });
                }
                children.sort_by(|a, b| match (a, b) {
                    (Ok(a), Ok(b)) => a.file_name().cmp(b.file_name()),
                    (Ok(_), Err(_)) => std::cmp::Ordering::Less,
                    (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
                    (Err(_), Err(_)) => std::cmp::Ordering::Equal,
                });
            });

        walk_dir
            .into_iter()
            .take_while(move |_| {
                if self.is_shutdown_requested() {
                    log::debug!("Walker: Shutdown requested, stopping iteration");
                    false
                } else {
                    true
                }
            })
            .filter_map(move |entry_result| match entry_result {
                Ok(entry) => {
                    let path = entry.path();
                    if path == self.root {
                        return None;
                    }

                    let file_type = entry.file_type();
                    if file_type.is_dir() {
                        return None;
                    }
                    if file_type.is_symlink() {
                        log::trace!("Skipping symlink: {}", path.display());
                        return None;
                    }

                    self.process_file(path)
                }
                Err(e) => {
                    let path = e
                        .path()
                        .map_or_else(|| self.root.clone(), std::borrow::ToOwned::to_owned);
                    Some(Err(self.handle_jwalk_error(path, e)))
                }
            })
    }

    /// Stat a candidate file and decide what, if anything, to yield for it.
    fn process_file(&self, path: PathBuf) -> Option<Result<WalkItem, ScanError>> {
        let metadata = match std::fs::symlink_metadata(&path) {
            Ok(m) => m,
            Err(e) => return Some(Err(self.handle_io_error(&path, e))),
        };

        // Sockets, fifos and device nodes are not content we can link
        if !metadata.is_file() {
            return None;
        }

        if is_temp_path(&path) {
            log::debug!("Found leftover temp link: {}", path.display());
            return Some(Ok(WalkItem::OrphanedTemp(path)));
        }

        let size = metadata.len();
        if size == 0 {
            log::trace!("Skipping empty file: {}", path.display());
            return None;
        }

        Some(Ok(WalkItem::File(FileEntry::new(path, size))))
    }

    /// Handle I/O errors during file access.
    fn handle_io_error(&self, path: &Path, error: std::io::Error) -> ScanError {
        use std::io::ErrorKind;

        match error.kind() {
            ErrorKind::PermissionDenied => {
                log::warn!("Permission denied: {}", path.display());
                ScanError::PermissionDenied(path.to_path_buf())
            }
            ErrorKind::NotFound => {
                log::debug!("File not found (may have been deleted): {}", path.display());
                ScanError::NotFound(path.to_path_buf())
            }
            _ => {
                log::warn!("I/O error for {}: {}", path.display(), error);
                ScanError::Io {
                    path: path.to_path_buf(),
                    source: error,
                }
            }
        }
    }

    /// Handle jwalk errors.
    fn handle_jwalk_error(&self, path: PathBuf, error: jwalk::Error) -> ScanError {
        if let Some(kind) = error.io_error().map(std::io::Error::kind) {
            if kind == std::io::ErrorKind::PermissionDenied {
                log::warn!("Permission denied: {}", path.display());
                return ScanError::PermissionDenied(path);
            }
        }
        log::warn!("Walker error for {}: {}", path.display(), error);
        ScanError::Io {
            path,
            source: std::io::Error::other(error.to_string()),
        }
    }
}

/// Whether `path` is a temp link created by the replacer.
#[must_use]
pub fn is_temp_path(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|name| name.to_string_lossy().ends_with(TEMP_SUFFIX))
}

fn is_ignored(root: &Path, gitignore: &Gitignore, path: &Path, is_dir: bool) -> bool {
    // Gitignore matching expects root-relative paths with forward slashes
    let relative_path = path.strip_prefix(root).unwrap_or(path);
    let path_str = relative_path.to_string_lossy();
    let normalized_path = if cfg!(windows) {
        path_str.replace('\\', "/")
    } else {
        path_str.into_owned()
    };

    let ignored = gitignore.matched(normalized_path, is_dir).is_ignore();
    if ignored {
        log::trace!("Ignoring {}", path.display());
    }
    ignored
}
