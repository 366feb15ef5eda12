//! Filesystem identity of a path, as seen by `stat`.
//!
//! # Overview
//!
//! Before two files may be merged into one inode, the pipeline needs their
//! device, inode, link count, owner and change time. [`FileIdentity`] is a
//! snapshot of exactly those fields. It is never cached across a run: every
//! check re-reads it, since state can change between filtering and linking.
//!
//! # Platform Support
//!
//! - **Unix**: Uses `std::os::unix::fs::MetadataExt`
//! - **Other**: Unsupported. Hard-link deduplication needs POSIX inode
//!   semantics, so [`FileIdentity::stat`] returns an `Unsupported` error.

use std::io;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// `stat`-level properties of one path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileIdentity {
    /// Device the file lives on
    pub dev: u64,
    /// Inode number on that device
    pub ino: u64,
    /// Number of directory entries pointing at the inode
    pub nlink: u64,
    /// Owner user id
    pub uid: u32,
    /// Owner group id
    pub gid: u32,
    /// Last status change time (ctime)
    pub ctime: SystemTime,
}

impl FileIdentity {
    /// Stat `path` without following a final symlink.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error, or `ErrorKind::Unsupported` on
    /// platforms without inode metadata.
    pub fn stat(path: &Path) -> io::Result<Self> {
        let metadata = std::fs::symlink_metadata(path)?;
        Self::from_metadata(&metadata)
    }

    /// Build an identity from already-fetched metadata.
    ///
    /// # Errors
    ///
    /// Returns `ErrorKind::Unsupported` on platforms without inode metadata.
    #[cfg(unix)]
    pub fn from_metadata(metadata: &std::fs::Metadata) -> io::Result<Self> {
        use std::os::unix::fs::MetadataExt;

        Ok(Self {
            dev: metadata.dev(),
            ino: metadata.ino(),
            nlink: metadata.nlink(),
            uid: metadata.uid(),
            gid: metadata.gid(),
            ctime: ctime_to_system_time(metadata.ctime(), metadata.ctime_nsec()),
        })
    }

    #[cfg(not(unix))]
    pub fn from_metadata(_metadata: &std::fs::Metadata) -> io::Result<Self> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "inode metadata is not available on this platform",
        ))
    }

    /// Whether hard-link deduplication is supported on this platform.
    #[must_use]
    pub const fn is_supported() -> bool {
        cfg!(unix)
    }

    /// Whether both identities name the same inode.
    #[must_use]
    pub fn same_inode(&self, other: &Self) -> bool {
        self.dev == other.dev && self.ino == other.ino
    }

    /// Whether the last status change happened less than `window` before `now`.
    ///
    /// A change time in the future counts as fresh.
    #[must_use]
    pub fn is_fresh(&self, now: SystemTime, window: Duration) -> bool {
        if window.is_zero() {
            return false;
        }
        match now.duration_since(self.ctime) {
            Ok(age) => age < window,
            Err(_) => true,
        }
    }
}

#[cfg(unix)]
fn ctime_to_system_time(secs: i64, nsecs: i64) -> SystemTime {
    let nanos = Duration::from_nanos(nsecs.clamp(0, 999_999_999) as u64);
    if secs >= 0 {
        UNIX_EPOCH + Duration::from_secs(secs as u64) + nanos
    } else {
        UNIX_EPOCH - Duration::from_secs(secs.unsigned_abs()) + nanos
    }
}
