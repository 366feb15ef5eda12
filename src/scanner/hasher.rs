//! BLAKE3 file hasher with streaming and positional reads.
//!
//! # Overview
//!
//! The duplicate pipeline needs three kinds of digests:
//! - a **prehash** of the first [`PREHASH_SIZE`] bytes (cheap content check),
//! - a **range hash** of an arbitrary `(offset, len)` window (sampled blocks
//!   of large files),
//! - a **full hash** of the entire content (authoritative identity check).
//!
//! All three use BLAKE3, so equal input bytes always yield equal digests and
//! distinct inputs collide with negligible probability.
//!
//! # Example
//!
//! ```no_run
//! use dupelink::scanner::Hasher;
//! use std::path::Path;
//!
//! let hasher = Hasher::new();
//! let prehash = hasher.prehash(Path::new("file.bin"), 10_000).unwrap();
//! let full = hasher.full_hash(Path::new("file.bin")).unwrap();
//! println!("{} / {}", dupelink::scanner::hash_to_hex(&prehash), dupelink::scanner::hash_to_hex(&full));
//! ```

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use memmap2::Mmap;

use super::HashError;

/// A 32-byte BLAKE3 digest.
pub type Hash = [u8; 32];

/// Number of leading bytes covered by the prehash.
pub const PREHASH_SIZE: usize = 4096;

/// Read buffer used when streaming a whole file.
pub const FULL_HASH_BUFFER_SIZE: usize = 4 * 1024 * 1024;

/// Files at least this large are memory-mapped when mmap hashing is enabled.
pub const DEFAULT_MMAP_THRESHOLD: u64 = 64 * 1024 * 1024;

/// File content hasher.
///
/// `Hasher` is stateless apart from its tuning knobs and can be shared
/// between worker threads behind an `Arc`.
#[derive(Debug, Clone)]
pub struct Hasher {
    use_mmap: bool,
    mmap_threshold: u64,
    buffer_size: usize,
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher {
    /// Create a hasher using buffered reads only.
    #[must_use]
    pub fn new() -> Self {
        Self {
            use_mmap: false,
            mmap_threshold: DEFAULT_MMAP_THRESHOLD,
            buffer_size: FULL_HASH_BUFFER_SIZE,
        }
    }

    /// Enable or disable memory-mapped full hashing.
    #[must_use]
    pub fn with_mmap(mut self, enabled: bool) -> Self {
        self.use_mmap = enabled;
        self
    }

    /// Set the minimum file size for memory-mapped hashing.
    #[must_use]
    pub fn with_mmap_threshold(mut self, threshold: u64) -> Self {
        self.mmap_threshold = threshold;
        self
    }

    /// Set the streaming read buffer size (minimum 1 byte).
    #[must_use]
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1);
        self
    }

    /// Hash the first `min(PREHASH_SIZE, filesize)` bytes of a file.
    ///
    /// `filesize` is the size recorded at scan time. If the file has shrunk
    /// below that window since, the read fails and the error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be opened or read.
    pub fn prehash(&self, path: &Path, filesize: u64) -> Result<Hash, HashError> {
        let file = File::open(path).map_err(|e| HashError::from_io(path, e))?;
        let len = filesize.min(PREHASH_SIZE as u64);
        self.hash_range(&file, path, 0, len)
    }

    /// Hash exactly `len` bytes of an open file starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if seeking fails or fewer than `len` bytes
    /// are available at `offset`.
    pub fn hash_range(
        &self,
        file: &File,
        path: &Path,
        offset: u64,
        len: u64,
    ) -> Result<Hash, HashError> {
        let mut reader = file;
        reader
            .seek(SeekFrom::Start(offset))
            .map_err(|e| HashError::from_io(path, e))?;

        let mut hasher = blake3::Hasher::new();
        let copied = io::copy(&mut reader.take(len), &mut hasher)
            .map_err(|e| HashError::from_io(path, e))?;

        if copied != len {
            return Err(HashError::from_io(
                path,
                io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("expected {len} bytes at offset {offset}, read {copied}"),
                ),
            ));
        }

        Ok(*hasher.finalize().as_bytes())
    }

    /// Hash the entire content of a file.
    ///
    /// Uses a memory map for large files when enabled, falling back to
    /// buffered reads if mapping fails. Both paths produce identical digests.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be opened or read.
    pub fn full_hash(&self, path: &Path) -> Result<Hash, HashError> {
        self.hash_file(path, None)
    }

    /// Hash the entire content of a file that was `filesize` bytes when scanned.
    ///
    /// A file whose current length differs is being written to, so it is
    /// never memory mapped and goes through buffered reads instead.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be opened or read.
    pub fn full_hash_sized(&self, path: &Path, filesize: u64) -> Result<Hash, HashError> {
        self.hash_file(path, Some(filesize))
    }

    fn hash_file(&self, path: &Path, expected: Option<u64>) -> Result<Hash, HashError> {
        let file = File::open(path).map_err(|e| HashError::from_io(path, e))?;

        if self.use_mmap {
            let len = file
                .metadata()
                .map_err(|e| HashError::from_io(path, e))?
                .len();
            if expected.is_some_and(|size| size != len) {
                log::debug!(
                    "{} changed size since the scan ({} -> {}), not mapping it",
                    path.display(),
                    expected.unwrap_or_default(),
                    len
                );
            } else if len >= self.mmap_threshold {
                match self.mmap_hash(&file) {
                    Ok(hash) => return Ok(hash),
                    Err(e) => {
                        log::debug!(
                            "mmap failed for {}, falling back to buffered read: {}",
                            path.display(),
                            e
                        );
                    }
                }
            }
        }

        self.buffered_hash(file, path)
    }

    fn mmap_hash(&self, file: &File) -> io::Result<Hash> {
        // SAFETY: the map is read-only and dropped before returning. Callers
        // check the length against the scanned size first, but a file
        // truncated while it is mapped still raises SIGBUS.
        let mmap = unsafe { Mmap::map(file)? };
        Ok(*blake3::hash(&mmap).as_bytes())
    }

    fn buffered_hash(&self, mut file: File, path: &Path) -> Result<Hash, HashError> {
        log::trace!("Hashing {}", path.display());
        let mut hasher = blake3::Hasher::new();
        let mut buffer = vec![0u8; self.buffer_size];

        loop {
            let read = match file.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(HashError::from_io(path, e)),
            };
            hasher.update(&buffer[..read]);
        }

        Ok(*hasher.finalize().as_bytes())
    }
}

/// Render a digest as lowercase hex.
#[must_use]
pub fn hash_to_hex(hash: &Hash) -> String {
    hash.iter().map(|b| format!("{b:02x}")).collect()
}
