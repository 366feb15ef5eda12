//! Progress reporting using indicatif.
//!
//! [`ProgressCallback`] is the hook the engine calls into; [`Progress`] draws
//! it on the terminal: a spinner while the tree is walked, then a bar over
//! size buckets as workers finish them.

use std::sync::Mutex;
use std::time::Duration;

use bytesize::ByteSize;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Phase name reported while walking the tree.
pub const PHASE_WALKING: &str = "walking";

/// Phase name reported while buckets are filtered and linked.
pub const PHASE_BUCKETS: &str = "buckets";

/// Progress callback for a deduplication run.
///
/// Implement this trait to receive progress updates from
/// `DuplicateFinder`. Calls may come from several worker threads.
pub trait ProgressCallback: Send + Sync {
    /// Called when a phase starts. `total` is 0 when unknown.
    fn on_phase_start(&self, phase: &str, total: usize);

    /// Called for each item processed (`current` is 1-based).
    fn on_progress(&self, current: usize, path: &str);

    /// Called when an item has been processed, providing its size in bytes.
    fn on_item_completed(&self, _bytes: u64) {}

    /// Called when a phase completes.
    fn on_phase_end(&self, phase: &str);

    /// Called to update the progress message.
    fn on_message(&self, _message: &str) {}
}

/// Terminal progress reporter.
pub struct Progress {
    multi: MultiProgress,
    walking: Mutex<Option<ProgressBar>>,
    buckets: Mutex<Option<ProgressBar>>,
    bytes: Mutex<u64>,
    quiet: bool,
}

impl Progress {
    /// Create a new progress reporter. `quiet` disables all drawing.
    ///
    /// # Examples
    ///
    /// ```
    /// use dupelink::progress::Progress;
    ///
    /// let progress = Progress::new(true);
    /// ```
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            multi: MultiProgress::new(),
            walking: Mutex::new(None),
            buckets: Mutex::new(None),
            bytes: Mutex::new(0),
            quiet,
        }
    }

    fn walking_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed_precise}] {pos} files")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
    }

    fn buckets_style() -> ProgressStyle {
        ProgressStyle::with_template(
            "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} buckets {msg} (ETA: {eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█>-")
    }

    fn active_bar(&self) -> Option<ProgressBar> {
        if let Ok(guard) = self.buckets.lock() {
            if let Some(ref pb) = *guard {
                return Some(pb.clone());
            }
        }
        self.walking.lock().ok().and_then(|guard| guard.clone())
    }
}

impl ProgressCallback for Progress {
    fn on_phase_start(&self, phase: &str, total: usize) {
        if self.quiet {
            return;
        }

        match phase {
            PHASE_WALKING => {
                let pb = self.multi.add(ProgressBar::new_spinner());
                pb.set_style(Self::walking_style());
                pb.set_message("Walking directory");
                pb.enable_steady_tick(Duration::from_millis(100));
                if let Ok(mut walking) = self.walking.lock() {
                    *walking = Some(pb);
                }
            }
            PHASE_BUCKETS => {
                let pb = self.multi.add(ProgressBar::new(total as u64));
                pb.set_style(Self::buckets_style());
                if let Ok(mut buckets) = self.buckets.lock() {
                    *buckets = Some(pb);
                }
                if let Ok(mut bytes) = self.bytes.lock() {
                    *bytes = 0;
                }
            }
            other => log::debug!("Unknown progress phase '{}'", other),
        }
    }

    fn on_progress(&self, current: usize, path: &str) {
        if self.quiet {
            return;
        }
        if let Some(pb) = self.active_bar() {
            pb.set_position(current as u64);
            if pb.length().is_none() {
                pb.set_message(truncate_path(path, 40));
            }
        }
    }

    fn on_item_completed(&self, bytes: u64) {
        if self.quiet {
            return;
        }
        let total = match self.bytes.lock() {
            Ok(mut seen) => {
                *seen += bytes;
                *seen
            }
            Err(_) => return,
        };
        if let Ok(guard) = self.buckets.lock() {
            if let Some(ref pb) = *guard {
                pb.set_message(format!("{} examined", ByteSize::b(total)));
            }
        }
    }

    fn on_phase_end(&self, phase: &str) {
        if self.quiet {
            return;
        }

        let (slot, message) = match phase {
            PHASE_WALKING => (&self.walking, "Walk complete"),
            PHASE_BUCKETS => (&self.buckets, "Buckets complete"),
            _ => return,
        };
        if let Some(pb) = slot.lock().ok().and_then(|mut guard| guard.take()) {
            pb.finish_with_message(message);
        }
    }

    fn on_message(&self, message: &str) {
        if self.quiet {
            return;
        }
        if let Some(pb) = self.active_bar() {
            pb.set_message(message.to_string());
        }
    }
}

/// Truncate a path for display in the progress bar.
fn truncate_path(path: &str, max_len: usize) -> String {
    if path.chars().count() <= max_len {
        return path.to_string();
    }

    let file_name = std::path::Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let name_len = file_name.chars().count();
    if name_len + 4 > max_len {
        let tail: String = file_name
            .chars()
            .skip(name_len.saturating_sub(max_len.saturating_sub(3)))
            .collect();
        return format!("...{tail}");
    }

    format!(".../{file_name}")
}
