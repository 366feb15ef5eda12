//! Filesystem actions.
//!
//! The link module replaces a verified duplicate with a hard link to its
//! twin using a temp-link-then-rename sequence, and removes temp links left
//! behind by interrupted runs.
//!
//! ```no_run
//! use dupelink::actions::{temp_path_for, Replacer};
//! use std::path::Path;
//!
//! let replacer = Replacer::new().with_dry_run(true);
//! let outcome = replacer.replace(Path::new("a.txt"), Path::new("b.txt"), 42);
//! println!("{:?} (temp would be {})", outcome, temp_path_for(Path::new("b.txt")).display());
//! ```

pub mod link;

pub use link::{
    clean_orphans, temp_path_for, CleanupStats, LinkError, LinkOutcome, LinkStats, Replacer,
};
