//! Duplicate detection and consolidation.
//!
//! This module provides functionality for:
//! - Size bucketing and candidate pair generation
//! - The five-stage filter pipeline
//! - Run orchestration across a bounded worker pool

pub mod filters;
pub mod finder;
pub mod groups;

pub use filters::{
    check_properties, FileTypeFilter, Filter, FilterConfig, FirstBlockFilter, FullHashFilter,
    Pipeline, PropertiesFilter, Rejection, SampledBlockFilter, StageStats,
    DEFAULT_LARGE_FILE_THRESHOLD, DEFAULT_MIN_AGE,
};
pub use finder::{CleanSummary, DuplicateFinder, FinderConfig, FinderError, RunSummary};
pub use groups::{
    candidate_pairs, group_by_size, CandidateBundle, CandidatePair, GroupingStats, SizeBucket,
};
