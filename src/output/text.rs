//! Human-readable summaries.

use std::fmt;

use bytesize::ByteSize;

use crate::duplicates::{CleanSummary, RunSummary};

/// Plain-text rendering of a run or cleanup summary.
#[derive(Debug, Clone, Copy)]
pub enum TextOutput<'a> {
    /// Summary of a `link` run
    Run(&'a RunSummary),
    /// Summary of a `clean` run
    Clean(&'a CleanSummary),
}

impl<'a> TextOutput<'a> {
    /// Render a `link` summary.
    #[must_use]
    pub fn run(summary: &'a RunSummary) -> Self {
        Self::Run(summary)
    }

    /// Render a `clean` summary.
    #[must_use]
    pub fn clean(summary: &'a CleanSummary) -> Self {
        Self::Clean(summary)
    }
}

impl fmt::Display for TextOutput<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Run(s) => write_run(f, s),
            Self::Clean(s) => write_clean(f, s),
        }
    }
}

fn write_run(f: &mut fmt::Formatter<'_>, s: &RunSummary) -> fmt::Result {
    let mode = if s.dry_run { " (dry run)" } else { "" };
    writeln!(f, "Deduplicated {}{}", s.root.display(), mode)?;
    writeln!(f, "  Files scanned:     {}", s.total_files)?;
    writeln!(f, "  Size buckets:      {}", s.buckets)?;
    writeln!(f, "  Candidate pairs:   {}", s.candidate_pairs)?;
    for stage in &s.stages {
        writeln!(
            f,
            "    {:<16}{} -> {}",
            format!("{}:", stage.name),
            stage.input,
            stage.output
        )?;
    }

    if s.dry_run {
        writeln!(f, "  Would link:        {}", s.links.would_link)?;
        writeln!(
            f,
            "  Would reclaim:     {}",
            ByteSize::b(s.links.bytes_reclaimed)
        )?;
    } else {
        writeln!(f, "  Linked:            {}", s.links.linked)?;
        writeln!(
            f,
            "  Reclaimed:         {}",
            ByteSize::b(s.links.bytes_reclaimed)
        )?;
    }
    if s.links.already_linked > 0 {
        writeln!(f, "  Already linked:    {}", s.links.already_linked)?;
    }
    if s.links.failed > 0 {
        writeln!(f, "  Link failures:     {}", s.links.failed)?;
    }
    if s.scan_errors > 0 {
        writeln!(f, "  Scan errors:       {}", s.scan_errors)?;
    }
    if s.orphans_found > 0 {
        writeln!(
            f,
            "  Orphaned temps:    {} found, {} removed, {} kept",
            s.orphans_found, s.orphans.removed, s.orphans.kept
        )?;
    }
    if s.interrupted {
        writeln!(
            f,
            "  Interrupted:       {} bucket(s) not processed",
            s.buckets_skipped
        )?;
    }
    writeln!(f, "  Duration:          {} ms", s.duration_ms)
}

fn write_clean(f: &mut fmt::Formatter<'_>, s: &CleanSummary) -> fmt::Result {
    let mode = if s.dry_run { " (dry run)" } else { "" };
    writeln!(f, "Cleaned {}{}", s.root.display(), mode)?;
    writeln!(f, "  Orphaned temps:    {}", s.orphans_found)?;
    writeln!(f, "  Removed:           {}", s.orphans.removed)?;
    if s.orphans.kept > 0 {
        writeln!(f, "  Kept (only copy):  {}", s.orphans.kept)?;
    }
    if s.orphans.failed > 0 {
        writeln!(f, "  Failures:          {}", s.orphans.failed)?;
    }
    if s.scan_errors > 0 {
        writeln!(f, "  Scan errors:       {}", s.scan_errors)?;
    }
    if s.interrupted {
        writeln!(f, "  Interrupted before cleanup")?;
    }
    writeln!(f, "  Duration:          {} ms", s.duration_ms)
}
