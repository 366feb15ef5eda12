//! Filter pipeline stages against real files.

use dupelink::duplicates::{
    candidate_pairs, group_by_size, CandidateBundle, FilterConfig, Pipeline,
};
use dupelink::scanner::{FileEntry, Hasher};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::{tempdir, TempDir};

fn pipeline() -> Pipeline {
    Pipeline::standard(
        FilterConfig {
            min_age: Duration::ZERO,
            large_file_threshold: 1024,
        },
        Arc::new(Hasher::new()),
    )
}

fn write_all(dir: &TempDir, files: &[(&str, Vec<u8>)]) -> Vec<FileEntry> {
    files
        .iter()
        .map(|(name, content)| {
            let path = dir.path().join(name);
            fs::write(&path, content).unwrap();
            FileEntry::new(path, content.len() as u64)
        })
        .collect()
}

fn bundles(entries: Vec<FileEntry>) -> Vec<CandidateBundle> {
    let (buckets, _) = group_by_size(entries);
    buckets.iter().map(CandidateBundle::from_bucket).collect()
}

#[test]
fn test_stage_order() {
    assert_eq!(
        pipeline().stage_names(),
        vec![
            "properties",
            "file-type",
            "first-block",
            "sampled-block",
            "full-hash"
        ]
    );
}

#[test]
fn test_first_block_difference_is_caught_early() {
    let dir = tempdir().unwrap();
    let mut other = vec![b'x'; 100];
    other[0] = b'y';
    let entries = write_all(&dir, &[("a.txt", vec![b'x'; 100]), ("b.txt", other)]);

    let bundle = bundles(entries).remove(0);
    let (survivors, stats) = pipeline().run(bundle);

    assert!(survivors.is_empty());
    let first_block = stats.iter().find(|s| s.name == "first-block").unwrap();
    assert_eq!((first_block.input, first_block.output), (1, 0));
    // Stages after an empty bundle do not run
    assert_eq!(stats.len(), 3);
    assert!(stats.iter().all(|s| s.name != "full-hash"));
}

#[test]
fn test_tail_difference_needs_full_hash() {
    let dir = tempdir().unwrap();
    let size = 8192;
    let base: Vec<u8> = (0..size).map(|i| (i % 200) as u8).collect();
    let mut tail = base.clone();
    // Past the first block and outside every sampled block
    tail[size - 2000] ^= 1;
    let entries = write_all(&dir, &[("a.bin", base.clone()), ("b.bin", tail), ("c.bin", base)]);

    let bundle = bundles(entries).remove(0);
    assert_eq!(bundle.len(), 3);
    let (survivors, stats) = pipeline().run(bundle);

    let sampled = stats.iter().find(|s| s.name == "sampled-block").unwrap();
    assert_eq!(sampled.output, 3);
    let full = stats.iter().find(|s| s.name == "full-hash").unwrap();
    assert_eq!((full.input, full.output), (3, 1));

    let pair = &survivors.pairs[0];
    assert_eq!(pair.first, dir.path().join("a.bin"));
    assert_eq!(pair.second, dir.path().join("c.bin"));
}

#[test]
fn test_missing_file_is_dropped_not_fatal() {
    let dir = tempdir().unwrap();
    let entries = write_all(&dir, &[("a.txt", b"same".to_vec()), ("b.txt", b"same".to_vec())]);
    let mut paths: Vec<PathBuf> = entries.iter().map(|e| e.path.clone()).collect();
    paths.push(dir.path().join("gone.txt"));

    let bundle = CandidateBundle::new(4, candidate_pairs(&paths));
    assert_eq!(bundle.len(), 3);
    let (survivors, _) = pipeline().run(bundle);

    assert_eq!(survivors.len(), 1);
}
