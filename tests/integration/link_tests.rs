//! End-to-end linking behavior on real directory trees.

#![cfg(unix)]

use dupelink::actions::{temp_path_for, LinkOutcome, Replacer};
use dupelink::duplicates::{DuplicateFinder, FinderConfig};
use dupelink::scanner::{FileIdentity, WalkerConfig};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::{tempdir, TempDir};

fn finder() -> DuplicateFinder {
    DuplicateFinder::new(FinderConfig::default().with_min_age(Duration::ZERO))
}

fn write(dir: &TempDir, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

fn stat(path: &Path) -> FileIdentity {
    FileIdentity::stat(path).unwrap()
}

#[test]
fn test_end_to_end_identical_pair_is_linked() {
    let dir = tempdir().unwrap();
    let a = write(&dir, "a.txt", b"aaaaaaaaaa");
    let b = write(&dir, "b.txt", b"aaaaaaaaaa");

    let summary = finder().run(dir.path()).unwrap();

    assert_eq!(summary.links.linked, 1);
    assert_eq!(summary.links.bytes_reclaimed, 10);
    let (ia, ib) = (stat(&a), stat(&b));
    assert!(ia.same_inode(&ib));
    assert_eq!(ia.nlink, 2);
    assert_eq!(fs::read(&a).unwrap(), b"aaaaaaaaaa");
    assert_eq!(fs::read(&b).unwrap(), b"aaaaaaaaaa");
}

#[test]
fn test_different_content_same_size_left_alone() {
    let dir = tempdir().unwrap();
    let a = write(&dir, "a.txt", b"aaaaaaaaaa");
    let b = write(&dir, "b.txt", b"aaaaaaaaaa");
    let c = write(&dir, "c.txt", b"bbbbbbbbbb");

    finder().run(dir.path()).unwrap();

    let ic = stat(&c);
    assert!(!ic.same_inode(&stat(&a)));
    assert!(!ic.same_inode(&stat(&b)));
    assert_eq!(ic.nlink, 1);
    assert_eq!(fs::read(&c).unwrap(), b"bbbbbbbbbb");
}

#[test]
fn test_second_run_links_nothing() {
    let dir = tempdir().unwrap();
    for name in ["one.dat", "two.dat", "three.dat"] {
        write(&dir, name, b"the same bytes everywhere");
    }

    let first = finder().run(dir.path()).unwrap();
    assert_eq!(first.links.linked, 2);
    assert_eq!(first.links.already_linked, 1);

    let second = finder().run(dir.path()).unwrap();
    assert_eq!(second.links.linked, 0);
    assert_eq!(second.links.bytes_reclaimed, 0);
    assert_eq!(stat(&dir.path().join("one.dat")).nlink, 3);
}

#[test]
fn test_fresh_files_are_not_linked() {
    let dir = tempdir().unwrap();
    let a = write(&dir, "a.txt", b"just written");
    let b = write(&dir, "b.txt", b"just written");

    let finder = DuplicateFinder::new(FinderConfig::default());
    let summary = finder.run(dir.path()).unwrap();

    assert_eq!(summary.links.linked, 0);
    assert!(!stat(&a).same_inode(&stat(&b)));
}

#[test]
fn test_extension_mismatch_is_not_linked() {
    let dir = tempdir().unwrap();
    let jpg = write(&dir, "a.jpg", b"\xff\xd8\xff same bytes");
    let png = write(&dir, "a.png", b"\xff\xd8\xff same bytes");

    let summary = finder().run(dir.path()).unwrap();

    assert_eq!(summary.links.linked, 0);
    assert!(!stat(&jpg).same_inode(&stat(&png)));
}

#[test]
fn test_extensionless_files_are_linked() {
    let dir = tempdir().unwrap();
    let a = write(&dir, "README", b"no extension");
    let b = write(&dir, "sub/README", b"no extension");

    finder().run(dir.path()).unwrap();
    assert!(stat(&a).same_inode(&stat(&b)));
}

#[test]
fn test_crash_between_link_and_rename_is_recoverable() {
    let dir = tempdir().unwrap();
    let a = write(&dir, "a.txt", b"crash test data");
    let b = write(&dir, "b.txt", b"crash test data");

    // State right after the temp link was created and before the rename
    let temp = temp_path_for(&b);
    fs::hard_link(&a, &temp).unwrap();
    assert_eq!(fs::read(&b).unwrap(), b"crash test data");
    assert_eq!(stat(&b).nlink, 1);

    let summary = finder().run(dir.path()).unwrap();

    assert!(!temp.exists());
    assert_eq!(summary.orphans_found, 1);
    assert!(stat(&a).same_inode(&stat(&b)));
    assert_eq!(stat(&a).nlink, 2);
}

#[test]
fn test_stale_temp_is_replaced_by_replacer() {
    let dir = tempdir().unwrap();
    let a = write(&dir, "a.txt", b"x");
    let b = write(&dir, "b.txt", b"x");
    let temp = write(&dir, "b.txt.dupelink.tmp", b"garbage from an older run");

    let outcome = Replacer::new().replace(&a, &b, 1).unwrap();

    assert_eq!(outcome, LinkOutcome::Linked { reclaimed: 1 });
    assert!(!temp.exists());
    assert!(stat(&a).same_inode(&stat(&b)));
}

#[test]
fn test_dry_run_leaves_tree_untouched() {
    let dir = tempdir().unwrap();
    let a = write(&dir, "a.bin", &[7u8; 4096]);
    let b = write(&dir, "b.bin", &[7u8; 4096]);

    let finder = DuplicateFinder::new(
        FinderConfig::default()
            .with_min_age(Duration::ZERO)
            .with_dry_run(true),
    );
    let summary = finder.run(dir.path()).unwrap();

    assert_eq!(summary.links.would_link, 1);
    assert_eq!(summary.links.bytes_reclaimed, 4096);
    assert!(!stat(&a).same_inode(&stat(&b)));
    assert!(!temp_path_for(&b).exists());
}

#[test]
fn test_dry_run_predicts_real_run_for_three_copies() {
    let dir = tempdir().unwrap();
    for name in ["a.txt", "b.txt", "c.txt"] {
        write(&dir, name, b"aaaaaaaaaa");
    }

    let dry = DuplicateFinder::new(
        FinderConfig::default()
            .with_min_age(Duration::ZERO)
            .with_dry_run(true),
    )
    .run(dir.path())
    .unwrap();
    let real = finder().run(dir.path()).unwrap();

    assert_eq!(dry.links.would_link, 2);
    assert_eq!(dry.links.bytes_reclaimed, 20);
    assert_eq!(real.links.linked, dry.links.would_link);
    assert_eq!(real.links.already_linked, dry.links.already_linked);
    assert_eq!(real.links.bytes_reclaimed, dry.links.bytes_reclaimed);
}

#[test]
fn test_existing_hardlink_group_joins_larger_group() {
    let dir = tempdir().unwrap();
    let a = write(&dir, "a.txt", b"shared");
    let b = write(&dir, "b.txt", b"shared");
    let c = dir.path().join("c.txt");
    fs::hard_link(&b, &c).unwrap();

    let summary = finder().run(dir.path()).unwrap();

    // b is replaced, c keeps the old inode until the (a, c) pair replaces it
    assert_eq!(summary.links.linked, 2);
    assert_eq!(summary.links.bytes_reclaimed, 6);
    assert!(stat(&a).same_inode(&stat(&b)));
    assert!(stat(&a).same_inode(&stat(&c)));
    assert_eq!(stat(&a).nlink, 3);
}

#[test]
fn test_ignored_files_are_not_linked() {
    let dir = tempdir().unwrap();
    let a = write(&dir, "keep/a.log", b"log line");
    let b = write(&dir, "keep/b.log", b"log line");

    let finder = DuplicateFinder::new(
        FinderConfig::default()
            .with_min_age(Duration::ZERO)
            .with_walker_config(WalkerConfig::new(vec!["*.log".to_string()])),
    );
    let summary = finder.run(dir.path()).unwrap();

    assert_eq!(summary.total_files, 0);
    assert!(!stat(&a).same_inode(&stat(&b)));
}

#[test]
fn test_large_files_go_through_sampling() {
    let dir = tempdir().unwrap();
    let mut content = vec![0u8; 64 * 1024];
    for (i, byte) in content.iter_mut().enumerate() {
        *byte = (i % 251) as u8;
    }
    let a = write(&dir, "a.img", &content);
    let b = write(&dir, "b.img", &content);
    let mid = content.len() / 2;
    content[mid] ^= 0xff;
    let c = write(&dir, "c.img", &content);

    let finder = DuplicateFinder::new(
        FinderConfig::default()
            .with_min_age(Duration::ZERO)
            .with_large_file_threshold(1024),
    );
    let summary = finder.run(dir.path()).unwrap();

    let sampled = summary
        .stages
        .iter()
        .find(|s| s.name == "sampled-block")
        .unwrap();
    assert_eq!(sampled.input, 3);
    assert_eq!(sampled.output, 1);
    assert_eq!(summary.links.linked, 1);
    assert!(stat(&a).same_inode(&stat(&b)));
    assert!(!stat(&a).same_inode(&stat(&c)));
}
