//! Tree scanner behavior on real directory layouts.

use dupelink::scanner::{WalkItem, Walker, WalkerConfig};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn walk(root: &Path, config: WalkerConfig) -> (Vec<PathBuf>, Vec<PathBuf>) {
    let mut files = Vec::new();
    let mut orphans = Vec::new();
    for item in Walker::new(root, config).walk() {
        match item.unwrap() {
            WalkItem::File(file) => files.push(file.path),
            WalkItem::OrphanedTemp(path) => orphans.push(path),
        }
    }
    files.sort();
    (files, orphans)
}

#[test]
fn test_nested_tree_is_fully_listed() {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join("a/b/c")).unwrap();
    fs::write(dir.path().join("top.txt"), "1").unwrap();
    fs::write(dir.path().join("a/mid.txt"), "2").unwrap();
    fs::write(dir.path().join("a/b/c/deep.txt"), "3").unwrap();

    let (files, orphans) = walk(dir.path(), WalkerConfig::default());

    assert_eq!(files.len(), 3);
    assert!(files.contains(&dir.path().join("a/b/c/deep.txt")));
    assert!(orphans.is_empty());
}

#[test]
fn test_hidden_entries_and_empty_files_are_skipped() {
    let dir = tempdir().unwrap();
    fs::create_dir(dir.path().join(".git")).unwrap();
    fs::write(dir.path().join(".git/config"), "hidden dir").unwrap();
    fs::write(dir.path().join(".profile"), "hidden file").unwrap();
    fs::write(dir.path().join("empty"), "").unwrap();
    fs::write(dir.path().join("visible"), "shown").unwrap();

    let (files, _) = walk(dir.path(), WalkerConfig::default());

    assert_eq!(files, vec![dir.path().join("visible")]);
}

#[test]
fn test_gitignore_and_cli_patterns_combine() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join(".gitignore"), "*.tmp\nbuild/\n").unwrap();
    fs::create_dir(dir.path().join("build")).unwrap();
    fs::write(dir.path().join("build/out.bin"), "artifact").unwrap();
    fs::write(dir.path().join("scratch.tmp"), "temp").unwrap();
    fs::write(dir.path().join("notes.bak"), "backup").unwrap();
    fs::write(dir.path().join("keep.txt"), "keep").unwrap();

    let config = WalkerConfig::new(vec!["*.bak".to_string()]);
    let (files, _) = walk(dir.path(), config);

    assert_eq!(files, vec![dir.path().join("keep.txt")]);
}

#[test]
fn test_temp_links_are_reported_as_orphans() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("photo.jpg"), "jpeg").unwrap();
    fs::write(dir.path().join("photo.jpg.dupelink.tmp"), "jpeg").unwrap();

    let (files, orphans) = walk(dir.path(), WalkerConfig::default());

    assert_eq!(files, vec![dir.path().join("photo.jpg")]);
    assert_eq!(orphans, vec![dir.path().join("photo.jpg.dupelink.tmp")]);
}

#[cfg(unix)]
#[test]
fn test_symlinks_are_not_followed() {
    let dir = tempdir().unwrap();
    let outside = tempdir().unwrap();
    fs::write(outside.path().join("secret.txt"), "outside").unwrap();
    fs::write(dir.path().join("real.txt"), "inside").unwrap();
    std::os::unix::fs::symlink(dir.path().join("real.txt"), dir.path().join("link.txt")).unwrap();
    std::os::unix::fs::symlink(outside.path(), dir.path().join("linked_dir")).unwrap();

    let (files, _) = walk(dir.path(), WalkerConfig::default());

    assert_eq!(files, vec![dir.path().join("real.txt")]);
}

#[cfg(unix)]
#[test]
fn test_hardlinks_are_listed_individually() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a"), "shared").unwrap();
    fs::hard_link(dir.path().join("a"), dir.path().join("b")).unwrap();

    let (files, _) = walk(dir.path(), WalkerConfig::default());

    assert_eq!(files.len(), 2);
}
