//! Named configuration profiles.

use dupelink::config::Config;
use std::fs;
use tempfile::tempdir;

const CONFIG: &str = r#"
min_age_secs = 30
io_threads = 2

[profile.photos]
large_file_threshold = 52428800
mmap = true

[profile.careful]
dry_run = true
min_age_secs = 3600
"#;

#[test]
fn test_profile_overrides_base_keys() {
    let _guard = crate::ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    crate::clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, CONFIG).unwrap();

    let config = Config::load_from_path(path, Some("careful"));

    assert!(config.dry_run);
    assert_eq!(config.min_age_secs, 3600);
    assert_eq!(config.io_threads, 2);
    assert!(!config.mmap);
}

#[test]
fn test_profiles_do_not_leak_into_each_other() {
    let _guard = crate::ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    crate::clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, CONFIG).unwrap();

    let config = Config::load_from_path(path, Some("photos"));

    assert!(config.mmap);
    assert_eq!(config.large_file_threshold, 52_428_800);
    assert_eq!(config.min_age_secs, 30);
    assert!(!config.dry_run);
    assert_eq!(config.profile.len(), 2);
}

#[test]
fn test_unknown_profile_uses_base_configuration() {
    let _guard = crate::ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    crate::clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, CONFIG).unwrap();

    let config = Config::load_from_path(path, Some("nope"));

    assert_eq!(config.min_age_secs, 30);
    assert!(!config.dry_run);
    assert!(!config.mmap);
}

#[test]
fn test_environment_beats_profile() {
    let _guard = crate::ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    crate::clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, CONFIG).unwrap();

    std::env::set_var("DUPELINK_MIN_AGE_SECS", "1");
    let config = Config::load_from_path(path, Some("careful"));
    crate::clear_env();

    assert_eq!(config.min_age_secs, 1);
    assert!(config.dry_run);
}
