//! Configuration layering: defaults, file, environment and flags.

use clap::Parser;
use dupelink::cli::{Cli, Commands, OutputFormat};
use dupelink::config::{suggest_key, unknown_keys, Config};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::{tempdir, TempDir};

fn config_file(dir: &TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("config.toml");
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_missing_file_gives_defaults() {
    let _guard = crate::ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    crate::clear_env();
    let dir = tempdir().unwrap();

    let config = Config::load_from_path(dir.path().join("absent.toml"), None);

    assert_eq!(config, Config::default());
    assert_eq!(config.min_age(), Duration::from_secs(10));
    assert_eq!(config.large_file_threshold, 10 * 1024 * 1024);
    assert!(config.clean_orphans);
}

#[test]
fn test_file_values_override_defaults() {
    let _guard = crate::ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    crate::clear_env();
    let dir = tempdir().unwrap();
    let path = config_file(
        &dir,
        r#"
min_age_secs = 60
io_threads = 2
ignore_patterns = ["*.part"]
output = "json"
"#,
    );

    let config = Config::load_from_path(path, None);

    assert_eq!(config.min_age_secs, 60);
    assert_eq!(config.io_threads, 2);
    assert_eq!(config.ignore_patterns, vec!["*.part".to_string()]);
    assert_eq!(config.output, OutputFormat::Json);
    assert_eq!(config.large_file_threshold, 10 * 1024 * 1024);
}

#[test]
fn test_malformed_file_falls_back_to_defaults() {
    let _guard = crate::ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    crate::clear_env();
    let dir = tempdir().unwrap();
    let path = config_file(&dir, "min_age_secs = [not toml");

    assert_eq!(Config::load_from_path(path, None), Config::default());
}

#[test]
fn test_wrong_type_falls_back_to_defaults() {
    let _guard = crate::ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    crate::clear_env();
    let dir = tempdir().unwrap();
    let path = config_file(&dir, "io_threads = \"many\"");

    assert_eq!(Config::load_from_path(path, None), Config::default());
}

#[test]
fn test_environment_overrides_file() {
    let _guard = crate::ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    crate::clear_env();
    let dir = tempdir().unwrap();
    let path = config_file(&dir, "min_age_secs = 60\nmmap = false\n");

    std::env::set_var("DUPELINK_MIN_AGE_SECS", "5");
    std::env::set_var("DUPELINK_MMAP", "true");
    let config = Config::load_from_path(path, None);
    crate::clear_env();

    assert_eq!(config.min_age_secs, 5);
    assert!(config.mmap);
}

#[test]
fn test_zero_threads_are_raised_to_one() {
    let _guard = crate::ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    crate::clear_env();
    let dir = tempdir().unwrap();
    let path = config_file(&dir, "io_threads = 0");

    assert_eq!(Config::load_from_path(path, None).io_threads, 1);
}

#[test]
fn test_flags_override_everything() {
    let _guard = crate::ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    crate::clear_env();
    let dir = tempdir().unwrap();
    let path = config_file(
        &dir,
        "min_age_secs = 60\nmmap = true\nignore_patterns = [\"*.part\"]\n",
    );
    let mut config = Config::load_from_path(path, None);

    let cli = Cli::try_parse_from([
        "dupelink",
        "link",
        "/data",
        "--min-age",
        "0",
        "--no-mmap",
        "-i",
        "*.bak",
        "--large-file-threshold",
        "1MiB",
        "--keep-orphans",
        "-n",
    ])
    .unwrap();
    let Commands::Link(args) = cli.command else {
        panic!("expected link subcommand");
    };
    config.merge_link_args(&args);

    assert_eq!(config.min_age(), Duration::ZERO);
    assert!(!config.mmap);
    assert_eq!(config.ignore_patterns, vec!["*.part", "*.bak"]);
    assert_eq!(config.large_file_threshold, 1024 * 1024);
    assert!(!config.clean_orphans);
    assert!(config.dry_run);

    let finder_config = config.finder_config();
    assert_eq!(finder_config.filter.min_age, Duration::ZERO);
    assert!(finder_config.dry_run);
}

#[test]
fn test_save_and_reload() {
    let _guard = crate::ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    crate::clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested/config.toml");
    let config = Config {
        min_age_secs: 42,
        output: OutputFormat::Json,
        ..Config::default()
    };

    config.save_to(&path).unwrap();
    assert_eq!(Config::load_from_path(path, None), config);
}

#[test]
fn test_unknown_keys_and_suggestions() {
    let table: toml::Table = "min_age_sec = 1\nio_threads = 2\nbanana = 3\n"
        .parse()
        .unwrap();

    let mut unknown = unknown_keys(&table);
    unknown.sort();
    assert_eq!(unknown, vec!["banana", "min_age_sec"]);
    assert_eq!(suggest_key("min_age_sec"), Some("min_age_secs"));
    assert_eq!(suggest_key("io_thread"), Some("io_threads"));
    assert_eq!(suggest_key("banana"), None);
}

#[test]
fn test_unknown_keys_do_not_block_loading() {
    let _guard = crate::ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    crate::clear_env();
    let dir = tempdir().unwrap();
    let path = config_file(&dir, "min_age_sec = 1\nio_threads = 3\n");

    let config = Config::load_from_path(path, None);

    assert_eq!(config.io_threads, 3);
    assert_eq!(config.min_age_secs, 10);
}
