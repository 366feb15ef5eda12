//! `run_app` driven through parsed command lines.

#![cfg(unix)]

use clap::Parser;
use dupelink::cli::Cli;
use dupelink::error::ExitCode;
use dupelink::scanner::FileIdentity;
use std::fs;
use std::path::Path;
use tempfile::{tempdir, TempDir};

fn run(config_dir: &TempDir, args: &[&str]) -> anyhow::Result<ExitCode> {
    let config = config_dir.path().join("config.toml");
    let mut argv = vec![
        "dupelink".to_string(),
        "--quiet".to_string(),
        "--config".to_string(),
        config.display().to_string(),
    ];
    argv.extend(args.iter().map(ToString::to_string));
    dupelink::run_app(Cli::try_parse_from(argv).unwrap())
}

fn path_arg(path: &Path) -> String {
    path.display().to_string()
}

#[test]
fn test_link_then_nothing_left() {
    let _guard = crate::ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    crate::clear_env();
    let config = tempdir().unwrap();
    let data = tempdir().unwrap();
    fs::write(data.path().join("a.txt"), "duplicate").unwrap();
    fs::write(data.path().join("b.txt"), "duplicate").unwrap();
    let root = path_arg(data.path());

    let code = run(&config, &["link", &root, "--min-age", "0"]).unwrap();
    assert_eq!(code, ExitCode::Success);
    let a = FileIdentity::stat(&data.path().join("a.txt")).unwrap();
    let b = FileIdentity::stat(&data.path().join("b.txt")).unwrap();
    assert!(a.same_inode(&b));

    let code = run(&config, &["link", &root, "--min-age", "0", "-o", "json"]).unwrap();
    assert_eq!(code, ExitCode::NoDuplicates);
}

#[test]
fn test_dry_run_reports_success_without_linking() {
    let _guard = crate::ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    crate::clear_env();
    let config = tempdir().unwrap();
    let data = tempdir().unwrap();
    fs::write(data.path().join("a.txt"), "duplicate").unwrap();
    fs::write(data.path().join("b.txt"), "duplicate").unwrap();

    let code = run(
        &config,
        &["link", &path_arg(data.path()), "--min-age", "0", "--dry-run"],
    )
    .unwrap();

    assert_eq!(code, ExitCode::Success);
    let a = FileIdentity::stat(&data.path().join("a.txt")).unwrap();
    assert_eq!(a.nlink, 1);
}

#[test]
fn test_config_file_is_honoured() {
    let _guard = crate::ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    crate::clear_env();
    let config = tempdir().unwrap();
    fs::write(config.path().join("config.toml"), "dry_run = true\nmin_age_secs = 0\n").unwrap();
    let data = tempdir().unwrap();
    fs::write(data.path().join("a.txt"), "duplicate").unwrap();
    fs::write(data.path().join("b.txt"), "duplicate").unwrap();

    let code = run(&config, &["link", &path_arg(data.path())]).unwrap();

    assert_eq!(code, ExitCode::Success);
    assert_eq!(FileIdentity::stat(&data.path().join("b.txt")).unwrap().nlink, 1);
}

#[test]
fn test_clean_removes_orphans() {
    let _guard = crate::ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    crate::clear_env();
    let config = tempdir().unwrap();
    let data = tempdir().unwrap();
    let original = data.path().join("a.txt");
    let temp = data.path().join("b.txt.dupelink.tmp");
    fs::write(&original, "content").unwrap();
    fs::hard_link(&original, &temp).unwrap();

    let code = run(&config, &["clean", &path_arg(data.path())]).unwrap();

    assert_eq!(code, ExitCode::Success);
    assert!(!temp.exists());
    assert!(original.exists());
}

#[test]
fn test_missing_root_is_fatal() {
    let _guard = crate::ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    crate::clear_env();
    let config = tempdir().unwrap();
    let missing = config.path().join("does-not-exist");

    let err = run(&config, &["link", &path_arg(&missing)]).unwrap_err();

    assert_eq!(ExitCode::from_error(&err), ExitCode::GeneralError);
    assert!(format!("{:#}", err).contains("Path not found"));
}

#[test]
fn test_quiet_and_verbose_conflict() {
    let result = Cli::try_parse_from(["dupelink", "-q", "-v", "link", "/tmp"]);
    assert!(result.is_err());
}
