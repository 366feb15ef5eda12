//! Application configuration management.
//!
//! Settings are layered with figment, lowest priority first:
//!
//! 1. Built-in defaults
//! 2. The TOML config file (base keys, then the selected `[profile.NAME]`)
//! 3. `DUPELINK_*` environment variables
//! 4. Command-line flags ([`Config::merge_link_args`], [`Config::merge_clean_args`])
//!
//! A missing config file is not an error. A malformed one is reported and
//! ignored. Unknown keys are reported with a "did you mean" suggestion.
//!
//! # Example
//!
//! ```toml
//! min_age_secs = 30
//! io_threads = 2
//! ignore_patterns = ["*.part", "cache/"]
//!
//! [profile.photos]
//! large_file_threshold = 52428800
//! mmap = true
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::cli::{CleanArgs, LinkArgs, OutputFormat};
use crate::duplicates::{FinderConfig, DEFAULT_LARGE_FILE_THRESHOLD, DEFAULT_MIN_AGE};
use crate::scanner::WalkerConfig;

/// Prefix of environment variables read into the configuration.
pub const ENV_PREFIX: &str = "DUPELINK_";

/// Keys accepted at the top level of the config file and in profiles.
pub const KNOWN_KEYS: &[&str] = &[
    "min_age_secs",
    "large_file_threshold",
    "io_threads",
    "ignore_patterns",
    "dry_run",
    "output",
    "mmap",
    "clean_orphans",
    "profile",
];

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Seconds since the last status change before a file may be linked
    pub min_age_secs: u64,
    /// Files larger than this many bytes get the sampled-block check
    pub large_file_threshold: u64,
    /// Number of size buckets processed in parallel
    pub io_threads: usize,
    /// Extra gitignore-style patterns to skip
    pub ignore_patterns: Vec<String>,
    /// Log links instead of performing them
    pub dry_run: bool,
    /// Summary output format
    pub output: OutputFormat,
    /// Hash large files through memory maps
    pub mmap: bool,
    /// Remove orphaned temp links before linking
    pub clean_orphans: bool,
    /// Named profiles, applied with `--profile`
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub profile: BTreeMap<String, toml::Table>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_age_secs: DEFAULT_MIN_AGE.as_secs(),
            large_file_threshold: DEFAULT_LARGE_FILE_THRESHOLD,
            io_threads: 4,
            ignore_patterns: Vec::new(),
            dry_run: false,
            output: OutputFormat::Text,
            mmap: false,
            clean_orphans: true,
            profile: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Load the configuration from `path`, or from the default location.
    #[must_use]
    pub fn load(path: Option<&Path>, profile: Option<&str>) -> Self {
        match path.map(Path::to_path_buf).or_else(Self::default_path) {
            Some(path) => Self::load_from_path(path, profile),
            None => {
                log::debug!("No config directory available, using defaults and environment");
                Self::defaults_with_env()
            }
        }
    }

    /// Load the configuration from a specific file.
    ///
    /// Never fails: problems with the file are logged and defaults are used
    /// in its place.
    #[must_use]
    pub fn load_from_path(path: PathBuf, profile: Option<&str>) -> Self {
        let table = match read_table(&path) {
            Ok(table) => table,
            Err(e) => {
                log::warn!("Ignoring config file {}: {:#}", path.display(), e);
                return Self::defaults_with_env();
            }
        };

        if let Some(ref table) = table {
            warn_unknown_keys(table, &path.display().to_string());
        }

        let mut figment =
            Figment::from(Serialized::defaults(Config::default())).merge(Toml::file(&path));

        if let Some(name) = profile {
            let selected = table
                .as_ref()
                .and_then(|t| t.get("profile"))
                .and_then(|p| p.get(name))
                .and_then(toml::Value::as_table);
            match selected {
                Some(overrides) => {
                    log::debug!("Applying profile '{}'", name);
                    figment = figment.merge(Serialized::defaults(overrides.clone()));
                }
                None => log::warn!(
                    "Profile '{}' not found in {}, using base configuration",
                    name,
                    path.display()
                ),
            }
        }

        let figment = figment.merge(Env::prefixed(ENV_PREFIX));
        match figment.extract::<Config>() {
            Ok(config) => {
                log::debug!("Loaded configuration from {}", path.display());
                config.normalized()
            }
            Err(e) => {
                log::warn!("Invalid configuration in {}: {}", path.display(), e);
                Self::defaults_with_env()
            }
        }
    }

    /// Defaults overridden by environment variables only.
    fn defaults_with_env() -> Self {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Env::prefixed(ENV_PREFIX))
            .extract::<Config>()
            .map(Config::normalized)
            .unwrap_or_else(|e| {
                log::warn!("Invalid {}* environment variable: {}", ENV_PREFIX, e);
                Self::default()
            })
    }

    fn normalized(mut self) -> Self {
        self.io_threads = self.io_threads.max(1);
        self
    }

    /// Get the default platform-specific configuration path.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "dupelink").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Save the configuration to the default platform-specific path.
    ///
    /// # Errors
    ///
    /// Fails if no config directory can be determined or the file cannot be
    /// written.
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path()
            .ok_or_else(|| anyhow::anyhow!("Failed to determine project directories"))?;
        self.save_to(&path)
    }

    /// Save the configuration as TOML to `path`.
    ///
    /// # Errors
    ///
    /// Fails if serialization or any filesystem operation fails.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// Apply explicit `link` flags on top of the loaded configuration.
    pub fn merge_link_args(&mut self, args: &LinkArgs) {
        if let Some(secs) = args.min_age {
            self.min_age_secs = secs;
        }
        if let Some(threshold) = args.large_file_threshold {
            self.large_file_threshold = threshold;
        }
        if let Some(threads) = args.io_threads {
            self.io_threads = threads.max(1);
        }
        if !args.ignore_patterns.is_empty() {
            self.ignore_patterns
                .extend(args.ignore_patterns.iter().cloned());
        }
        if args.dry_run {
            self.dry_run = true;
        }
        if let Some(output) = args.output {
            self.output = output;
        }
        if let Some(mmap) = args.mmap_override() {
            self.mmap = mmap;
        }
        if args.keep_orphans {
            self.clean_orphans = false;
        }
    }

    /// Apply explicit `clean` flags on top of the loaded configuration.
    pub fn merge_clean_args(&mut self, args: &CleanArgs) {
        if args.dry_run {
            self.dry_run = true;
        }
        if let Some(output) = args.output {
            self.output = output;
        }
    }

    /// Freshness window as a duration.
    #[must_use]
    pub fn min_age(&self) -> Duration {
        Duration::from_secs(self.min_age_secs)
    }

    /// Engine configuration described by these settings.
    #[must_use]
    pub fn finder_config(&self) -> FinderConfig {
        FinderConfig::default()
            .with_io_threads(self.io_threads)
            .with_min_age(self.min_age())
            .with_large_file_threshold(self.large_file_threshold)
            .with_walker_config(WalkerConfig::new(self.ignore_patterns.clone()))
            .with_dry_run(self.dry_run)
            .with_mmap(self.mmap)
            .with_clean_orphans(self.clean_orphans)
    }
}

/// Parse the file as a raw table, `None` if it does not exist.
fn read_table(path: &Path) -> Result<Option<toml::Table>> {
    if !path.exists() {
        return Ok(None);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let table = content
        .parse::<toml::Table>()
        .context("Failed to parse TOML")?;
    Ok(Some(table))
}

/// Closest known key to `key`, if any is close enough to be a likely typo.
#[must_use]
pub fn suggest_key(key: &str) -> Option<&'static str> {
    KNOWN_KEYS
        .iter()
        .map(|known| (*known, strsim::jaro_winkler(key, known)))
        .filter(|(_, score)| *score > 0.8)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(known, _)| known)
}

/// Keys of `table` that are not configuration keys.
#[must_use]
pub fn unknown_keys(table: &toml::Table) -> Vec<String> {
    table
        .keys()
        .filter(|key| !KNOWN_KEYS.contains(&key.as_str()))
        .cloned()
        .collect()
}

fn warn_unknown_keys(table: &toml::Table, source: &str) {
    let report = |key: &str, location: &str| match suggest_key(key) {
        Some(suggestion) => log::warn!(
            "Unknown config key '{}' in {}, did you mean '{}'?",
            key,
            location,
            suggestion
        ),
        None => log::warn!("Unknown config key '{}' in {}", key, location),
    };

    for key in unknown_keys(table) {
        report(&key, source);
    }

    let profiles = table.get("profile").and_then(toml::Value::as_table);
    for (name, profile) in profiles.into_iter().flatten() {
        let Some(profile) = profile.as_table() else {
            log::warn!("Profile '{}' in {} is not a table", name, source);
            continue;
        };
        let location = format!("{} [profile.{}]", source, name);
        for key in unknown_keys(profile) {
            report(&key, &location);
        }
    }
}
