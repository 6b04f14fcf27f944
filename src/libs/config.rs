//! Configuration loading for the appwatch engine.
//!
//! Two kinds of configuration live under the config root:
//!
//! - `network_settings.json` — scalar knobs for the HTTP layer and the
//!   installer (timeouts, retries, rate limiting, cache location). Loaded
//!   as an overlay: built-in defaults, then the file, then `APPWATCH_*`
//!   environment variables. Later layers win.
//! - `conf.d/*.json` — one application declaration per file, validated by
//!   [`crate::libs::app_config`].
//!
//! Configuration is loaded once at startup and frozen for the run.
//!
//! ## Environment overrides
//!
//! `APPWATCH_CACHE_DIR`, `APPWATCH_CACHE_DURATION`, `APPWATCH_MAX_RETRIES`,
//! `APPWATCH_TIMEOUT`, `APPWATCH_USER_AGENT`, `APPWATCH_RATE_LIMIT`,
//! `APPWATCH_RETRY_DELAY`.

use crate::libs::app_config::{AppConfig, RawAppFile};
use crate::libs::error::{engine_error, ErrorKind};
use crate::libs::messages::Message;
use crate::libs::paths::Paths;
use anyhow::Result;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::PathBuf;

// Include compile-time application metadata
include!(concat!(env!("OUT_DIR"), "/app_metadata.rs"));

/// Resolved scalar settings for one run.
///
/// Durations are in seconds unless the field name says otherwise. The
/// defaults are deliberately conservative: a small rate-limit spacing and
/// a five-minute cache keep the engine polite toward upstream hosts even
/// when a user re-runs it in a loop, and the extraction cap bounds the
/// damage a hostile archive can do before validation rejects it.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkSettings {
    /// Cache root override; `None` keeps the platform default.
    pub cache_dir: Option<PathBuf>,
    /// Freshness window for URL-addressed cache entries.
    pub cache_duration: u64,
    /// Connect timeout per HTTP attempt.
    pub timeout: u64,
    /// Maximum HTTP attempts per request.
    pub max_retries: u32,
    /// Initial retry backoff, doubled after each failure.
    pub retry_delay: u64,
    /// Minimum spacing between outbound requests.
    pub rate_limit: u64,
    /// User-Agent header sent on every request.
    pub user_agent: String,
    /// Total-timeout multiplier for metadata fetches.
    pub metadata_timeout_multiplier: u64,
    /// Total-timeout multiplier for artifact downloads.
    pub download_timeout_multiplier: u64,
    /// Wall-clock budget for each build step of the compile strategy.
    pub compile_timeout: u64,
    /// Parallelism handed to `make -j`.
    pub compile_jobs: u32,
    /// Cap on total extracted archive size, in megabytes.
    pub max_extracted_mb: u64,
    /// Time budget for custom checker invocations.
    pub checker_timeout: u64,
    /// Cache entries older than this many minutes are swept at exit.
    pub cleanup_max_age_minutes: u64,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        NetworkSettings {
            cache_dir: None,
            cache_duration: 300,
            timeout: 15,
            max_retries: 3,
            retry_delay: 2,
            rate_limit: 1,
            user_agent: format!("{}/{}", APP_METADATA_NAME, APP_METADATA_VERSION),
            metadata_timeout_multiplier: 4,
            download_timeout_multiplier: 10,
            compile_timeout: 3600,
            compile_jobs: 4,
            max_extracted_mb: 5000,
            checker_timeout: 60,
            cleanup_max_age_minutes: 60,
        }
    }
}

/// On-disk shape of `network_settings.json`; every field optional.
#[derive(Debug, Default, Deserialize)]
struct SettingsOverlay {
    cache_dir: Option<String>,
    cache_duration: Option<u64>,
    timeout: Option<u64>,
    max_retries: Option<u32>,
    retry_delay: Option<u64>,
    rate_limit: Option<u64>,
    user_agent: Option<String>,
    metadata_timeout_multiplier: Option<u64>,
    download_timeout_multiplier: Option<u64>,
    compile_timeout: Option<u64>,
    compile_jobs: Option<u32>,
    max_extracted_mb: Option<u64>,
    checker_timeout: Option<u64>,
    cleanup_max_age_minutes: Option<u64>,
}

impl NetworkSettings {
    /// Loads settings: defaults, then the overlay file, then environment.
    pub fn load(paths: &Paths) -> Result<Self> {
        let mut settings = NetworkSettings::default();

        let overlay_file = paths.network_settings_file();
        if overlay_file.exists() {
            let text = fs::read_to_string(&overlay_file)?;
            let overlay: SettingsOverlay = serde_json::from_str(&text).map_err(|e| {
                engine_error(ErrorKind::Config, Message::NetworkSettingsInvalid(e.to_string()).to_string())
            })?;
            settings.apply_overlay(overlay);
        }

        settings.apply_env();
        Ok(settings)
    }

    fn apply_overlay(&mut self, overlay: SettingsOverlay) {
        if let Some(dir) = overlay.cache_dir {
            self.cache_dir = Some(expand_tilde(&dir));
        }
        if let Some(v) = overlay.cache_duration {
            self.cache_duration = v;
        }
        if let Some(v) = overlay.timeout {
            self.timeout = v;
        }
        if let Some(v) = overlay.max_retries {
            self.max_retries = v;
        }
        if let Some(v) = overlay.retry_delay {
            self.retry_delay = v;
        }
        if let Some(v) = overlay.rate_limit {
            self.rate_limit = v;
        }
        if let Some(v) = overlay.user_agent {
            self.user_agent = v;
        }
        if let Some(v) = overlay.metadata_timeout_multiplier {
            self.metadata_timeout_multiplier = v;
        }
        if let Some(v) = overlay.download_timeout_multiplier {
            self.download_timeout_multiplier = v;
        }
        if let Some(v) = overlay.compile_timeout {
            self.compile_timeout = v;
        }
        if let Some(v) = overlay.compile_jobs {
            self.compile_jobs = v;
        }
        if let Some(v) = overlay.max_extracted_mb {
            self.max_extracted_mb = v;
        }
        if let Some(v) = overlay.checker_timeout {
            self.checker_timeout = v;
        }
        if let Some(v) = overlay.cleanup_max_age_minutes {
            self.cleanup_max_age_minutes = v;
        }
    }

    fn apply_env(&mut self) {
        if let Ok(dir) = env::var("APPWATCH_CACHE_DIR") {
            self.cache_dir = Some(expand_tilde(&dir));
        }
        if let Some(v) = env_u64("APPWATCH_CACHE_DURATION") {
            self.cache_duration = v;
        }
        if let Some(v) = env_u64("APPWATCH_MAX_RETRIES") {
            self.max_retries = v as u32;
        }
        if let Some(v) = env_u64("APPWATCH_TIMEOUT") {
            self.timeout = v;
        }
        if let Ok(v) = env::var("APPWATCH_USER_AGENT") {
            if !v.is_empty() {
                self.user_agent = v;
            }
        }
        if let Some(v) = env_u64("APPWATCH_RATE_LIMIT") {
            self.rate_limit = v;
        }
        if let Some(v) = env_u64("APPWATCH_RETRY_DELAY") {
            self.retry_delay = v;
        }
    }
}

fn env_u64(key: &str) -> Option<u64> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Expands a leading `~` to the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    }
    if let Some(rest) = path.strip_prefix("~/") {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(rest);
    }
    PathBuf::from(path)
}

/// What happened to the non-loadable files during a config scan.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Enabled files that failed validation: (file name, reason).
    pub failures: Vec<(String, String)>,
    /// App keys that were declared but disabled.
    pub disabled: Vec<String>,
}

/// The frozen set of enabled, validated application configurations.
#[derive(Debug, Default)]
pub struct ConfigStore {
    apps: BTreeMap<String, AppConfig>,
}

impl ConfigStore {
    /// Scans `conf.d/` and validates every candidate file.
    ///
    /// Files whose name starts with `.` or `_` are ignored entirely.
    /// Disabled apps are recorded in the report; enabled apps that fail
    /// validation are recorded as failures and excluded from the store.
    /// An unreadable config root is fatal.
    pub fn load(paths: &Paths) -> Result<(ConfigStore, LoadReport)> {
        let conf_d = paths.conf_d();
        let mut store = ConfigStore::default();
        let mut report = LoadReport::default();

        if !conf_d.is_dir() {
            // A missing conf.d simply means no applications are declared.
            return Ok((store, report));
        }

        let entries = fs::read_dir(&conf_d).map_err(|e| {
            engine_error(
                ErrorKind::Config,
                Message::ConfigRootUnreadable(format!("{}: {}", conf_d.display(), e)).to_string(),
            )
        })?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| {
                let name = p.file_name().and_then(|n| n.to_str()).unwrap_or("");
                p.extension().is_some_and(|e| e == "json") && !name.starts_with('.') && !name.starts_with('_')
            })
            .collect();
        files.sort();

        for path in files {
            let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default().to_string();

            let raw: RawAppFile = match fs::read_to_string(&path).map_err(anyhow::Error::from).and_then(|text| {
                serde_json::from_str(&text).map_err(anyhow::Error::from)
            }) {
                Ok(raw) => raw,
                Err(e) => {
                    report.failures.push((file_name, e.to_string()));
                    continue;
                }
            };

            if !raw.enabled {
                report.disabled.push(raw.app_key);
                continue;
            }

            match AppConfig::from_raw(&file_name, raw) {
                Ok(config) => {
                    store.apps.insert(config.app_key.clone(), config);
                }
                Err(e) => report.failures.push((file_name, e.to_string())),
            }
        }

        Ok((store, report))
    }

    /// Keys of every enabled, valid application, in sorted order.
    pub fn list(&self) -> Vec<String> {
        self.apps.keys().cloned().collect()
    }

    /// Looks up one application by key.
    pub fn get(&self, app_key: &str) -> Option<&AppConfig> {
        self.apps.get(app_key)
    }

    /// Number of loaded applications.
    pub fn len(&self) -> usize {
        self.apps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }
}
