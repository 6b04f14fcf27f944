//! Filesystem layout for application state.
//!
//! Resolves the two roots everything else hangs off of:
//!
//! - **Config root** (`~/.config/appwatch/` by default): the per-app
//!   configuration set under `conf.d/`, the optional
//!   `network_settings.json`, and the installed-version ledger.
//! - **Cache root** (`~/.cache/appwatch/` by default): the URL-addressed
//!   response cache plus `artifacts/`, `tmp/`, and `logs/` subtrees.
//!
//! Both roots can be redirected with environment variables
//! (`APPWATCH_CONFIG_DIR`, `APPWATCH_CACHE_DIR`), which is also how the
//! test suite points the engine at temporary directories.
//!
//! All directories the engine creates are private to the user (mode 0700):
//! cache contents reveal which applications are tracked, and artifacts are
//! executed after verification.

use anyhow::Result;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

// Include compile-time application metadata
include!(concat!(env!("OUT_DIR"), "/app_metadata.rs"));

/// Environment variable overriding the configuration root.
const CONFIG_DIR_ENV: &str = "APPWATCH_CONFIG_DIR";

/// Environment variable overriding the cache root.
const CACHE_DIR_ENV: &str = "APPWATCH_CACHE_DIR";

/// Resolved filesystem layout for one engine run.
#[derive(Debug, Clone)]
pub struct Paths {
    config_root: PathBuf,
    cache_root: PathBuf,
}

impl Paths {
    /// Resolves the configuration and cache roots from the environment.
    ///
    /// Resolution order for each root: explicit environment override, then
    /// the XDG base directory, then the current directory as a last resort
    /// (restricted environments without a home directory).
    pub fn resolve() -> Self {
        let config_root = match env::var(CONFIG_DIR_ENV) {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => dirs::config_dir().unwrap_or_else(|| PathBuf::from(".")).join(APP_METADATA_NAME),
        };

        let cache_root = match env::var(CACHE_DIR_ENV) {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => dirs::cache_dir().unwrap_or_else(|| PathBuf::from(".")).join(APP_METADATA_NAME),
        };

        Self { config_root, cache_root }
    }

    /// Builds a layout rooted at explicit directories.
    ///
    /// Used when the cache directory was overridden through
    /// `network_settings.json` or `--cache-duration`-style configuration.
    pub fn with_roots(config_root: PathBuf, cache_root: PathBuf) -> Self {
        Self { config_root, cache_root }
    }

    /// The configuration root directory.
    pub fn config_root(&self) -> &Path {
        &self.config_root
    }

    /// The per-application configuration directory (`conf.d/`).
    pub fn conf_d(&self) -> PathBuf {
        self.config_root.join("conf.d")
    }

    /// The optional network settings overlay file.
    pub fn network_settings_file(&self) -> PathBuf {
        self.config_root.join("network_settings.json")
    }

    /// The installed-version ledger document.
    pub fn ledger_file(&self) -> PathBuf {
        self.config_root.join("installed_versions.json")
    }

    /// The cache root directory (also holds the URL-addressed entries).
    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    /// Downloaded installables, addressable by app and version.
    pub fn artifacts_dir(&self) -> PathBuf {
        self.cache_root.join("artifacts")
    }

    /// The artifact directory for one app at one version.
    pub fn artifact_dir(&self, app_key: &str, version: &str) -> PathBuf {
        self.artifacts_dir().join(app_key).join(format!("v{}", version))
    }

    /// Ephemeral extraction directories.
    pub fn tmp_dir(&self) -> PathBuf {
        self.cache_root.join("tmp")
    }

    /// Per-operation subprocess logs.
    pub fn logs_dir(&self) -> PathBuf {
        self.cache_root.join("logs")
    }

    /// Replaces the cache root, keeping the config root.
    pub fn set_cache_root(&mut self, cache_root: PathBuf) {
        self.cache_root = cache_root;
    }
}

/// Creates a directory (and its parents) with user-only permissions.
pub fn ensure_private_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o700))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_dir_is_versioned() {
        let paths = Paths::with_roots(PathBuf::from("/tmp/cfg"), PathBuf::from("/tmp/cache"));
        assert_eq!(paths.artifact_dir("MyApp", "1.2.3"), PathBuf::from("/tmp/cache/artifacts/MyApp/v1.2.3"));
    }

    #[test]
    fn ledger_lives_in_config_root() {
        let paths = Paths::with_roots(PathBuf::from("/tmp/cfg"), PathBuf::from("/tmp/cache"));
        assert_eq!(paths.ledger_file(), PathBuf::from("/tmp/cfg/installed_versions.json"));
    }
}
