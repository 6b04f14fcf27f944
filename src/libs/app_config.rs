//! Typed per-application configuration.
//!
//! Each file under `conf.d/` declares one application. On disk the file is
//! a JSON object with top-level `app_key`, `enabled`, and an `application`
//! object holding the type-specific and policy fields:
//!
//! ```json
//! {
//!   "app_key": "Vivaldi",
//!   "enabled": true,
//!   "application": {
//!     "name": "Vivaldi",
//!     "type": "direct_download",
//!     "download_url": "https://downloads.vivaldi.com/stable/vivaldi-stable_amd64.deb",
//!     "package_name": "vivaldi-stable"
//!   }
//! }
//! ```
//!
//! In memory this becomes an [`AppConfig`]: shared fields plus an
//! [`AppType`] variant that carries only the fields its discovery
//! mechanism actually uses, so the pipeline never reaches for a field that
//! cannot exist for the type. Policy and verification knobs shared by
//! every type live in the embedded [`Policy`] record.
//!
//! ## Validation
//!
//! Validation happens entirely at load time, before any network activity:
//!
//! - the file must be named `lowercase(app_key).json`,
//! - the required field set for the declared `type` must be present,
//! - `filename_pattern_template` must carry exactly one `%s` version slot,
//! - a `version_regex` must compile and define a single capture group,
//! - every declared URL must be HTTPS unless `allow_insecure_http` is set,
//! - `install_path` must be anchored (absolute or `~`-prefixed) and free
//!   of `..` components.
//!
//! An invalid enabled file is a `CONFIG_ERROR` and is counted as failed
//! for the run; disabled files are skipped without validation beyond JSON
//! parsing. Keys starting with `_comment` (or any other unknown key) are
//! ignored, so configs can carry inline annotations.

use crate::libs::error::{engine_error, ErrorKind};
use crate::libs::messages::Message;
use anyhow::Result;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};

/// Digest algorithm for artifact checksum verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumAlgorithm {
    Sha256,
    Sha1,
    Md5,
}

impl ChecksumAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChecksumAlgorithm::Sha256 => "sha256",
            ChecksumAlgorithm::Sha1 => "sha1",
            ChecksumAlgorithm::Md5 => "md5",
        }
    }
}

impl Default for ChecksumAlgorithm {
    fn default() -> Self {
        ChecksumAlgorithm::Sha256
    }
}

/// How an extracted archive (or downloaded image) lands on the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallStrategy {
    MoveBinary,
    CopyRootContents,
    Compile,
    MoveAppimage,
}

/// Upstream discovery mechanism, one variant per `type`.
#[derive(Debug, Clone, PartialEq)]
pub enum AppType {
    GithubRelease {
        repo_owner: String,
        repo_name: String,
        filename_pattern_template: String,
    },
    DirectDownload {
        download_url: String,
        version_regex: Option<String>,
    },
    AppImage(AppImageSource),
    Script {
        version_url: String,
        version_regex: Option<String>,
        download_url: String,
    },
    Flatpak {
        flatpak_app_id: String,
    },
    Custom {
        custom_checker_script: String,
        custom_checker_func: String,
    },
}

/// AppImages are discovered either through a release index or a fixed URL.
#[derive(Debug, Clone, PartialEq)]
pub enum AppImageSource {
    Release {
        repo_owner: String,
        repo_name: String,
        filename_pattern_template: String,
    },
    Direct {
        download_url: String,
    },
}

impl AppType {
    pub fn type_name(&self) -> &'static str {
        match self {
            AppType::GithubRelease { .. } => "github_release",
            AppType::DirectDownload { .. } => "direct_download",
            AppType::AppImage(_) => "appimage",
            AppType::Script { .. } => "script",
            AppType::Flatpak { .. } => "flatpak",
            AppType::Custom { .. } => "custom",
        }
    }
}

/// Shared policy and verification fields, valid for every app type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Policy {
    pub install_path: Option<String>,
    pub package_name: Option<String>,
    pub binary_name: Option<String>,
    pub checksum_url: Option<String>,
    pub checksum_algorithm: ChecksumAlgorithm,
    pub checksum_from_release_digest: bool,
    pub gpg_key_id: Option<String>,
    pub gpg_fingerprint: Option<String>,
    pub sig_url: Option<String>,
    pub allow_insecure_http: bool,
    pub install_strategy: Option<InstallStrategy>,
    pub content_length: Option<u64>,
}

/// One validated application declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub app_key: String,
    pub name: String,
    pub enabled: bool,
    pub kind: AppType,
    pub policy: Policy,
}

/// On-disk shape of a `conf.d/*.json` file.
///
/// Unknown keys are tolerated (serde skips them), which is also what makes
/// `_comment`-prefixed annotation keys legal anywhere in the document.
#[derive(Debug, Deserialize)]
pub struct RawAppFile {
    pub app_key: String,
    pub enabled: bool,
    pub application: RawApplication,
}

#[derive(Debug, Deserialize)]
pub struct RawApplication {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub type_name: String,
    pub repo_owner: Option<String>,
    pub repo_name: Option<String>,
    pub filename_pattern_template: Option<String>,
    pub download_url: Option<String>,
    pub version_url: Option<String>,
    pub version_regex: Option<String>,
    pub install_path: Option<String>,
    pub package_name: Option<String>,
    pub binary_name: Option<String>,
    pub flatpak_app_id: Option<String>,
    pub custom_checker_script: Option<String>,
    pub custom_checker_func: Option<String>,
    pub checksum_url: Option<String>,
    #[serde(default)]
    pub checksum_algorithm: ChecksumAlgorithm,
    #[serde(default)]
    pub checksum_from_release_digest: bool,
    pub gpg_key_id: Option<String>,
    pub gpg_fingerprint: Option<String>,
    pub sig_url: Option<String>,
    #[serde(default)]
    pub allow_insecure_http: bool,
    pub install_strategy: Option<InstallStrategy>,
    pub content_length: Option<u64>,
}

impl AppConfig {
    /// Validates a raw file against the rules for its declared type.
    ///
    /// `file_name` is the basename of the source file and must equal
    /// `lowercase(app_key).json`.
    pub fn from_raw(file_name: &str, raw: RawAppFile) -> Result<AppConfig> {
        let app_key = raw.app_key;

        let expected_file = format!("{}.json", app_key.to_lowercase());
        if file_name != expected_file {
            return Err(engine_error(
                ErrorKind::Config,
                Message::ConfigKeyFilenameMismatch {
                    file: file_name.to_string(),
                    app_key: app_key.clone(),
                }
                .to_string(),
            ));
        }

        let app = raw.application;
        let require = |field: Option<String>, name: &str| -> Result<String> {
            field.filter(|v| !v.is_empty()).ok_or_else(|| {
                engine_error(
                    ErrorKind::Config,
                    Message::ConfigMissingField {
                        app_key: app_key.clone(),
                        field: name.to_string(),
                    }
                    .to_string(),
                )
            })
        };

        let kind = match app.type_name.as_str() {
            "github_release" => {
                let filename_pattern_template = require(app.filename_pattern_template.clone(), "filename_pattern_template")?;
                validate_pattern_slots(&app_key, &filename_pattern_template)?;
                AppType::GithubRelease {
                    repo_owner: require(app.repo_owner.clone(), "repo_owner")?,
                    repo_name: require(app.repo_name.clone(), "repo_name")?,
                    filename_pattern_template,
                }
            }
            "direct_download" => AppType::DirectDownload {
                download_url: require(app.download_url.clone(), "download_url")?,
                version_regex: validate_version_regex(&app_key, app.version_regex.clone())?,
            },
            "appimage" => {
                // Release-index discovery when a repository is declared,
                // otherwise a fixed download URL.
                if app.repo_owner.is_some() || app.repo_name.is_some() {
                    let filename_pattern_template = require(app.filename_pattern_template.clone(), "filename_pattern_template")?;
                    validate_pattern_slots(&app_key, &filename_pattern_template)?;
                    AppType::AppImage(AppImageSource::Release {
                        repo_owner: require(app.repo_owner.clone(), "repo_owner")?,
                        repo_name: require(app.repo_name.clone(), "repo_name")?,
                        filename_pattern_template,
                    })
                } else {
                    AppType::AppImage(AppImageSource::Direct {
                        download_url: require(app.download_url.clone(), "download_url")?,
                    })
                }
            }
            "script" => AppType::Script {
                version_url: require(app.version_url.clone(), "version_url")?,
                version_regex: validate_version_regex(&app_key, app.version_regex.clone())?,
                download_url: require(app.download_url.clone(), "download_url")?,
            },
            "flatpak" => AppType::Flatpak {
                flatpak_app_id: require(app.flatpak_app_id.clone(), "flatpak_app_id")?,
            },
            "custom" => AppType::Custom {
                custom_checker_script: require(app.custom_checker_script.clone(), "custom_checker_script")?,
                custom_checker_func: require(app.custom_checker_func.clone(), "custom_checker_func")?,
            },
            other => {
                return Err(engine_error(
                    ErrorKind::Config,
                    Message::ConfigUnknownType {
                        app_key: app_key.clone(),
                        type_name: other.to_string(),
                    }
                    .to_string(),
                ))
            }
        };

        let policy = Policy {
            install_path: app.install_path,
            package_name: app.package_name,
            binary_name: app.binary_name,
            checksum_url: app.checksum_url,
            checksum_algorithm: app.checksum_algorithm,
            checksum_from_release_digest: app.checksum_from_release_digest,
            gpg_key_id: app.gpg_key_id,
            gpg_fingerprint: app.gpg_fingerprint,
            sig_url: app.sig_url,
            allow_insecure_http: app.allow_insecure_http,
            install_strategy: app.install_strategy,
            content_length: app.content_length,
        };

        let config = AppConfig {
            name: app.name.unwrap_or_else(|| app_key.clone()),
            app_key,
            enabled: raw.enabled,
            kind,
            policy,
        };

        config.validate_urls()?;
        config.validate_install_path()?;

        Ok(config)
    }

    /// Every URL the app declares must be HTTPS unless explicitly waived.
    fn validate_urls(&self) -> Result<()> {
        let mut urls: Vec<&str> = Vec::new();
        match &self.kind {
            AppType::DirectDownload { download_url, .. } => urls.push(download_url),
            AppType::AppImage(AppImageSource::Direct { download_url }) => urls.push(download_url),
            AppType::Script { version_url, download_url, .. } => {
                urls.push(version_url);
                urls.push(download_url);
            }
            _ => {}
        }
        if let Some(url) = &self.policy.checksum_url {
            urls.push(url);
        }
        if let Some(url) = &self.policy.sig_url {
            urls.push(url);
        }

        for url in urls {
            let insecure = url.starts_with("http://");
            if !insecure && !url.starts_with("https://") {
                return Err(engine_error(
                    ErrorKind::Config,
                    Message::ConfigFileInvalid {
                        file: self.app_key.clone(),
                        reason: format!("'{}' is not an HTTP(S) URL", url),
                    }
                    .to_string(),
                ));
            }
            if insecure && !self.policy.allow_insecure_http {
                return Err(engine_error(
                    ErrorKind::Config,
                    Message::ConfigInsecureUrl {
                        app_key: self.app_key.clone(),
                        url: url.to_string(),
                    }
                    .to_string(),
                ));
            }
        }
        Ok(())
    }

    /// `install_path` must not traverse upwards and must be anchored.
    fn validate_install_path(&self) -> Result<()> {
        if let Some(path) = &self.policy.install_path {
            let anchored = path.starts_with('/') || path.starts_with("~/") || path == "~";
            if !anchored || path.split('/').any(|c| c == "..") {
                return Err(engine_error(
                    ErrorKind::Config,
                    Message::ConfigBadInstallPath {
                        app_key: self.app_key.clone(),
                        path: path.clone(),
                    }
                    .to_string(),
                ));
            }
        }
        Ok(())
    }

    /// The effective URL a detached signature is fetched from.
    pub fn sig_url_for(&self, download_url: &str) -> String {
        self.policy.sig_url.clone().unwrap_or_else(|| format!("{}.sig", download_url))
    }

    /// Serializes the effective configuration as the flat JSON object handed
    /// to custom checkers.
    pub fn to_flat_json(&self) -> Value {
        let mut obj = json!({
            "app_key": self.app_key,
            "name": self.name,
            "type": self.kind.type_name(),
            "enabled": self.enabled,
            "checksum_algorithm": self.policy.checksum_algorithm.as_str(),
            "checksum_from_release_digest": self.policy.checksum_from_release_digest,
            "allow_insecure_http": self.policy.allow_insecure_http,
        });
        let map = obj.as_object_mut().unwrap();

        let mut put = |key: &str, value: &Option<String>| {
            if let Some(v) = value {
                map.insert(key.to_string(), Value::String(v.clone()));
            }
        };

        match &self.kind {
            AppType::GithubRelease { repo_owner, repo_name, filename_pattern_template }
            | AppType::AppImage(AppImageSource::Release { repo_owner, repo_name, filename_pattern_template }) => {
                put("repo_owner", &Some(repo_owner.clone()));
                put("repo_name", &Some(repo_name.clone()));
                put("filename_pattern_template", &Some(filename_pattern_template.clone()));
            }
            AppType::DirectDownload { download_url, version_regex } => {
                put("download_url", &Some(download_url.clone()));
                put("version_regex", version_regex);
            }
            AppType::AppImage(AppImageSource::Direct { download_url }) => {
                put("download_url", &Some(download_url.clone()));
            }
            AppType::Script { version_url, version_regex, download_url } => {
                put("version_url", &Some(version_url.clone()));
                put("version_regex", version_regex);
                put("download_url", &Some(download_url.clone()));
            }
            AppType::Flatpak { flatpak_app_id } => {
                put("flatpak_app_id", &Some(flatpak_app_id.clone()));
            }
            AppType::Custom { custom_checker_script, custom_checker_func } => {
                put("custom_checker_script", &Some(custom_checker_script.clone()));
                put("custom_checker_func", &Some(custom_checker_func.clone()));
            }
        }

        put("install_path", &self.policy.install_path);
        put("package_name", &self.policy.package_name);
        put("binary_name", &self.policy.binary_name);
        put("checksum_url", &self.policy.checksum_url);
        put("gpg_key_id", &self.policy.gpg_key_id);
        put("gpg_fingerprint", &self.policy.gpg_fingerprint);
        put("sig_url", &self.policy.sig_url);

        obj
    }
}

/// `filename_pattern_template` carries exactly one `%s` version slot.
fn validate_pattern_slots(app_key: &str, pattern: &str) -> Result<()> {
    let count = pattern.matches("%s").count();
    if count != 1 {
        return Err(engine_error(
            ErrorKind::Config,
            Message::ConfigPatternSlotCount {
                app_key: app_key.to_string(),
                count,
            }
            .to_string(),
        ));
    }
    Ok(())
}

/// A configured `version_regex` must compile and define a single capture
/// group that delivers the version.
fn validate_version_regex(app_key: &str, pattern: Option<String>) -> Result<Option<String>> {
    if let Some(pattern) = &pattern {
        let re = Regex::new(pattern).map_err(|e| {
            engine_error(
                ErrorKind::Config,
                Message::ConfigFileInvalid {
                    file: app_key.to_string(),
                    reason: format!("version_regex does not compile: {}", e),
                }
                .to_string(),
            )
        })?;
        if re.captures_len() != 2 {
            return Err(engine_error(
                ErrorKind::Config,
                Message::ConfigFileInvalid {
                    file: app_key.to_string(),
                    reason: "version_regex must define exactly one capture group".to_string(),
                }
                .to_string(),
            ));
        }
    }
    Ok(pattern)
}
