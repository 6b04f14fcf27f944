//! Per-application update pipeline.
//!
//! One run of the pipeline takes a single application through
//! `discover -> compare -> fetch -> verify -> prompt -> install -> ledger`,
//! with any failure short-circuiting to a terminal error outcome. The
//! orchestrator turns the returned [`Outcome`] into exactly one counter
//! tick per app.
//!
//! ## Discovery
//!
//! Discovery is dispatched on the app's type:
//!
//! - `github_release` (and repository-backed AppImages): fetch the
//!   releases index, take element 0, resolve the asset by the filename
//!   pattern, and pick up a published digest when present.
//! - `direct_download`: extract the version from the artifact filename;
//!   failing that, download the file and read its embedded metadata.
//! - `appimage` with a fixed URL: version from the URL's filename.
//! - `script`: fetch the version page, prefer a JSON `tag_name`, fall
//!   back to the configured regex.
//! - `flatpak`: parse `flatpak search` output for the app id's row.
//! - `custom`: run the checker; a `success` verdict re-enters at the
//!   compare step with the checker-supplied fields, never at discovery.
//!
//! ## Fetch and Verify
//!
//! Artifacts live at a deterministic per-version path and are re-used
//! when already present with a matching digest, so interrupted runs do
//! not re-download. Verification (checksum, then detached signature) runs
//! before the user is ever prompted.
//!
//! ## Dry Run
//!
//! Dry-run mode performs discovery and (when the artifact is already on
//! disk) verification, then skips the prompt and the installer and only
//! simulates the ledger update. Nothing under `/usr/local`,
//! `$HOME/Applications`, or the package database is touched.
//!
//! ## Hooks
//!
//! Hook slots fire around the phases (`pre_check`, `post_check`,
//! `post_verify`, `pre_install`, `post_install`, `error`); hook failures
//! are logged and never affect the pipeline. The `error` slot receives a
//! `{phase, error_type, message}` payload.

use crate::libs::app_config::{AppConfig, AppImageSource, AppType, ChecksumAlgorithm};
use crate::libs::cleanup::CleanupRegistry;
use crate::libs::config::NetworkSettings;
use crate::libs::custom::{self, CheckerInstallType, Verdict};
use crate::libs::error::{engine_error, kind_of, ErrorKind};
use crate::libs::exec::Runner;
use crate::libs::hooks::{Hooks, HookSlot};
use crate::libs::http::{ExpectedType, HttpClient};
use crate::libs::install::{self, deb, flatpak, InstallContext};
use crate::libs::ledger::Ledger;
use crate::libs::messages::Message;
use crate::libs::paths::Paths;
use crate::libs::release;
use crate::libs::verify::{hash_file, Verifier};
use crate::libs::version::{self, NOT_INSTALLED};
use crate::{msg_info, msg_print, msg_success};
use anyhow::Result;
use dialoguer::{theme::ColorfulTheme, Confirm};
use regex::Regex;
use serde_json::json;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

/// How install confirmations are answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptPolicy {
    /// Ask on the terminal, defaulting to yes.
    Interactive,
    /// Answer every prompt with yes (`--yes`).
    AssumeYes,
    /// Answer every prompt with no.
    AssumeNo,
}

/// Per-run behavior switches.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub dry_run: bool,
    pub prompt: PromptPolicy,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self { dry_run: false, prompt: PromptPolicy::Interactive }
    }
}

/// Terminal state of one pipeline run; maps 1:1 onto the run counters.
#[derive(Debug)]
pub enum Outcome {
    Updated(String),
    UpToDate,
    Skipped,
    Failed { kind: ErrorKind, message: String },
}

/// Where the installable comes from once a newer version is known.
enum Source {
    /// Fetch from a URL into the artifact store.
    Download { url: String, filename: String, release_digest: Option<String> },
    /// Already on disk (direct downloads resolve their version from the
    /// fetched file).
    PreFetched { path: PathBuf, url: String },
    /// No artifact; handled by the flatpak CLI.
    Flatpak { app_id: String },
}

/// A discovered newer-version candidate.
struct Found {
    latest: String,
    source: Source,
    explicit_checksum: Option<String>,
    /// App config, possibly adjusted by a custom-checker verdict.
    effective: AppConfig,
}

enum Discovery {
    Found(Found),
    NoUpdate,
}

/// Pipeline phases, as reported to error hooks.
#[derive(Debug, Clone, Copy)]
enum Phase {
    Discover,
    Fetch,
    Verify,
    Install,
    Ledger,
}

impl Phase {
    fn as_str(&self) -> &'static str {
        match self {
            Phase::Discover => "discover",
            Phase::Fetch => "fetch",
            Phase::Verify => "verify",
            Phase::Install => "install",
            Phase::Ledger => "ledger",
        }
    }

    /// Taxonomy kind assumed for untagged errors raised in this phase.
    fn default_kind(&self) -> ErrorKind {
        match self {
            Phase::Discover | Phase::Fetch => ErrorKind::Network,
            Phase::Verify => ErrorKind::Validation,
            Phase::Install => ErrorKind::Installation,
            Phase::Ledger => ErrorKind::Cache,
        }
    }
}

/// One application's pipeline, borrowing the engine's shared services.
pub struct Pipeline<'a> {
    pub http: &'a HttpClient,
    pub runner: &'a Runner,
    pub settings: &'a NetworkSettings,
    pub paths: &'a Paths,
    pub ledger: &'a Ledger,
    pub hooks: &'a Hooks,
    pub cleanup: &'a Arc<CleanupRegistry>,
    pub options: &'a RunOptions,
}

impl Pipeline<'_> {
    /// Runs the full pipeline for one app, converting failures into the
    /// `Failed` outcome after firing the error hook.
    pub async fn run(&self, app: &AppConfig) -> Outcome {
        self.hooks.fire(HookSlot::PreCheck, &app.name, None);

        match self.execute(app).await {
            Ok(outcome) => outcome,
            Err((phase, e)) => {
                let kind = kind_of(&e).unwrap_or_else(|| phase.default_kind());
                let message = e.to_string();
                self.hooks.fire_error(&app.name, phase.as_str(), kind.identifier(), &message);
                Outcome::Failed { kind, message }
            }
        }
    }

    async fn execute(&self, app: &AppConfig) -> Result<Outcome, (Phase, anyhow::Error)> {
        msg_print!(Message::CheckingApp(app.name.clone()));

        let discovery = self.discover(app).await.map_err(|e| (Phase::Discover, e))?;

        let found = match discovery {
            Discovery::NoUpdate => {
                self.hooks.fire(HookSlot::PostCheck, &app.name, None);
                msg_info!(Message::CheckerNoUpdate(app.app_key.clone()));
                return Ok(Outcome::UpToDate);
            }
            Discovery::Found(found) => found,
        };

        self.hooks
            .fire(HookSlot::PostCheck, &app.name, Some(&json!({ "latest_version": found.latest })));

        self.apply(app, found).await
    }

    /// Reads the ledger off the async runtime.
    ///
    /// Ledger lock acquisition polls a file lock synchronously, so it runs
    /// on the blocking pool; a contended lock must not stall a runtime
    /// worker that other tasks (signal handling, subprocess log capture)
    /// are scheduled on.
    async fn ledger_get(&self, app_key: &str) -> String {
        let ledger = self.ledger.clone();
        let app_key = app_key.to_string();
        tokio::task::spawn_blocking(move || ledger.get(&app_key))
            .await
            .unwrap_or_else(|_| NOT_INSTALLED.to_string())
    }

    /// Records (or, in dry-run, simulates recording) a version, off the
    /// async runtime for the same reason as [`ledger_get`](Self::ledger_get).
    async fn ledger_record(&self, app_key: &str, version: &str) -> Result<()> {
        let ledger = self.ledger.clone();
        let app_key = app_key.to_string();
        let version = version.to_string();
        let simulate = self.options.dry_run;
        tokio::task::spawn_blocking(move || {
            if simulate {
                ledger.set_simulated(&app_key, &version)
            } else {
                ledger.set(&app_key, &version)
            }
        })
        .await
        .map_err(anyhow::Error::from)?
    }

    /// Compare through ledger; everything after discovery.
    async fn apply(&self, app: &AppConfig, found: Found) -> Result<Outcome, (Phase, anyhow::Error)> {
        let mut installed = self.ledger_get(&app.app_key).await;

        // A package installed outside this engine should not look like an
        // install-from-scratch: fall back to the system package database
        // when the ledger has no record.
        if installed == NOT_INSTALLED {
            if let Some(package_name) = &app.policy.package_name {
                if let Ok(Some(system_version)) = deb::installed_package_version(self.runner, package_name).await {
                    installed = version::normalize(&system_version);
                }
            }
        }

        let latest = found.latest.clone();

        if !version::is_newer(&latest, &installed) {
            msg_success!(Message::AppUpToDate { app_key: app.app_key.clone(), version: installed });
            return Ok(Outcome::UpToDate);
        }

        if installed == NOT_INSTALLED {
            msg_info!(Message::InstallFromScratch { app_key: app.app_key.clone(), latest: latest.clone() });
        } else {
            msg_info!(Message::UpdateAvailable { app_key: app.app_key.clone(), current: installed, latest: latest.clone() });
        }

        let effective = &found.effective;

        // Flatpak installs carry no artifact of their own.
        if let Source::Flatpak { app_id } = &found.source {
            if self.options.dry_run {
                msg_info!(Message::DryRunInstallSkipped(app.app_key.clone()));
                self.ledger_record(&app.app_key, &latest).await.map_err(|e| (Phase::Ledger, e))?;
                return Ok(Outcome::Updated(latest));
            }
            if !self.confirm(app, &latest).map_err(|e| (Phase::Install, e))? {
                msg_info!(Message::UserDeclined(app.app_key.clone()));
                return Ok(Outcome::Skipped);
            }
            self.hooks.fire(HookSlot::PreInstall, &app.name, None);
            let ctx = self.install_context();
            flatpak::install_flatpak(&ctx, &app.app_key, &latest, app_id)
                .await
                .map_err(|e| (Phase::Install, e))?;
            self.hooks.fire(HookSlot::PostInstall, &app.name, None);
            self.ledger_record(&app.app_key, &latest).await.map_err(|e| (Phase::Ledger, e))?;
            msg_success!(Message::InstallCompleted { app_key: app.app_key.clone(), version: latest.clone() });
            return Ok(Outcome::Updated(latest));
        }

        let (artifact, download_url, release_digest) =
            self.fetch(app, &found, &latest).await.map_err(|e| (Phase::Fetch, e))?;

        // Verification needs the artifact on disk; in dry-run the download
        // is a no-op, so a missing file skips straight past this step.
        if artifact.exists() {
            let verifier = Verifier {
                http: self.http,
                runner: self.runner,
                logs_dir: self.paths.logs_dir(),
            };
            verifier
                .verify(effective, &artifact, &download_url, found.explicit_checksum.as_deref(), release_digest.as_deref())
                .await
                .map_err(|e| (Phase::Verify, e))?;
            self.hooks.fire(HookSlot::PostVerify, &app.name, None);
        }

        if self.options.dry_run {
            msg_info!(Message::DryRunInstallSkipped(app.app_key.clone()));
            self.ledger_record(&app.app_key, &latest).await.map_err(|e| (Phase::Ledger, e))?;
            return Ok(Outcome::Updated(latest));
        }

        if !self.confirm(app, &latest).map_err(|e| (Phase::Install, e))? {
            msg_info!(Message::UserDeclined(app.app_key.clone()));
            return Ok(Outcome::Skipped);
        }

        msg_info!(Message::InstallStarted { app_key: app.app_key.clone(), version: latest.clone() });
        self.hooks.fire(HookSlot::PreInstall, &app.name, None);
        let ctx = self.install_context();
        install::install_artifact(&ctx, effective, &artifact, &latest)
            .await
            .map_err(|e| (Phase::Install, e))?;
        self.hooks.fire(HookSlot::PostInstall, &app.name, None);

        self.ledger_record(&app.app_key, &latest).await.map_err(|e| (Phase::Ledger, e))?;
        msg_success!(Message::InstallCompleted { app_key: app.app_key.clone(), version: latest.clone() });
        Ok(Outcome::Updated(latest))
    }

    fn install_context(&self) -> InstallContext<'_> {
        InstallContext {
            runner: self.runner,
            settings: self.settings,
            paths: self.paths,
            cleanup: self.cleanup,
        }
    }

    /// Resolves the artifact onto disk, re-using a previous download when
    /// its digest still matches.
    async fn fetch(&self, app: &AppConfig, found: &Found, latest: &str) -> Result<(PathBuf, String, Option<String>)> {
        match &found.source {
            Source::Flatpak { .. } => unreachable!("flatpak installs are handled before fetch"),
            Source::PreFetched { path, url } => {
                let artifact_dir = self.paths.artifact_dir(&app.app_key, latest);
                crate::libs::paths::ensure_private_dir(&artifact_dir)?;
                let dest = artifact_dir.join(path.file_name().unwrap_or(std::ffi::OsStr::new("artifact")));
                if !dest.exists() {
                    fs::rename(path, &dest)?;
                    self.cleanup.unregister_path(path);
                }
                Ok((dest, url.clone(), None))
            }
            Source::Download { url, filename, release_digest } => {
                let artifact = self.paths.artifact_dir(&app.app_key, latest).join(filename);

                if artifact.exists() && self.reusable(&artifact, found, release_digest.as_deref())? {
                    msg_info!(Message::ArtifactReused(artifact.display().to_string()));
                } else {
                    self.http
                        .download(
                            url,
                            &artifact,
                            None,
                            found.effective.policy.checksum_algorithm,
                            found.effective.policy.allow_insecure_http,
                            found.effective.policy.content_length,
                        )
                        .await?;
                }

                Ok((artifact, url.clone(), release_digest.clone()))
            }
        }
    }

    /// A present artifact is reusable when no digest is known, or when its
    /// digest still matches the expected one.
    fn reusable(&self, artifact: &std::path::Path, found: &Found, release_digest: Option<&str>) -> Result<bool> {
        if let Some(expected) = &found.explicit_checksum {
            let actual = hash_file(artifact, found.effective.policy.checksum_algorithm)?;
            return Ok(actual.eq_ignore_ascii_case(expected));
        }
        if let Some(expected) = release_digest {
            let actual = hash_file(artifact, ChecksumAlgorithm::Sha256)?;
            return Ok(actual.eq_ignore_ascii_case(expected));
        }
        Ok(true)
    }

    /// Asks for install confirmation according to the prompt policy.
    fn confirm(&self, app: &AppConfig, latest: &str) -> Result<bool> {
        match self.options.prompt {
            PromptPolicy::AssumeYes => Ok(true),
            PromptPolicy::AssumeNo => Ok(false),
            PromptPolicy::Interactive => {
                let prompt = Message::PromptInstall {
                    app_key: app.app_key.clone(),
                    version: latest.to_string(),
                }
                .to_string();
                Ok(Confirm::with_theme(&ColorfulTheme::default())
                    .with_prompt(prompt)
                    .default(true)
                    .interact()?)
            }
        }
    }

    /// Type-dispatched discovery.
    async fn discover(&self, app: &AppConfig) -> Result<Discovery> {
        match &app.kind {
            AppType::GithubRelease { repo_owner, repo_name, filename_pattern_template } => {
                self.discover_release(app, repo_owner, repo_name, filename_pattern_template).await
            }
            AppType::AppImage(AppImageSource::Release { repo_owner, repo_name, filename_pattern_template }) => {
                self.discover_release(app, repo_owner, repo_name, filename_pattern_template).await
            }
            AppType::AppImage(AppImageSource::Direct { download_url }) => {
                let filename = url_basename(download_url);
                let latest = version::extract_embedded(&filename).map(|v| version::normalize(&v)).ok_or_else(|| {
                    engine_error(ErrorKind::Validation, Message::VersionUndetermined(filename.clone()).to_string())
                })?;
                Ok(Discovery::Found(Found {
                    latest,
                    source: Source::Download { url: download_url.clone(), filename, release_digest: None },
                    explicit_checksum: None,
                    effective: app.clone(),
                }))
            }
            AppType::DirectDownload { download_url, version_regex } => {
                self.discover_direct(app, download_url, version_regex.as_deref()).await
            }
            AppType::Script { version_url, version_regex, download_url } => {
                self.discover_script(app, version_url, version_regex.as_deref(), download_url).await
            }
            AppType::Flatpak { flatpak_app_id } => {
                let latest = flatpak::search_version(self.runner, flatpak_app_id).await?;
                Ok(Discovery::Found(Found {
                    latest,
                    source: Source::Flatpak { app_id: flatpak_app_id.clone() },
                    explicit_checksum: None,
                    effective: app.clone(),
                }))
            }
            AppType::Custom { custom_checker_script, custom_checker_func } => {
                self.discover_custom(app, custom_checker_script, custom_checker_func).await
            }
        }
    }

    /// Release-index discovery shared by `github_release` and AppImages.
    async fn discover_release(&self, app: &AppConfig, owner: &str, repo: &str, template: &str) -> Result<Discovery> {
        let index_url = release::releases_url(owner, repo);
        let index_path = self
            .http
            .fetch_cached(&index_url, ExpectedType::Json, app.policy.allow_insecure_http)
            .await?;
        let index = release::parse_index(&index_path)?;
        let latest_release = release::latest(&index)?;
        let latest = release::latest_version(latest_release)?;

        let resolved_name = template.replacen("%s", &latest, 1);
        let url = release::asset_url(latest_release, &resolved_name, app.policy.allow_insecure_http)
            .or_else(|_| release::asset_url(latest_release, template, app.policy.allow_insecure_http))?;

        let filename = url_basename(&url);
        let release_digest = release::asset_digest(latest_release, &filename);

        Ok(Discovery::Found(Found {
            latest,
            source: Source::Download { url, filename, release_digest },
            explicit_checksum: None,
            effective: app.clone(),
        }))
    }

    /// Direct-download discovery: version from the filename, else from the
    /// downloaded package's own metadata.
    async fn discover_direct(&self, app: &AppConfig, download_url: &str, version_regex: Option<&str>) -> Result<Discovery> {
        let filename = url_basename(download_url);

        if let Some(v) = extract_with_regex(version_regex, &filename)?.or_else(|| version::extract_embedded(&filename)) {
            return Ok(Discovery::Found(Found {
                latest: version::normalize(&v),
                source: Source::Download { url: download_url.to_string(), filename, release_digest: None },
                explicit_checksum: None,
                effective: app.clone(),
            }));
        }

        // The filename carries no version; the file itself has to tell us.
        if self.options.dry_run {
            return Err(engine_error(
                ErrorKind::Validation,
                Message::VersionUndetermined(format!("{} (dry run skips the download)", filename)).to_string(),
            ));
        }

        let tmp_dir = self.paths.tmp_dir();
        crate::libs::paths::ensure_private_dir(&tmp_dir)?;
        let tmp_path = tmp_dir.join(&filename);
        self.cleanup.register_path(&tmp_path);
        self.http
            .download(
                download_url,
                &tmp_path,
                None,
                app.policy.checksum_algorithm,
                app.policy.allow_insecure_http,
                app.policy.content_length,
            )
            .await?;

        let latest = if filename.to_lowercase().ends_with(".deb") {
            deb::package_version(self.runner, &tmp_path).await?
        } else {
            None
        };
        let latest = latest
            .map(|v| version::normalize(&v))
            .ok_or_else(|| engine_error(ErrorKind::Validation, Message::VersionUndetermined(filename.clone()).to_string()))?;

        Ok(Discovery::Found(Found {
            latest,
            source: Source::PreFetched { path: tmp_path, url: download_url.to_string() },
            explicit_checksum: None,
            effective: app.clone(),
        }))
    }

    /// Version-page discovery: JSON `tag_name` preferred, regex fallback.
    async fn discover_script(
        &self,
        app: &AppConfig,
        version_url: &str,
        version_regex: Option<&str>,
        download_url: &str,
    ) -> Result<Discovery> {
        let page = self
            .http
            .fetch_cached(version_url, ExpectedType::Raw, app.policy.allow_insecure_http)
            .await?;
        let body = fs::read_to_string(&page)?;

        let from_json = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("tag_name").and_then(|t| t.as_str()).map(str::to_string));

        let latest = match from_json {
            Some(tag) => version::normalize(&tag),
            None => extract_with_regex(version_regex, &body)?
                .map(|v| version::normalize(&v))
                .ok_or_else(|| {
                    engine_error(ErrorKind::Validation, Message::VersionUndetermined(version_url.to_string()).to_string())
                })?,
        };

        Ok(Discovery::Found(Found {
            latest,
            source: Source::Download {
                url: download_url.to_string(),
                filename: url_basename(download_url),
                release_digest: None,
            },
            explicit_checksum: None,
            effective: app.clone(),
        }))
    }

    /// Custom-checker discovery; a success verdict re-enters at compare.
    async fn discover_custom(&self, app: &AppConfig, script: &str, func: &str) -> Result<Discovery> {
        let verdict = custom::run_checker(self.runner, self.settings, &self.paths.logs_dir(), app, script, func).await?;

        let update = match verdict {
            Verdict::NoUpdate => return Ok(Discovery::NoUpdate),
            Verdict::Success(update) => update,
        };

        let mut effective = app.clone();
        if update.checksum_url.is_some() {
            effective.policy.checksum_url = update.checksum_url.clone();
        }
        if update.gpg_key_id.is_some() {
            effective.policy.gpg_key_id = update.gpg_key_id.clone();
        }
        if update.gpg_fingerprint.is_some() {
            effective.policy.gpg_fingerprint = update.gpg_fingerprint.clone();
        }
        if update.install_target_path.is_some() {
            effective.policy.install_path = update.install_target_path.clone();
        }

        let source = match update.install_type {
            CheckerInstallType::Flatpak => {
                let app_id = update.flatpak_app_id.clone().ok_or_else(|| {
                    engine_error(
                        ErrorKind::CustomChecker,
                        Message::CheckerMalformedVerdict("flatpak verdict without flatpak_app_id".to_string()).to_string(),
                    )
                })?;
                Source::Flatpak { app_id }
            }
            CheckerInstallType::Deb | CheckerInstallType::Appimage | CheckerInstallType::Tgz => {
                let url = update.download_url.clone().ok_or_else(|| {
                    engine_error(
                        ErrorKind::CustomChecker,
                        Message::CheckerMalformedVerdict("verdict without download_url".to_string()).to_string(),
                    )
                })?;
                let filename = url_basename(&url);
                Source::Download { url, filename, release_digest: None }
            }
        };

        Ok(Discovery::Found(Found {
            latest: update.latest_version.clone(),
            source,
            explicit_checksum: update.expected_checksum.clone(),
            effective,
        }))
    }
}

/// Last path segment of a URL, query string stripped.
fn url_basename(url: &str) -> String {
    let no_query = url.split(['?', '#']).next().unwrap_or(url);
    no_query.rsplit('/').next().unwrap_or(no_query).to_string()
}

/// Applies a configured single-capture version regex to a haystack.
fn extract_with_regex(pattern: Option<&str>, haystack: &str) -> Result<Option<String>> {
    let Some(pattern) = pattern else {
        return Ok(None);
    };
    let re = Regex::new(pattern).map_err(|e| engine_error(ErrorKind::Config, format!("version_regex does not compile: {}", e)))?;
    Ok(re.captures(haystack).and_then(|caps| caps.get(1)).map(|m| m.as_str().to_string()))
}
