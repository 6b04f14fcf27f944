//! Custom-checker extension protocol.
//!
//! An app of type `custom` delegates discovery to a user-supplied shell
//! function. The checker is treated as an untrusted subprocess: the
//! effective app configuration travels in as a single JSON argv argument
//! (never interpolated into shell text), the verdict comes back as one
//! JSON object on stdout, the invocation runs under a time budget, and
//! only the closed set of `install_type` values is accepted.
//!
//! ## Verdict Format
//!
//! The checker prints exactly one JSON object:
//!
//! ```json
//! {
//!   "status": "success",
//!   "latest_version": "2.1.0",
//!   "source": "vendor release page",
//!   "install_type": "deb",
//!   "download_url": "https://example.com/widget_2.1.0_amd64.deb",
//!   "expected_checksum": "9f86d081..."
//! }
//! ```
//!
//! `status` is one of `success`, `no_update`, or `error`. A `no_update`
//! verdict counts the app as up to date; an `error` verdict carries an
//! `error_type` from the engine's taxonomy plus an `error_message`.
//! `install_type` must be one of `deb`, `appimage`, `flatpak`, `tgz`;
//! anything else is a `CONFIG_ERROR`.
//!
//! After a `success` verdict the pipeline re-enters at the compare step
//! with the checker-supplied fields; discovery is not repeated.

use crate::libs::app_config::AppConfig;
use crate::libs::config::{expand_tilde, NetworkSettings};
use crate::libs::error::{engine_error, ErrorKind};
use crate::libs::exec::{self, Runner, RunSpec};
use crate::libs::messages::Message;
use crate::msg_info;
use anyhow::Result;
use regex::Regex;
use serde::Deserialize;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

fn function_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap())
}

/// Installation mechanism a checker may select.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckerInstallType {
    Deb,
    Appimage,
    Flatpak,
    Tgz,
}

impl CheckerInstallType {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "deb" => Some(Self::Deb),
            "appimage" => Some(Self::Appimage),
            "flatpak" => Some(Self::Flatpak),
            "tgz" => Some(Self::Tgz),
            _ => None,
        }
    }
}

/// Fields of a successful checker verdict.
#[derive(Debug, Clone)]
pub struct CheckerUpdate {
    pub latest_version: String,
    pub source: Option<String>,
    pub install_type: CheckerInstallType,
    pub download_url: Option<String>,
    pub install_target_path: Option<String>,
    pub flatpak_app_id: Option<String>,
    pub checksum_url: Option<String>,
    pub expected_checksum: Option<String>,
    pub gpg_key_id: Option<String>,
    pub gpg_fingerprint: Option<String>,
}

/// Outcome of one checker invocation.
#[derive(Debug, Clone)]
pub enum Verdict {
    Success(CheckerUpdate),
    NoUpdate,
}

/// Raw JSON shape a checker prints to stdout.
#[derive(Debug, Deserialize)]
struct RawVerdict {
    status: String,
    latest_version: Option<String>,
    source: Option<String>,
    install_type: Option<String>,
    download_url: Option<String>,
    install_target_path: Option<String>,
    flatpak_app_id: Option<String>,
    checksum_url: Option<String>,
    expected_checksum: Option<String>,
    gpg_key_id: Option<String>,
    gpg_fingerprint: Option<String>,
    error_type: Option<String>,
    error_message: Option<String>,
}

/// Runs the configured checker function and parses its verdict.
pub async fn run_checker(
    runner: &Runner,
    settings: &NetworkSettings,
    logs_dir: &Path,
    app: &AppConfig,
    script: &str,
    func: &str,
) -> Result<Verdict> {
    if !function_name_re().is_match(func) {
        return Err(engine_error(ErrorKind::Config, Message::CheckerBadFunctionName(func.to_string()).to_string()));
    }

    let script_path = expand_tilde(script);
    if !script_path.is_file() {
        return Err(engine_error(
            ErrorKind::Config,
            Message::ConfigFileInvalid {
                file: app.app_key.clone(),
                reason: format!("custom_checker_script '{}' does not exist", script_path.display()),
            }
            .to_string(),
        ));
    }

    msg_info!(Message::CheckerInvoked { app_key: app.app_key.clone(), func: func.to_string() });

    let config_json = app.to_flat_json().to_string();
    // The script path and config JSON travel as $0/$1; only the validated
    // function name lands in the command text.
    let args = vec![
        "-c".to_string(),
        format!("source \"$0\" && {} \"$1\"", func),
        script_path.display().to_string(),
        config_json,
    ];

    let timeout = Duration::from_secs(settings.checker_timeout);
    let output = runner
        .run(
            "bash",
            &args,
            timeout,
            RunSpec { log_path: Some(exec::log_path(logs_dir, &app.app_key, "checker")), ..Default::default() },
        )
        .await
        .map_err(|e| match crate::libs::error::kind_of(&e) {
            Some(ErrorKind::Timeout) => {
                engine_error(ErrorKind::CustomChecker, Message::CheckerTimedOut(settings.checker_timeout).to_string())
            }
            _ => e,
        })?;

    if !output.success {
        return Err(engine_error(
            ErrorKind::CustomChecker,
            Message::CheckerMalformedVerdict(output.stderr.lines().last().unwrap_or("non-zero exit").to_string()).to_string(),
        ));
    }

    parse_verdict(&output.stdout)
}

/// Parses and validates a checker's stdout document.
pub fn parse_verdict(stdout: &str) -> Result<Verdict> {
    let raw: RawVerdict = serde_json::from_str(stdout.trim())
        .map_err(|e| engine_error(ErrorKind::CustomChecker, Message::CheckerMalformedVerdict(e.to_string()).to_string()))?;

    match raw.status.as_str() {
        "no_update" => Ok(Verdict::NoUpdate),
        "error" => {
            let error_type = raw.error_type.unwrap_or_else(|| "CUSTOM_CHECKER_ERROR".to_string());
            let detail = raw.error_message.unwrap_or_else(|| "checker reported an error".to_string());
            let kind = ErrorKind::from_identifier(&error_type);
            Err(engine_error(kind, Message::CheckerReportedError { error_type, detail }.to_string()))
        }
        "success" => {
            let install_type_str = raw.install_type.unwrap_or_default();
            let install_type = CheckerInstallType::parse(&install_type_str).ok_or_else(|| {
                engine_error(ErrorKind::Config, Message::CheckerUnknownInstallType(install_type_str.clone()).to_string())
            })?;
            let latest_version = raw.latest_version.filter(|v| !v.is_empty()).ok_or_else(|| {
                engine_error(
                    ErrorKind::CustomChecker,
                    Message::CheckerMalformedVerdict("success verdict without latest_version".to_string()).to_string(),
                )
            })?;
            Ok(Verdict::Success(CheckerUpdate {
                latest_version: crate::libs::version::normalize(&latest_version),
                source: raw.source,
                install_type,
                download_url: raw.download_url,
                install_target_path: raw.install_target_path,
                flatpak_app_id: raw.flatpak_app_id,
                checksum_url: raw.checksum_url,
                expected_checksum: raw.expected_checksum,
                gpg_key_id: raw.gpg_key_id,
                gpg_fingerprint: raw.gpg_fingerprint,
            }))
        }
        other => Err(engine_error(
            ErrorKind::CustomChecker,
            Message::CheckerMalformedVerdict(format!("unknown status '{}'", other)).to_string(),
        )),
    }
}
