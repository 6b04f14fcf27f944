//! Artifact verification: checksums and detached signatures.
//!
//! Verification runs after download and before the user is asked to
//! install. Checksum sources are consulted in priority order: an explicit
//! expected digest (custom checkers), the release index digest (when
//! `checksum_from_release_digest` is set), then a checksum text file
//! fetched from `checksum_url`. A configured GPG key id plus fingerprint
//! additionally requires a valid detached signature whose signing key
//! matches the configured fingerprint exactly.
//!
//! GPG always runs against the invoking user's keyring. Under sudo that is
//! the `SUDO_USER`'s `~/.gnupg`, reached by dropping back to that user for
//! the gpg invocation; an unusable keyring is a hard `GPG_ERROR`, never a
//! silent fall back to root's.

use crate::libs::app_config::{AppConfig, ChecksumAlgorithm};
use crate::libs::error::{engine_error, ErrorKind};
use crate::libs::exec::{self, Runner, RunSpec};
use crate::libs::http::{ExpectedType, HttpClient};
use crate::libs::messages::Message;
use crate::{msg_info, msg_success};
use anyhow::Result;
use md5::Md5;
use regex::Regex;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

/// Time budget for each gpg invocation.
const GPG_TIMEOUT: Duration = Duration::from_secs(120);

/// Keyserver used to fetch configured keys that are not yet in the keyring.
const KEYSERVER: &str = "hkps://keyserver.ubuntu.com";

fn checksum_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*([0-9a-fA-F]+)\s+\*?(.+?)\s*$").unwrap())
}

fn validsig_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\[GNUPG:\]\s+VALIDSIG\s+([0-9A-Fa-f]+)").unwrap())
}

/// Computes the hex digest of a file under the given algorithm.
pub fn hash_file(path: &Path, algorithm: ChecksumAlgorithm) -> Result<String> {
    match algorithm {
        ChecksumAlgorithm::Sha256 => hash_with::<Sha256>(path),
        ChecksumAlgorithm::Sha1 => hash_with::<Sha1>(path),
        ChecksumAlgorithm::Md5 => hash_with::<Md5>(path),
    }
}

fn hash_with<D: Digest>(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = D::new();
    let mut buf = [0u8; 65536];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Extracts the digest for `filename` from a checksum text file.
///
/// Accepts the common producer variants: optional leading whitespace, hex
/// digest, one or two spaces, optional `*` binary marker, basename,
/// trailing whitespace.
pub fn parse_checksum_file(text: &str, filename: &str) -> Option<String> {
    for line in text.lines() {
        if let Some(caps) = checksum_line_re().captures(line) {
            if &caps[2] == filename {
                return Some(caps[1].to_lowercase());
            }
        }
    }
    None
}

/// Verifier for one run, borrowing the engine's shared services.
pub struct Verifier<'a> {
    pub http: &'a HttpClient,
    pub runner: &'a Runner,
    pub logs_dir: PathBuf,
}

impl Verifier<'_> {
    /// Verifies a downloaded artifact against the app's configured policy.
    ///
    /// With neither a checksum source nor a signature configured this is a
    /// logged no-op.
    pub async fn verify(
        &self,
        app: &AppConfig,
        artifact: &Path,
        download_url: &str,
        explicit_checksum: Option<&str>,
        release_digest: Option<&str>,
    ) -> Result<()> {
        let expected = self.resolve_checksum(app, artifact, explicit_checksum, release_digest).await?;

        let has_signature = app.policy.gpg_key_id.is_some() && app.policy.gpg_fingerprint.is_some();
        if expected.is_none() && !has_signature {
            msg_info!(Message::VerificationSkipped(app.app_key.clone()));
            return Ok(());
        }

        if let Some(expected) = expected {
            let actual = hash_file(artifact, app.policy.checksum_algorithm)?;
            if !actual.eq_ignore_ascii_case(&expected) {
                return Err(engine_error(
                    ErrorKind::Validation,
                    Message::ChecksumMismatch {
                        file: artifact.display().to_string(),
                        expected,
                        actual,
                    }
                    .to_string(),
                ));
            }
            msg_success!(Message::ChecksumVerified {
                file: artifact.display().to_string(),
                algorithm: app.policy.checksum_algorithm.as_str().to_string(),
            });
        }

        if has_signature {
            self.verify_signature(app, artifact, download_url).await?;
        }

        Ok(())
    }

    /// Resolves the expected digest by source priority.
    async fn resolve_checksum(
        &self,
        app: &AppConfig,
        artifact: &Path,
        explicit: Option<&str>,
        release_digest: Option<&str>,
    ) -> Result<Option<String>> {
        if let Some(explicit) = explicit {
            return Ok(Some(explicit.to_lowercase()));
        }

        if app.policy.checksum_from_release_digest {
            if let Some(digest) = release_digest {
                return Ok(Some(digest.to_lowercase()));
            }
        }

        let Some(checksum_url) = &app.policy.checksum_url else {
            return Ok(None);
        };

        let path = self
            .http
            .fetch_cached(checksum_url, ExpectedType::Raw, app.policy.allow_insecure_http)
            .await?;
        let text = fs::read_to_string(&path)?;
        let basename = artifact.file_name().and_then(|n| n.to_str()).unwrap_or_default();

        match parse_checksum_file(&text, basename) {
            Some(digest) => Ok(Some(digest)),
            None if text.lines().any(|l| checksum_line_re().is_match(l)) => Err(engine_error(
                ErrorKind::Validation,
                Message::ChecksumEntryMissing { file: basename.to_string() }.to_string(),
            )),
            None => Err(engine_error(
                ErrorKind::Validation,
                Message::ChecksumFileMalformed(checksum_url.clone()).to_string(),
            )),
        }
    }

    /// Fetches the detached signature and verifies it with gpg.
    async fn verify_signature(&self, app: &AppConfig, artifact: &Path, download_url: &str) -> Result<()> {
        let key_id = app.policy.gpg_key_id.as_deref().unwrap_or_default();
        let expected_fpr = normalize_fingerprint(app.policy.gpg_fingerprint.as_deref().unwrap_or_default());

        let sig_url = app.sig_url_for(download_url);
        let sig_path = artifact.with_file_name(format!(
            "{}.sig",
            artifact.file_name().and_then(|n| n.to_str()).unwrap_or("artifact")
        ));
        self.http
            .download(&sig_url, &sig_path, None, ChecksumAlgorithm::Sha256, app.policy.allow_insecure_http, None)
            .await?;

        // In dry-run mode the signature download is a no-op; without the
        // signature file there is nothing to check.
        if self.http.is_dry_run() && !sig_path.exists() {
            return Ok(());
        }

        let (program, prefix, homedir) = self.gpg_invocation()?;
        let log = exec::log_path(&self.logs_dir, &app.app_key, "gpg");
        let homedir_arg = homedir.display().to_string();

        // Make sure the configured key is present in the user's keyring.
        let mut list_args = prefix.clone();
        list_args.extend(["--homedir".to_string(), homedir_arg.clone(), "--list-keys".to_string(), key_id.to_string()]);
        let listed = self.runner.run(&program, &list_args, GPG_TIMEOUT, RunSpec::default()).await?;
        if !listed.success {
            msg_info!(Message::GpgImportingKey(key_id.to_string()));
            let mut recv_args = prefix.clone();
            recv_args.extend([
                "--homedir".to_string(),
                homedir_arg.clone(),
                "--keyserver".to_string(),
                KEYSERVER.to_string(),
                "--recv-keys".to_string(),
                key_id.to_string(),
            ]);
            let received = self
                .runner
                .run(&program, &recv_args, GPG_TIMEOUT, RunSpec { log_path: Some(log.clone()), ..Default::default() })
                .await?;
            if !received.success {
                return Err(engine_error(
                    ErrorKind::Gpg,
                    Message::GpgVerificationFailed(format!("could not import key {}", key_id)).to_string(),
                ));
            }
        }

        let mut verify_args = prefix;
        verify_args.extend([
            "--homedir".to_string(),
            homedir_arg,
            "--status-fd".to_string(),
            "1".to_string(),
            "--verify".to_string(),
            sig_path.display().to_string(),
            artifact.display().to_string(),
        ]);
        let verified = self
            .runner
            .run(&program, &verify_args, GPG_TIMEOUT, RunSpec { log_path: Some(log), ..Default::default() })
            .await?;
        if !verified.success {
            let detail = verified.stderr.lines().last().unwrap_or("bad signature").to_string();
            return Err(engine_error(ErrorKind::Gpg, Message::GpgVerificationFailed(detail).to_string()));
        }

        let actual_fpr = validsig_re()
            .captures(&verified.stdout)
            .map(|caps| normalize_fingerprint(&caps[1]))
            .ok_or_else(|| {
                engine_error(ErrorKind::Gpg, Message::GpgVerificationFailed("no VALIDSIG in gpg status output".to_string()).to_string())
            })?;

        if actual_fpr != expected_fpr {
            return Err(engine_error(
                ErrorKind::Gpg,
                Message::GpgFingerprintMismatch { expected: expected_fpr, actual: actual_fpr }.to_string(),
            ));
        }

        msg_success!(Message::GpgVerified(actual_fpr));
        Ok(())
    }

    /// Resolves the gpg invocation and the keyring it must use.
    ///
    /// Returns `(program, leading args, homedir)`. Under sudo the command
    /// becomes `sudo -u <invoking user> gpg ...` so keyring files never end
    /// up owned by root.
    fn gpg_invocation(&self) -> Result<(String, Vec<String>, PathBuf)> {
        self.runner.require("gpg")?;

        #[cfg(unix)]
        if exec::is_root() {
            if let Ok(sudo_user) = std::env::var("SUDO_USER") {
                let user = nix::unistd::User::from_name(&sudo_user)
                    .ok()
                    .flatten()
                    .ok_or_else(|| {
                        engine_error(ErrorKind::Gpg, Message::GpgKeyringUnusable(format!("unknown user '{}'", sudo_user)).to_string())
                    })?;
                let gnupg = user.dir.join(".gnupg");
                if !gnupg.is_dir() {
                    return Err(engine_error(
                        ErrorKind::Gpg,
                        Message::GpgKeyringUnusable(format!("{} does not exist", gnupg.display())).to_string(),
                    ));
                }
                return Ok((
                    "sudo".to_string(),
                    vec!["-u".to_string(), sudo_user, "gpg".to_string()],
                    gnupg,
                ));
            }
        }

        let home = dirs::home_dir()
            .ok_or_else(|| engine_error(ErrorKind::Gpg, Message::GpgKeyringUnusable("no home directory".to_string()).to_string()))?;
        let gnupg = home.join(".gnupg");
        if !gnupg.is_dir() {
            return Err(engine_error(
                ErrorKind::Gpg,
                Message::GpgKeyringUnusable(format!("{} does not exist", gnupg.display())).to_string(),
            ));
        }
        Ok(("gpg".to_string(), Vec::new(), gnupg))
    }
}

/// Uppercases and strips whitespace from a key fingerprint.
pub fn normalize_fingerprint(fpr: &str) -> String {
    fpr.chars().filter(|c| !c.is_whitespace()).collect::<String>().to_uppercase()
}
