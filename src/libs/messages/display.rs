//! Display implementation for appwatch application messages.
//!
//! Converts the structured [`Message`] variants into the human-readable text
//! shown in the terminal. All user-facing wording lives here, in one place,
//! so the rest of the engine never formats ad-hoc strings.

use super::types::Message;
use std::fmt::{Display, Formatter, Result};

impl Display for Message {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        let message = match self {
            // === CONFIGURATION MESSAGES ===
            Message::ConfigRootUnreadable(path) => format!("Configuration directory is not readable: {}", path),
            Message::ConfigFileInvalid { file, reason } => format!("Invalid configuration file '{}': {}", file, reason),
            Message::ConfigKeyFilenameMismatch { file, app_key } => {
                format!("Configuration file '{}' must be named '{}.json' to match its app_key", file, app_key.to_lowercase())
            }
            Message::ConfigUnknownType { app_key, type_name } => format!("App '{}' has unknown type '{}'", app_key, type_name),
            Message::ConfigMissingField { app_key, field } => format!("App '{}' is missing required field '{}'", app_key, field),
            Message::ConfigInsecureUrl { app_key, url } => {
                format!("App '{}' uses plain-HTTP URL '{}' without allow_insecure_http", app_key, url)
            }
            Message::ConfigBadInstallPath { app_key, path } => {
                format!("App '{}' has unsafe install_path '{}' (must be absolute or ~-prefixed, no '..')", app_key, path)
            }
            Message::ConfigPatternSlotCount { app_key, count } => {
                format!("App '{}': filename_pattern_template must contain exactly one %s slot, found {}", app_key, count)
            }
            Message::ConfigAppDisabled(app_key) => format!("App '{}' is disabled, skipping", app_key),
            Message::ConfigNoAppsEnabled => "No enabled applications found, nothing to do".to_string(),
            Message::ConfigAppsLoaded(count) => format!("Loaded {} application configuration(s)", count),
            Message::NetworkSettingsInvalid(reason) => format!("Invalid network_settings.json: {}", reason),
            Message::CreateConfigWritten(file) => format!("Wrote default configuration '{}'", file),
            Message::CreateConfigSkipped(file) => format!("Configuration '{}' already exists, left untouched", file),
            Message::CreateConfigDone(count) => format!("Created {} default configuration file(s)", count),

            // === LEDGER MESSAGES ===
            Message::LedgerInitialized(path) => format!("Initialized version ledger at {}", path),
            Message::LedgerCorrupt(path) => format!("Version ledger '{}' is unreadable, treating as empty", path),
            Message::LedgerLockTimeout(path) => format!("Timed out waiting for exclusive lock on '{}'", path),
            Message::LedgerSharedLockTimeout => "Timed out waiting for shared ledger lock, reading best-effort".to_string(),
            Message::LedgerUpdated { app_key, version } => format!("Recorded {} {} in the version ledger", app_key, version),
            Message::LedgerDryRunUpdate { app_key, version } => {
                format!("Dry run: would record {} {} in the version ledger", app_key, version)
            }
            Message::LedgerChownFailed(detail) => format!("Could not restore ledger ownership: {}", detail),

            // === NETWORK & CACHE MESSAGES ===
            Message::HttpRetrying { url, attempt, delay_secs } => {
                format!("Request to {} failed (attempt {}), retrying in {}s", url, attempt, delay_secs)
            }
            Message::HttpRequestFailed { url, detail } => format!("Request to {} failed: {}", url, detail),
            Message::InsecureUrlRefused(url) => format!("Refusing plain-HTTP URL: {}", url),
            Message::CacheHit(url) => format!("Using cached response for {}", url),
            Message::CacheTypeMismatch { url, expected } => format!("Response from {} is not valid {}", url, expected),
            Message::HtmlDocumentSuspicious(url) => format!("Response from {} does not look like an HTML document", url),
            Message::DownloadComplete(dest) => format!("Downloaded to {}", dest),
            Message::DownloadDryRun(url) => format!("Dry run: skipping download of {}", url),
            Message::ContentLengthMismatch { expected, actual } => {
                format!("Download size {} does not match expected content length {}", actual, expected)
            }
            Message::CacheSwept(count) => format!("Removed {} stale cache entrie(s)", count),

            // === VERSION MESSAGES ===
            Message::VersionUndetermined(subject) => format!("Could not determine a version from {}", subject),

            // === RELEASE PROBE MESSAGES ===
            Message::ReleaseIndexMalformed(detail) => format!("Release index is malformed: {}", detail),
            Message::ReleaseIndexEmpty => "Release index contains no releases".to_string(),
            Message::ReleaseNoAssetMatch(pattern) => format!("No release asset matches '{}'", pattern),
            Message::ReleaseTagEmpty => "Latest release has an empty tag_name".to_string(),

            // === VERIFICATION MESSAGES ===
            Message::VerificationSkipped(app_key) => {
                format!("No checksum or signature configured for '{}', skipping verification", app_key)
            }
            Message::ChecksumVerified { file, algorithm } => format!("{} checksum verified for {}", algorithm, file),
            Message::ChecksumMismatch { file, expected, actual } => {
                format!("Checksum mismatch for {}: expected {}, got {}", file, expected, actual)
            }
            Message::ChecksumEntryMissing { file } => format!("Checksum file has no entry for '{}'", file),
            Message::ChecksumFileMalformed(url) => format!("Checksum file from {} has no parseable entries", url),
            Message::GpgImportingKey(key_id) => format!("Importing GPG key {}", key_id),
            Message::GpgVerified(fingerprint) => format!("GPG signature verified (key {})", fingerprint),
            Message::GpgVerificationFailed(detail) => format!("GPG signature verification failed: {}", detail),
            Message::GpgFingerprintMismatch { expected, actual } => {
                format!("Signing key fingerprint {} does not match configured {}", actual, expected)
            }
            Message::GpgKeyringUnusable(detail) => format!("User keyring is not usable: {}", detail),

            // === INSTALLATION MESSAGES ===
            Message::InstallStarted { app_key, version } => format!("Installing {} {}", app_key, version),
            Message::InstallCompleted { app_key, version } => format!("{} updated to {}", app_key, version),
            Message::DebMetadataUnreadable(path) => format!("'{}' is not a readable Debian package", path),
            Message::VeraCryptVolumesMounted => {
                "VeraCrypt volumes are still mounted; dismount all volumes and retry the update".to_string()
            }
            Message::ArchiveUnsupported(name) => format!("Unsupported archive format: {}", name),
            Message::ArchiveEmpty => "Archive extracted to an empty directory".to_string(),
            Message::ArchiveEntryTraversal(entry) => format!("Archive entry '{}' escapes the extraction directory", entry),
            Message::ArchiveTooLarge { actual_mb, cap_mb } => {
                format!("Extracted size {} MB exceeds the {} MB limit", actual_mb, cap_mb)
            }
            Message::BinaryNotFoundInArchive(name) => format!("No file named '{}' found in the archive", name),
            Message::ArchiveMissingStandardDirs => {
                "Archive has none of bin/ lib/ share/ include/ etc/ at its top level".to_string()
            }
            Message::BuildSystemMissing => "Archive has no configure script or Makefile".to_string(),
            Message::BuildStepFailed { step, detail } => format!("Build step '{}' failed: {}", step, detail),
            Message::BuildStepTimedOut { step, secs } => format!("Build step '{}' exceeded {}s", step, secs),
            Message::AppImageNotFoundInArchive => "No .AppImage file found in the archive".to_string(),
            Message::FlatpakRemoteAdded => "Added flathub remote".to_string(),
            Message::FlatpakAppNotFound(app_id) => format!("flatpak search returned no row for {}", app_id),
            Message::CommandFailed { program, detail } => format!("'{}' failed: {}", program, detail),
            Message::CommandTimedOut { program, secs } => format!("'{}' exceeded {}s and was killed", program, secs),
            Message::DependencyMissing(program) => format!("Required command '{}' is not installed", program),

            // === PIPELINE MESSAGES ===
            Message::CheckingApp(name) => format!("Checking {}...", name),
            Message::AppUpToDate { app_key, version } => format!("{} is up to date ({})", app_key, version),
            Message::UpdateAvailable { app_key, current, latest } => {
                format!("{}: {} -> {}", app_key, current, latest)
            }
            Message::InstallFromScratch { app_key, latest } => format!("{} is not installed, latest is {}", app_key, latest),
            Message::PromptInstall { app_key, version } => format!("Install {} {}?", app_key, version),
            Message::UserDeclined(app_key) => format!("Skipping {} at user request", app_key),
            Message::ArtifactReused(path) => format!("Reusing previously downloaded artifact {}", path),
            Message::DryRunInstallSkipped(app_key) => format!("Dry run: skipping installation of {}", app_key),
            Message::AppFailed { app_key, kind, detail } => format!("[{}] {}: {}", app_key, kind, detail),
            Message::HookFailed { slot, name, detail } => format!("Hook '{}' in slot {} failed: {}", name, slot, detail),

            // === CUSTOM CHECKER MESSAGES ===
            Message::CheckerInvoked { app_key, func } => format!("Running custom checker {}() for {}", func, app_key),
            Message::CheckerBadFunctionName(func) => format!("Custom checker function name '{}' is not allowed", func),
            Message::CheckerTimedOut(secs) => format!("Custom checker exceeded its {}s time budget", secs),
            Message::CheckerMalformedVerdict(detail) => format!("Custom checker produced malformed output: {}", detail),
            Message::CheckerReportedError { error_type, detail } => format!("Custom checker reported {}: {}", error_type, detail),
            Message::CheckerUnknownInstallType(install_type) => {
                format!("Custom checker returned unknown install_type '{}'", install_type)
            }
            Message::CheckerNoUpdate(app_key) => format!("Custom checker reports no update for {}", app_key),

            // === RUN MESSAGES ===
            Message::RunSummary { updated, up_to_date, skipped, failed } => format!(
                "Run complete: {} updated, {} up to date, {} skipped, {} failed",
                updated, up_to_date, skipped, failed
            ),
            Message::UnknownAppKey(app_key) => format!("Unknown application key '{}', skipping", app_key),
            Message::NoValidAppsRequested => "None of the requested application keys are known".to_string(),
            Message::NothingToCheck => "Nothing to check".to_string(),
            Message::SignalReceived(signal) => format!("Received {}, cleaning up", signal),
            Message::CleanupRemovedTempFiles(count) => format!("Removed {} temporary file(s)", count),
            Message::CleanupKilledChildren(count) => format!("Terminated {} child process(es)", count),
        };

        write!(f, "{}", message)
    }
}
