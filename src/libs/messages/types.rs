//! The central catalog of user-facing messages.
//!
//! Every string the engine shows a user is a variant here, grouped by the
//! component that emits it. Parameters are typed, so a message cannot be
//! constructed with the wrong number of arguments, and the rendering in
//! one place keeps wording consistent across the application.

#[derive(Debug, Clone)]
pub enum Message {
    // === CONFIGURATION MESSAGES ===
    ConfigRootUnreadable(String),
    ConfigFileInvalid { file: String, reason: String },
    ConfigKeyFilenameMismatch { file: String, app_key: String },
    ConfigUnknownType { app_key: String, type_name: String },
    ConfigMissingField { app_key: String, field: String },
    ConfigInsecureUrl { app_key: String, url: String },
    ConfigBadInstallPath { app_key: String, path: String },
    ConfigPatternSlotCount { app_key: String, count: usize },
    ConfigAppDisabled(String),
    ConfigNoAppsEnabled,
    ConfigAppsLoaded(usize),
    NetworkSettingsInvalid(String),
    CreateConfigWritten(String),
    CreateConfigSkipped(String),
    CreateConfigDone(usize),

    // === LEDGER MESSAGES ===
    LedgerInitialized(String),
    LedgerCorrupt(String),
    LedgerLockTimeout(String),
    LedgerSharedLockTimeout,
    LedgerUpdated { app_key: String, version: String },
    LedgerDryRunUpdate { app_key: String, version: String },
    LedgerChownFailed(String),

    // === NETWORK & CACHE MESSAGES ===
    HttpRetrying { url: String, attempt: u32, delay_secs: u64 },
    HttpRequestFailed { url: String, detail: String },
    InsecureUrlRefused(String),
    CacheHit(String),
    CacheTypeMismatch { url: String, expected: String },
    HtmlDocumentSuspicious(String),
    DownloadComplete(String),
    DownloadDryRun(String),
    ContentLengthMismatch { expected: u64, actual: u64 },
    CacheSwept(usize),

    // === VERSION MESSAGES ===
    VersionUndetermined(String),

    // === RELEASE PROBE MESSAGES ===
    ReleaseIndexMalformed(String),
    ReleaseIndexEmpty,
    ReleaseNoAssetMatch(String),
    ReleaseTagEmpty,

    // === VERIFICATION MESSAGES ===
    VerificationSkipped(String),
    ChecksumVerified { file: String, algorithm: String },
    ChecksumMismatch { file: String, expected: String, actual: String },
    ChecksumEntryMissing { file: String },
    ChecksumFileMalformed(String),
    GpgImportingKey(String),
    GpgVerified(String),
    GpgVerificationFailed(String),
    GpgFingerprintMismatch { expected: String, actual: String },
    GpgKeyringUnusable(String),

    // === INSTALLATION MESSAGES ===
    InstallStarted { app_key: String, version: String },
    InstallCompleted { app_key: String, version: String },
    DebMetadataUnreadable(String),
    VeraCryptVolumesMounted,
    ArchiveUnsupported(String),
    ArchiveEmpty,
    ArchiveEntryTraversal(String),
    ArchiveTooLarge { actual_mb: u64, cap_mb: u64 },
    BinaryNotFoundInArchive(String),
    ArchiveMissingStandardDirs,
    BuildSystemMissing,
    BuildStepFailed { step: String, detail: String },
    BuildStepTimedOut { step: String, secs: u64 },
    AppImageNotFoundInArchive,
    FlatpakRemoteAdded,
    FlatpakAppNotFound(String),
    CommandFailed { program: String, detail: String },
    CommandTimedOut { program: String, secs: u64 },
    DependencyMissing(String),

    // === PIPELINE MESSAGES ===
    CheckingApp(String),
    AppUpToDate { app_key: String, version: String },
    UpdateAvailable { app_key: String, current: String, latest: String },
    InstallFromScratch { app_key: String, latest: String },
    PromptInstall { app_key: String, version: String },
    UserDeclined(String),
    ArtifactReused(String),
    DryRunInstallSkipped(String),
    AppFailed { app_key: String, kind: String, detail: String },
    HookFailed { slot: String, name: String, detail: String },

    // === CUSTOM CHECKER MESSAGES ===
    CheckerInvoked { app_key: String, func: String },
    CheckerBadFunctionName(String),
    CheckerTimedOut(u64),
    CheckerMalformedVerdict(String),
    CheckerReportedError { error_type: String, detail: String },
    CheckerUnknownInstallType(String),
    CheckerNoUpdate(String),

    // === RUN MESSAGES ===
    RunSummary { updated: usize, up_to_date: usize, skipped: usize, failed: usize },
    UnknownAppKey(String),
    NoValidAppsRequested,
    NothingToCheck,
    SignalReceived(String),
    CleanupRemovedTempFiles(usize),
    CleanupKilledChildren(usize),
}
