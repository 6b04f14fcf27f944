//! Stable error taxonomy for the update engine.
//!
//! Every failure that crosses a component boundary is tagged with an
//! [`ErrorKind`]. The kind determines the process exit code, whether a
//! desktop notification is emitted, and the identifier shown in terminal
//! output and hook payloads. Errors travel as [`EngineError`] values inside
//! `anyhow::Error`, so callers keep the usual `?` flow and the top level
//! recovers the kind with [`kind_of`].

use thiserror::Error;

/// Classification of engine failures.
///
/// The `Display` form of each kind is a stable identifier; it appears in
/// terminal output, log lines, and the JSON payload handed to `error` hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Network,
    Config,
    Permission,
    Validation,
    Dependency,
    Gpg,
    CustomChecker,
    Installation,
    Cache,
    Lock,
    Security,
    Timeout,
    Compilation,
    Cli,
}

impl ErrorKind {
    /// Stable identifier used in logs, hook payloads, and checker verdicts.
    pub fn identifier(&self) -> &'static str {
        match self {
            ErrorKind::Network => "NETWORK_ERROR",
            ErrorKind::Config => "CONFIG_ERROR",
            ErrorKind::Permission => "PERMISSION_ERROR",
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::Dependency => "DEPENDENCY_ERROR",
            ErrorKind::Gpg => "GPG_ERROR",
            ErrorKind::CustomChecker => "CUSTOM_CHECKER_ERROR",
            ErrorKind::Installation => "INSTALLATION_ERROR",
            ErrorKind::Cache => "CACHE_ERROR",
            ErrorKind::Lock => "LOCK_ERROR",
            ErrorKind::Security => "SECURITY_ERROR",
            ErrorKind::Timeout => "TIMEOUT_ERROR",
            ErrorKind::Compilation => "COMPILATION_ERROR",
            ErrorKind::Cli => "CLI_ERROR",
        }
    }

    /// Process exit code used when a failure of this kind is fatal.
    ///
    /// Per-app failures always collapse to exit code 1; these codes apply to
    /// failures that abort the whole run (unreadable config root, missing
    /// dependency, ledger lock timeout, ...).
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorKind::Network => 10,
            ErrorKind::Config => 11,
            ErrorKind::Permission => 12,
            ErrorKind::Validation => 13,
            ErrorKind::Dependency => 14,
            ErrorKind::Gpg => 15,
            ErrorKind::CustomChecker => 16,
            ErrorKind::Installation => 17,
            ErrorKind::Cache | ErrorKind::Lock => 20,
            // Security, timeout, compilation and CLI failures have no
            // dedicated code and collapse to the generic failure exit.
            _ => 1,
        }
    }

    /// Whether a failure of this kind also raises a desktop notification.
    pub fn notifies(&self) -> bool {
        matches!(
            self,
            ErrorKind::Network | ErrorKind::Permission | ErrorKind::Gpg | ErrorKind::Installation
        )
    }

    /// Parses a stable identifier back into a kind.
    ///
    /// Custom checkers report their failures with `error_type` strings from
    /// this taxonomy; unknown strings map to `CustomChecker`.
    pub fn from_identifier(s: &str) -> ErrorKind {
        match s {
            "NETWORK_ERROR" => ErrorKind::Network,
            "CONFIG_ERROR" => ErrorKind::Config,
            "PERMISSION_ERROR" => ErrorKind::Permission,
            "VALIDATION_ERROR" => ErrorKind::Validation,
            "DEPENDENCY_ERROR" => ErrorKind::Dependency,
            "GPG_ERROR" => ErrorKind::Gpg,
            "INSTALLATION_ERROR" => ErrorKind::Installation,
            "CACHE_ERROR" => ErrorKind::Cache,
            "LOCK_ERROR" => ErrorKind::Lock,
            "SECURITY_ERROR" => ErrorKind::Security,
            "TIMEOUT_ERROR" => ErrorKind::Timeout,
            "COMPILATION_ERROR" => ErrorKind::Compilation,
            "CLI_ERROR" => ErrorKind::Cli,
            _ => ErrorKind::CustomChecker,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.identifier())
    }
}

/// A classified engine failure.
///
/// Wraps a human-readable message with the taxonomy kind so the pipeline,
/// orchestrator, and `main` can all make policy decisions (retry, notify,
/// exit code) without string matching.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct EngineError {
    pub kind: ErrorKind,
    pub message: String,
}

impl EngineError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }
}

/// Convenience constructor returning `anyhow::Error` directly.
pub fn engine_error(kind: ErrorKind, message: impl Into<String>) -> anyhow::Error {
    EngineError::new(kind, message).into()
}

/// Recovers the taxonomy kind from an `anyhow::Error`, if one was attached.
pub fn kind_of(err: &anyhow::Error) -> Option<ErrorKind> {
    err.downcast_ref::<EngineError>().map(|e| e.kind)
}
