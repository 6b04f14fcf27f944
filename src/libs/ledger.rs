//! Installed-version ledger.
//!
//! A single JSON document mapping `app_key -> version`, stored in the
//! config root as `installed_versions.json`. The ledger is the engine's
//! only mutable record: it is read at the start of every pipeline to decide
//! whether an update is needed and rewritten after every successful
//! install.
//!
//! ## Document Semantics
//!
//! - **Missing file**: equivalent to an empty map; the first run needs no
//!   setup beyond [`Ledger::init`].
//! - **Absent key**: reads as the synthetic version `0.0.0`, the sentinel
//!   for "not installed". Every well-formed real version sorts above it.
//! - **Entry lifecycle**: entries are created or updated only after a
//!   successful install; nothing ever deletes an entry.
//!
//! ## Concurrency
//!
//! Writers serialize on an advisory lock held on a sibling `.lock` file:
//! exclusive for writes (10 s acquire budget, `LOCK_ERROR` on timeout),
//! shared for reads (5 s budget, best-effort read with a warning on
//! timeout). Updates are atomic: the new document is written to a
//! temporary file in the same directory and renamed over the original, so
//! a reader never observes a half-written document and a crash mid-write
//! leaves the previous document intact.
//!
//! Lock acquisition polls synchronously — the ledger is also used from
//! plain synchronous contexts. Async callers must take ledger operations
//! through `tokio::task::spawn_blocking` (the pipeline does) so a
//! contended lock never stalls a runtime worker.
//!
//! ## Corruption Policy
//!
//! A corrupt ledger degrades to an empty map for readers (after a logged
//! warning) so a damaged file cannot take the whole engine down. Writers
//! are stricter: a writer that cannot parse the existing document fails
//! loudly instead of clobbering operator data with a fresh `{}`.
//!
//! ## Privilege Handling
//!
//! When the engine runs under sudo, the rewritten document is handed back
//! to the invoking user (`SUDO_UID:SUDO_GID`) so later unprivileged runs
//! can still update it.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use appwatch::libs::ledger::Ledger;
//!
//! let ledger = Ledger::new("/home/user/.config/appwatch/installed_versions.json".into());
//! ledger.init()?;
//! assert_eq!(ledger.get("Vivaldi"), "0.0.0");
//! ledger.set("Vivaldi", "6.7.3329.31")?;
//! # anyhow::Ok(())
//! ```

use crate::libs::error::{engine_error, ErrorKind};
use crate::libs::messages::Message;
use crate::libs::version::NOT_INSTALLED;
use crate::{msg_info, msg_warning};
use anyhow::Result;
use fs2::FileExt;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Acquire budget for the exclusive (writer) lock.
const EXCLUSIVE_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

/// Acquire budget for the shared (reader) lock.
const SHARED_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Poll interval while waiting for a lock.
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Handle to the installed-version ledger document.
#[derive(Debug, Clone)]
pub struct Ledger {
    path: PathBuf,
}

impl Ledger {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates an empty ledger document if none exists.
    pub fn init(&self) -> Result<()> {
        if !self.path.exists() {
            if let Some(parent) = self.path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&self.path, "{}\n")?;
            msg_info!(Message::LedgerInitialized(self.path.display().to_string()));
        }
        Ok(())
    }

    /// Strict readability check used at startup.
    ///
    /// A document that exists but does not parse aborts the run before any
    /// pipeline starts, so the operator can repair it instead of watching
    /// writers fail halfway through an update batch.
    pub fn validate(&self) -> Result<()> {
        self.read_map_strict().map(|_| ())
    }

    /// Returns the recorded version for an app, or `0.0.0` when absent.
    ///
    /// Reads take the shared lock best-effort: if the lock cannot be
    /// acquired within its budget the read proceeds anyway after a
    /// warning, because the atomic-rename write discipline means the
    /// worst a lockless reader can observe is the previous complete
    /// document. A missing or unparseable document reads as an empty map.
    pub fn get(&self, app_key: &str) -> String {
        self.read_map()
            .get(app_key)
            .cloned()
            .unwrap_or_else(|| NOT_INSTALLED.to_string())
    }

    /// Records `version` for `app_key`, atomically and under the writer lock.
    ///
    /// The sequence is read-then-modify-then-atomic-rename: the current
    /// document is re-read under the lock (another process may have
    /// written since our pipeline started), the single entry is merged in,
    /// and the whole document is replaced in one rename.
    ///
    /// # Errors
    ///
    /// - `LOCK_ERROR` when the exclusive lock cannot be acquired in time
    /// - A refusal to write when the existing document does not parse,
    ///   so corrupted state is never silently replaced
    pub fn set(&self, app_key: &str, version: &str) -> Result<()> {
        let _guard = self.lock_exclusive()?;
        let mut map = self.read_map_strict()?;
        map.insert(app_key.to_string(), version.to_string());
        self.write_atomic(&map)?;
        msg_info!(Message::LedgerUpdated {
            app_key: app_key.to_string(),
            version: version.to_string()
        });
        Ok(())
    }

    /// Dry-run variant of [`set`](Self::set): exercises the lock and the
    /// read-modify path, but persists nothing.
    pub fn set_simulated(&self, app_key: &str, version: &str) -> Result<()> {
        let _guard = self.lock_exclusive()?;
        let mut map = self.read_map_strict()?;
        map.insert(app_key.to_string(), version.to_string());
        msg_info!(Message::LedgerDryRunUpdate {
            app_key: app_key.to_string(),
            version: version.to_string()
        });
        Ok(())
    }

    /// Reads the whole document under a shared lock, best-effort.
    fn read_map(&self) -> BTreeMap<String, String> {
        let _guard = self.lock_shared();
        if !self.path.exists() {
            return BTreeMap::new();
        }
        match fs::read_to_string(&self.path).map_err(anyhow::Error::from).and_then(|text| {
            serde_json::from_str::<BTreeMap<String, String>>(&text).map_err(anyhow::Error::from)
        }) {
            Ok(map) => map,
            Err(_) => {
                msg_warning!(Message::LedgerCorrupt(self.path.display().to_string()));
                BTreeMap::new()
            }
        }
    }

    /// Reads the document for a writer; a corrupt document is an error.
    fn read_map_strict(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let text = fs::read_to_string(&self.path)?;
        serde_json::from_str(&text).map_err(|e| {
            engine_error(
                ErrorKind::Cache,
                format!("refusing to overwrite corrupt ledger '{}': {}", self.path.display(), e),
            )
        })
    }

    /// Writes the document to a sibling temp file and renames it in place.
    fn write_atomic(&self, map: &BTreeMap<String, String>) -> Result<()> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, map)?;
        tmp.write_all(b"\n")?;
        tmp.persist(&self.path)?;

        self.restore_ownership();
        Ok(())
    }

    /// When running under sudo, hands the rewritten document back to the
    /// invoking user so later unprivileged runs can still update it.
    #[cfg(unix)]
    fn restore_ownership(&self) {
        use nix::unistd::{chown, Gid, Uid};

        if !Uid::effective().is_root() {
            return;
        }
        let uid = std::env::var("SUDO_UID").ok().and_then(|v| v.parse::<u32>().ok());
        let gid = std::env::var("SUDO_GID").ok().and_then(|v| v.parse::<u32>().ok());
        if let (Some(uid), Some(gid)) = (uid, gid) {
            if let Err(e) = chown(&self.path, Some(Uid::from_raw(uid)), Some(Gid::from_raw(gid))) {
                msg_warning!(Message::LedgerChownFailed(e.to_string()));
            }
        }
    }

    #[cfg(not(unix))]
    fn restore_ownership(&self) {}

    fn lock_file(&self) -> Result<File> {
        let lock_path = self.path.with_extension("json.lock");
        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(OpenOptions::new().create(true).truncate(false).write(true).open(lock_path)?)
    }

    /// Acquires the exclusive writer lock within the 10 s budget.
    fn lock_exclusive(&self) -> Result<File> {
        let file = self.lock_file()?;
        let deadline = Instant::now() + EXCLUSIVE_LOCK_TIMEOUT;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(file),
                Err(_) if Instant::now() < deadline => std::thread::sleep(LOCK_POLL_INTERVAL),
                Err(_) => {
                    return Err(engine_error(
                        ErrorKind::Lock,
                        Message::LedgerLockTimeout(self.path.display().to_string()).to_string(),
                    ))
                }
            }
        }
    }

    /// Acquires the shared reader lock, degrading to lockless on timeout.
    fn lock_shared(&self) -> Option<File> {
        let file = self.lock_file().ok()?;
        let deadline = Instant::now() + SHARED_LOCK_TIMEOUT;
        loop {
            match file.try_lock_shared() {
                Ok(()) => return Some(file),
                Err(_) if Instant::now() < deadline => std::thread::sleep(LOCK_POLL_INTERVAL),
                Err(_) => {
                    msg_warning!(Message::LedgerSharedLockTimeout);
                    return None;
                }
            }
        }
    }
}
