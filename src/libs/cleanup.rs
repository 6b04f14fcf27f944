//! Process-exit cleanup and signal handling.
//!
//! The engine leaves no droppings behind: temporary files and spawned
//! children are registered here, and [`CleanupRegistry::run`] tears them
//! down on normal exit and on termination signals alike. The registry also
//! sweeps URL-cache entries and extraction directories older than the
//! configured age.
//!
//! Cleanup is idempotent; running it twice is safe, which is exactly what
//! happens when a signal arrives during the normal shutdown path.

use crate::libs::messages::Message;
use crate::{msg_debug, msg_info};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Shared registry of resources to reclaim on exit.
#[derive(Debug, Default)]
pub struct CleanupRegistry {
    temp_paths: Mutex<HashSet<PathBuf>>,
    children: Mutex<HashSet<u32>>,
}

impl CleanupRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Tracks a temporary file or directory for removal at exit.
    pub fn register_path(&self, path: &Path) {
        self.temp_paths.lock().insert(path.to_path_buf());
    }

    /// Drops a path from the registry once it was cleaned up in-line.
    pub fn unregister_path(&self, path: &Path) {
        self.temp_paths.lock().remove(path);
    }

    /// Tracks a spawned child process.
    pub fn register_child(&self, pid: u32) {
        self.children.lock().insert(pid);
    }

    pub fn unregister_child(&self, pid: u32) {
        self.children.lock().remove(&pid);
    }

    /// Kills tracked children, removes registered temp paths, and sweeps
    /// stale cache entries.
    pub fn run(&self, cache_root: Option<&Path>, max_age: Duration) {
        let children: Vec<u32> = self.children.lock().drain().collect();
        let killed = children.len();
        for pid in children {
            terminate(pid);
        }
        if killed > 0 {
            msg_info!(Message::CleanupKilledChildren(killed));
        }

        let paths: Vec<PathBuf> = self.temp_paths.lock().drain().collect();
        let mut removed = 0usize;
        for path in paths {
            let gone = if path.is_dir() {
                fs::remove_dir_all(&path).is_ok()
            } else {
                fs::remove_file(&path).is_ok()
            };
            if gone {
                removed += 1;
            }
        }
        if removed > 0 {
            msg_debug!(Message::CleanupRemovedTempFiles(removed));
        }

        if let Some(cache_root) = cache_root {
            sweep_stale(cache_root, max_age);
        }
    }
}

/// Removes URL-cache entries and extraction leftovers older than `max_age`.
fn sweep_stale(cache_root: &Path, max_age: Duration) {
    let mut swept = 0usize;

    // Top-level cache entries are the URL-hashed response files.
    if let Ok(entries) = fs::read_dir(cache_root) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_file() && is_older_than(&path, max_age) && fs::remove_file(&path).is_ok() {
                swept += 1;
            }
        }
    }

    // Extraction directories that survived a crash.
    if let Ok(entries) = fs::read_dir(cache_root.join("tmp")) {
        for entry in entries.flatten() {
            let path = entry.path();
            if is_older_than(&path, max_age) && fs::remove_dir_all(&path).is_ok() {
                swept += 1;
            }
        }
    }

    if swept > 0 {
        msg_debug!(Message::CacheSwept(swept));
    }
}

fn is_older_than(path: &Path, max_age: Duration) -> bool {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|mtime| mtime.elapsed().ok())
        .is_some_and(|age| age > max_age)
}

#[cfg(unix)]
fn terminate(pid: u32) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
}

#[cfg(not(unix))]
fn terminate(_pid: u32) {}

/// Installs handlers for SIGINT, SIGTERM, and SIGHUP that run cleanup and
/// terminate the process.
#[cfg(unix)]
pub fn install_signal_handlers(registry: Arc<CleanupRegistry>, cache_root: PathBuf, max_age: Duration) {
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigint = match signal(SignalKind::interrupt()) {
            Ok(s) => s,
            Err(_) => return,
        };
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(_) => return,
        };
        let mut sighup = match signal(SignalKind::hangup()) {
            Ok(s) => s,
            Err(_) => return,
        };

        let name = tokio::select! {
            _ = sigint.recv() => "SIGINT",
            _ = sigterm.recv() => "SIGTERM",
            _ = sighup.recv() => "SIGHUP",
        };

        msg_info!(Message::SignalReceived(name.to_string()));
        registry.run(Some(&cache_root), max_age);
        std::process::exit(130);
    });
}

#[cfg(not(unix))]
pub fn install_signal_handlers(_registry: Arc<CleanupRegistry>, _cache_root: PathBuf, _max_age: Duration) {}
