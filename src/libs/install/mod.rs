//! Installation strategies.
//!
//! Once an artifact is downloaded and verified, one of the concrete
//! strategies lands it on the system:
//!
//! - [`deb::install_deb`] — Debian packages through the system package
//!   manager.
//! - [`archive::install_archive`] — compressed archives, dispatched on the
//!   configured [`InstallStrategy`] (`move_binary`, `copy_root_contents`,
//!   `compile`, `move_appimage`).
//! - [`archive::place_appimage`] — bare AppImage files.
//! - [`flatpak::install_flatpak`] — sandboxed bundles via the flatpak CLI.
//! - [`script::install_script`] — vendor installer scripts.
//!
//! All strategies share the [`InstallContext`]: the subprocess runner, the
//! resolved settings, the filesystem layout, and the cleanup registry.
//! Anything touching `/usr/local` or the package database runs elevated;
//! AppImage placement stays in the user's home.

pub mod archive;
pub mod deb;
pub mod flatpak;
pub mod script;

use crate::libs::app_config::{AppConfig, AppType, InstallStrategy};
use crate::libs::cleanup::CleanupRegistry;
use crate::libs::config::NetworkSettings;
use crate::libs::error::{engine_error, ErrorKind};
use crate::libs::exec::Runner;
use crate::libs::messages::Message;
use crate::libs::paths::Paths;
use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Wall-clock budget for package-manager and script installs.
pub(crate) const INSTALL_TIMEOUT: Duration = Duration::from_secs(900);

/// Shared services handed to every strategy.
pub struct InstallContext<'a> {
    pub runner: &'a Runner,
    pub settings: &'a NetworkSettings,
    pub paths: &'a Paths,
    pub cleanup: &'a Arc<CleanupRegistry>,
}

/// Archive filename suffixes the extraction layer understands.
const ARCHIVE_SUFFIXES: [&str; 7] = [".tar.gz", ".tgz", ".tar.xz", ".txz", ".tar.bz2", ".tar.zst", ".zip"];

/// True when the filename looks like a supported archive.
pub fn is_archive(name: &str) -> bool {
    let lower = name.to_lowercase();
    ARCHIVE_SUFFIXES.iter().any(|s| lower.ends_with(s))
}

/// Installs a downloaded artifact, dispatching on its filename and the
/// app's configured strategy.
pub async fn install_artifact(ctx: &InstallContext<'_>, app: &AppConfig, artifact: &Path, version: &str) -> Result<()> {
    let name = artifact.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    let lower = name.to_lowercase();

    if lower.ends_with(".deb") {
        return deb::install_deb(ctx, artifact, &app.app_key, version).await;
    }

    if lower.ends_with(".appimage") {
        return archive::place_appimage(artifact, &app.app_key, app.policy.binary_name.as_deref(), app.policy.install_path.as_deref());
    }

    if matches!(app.kind, AppType::Script { .. }) {
        return script::install_script(ctx, artifact, &app.app_key).await;
    }

    if is_archive(name) {
        let strategy = match app.policy.install_strategy {
            Some(strategy) => strategy,
            None if matches!(app.kind, AppType::AppImage(_)) => InstallStrategy::MoveAppimage,
            None => {
                return Err(engine_error(
                    ErrorKind::Config,
                    Message::ConfigMissingField {
                        app_key: app.app_key.to_string(),
                        field: "install_strategy".to_string(),
                    }
                    .to_string(),
                ))
            }
        };
        return archive::install_archive(
            ctx,
            artifact,
            &app.app_key,
            version,
            app.policy.binary_name.as_deref(),
            app.policy.install_path.as_deref(),
            strategy,
        )
        .await;
    }

    Err(engine_error(ErrorKind::Installation, Message::ArchiveUnsupported(name.to_string()).to_string()))
}
