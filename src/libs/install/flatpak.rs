//! Flatpak pass-through installation and version discovery.

use super::{InstallContext, INSTALL_TIMEOUT};
use crate::libs::error::{engine_error, ErrorKind};
use crate::libs::exec::{self, RunSpec};
use crate::libs::messages::Message;
use crate::msg_info;
use anyhow::Result;
use std::time::Duration;

const FLATHUB_REPO: &str = "https://dl.flathub.org/repo/flathub.flatpakrepo";

/// Installs or updates a flatpak application from flathub.
pub async fn install_flatpak(ctx: &InstallContext<'_>, app_key: &str, _version: &str, app_id: &str) -> Result<()> {
    ctx.runner.require("flatpak")?;
    ensure_flathub_remote(ctx, app_key).await?;

    let log = exec::log_path(&ctx.paths.logs_dir(), app_key, "install");
    let installed = ctx
        .runner
        .run(
            "flatpak",
            &[
                "install".to_string(),
                "--or-update".to_string(),
                "-y".to_string(),
                "flathub".to_string(),
                app_id.to_string(),
            ],
            INSTALL_TIMEOUT,
            RunSpec { elevate: true, log_path: Some(log), ..Default::default() },
        )
        .await?;
    if !installed.success {
        return Err(engine_error(
            ErrorKind::Installation,
            Message::CommandFailed {
                program: "flatpak".to_string(),
                detail: installed.stderr.lines().last().unwrap_or("install failed").to_string(),
            }
            .to_string(),
        ));
    }

    Ok(())
}

/// Adds the flathub remote when it is not configured yet.
async fn ensure_flathub_remote(ctx: &InstallContext<'_>, app_key: &str) -> Result<()> {
    let remotes = ctx
        .runner
        .run(
            "flatpak",
            &["remotes".to_string(), "--columns=name".to_string()],
            Duration::from_secs(60),
            RunSpec::default(),
        )
        .await?;
    if remotes.stdout.lines().any(|line| line.trim() == "flathub") {
        return Ok(());
    }

    let added = ctx
        .runner
        .run(
            "flatpak",
            &[
                "remote-add".to_string(),
                "--if-not-exists".to_string(),
                "flathub".to_string(),
                FLATHUB_REPO.to_string(),
            ],
            Duration::from_secs(120),
            RunSpec {
                elevate: true,
                log_path: Some(exec::log_path(&ctx.paths.logs_dir(), app_key, "install")),
                ..Default::default()
            },
        )
        .await?;
    if !added.success {
        return Err(engine_error(
            ErrorKind::Installation,
            Message::CommandFailed { program: "flatpak remote-add".to_string(), detail: added.combined() }.to_string(),
        ));
    }

    msg_info!(Message::FlatpakRemoteAdded);
    Ok(())
}

/// Discovers the latest published version of a flatpak application.
///
/// Parses `flatpak search --columns=application,version,summary` for the
/// row whose application column matches the configured id.
pub async fn search_version(runner: &crate::libs::exec::Runner, app_id: &str) -> Result<String> {
    runner.require("flatpak")?;

    let searched = runner
        .run(
            "flatpak",
            &[
                "search".to_string(),
                "--columns=application,version,summary".to_string(),
                app_id.to_string(),
            ],
            Duration::from_secs(120),
            RunSpec::default(),
        )
        .await?;
    if !searched.success {
        return Err(engine_error(
            ErrorKind::Network,
            Message::CommandFailed { program: "flatpak search".to_string(), detail: searched.combined() }.to_string(),
        ));
    }

    for line in searched.stdout.lines() {
        let mut columns = line.split('\t');
        if columns.next().map(str::trim) == Some(app_id) {
            if let Some(version) = columns.next().map(str::trim) {
                if !version.is_empty() {
                    return Ok(crate::libs::version::normalize(version));
                }
            }
        }
    }

    Err(engine_error(ErrorKind::Validation, Message::FlatpakAppNotFound(app_id.to_string()).to_string()))
}
