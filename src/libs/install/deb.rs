//! Debian package installation.

use super::{InstallContext, INSTALL_TIMEOUT};
use crate::libs::error::{engine_error, ErrorKind};
use crate::libs::exec::{self, RunSpec};
use crate::libs::messages::Message;
use crate::msg_warning;
use anyhow::Result;
use std::path::Path;
use std::time::Duration;

/// Output marker for the VeraCrypt dismount failure mode.
const VERACRYPT_DISMOUNT: &str = "VeraCrypt volumes must be dismounted";

/// Installs a `.deb` through the system package manager.
///
/// The package metadata is read first as a sanity check; a file dpkg-deb
/// cannot describe is rejected before any privileged operation. A failed
/// `dpkg -i` gets one `apt-get -f install` pass to resolve missing
/// dependencies and finish configuration.
pub async fn install_deb(ctx: &InstallContext<'_>, package: &Path, app_key: &str, _version: &str) -> Result<()> {
    ctx.runner.require("dpkg")?;

    let info = ctx
        .runner
        .run(
            "dpkg-deb",
            &["--info".to_string(), package.display().to_string()],
            Duration::from_secs(60),
            RunSpec::default(),
        )
        .await?;
    if !info.success {
        return Err(engine_error(
            ErrorKind::Installation,
            Message::DebMetadataUnreadable(package.display().to_string()).to_string(),
        ));
    }

    let log = exec::log_path(&ctx.paths.logs_dir(), app_key, "install");
    let installed = ctx
        .runner
        .run(
            "dpkg",
            &["-i".to_string(), package.display().to_string()],
            INSTALL_TIMEOUT,
            RunSpec { elevate: true, log_path: Some(log.clone()), ..Default::default() },
        )
        .await?;

    if installed.success {
        return Ok(());
    }

    if app_key == "VeraCrypt" && installed.combined().contains(VERACRYPT_DISMOUNT) {
        return Err(engine_error(ErrorKind::Permission, Message::VeraCryptVolumesMounted.to_string()));
    }

    // dpkg commonly fails on missing dependencies; let apt finish the job.
    msg_warning!(Message::CommandFailed {
        program: "dpkg".to_string(),
        detail: "retrying with apt-get -f install".to_string()
    });
    let fixed = ctx
        .runner
        .run(
            "apt-get",
            &["-y".to_string(), "-f".to_string(), "install".to_string()],
            INSTALL_TIMEOUT,
            RunSpec { elevate: true, log_path: Some(log), ..Default::default() },
        )
        .await?;
    if !fixed.success {
        return Err(engine_error(
            ErrorKind::Installation,
            Message::CommandFailed {
                program: "dpkg".to_string(),
                detail: installed.stderr.lines().last().unwrap_or("installation failed").to_string(),
            }
            .to_string(),
        ));
    }

    Ok(())
}

/// Queries the system package database for an installed package's version.
///
/// Consulted when the ledger has no record for an app that declares a
/// `package_name`: a package installed outside this engine should not be
/// re-offered as an install-from-scratch.
pub async fn installed_package_version(runner: &crate::libs::exec::Runner, package_name: &str) -> Result<Option<String>> {
    if which::which("dpkg-query").is_err() {
        return Ok(None);
    }
    let queried = runner
        .run(
            "dpkg-query",
            &["-W".to_string(), "-f=${Version}".to_string(), package_name.to_string()],
            Duration::from_secs(30),
            RunSpec::default(),
        )
        .await?;
    if !queried.success {
        return Ok(None);
    }
    let version = queried.stdout.trim().to_string();
    Ok(if version.is_empty() { None } else { Some(version) })
}

/// Reads the `Version` field from a package's control metadata.
///
/// Used by the direct-download flow when the filename carries no version.
pub async fn package_version(runner: &crate::libs::exec::Runner, package: &Path) -> Result<Option<String>> {
    let info = runner
        .run(
            "dpkg-deb",
            &["--info".to_string(), package.display().to_string()],
            Duration::from_secs(60),
            RunSpec::default(),
        )
        .await?;
    if !info.success {
        return Ok(None);
    }
    Ok(info
        .stdout
        .lines()
        .find_map(|line| line.trim().strip_prefix("Version:").map(|v| v.trim().to_string())))
}
