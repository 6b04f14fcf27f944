//! Vendor installer script execution.

use super::{InstallContext, INSTALL_TIMEOUT};
use crate::libs::error::{engine_error, ErrorKind};
use crate::libs::exec::{self, RunSpec};
use crate::libs::messages::Message;
use anyhow::Result;
use std::fs;
use std::path::Path;

/// Marks the downloaded script executable and runs it with elevated
/// privileges, logging its output.
pub async fn install_script(ctx: &InstallContext<'_>, script: &Path, app_key: &str) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(script, fs::Permissions::from_mode(0o755))?;
    }

    let log = exec::log_path(&ctx.paths.logs_dir(), app_key, "install");
    let ran = ctx
        .runner
        .run(
            &script.display().to_string(),
            &[],
            INSTALL_TIMEOUT,
            RunSpec { elevate: true, log_path: Some(log), ..Default::default() },
        )
        .await?;
    if !ran.success {
        return Err(engine_error(
            ErrorKind::Installation,
            Message::CommandFailed {
                program: script.display().to_string(),
                detail: ran.stderr.lines().last().unwrap_or("script failed").to_string(),
            }
            .to_string(),
        ));
    }

    Ok(())
}
