//! The default command: check and update the selected applications.

use crate::libs::error::{engine_error, ErrorKind};
use crate::libs::messages::Message;
use crate::libs::orchestrator::{exit_ok, Engine};
use crate::libs::pipeline::{PromptPolicy, RunOptions};
use crate::{msg_info, msg_warning};
use anyhow::Result;

/// Arguments resolved from the CLI surface.
#[derive(Debug)]
pub struct CheckArgs {
    pub dry_run: bool,
    pub assume_yes: bool,
    pub cache_duration: Option<u64>,
    pub apps: Vec<String>,
}

/// Runs the update engine over the selected applications.
///
/// With no positional keys every enabled app is checked and load-time
/// casualties (invalid enabled files, disabled apps) join the run totals.
/// Unknown requested keys are warned about and skipped; a request that
/// resolves to zero known keys is a `CLI_ERROR`.
pub async fn cmd(args: CheckArgs) -> Result<()> {
    let options = RunOptions {
        dry_run: args.dry_run,
        prompt: if args.assume_yes { PromptPolicy::AssumeYes } else { PromptPolicy::Interactive },
    };

    let (engine, report) = Engine::bootstrap(options, args.cache_duration)?;

    let (keys, seed) = if args.apps.is_empty() {
        let all = engine.store.list();
        if all.is_empty() && report.failures.is_empty() && report.disabled.is_empty() {
            msg_info!(Message::NothingToCheck);
            return Ok(());
        }
        if all.is_empty() {
            // Nothing runnable remains; report what the scan found and
            // leave with the success code, since there is nothing to do.
            for (file, reason) in &report.failures {
                msg_warning!(Message::ConfigFileInvalid { file: file.clone(), reason: reason.clone() });
            }
            msg_info!(Message::ConfigNoAppsEnabled);
            return Ok(());
        }
        msg_info!(Message::ConfigAppsLoaded(all.len()));
        (all, Some(&report))
    } else {
        let mut valid = Vec::new();
        for key in &args.apps {
            if engine.store.get(key).is_some() {
                valid.push(key.clone());
            } else {
                msg_warning!(Message::UnknownAppKey(key.clone()));
            }
        }
        if valid.is_empty() {
            return Err(engine_error(ErrorKind::Cli, Message::NoValidAppsRequested.to_string()));
        }
        (valid, None)
    };

    engine.check_dependencies(&keys)?;

    let totals = engine.run(&keys, seed).await;
    engine.shutdown();

    if !exit_ok(&totals) {
        anyhow::bail!("{} application(s) failed", totals.failed);
    }
    Ok(())
}
