//! Engine assembly and the sequential run loop.
//!
//! The [`Engine`] value owns every shared service for one run: resolved
//! paths and settings, the frozen config store, the ledger, the HTTP
//! client, the subprocess runner, the hook registry, and the cleanup
//! registry. Nothing engine-scoped lives in a global; pipelines borrow
//! what they need, and dropping the engine drops the whole run's state.
//!
//! ## Scheduling
//!
//! Applications are processed strictly sequentially: the ledger has a
//! single writer, the terminal is shared, and confirmation prompts must
//! not interleave. Within one pipeline the only suspension points are
//! network I/O, rate-limit sleeps, subprocess execution, and the
//! confirmation prompt.
//!
//! ## Counters
//!
//! [`RunTotals`] tallies `updated`, `up_to_date`, `skipped`, and `failed`.
//! Exactly one counter is incremented per application per run; the
//! process exits non-zero iff `failed > 0`.

use crate::libs::cleanup::{self, CleanupRegistry};
use crate::libs::config::{ConfigStore, LoadReport, NetworkSettings};
use crate::libs::error::ErrorKind;
use crate::libs::exec::Runner;
use crate::libs::hooks::Hooks;
use crate::libs::http::HttpClient;
use crate::libs::ledger::Ledger;
use crate::libs::messages::Message;
use crate::libs::notify;
use crate::libs::paths::{ensure_private_dir, Paths};
use crate::libs::pipeline::{Outcome, Pipeline, RunOptions};
use crate::{msg_error, msg_info, msg_print};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

/// Process-wide outcome tally; reset at orchestrator start.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunTotals {
    pub updated: usize,
    pub up_to_date: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RunTotals {
    fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Updated(_) => self.updated += 1,
            Outcome::UpToDate => self.up_to_date += 1,
            Outcome::Skipped => self.skipped += 1,
            Outcome::Failed { .. } => self.failed += 1,
        }
    }
}

/// All services for one engine run.
pub struct Engine {
    pub paths: Paths,
    pub settings: NetworkSettings,
    pub store: ConfigStore,
    pub ledger: Ledger,
    pub http: HttpClient,
    pub runner: Runner,
    pub hooks: Hooks,
    pub cleanup: Arc<CleanupRegistry>,
    pub options: RunOptions,
}

impl Engine {
    /// Resolves paths and settings, loads the config set, and wires up the
    /// shared services.
    pub fn bootstrap(options: RunOptions, cache_duration_override: Option<u64>) -> Result<(Engine, LoadReport)> {
        let mut paths = Paths::resolve();
        let mut settings = NetworkSettings::load(&paths)?;
        if let Some(duration) = cache_duration_override {
            settings.cache_duration = duration;
        }
        if let Some(cache_dir) = &settings.cache_dir {
            paths.set_cache_root(cache_dir.clone());
        }

        ensure_private_dir(paths.cache_root())?;
        ensure_private_dir(&paths.artifacts_dir())?;
        ensure_private_dir(&paths.tmp_dir())?;
        ensure_private_dir(&paths.logs_dir())?;

        let (store, report) = ConfigStore::load(&paths)?;

        let ledger = Ledger::new(paths.ledger_file());
        ledger.init()?;
        ledger.validate()?;

        let cleanup = CleanupRegistry::new();
        let http = HttpClient::new(&settings, paths.cache_root().to_path_buf(), options.dry_run)?;
        let runner = Runner::new(cleanup.clone());

        cleanup::install_signal_handlers(
            cleanup.clone(),
            paths.cache_root().to_path_buf(),
            Duration::from_secs(settings.cleanup_max_age_minutes * 60),
        );

        let engine = Engine {
            paths,
            settings,
            store,
            ledger,
            http,
            runner,
            hooks: Hooks::new(),
            cleanup,
            options,
        };
        Ok((engine, report))
    }

    /// Probes for the external commands the selected apps will need.
    ///
    /// A missing mandatory command aborts the run before any pipeline
    /// starts, so failures surface immediately instead of halfway through
    /// an update.
    pub fn check_dependencies(&self, keys: &[String]) -> Result<()> {
        use crate::libs::app_config::{AppType, InstallStrategy};

        for key in keys {
            let Some(app) = self.store.get(key) else { continue };

            match &app.kind {
                AppType::Flatpak { .. } => {
                    self.runner.require("flatpak")?;
                }
                AppType::Custom { .. } => {
                    self.runner.require("bash")?;
                }
                _ => {}
            }

            if app.policy.gpg_key_id.is_some() && app.policy.gpg_fingerprint.is_some() {
                self.runner.require("gpg")?;
            }
            if app.policy.install_strategy == Some(InstallStrategy::Compile) {
                self.runner.require("make")?;
            }
        }
        Ok(())
    }

    /// Runs the pipeline for each key in order and aggregates the totals.
    ///
    /// When `seed` is given (a full "check everything" run), load-time
    /// casualties join the tally: invalid enabled files as failures,
    /// disabled apps as skips.
    pub async fn run(&self, keys: &[String], seed: Option<&LoadReport>) -> RunTotals {
        let mut totals = RunTotals::default();

        if let Some(report) = seed {
            for (file, reason) in &report.failures {
                msg_error!(Message::AppFailed {
                    app_key: file.clone(),
                    kind: ErrorKind::Config.identifier().to_string(),
                    detail: reason.clone(),
                });
                totals.failed += 1;
            }
            for app_key in &report.disabled {
                msg_info!(Message::ConfigAppDisabled(app_key.clone()));
                totals.skipped += 1;
            }
        }

        for key in keys {
            let Some(app) = self.store.get(key) else {
                continue;
            };

            let pipeline = Pipeline {
                http: &self.http,
                runner: &self.runner,
                settings: &self.settings,
                paths: &self.paths,
                ledger: &self.ledger,
                hooks: &self.hooks,
                cleanup: &self.cleanup,
                options: &self.options,
            };

            let outcome = pipeline.run(app).await;
            if let Outcome::Failed { kind, message } = &outcome {
                msg_error!(Message::AppFailed {
                    app_key: app.app_key.clone(),
                    kind: kind.identifier().to_string(),
                    detail: message.clone(),
                });
                notify::notify_failure(&app.name, *kind, message);
            }
            totals.record(&outcome);
        }

        msg_print!(
            Message::RunSummary {
                updated: totals.updated,
                up_to_date: totals.up_to_date,
                skipped: totals.skipped,
                failed: totals.failed,
            },
            true
        );
        totals
    }

    /// Normal-exit cleanup: temp files, children, stale cache entries.
    pub fn shutdown(&self) {
        self.cleanup.run(
            Some(self.paths.cache_root()),
            Duration::from_secs(self.settings.cleanup_max_age_minutes * 60),
        );
    }
}

/// Success is the absence of failures.
pub fn exit_ok(totals: &RunTotals) -> bool {
    totals.failed == 0
}
