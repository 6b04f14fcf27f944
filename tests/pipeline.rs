#[cfg(test)]
mod tests {
    use appwatch::libs::app_config::{AppConfig, RawAppFile};
    use appwatch::libs::cleanup::CleanupRegistry;
    use appwatch::libs::config::NetworkSettings;
    use appwatch::libs::error::ErrorKind;
    use appwatch::libs::exec::Runner;
    use appwatch::libs::hooks::Hooks;
    use appwatch::libs::http::HttpClient;
    use appwatch::libs::ledger::Ledger;
    use appwatch::libs::paths::Paths;
    use appwatch::libs::pipeline::{Outcome, Pipeline, PromptPolicy, RunOptions};
    use appwatch::libs::release;
    use serde_json::json;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    /// One isolated engine environment per test: config root, cache root,
    /// ledger, and a pre-warmable response cache.
    struct PipelineHarness {
        _dir: TempDir,
        paths: Paths,
        settings: NetworkSettings,
        http: HttpClient,
        runner: Runner,
        ledger: Ledger,
        hooks: Hooks,
        cleanup: Arc<CleanupRegistry>,
        options: RunOptions,
    }

    impl PipelineHarness {
        fn new(prompt: PromptPolicy) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let paths = Paths::with_roots(dir.path().join("config"), dir.path().join("cache"));
            fs::create_dir_all(paths.config_root()).unwrap();
            let settings = NetworkSettings::default();
            let http = HttpClient::new(&settings, paths.cache_root().to_path_buf(), false).unwrap();
            let cleanup = CleanupRegistry::new();
            let runner = Runner::new(cleanup.clone());
            let ledger = Ledger::new(paths.ledger_file());
            PipelineHarness {
                paths,
                settings,
                http,
                runner,
                ledger,
                hooks: Hooks::new(),
                cleanup,
                options: RunOptions { dry_run: false, prompt },
                _dir: dir,
            }
        }

        fn pipeline(&self) -> Pipeline<'_> {
            Pipeline {
                http: &self.http,
                runner: &self.runner,
                settings: &self.settings,
                paths: &self.paths,
                ledger: &self.ledger,
                hooks: &self.hooks,
                cleanup: &self.cleanup,
                options: &self.options,
            }
        }

        /// Seeds the ledger document directly.
        fn seed_ledger(&self, app_key: &str, version: &str) {
            fs::write(self.ledger.path(), json!({ app_key: version }).to_string()).unwrap();
        }

        /// Pre-warms the URL cache so discovery needs no network.
        fn warm_cache(&self, url: &str, body: &str) {
            fs::write(self.http.cache_path_for(url), body).unwrap();
        }

        /// Drops an artifact into the content-addressed store.
        fn seed_artifact(&self, app_key: &str, version: &str, filename: &str, content: &str) {
            let dir = self.paths.artifact_dir(app_key, version);
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join(filename), content).unwrap();
        }
    }

    fn appimage_app(extra: serde_json::Value) -> AppConfig {
        let mut application = json!({
            "name": "TestApp",
            "type": "appimage",
            "repo_owner": "testorg",
            "repo_name": "testapp-fixture-does-not-exist",
            "filename_pattern_template": "TestApp-%s.AppImage"
        });
        application.as_object_mut().unwrap().extend(extra.as_object().unwrap().clone());
        let raw: RawAppFile = serde_json::from_value(json!({
            "app_key": "TestApp",
            "enabled": true,
            "application": application
        }))
        .unwrap();
        AppConfig::from_raw("testapp.json", raw).unwrap()
    }

    const RELEASES: &str = r#"[{
        "tag_name": "v1.1.0",
        "assets": [{
            "name": "TestApp-1.1.0.AppImage",
            "browser_download_url": "https://releases.example.com/TestApp-1.1.0.AppImage"
        }]
    }]"#;

    fn warm_release_index(h: &PipelineHarness) {
        h.warm_cache(&release::releases_url("testorg", "testapp-fixture-does-not-exist"), RELEASES);
    }

    #[tokio::test]
    async fn test_up_to_date_app_is_left_alone() {
        let h = PipelineHarness::new(PromptPolicy::AssumeYes);
        warm_release_index(&h);
        h.seed_ledger("TestApp", "1.1.0");
        let before = fs::read_to_string(h.ledger.path()).unwrap();

        let outcome = h.pipeline().run(&appimage_app(json!({}))).await;

        assert!(matches!(outcome, Outcome::UpToDate), "{outcome:?}");
        assert_eq!(fs::read_to_string(h.ledger.path()).unwrap(), before);
        // No artifact was fetched for an up-to-date app.
        assert!(!h.paths.artifact_dir("TestApp", "1.1.0").exists());
    }

    #[tokio::test]
    async fn test_accepted_update_installs_and_records() {
        let home = tempfile::tempdir().unwrap();
        std::env::set_var("HOME", home.path());

        let h = PipelineHarness::new(PromptPolicy::AssumeYes);
        warm_release_index(&h);
        h.seed_ledger("TestApp", "1.0.0");
        h.seed_artifact("TestApp", "1.1.0", "TestApp-1.1.0.AppImage", "#!AppImage 1.1.0");

        let outcome = h.pipeline().run(&appimage_app(json!({"binary_name": "testapp"}))).await;

        match outcome {
            Outcome::Updated(version) => assert_eq!(version, "1.1.0"),
            other => panic!("expected update, got {other:?}"),
        }
        assert_eq!(h.ledger.get("TestApp"), "1.1.0");
        assert!(home.path().join("Applications/testapp/testapp.AppImage").is_file());
    }

    #[tokio::test]
    async fn test_declined_update_skips_and_keeps_ledger() {
        let h = PipelineHarness::new(PromptPolicy::AssumeNo);
        warm_release_index(&h);
        h.seed_ledger("TestApp", "1.0.0");
        h.seed_artifact("TestApp", "1.1.0", "TestApp-1.1.0.AppImage", "#!AppImage 1.1.0");

        let outcome = h.pipeline().run(&appimage_app(json!({}))).await;

        assert!(matches!(outcome, Outcome::Skipped), "{outcome:?}");
        assert_eq!(h.ledger.get("TestApp"), "1.0.0");
    }

    #[tokio::test]
    async fn test_checksum_mismatch_fails_before_install() {
        let h = PipelineHarness::new(PromptPolicy::AssumeYes);
        warm_release_index(&h);
        h.seed_ledger("TestApp", "1.0.0");
        h.seed_artifact("TestApp", "1.1.0", "TestApp-1.1.0.AppImage", "tampered content");
        h.warm_cache(
            "https://releases.example.com/SHA256SUMS",
            &format!("{}  TestApp-1.1.0.AppImage\n", "deadbeef".repeat(8)),
        );

        let app = appimage_app(json!({"checksum_url": "https://releases.example.com/SHA256SUMS"}));
        let outcome = h.pipeline().run(&app).await;

        match outcome {
            Outcome::Failed { kind, message } => {
                assert_eq!(kind, ErrorKind::Validation);
                assert!(message.contains("mismatch"), "{message}");
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(h.ledger.get("TestApp"), "1.0.0");
    }

    #[tokio::test]
    async fn test_install_from_scratch_is_offered() {
        let h = PipelineHarness::new(PromptPolicy::AssumeNo);
        warm_release_index(&h);
        // No ledger entry at all: synthetic 0.0.0 applies.
        h.seed_artifact("TestApp", "1.1.0", "TestApp-1.1.0.AppImage", "#!AppImage");

        let outcome = h.pipeline().run(&appimage_app(json!({}))).await;

        // The prompt was reached (and declined), proving 0.0.0 compared
        // as older than the discovered release.
        assert!(matches!(outcome, Outcome::Skipped), "{outcome:?}");
    }

    #[tokio::test]
    async fn test_dry_run_touches_nothing() {
        let h = {
            let mut h = PipelineHarness::new(PromptPolicy::Interactive);
            h.options.dry_run = true;
            h
        };
        warm_release_index(&h);
        h.seed_ledger("TestApp", "1.0.0");
        h.seed_artifact("TestApp", "1.1.0", "TestApp-1.1.0.AppImage", "#!AppImage");

        let outcome = h.pipeline().run(&appimage_app(json!({}))).await;

        match outcome {
            Outcome::Updated(version) => assert_eq!(version, "1.1.0"),
            other => panic!("expected simulated update, got {other:?}"),
        }
        // The real ledger still holds the old version.
        assert_eq!(h.ledger.get("TestApp"), "1.0.0");
    }

    #[tokio::test]
    async fn test_custom_checker_no_update_counts_up_to_date() {
        let h = PipelineHarness::new(PromptPolicy::AssumeYes);
        let script = h.paths.config_root().join("checker.sh");
        fs::write(&script, "widget_check() { echo '{\"status\": \"no_update\"}'; }\n").unwrap();
        h.seed_ledger("Widget", "1.0.0");

        let raw: RawAppFile = serde_json::from_value(json!({
            "app_key": "Widget",
            "enabled": true,
            "application": {
                "type": "custom",
                "custom_checker_script": script.display().to_string(),
                "custom_checker_func": "widget_check"
            }
        }))
        .unwrap();
        let app = AppConfig::from_raw("widget.json", raw).unwrap();

        let outcome = h.pipeline().run(&app).await;

        assert!(matches!(outcome, Outcome::UpToDate), "{outcome:?}");
        assert_eq!(h.ledger.get("Widget"), "1.0.0");
        // No artifact work happened at all.
        assert!(!h.paths.artifacts_dir().join("Widget").exists());
    }

    #[tokio::test]
    async fn test_hooks_fire_around_failures() {
        use appwatch::libs::hooks::HookSlot;
        use std::sync::atomic::{AtomicUsize, Ordering};

        let mut h = PipelineHarness::new(PromptPolicy::AssumeYes);
        // No cache warm-up: discovery will fail on the network. Tight
        // timeouts keep the failure quick.
        h.settings.max_retries = 1;
        h.settings.timeout = 1;
        h.settings.rate_limit = 0;
        h.http = HttpClient::new(&h.settings, h.paths.cache_root().to_path_buf(), false).unwrap();
        h.seed_ledger("TestApp", "1.0.0");

        static ERRORS: AtomicUsize = AtomicUsize::new(0);
        h.hooks.register(
            HookSlot::Error,
            "counter",
            Box::new(|_, details| {
                let details = details.expect("error hook gets a payload");
                assert!(details.get("phase").is_some());
                assert!(details.get("error_type").is_some());
                ERRORS.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );

        let outcome = h.pipeline().run(&appimage_app(json!({}))).await;

        assert!(matches!(outcome, Outcome::Failed { .. }), "{outcome:?}");
        assert_eq!(ERRORS.load(Ordering::SeqCst), 1);
    }
}
