#[cfg(test)]
mod tests {
    use appwatch::libs::app_config::{AppConfig, RawAppFile};
    use appwatch::libs::cleanup::CleanupRegistry;
    use appwatch::libs::config::NetworkSettings;
    use appwatch::libs::custom::{parse_verdict, run_checker, CheckerInstallType, Verdict};
    use appwatch::libs::error::{kind_of, ErrorKind};
    use appwatch::libs::exec::Runner;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn custom_app(script: &str, func: &str) -> AppConfig {
        let raw: RawAppFile = serde_json::from_value(json!({
            "app_key": "Widget",
            "enabled": true,
            "application": {
                "type": "custom",
                "custom_checker_script": script,
                "custom_checker_func": func
            }
        }))
        .unwrap();
        AppConfig::from_raw("widget.json", raw).unwrap()
    }

    #[test]
    fn test_parse_no_update_verdict() {
        let verdict = parse_verdict(r#"{"status": "no_update"}"#).unwrap();
        assert!(matches!(verdict, Verdict::NoUpdate));
    }

    #[test]
    fn test_parse_success_verdict() {
        let verdict = parse_verdict(
            r#"{
                "status": "success",
                "latest_version": "v2.1.0",
                "source": "vendor page",
                "install_type": "tgz",
                "download_url": "https://example.com/widget-2.1.0.tar.gz",
                "expected_checksum": "abc123"
            }"#,
        )
        .unwrap();

        let Verdict::Success(update) = verdict else {
            panic!("expected success verdict");
        };
        assert_eq!(update.latest_version, "2.1.0");
        assert_eq!(update.install_type, CheckerInstallType::Tgz);
        assert_eq!(update.download_url.as_deref(), Some("https://example.com/widget-2.1.0.tar.gz"));
        assert_eq!(update.expected_checksum.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_unknown_install_type_is_a_config_error() {
        let err = parse_verdict(r#"{"status": "success", "latest_version": "1.0", "install_type": "msi"}"#).unwrap_err();
        assert_eq!(kind_of(&err), Some(ErrorKind::Config));
    }

    #[test]
    fn test_error_verdict_carries_its_error_type() {
        let err = parse_verdict(
            r#"{"status": "error", "error_type": "GPG_ERROR", "error_message": "key expired"}"#,
        )
        .unwrap_err();
        assert_eq!(kind_of(&err), Some(ErrorKind::Gpg));
        assert!(err.to_string().contains("key expired"));
    }

    #[test]
    fn test_unknown_error_type_maps_to_custom_checker() {
        let err = parse_verdict(r#"{"status": "error", "error_type": "WAT", "error_message": "?"}"#).unwrap_err();
        assert_eq!(kind_of(&err), Some(ErrorKind::CustomChecker));
    }

    #[test]
    fn test_malformed_verdicts_are_rejected() {
        for body in [
            "not json",
            r#"{"status": "maybe"}"#,
            r#"{"status": "success", "install_type": "deb"}"#,
            r#"{"status": "success", "latest_version": "", "install_type": "deb"}"#,
        ] {
            let err = parse_verdict(body).unwrap_err();
            assert!(kind_of(&err).is_some(), "{body}");
        }
    }

    struct CheckerHarness {
        dir: TempDir,
        runner: Runner,
        settings: NetworkSettings,
    }

    fn harness() -> CheckerHarness {
        CheckerHarness {
            dir: tempfile::tempdir().unwrap(),
            runner: Runner::new(CleanupRegistry::new()),
            settings: NetworkSettings::default(),
        }
    }

    #[tokio::test]
    async fn test_checker_success_round_trip() {
        let h = harness();
        let script = h.dir.path().join("checker.sh");
        fs::write(
            &script,
            r#"check_widget() {
    # The engine hands the effective config as the sole argument.
    if [ -z "$1" ]; then
        echo '{"status": "error", "error_type": "CUSTOM_CHECKER_ERROR", "error_message": "no config argument"}'
        return 0
    fi
    echo '{"status": "success", "latest_version": "3.2.1", "install_type": "deb", "download_url": "https://example.com/widget_3.2.1_amd64.deb"}'
}
"#,
        )
        .unwrap();

        let app = custom_app(&script.display().to_string(), "check_widget");
        let verdict = run_checker(&h.runner, &h.settings, h.dir.path(), &app, &script.display().to_string(), "check_widget")
            .await
            .unwrap();

        let Verdict::Success(update) = verdict else {
            panic!("expected success");
        };
        assert_eq!(update.latest_version, "3.2.1");
        assert_eq!(update.install_type, CheckerInstallType::Deb);
    }

    #[tokio::test]
    async fn test_checker_no_update_round_trip() {
        let h = harness();
        let script = h.dir.path().join("checker.sh");
        fs::write(&script, "quiet_checker() { echo '{\"status\": \"no_update\"}'; }\n").unwrap();

        let app = custom_app(&script.display().to_string(), "quiet_checker");
        let verdict = run_checker(&h.runner, &h.settings, h.dir.path(), &app, &script.display().to_string(), "quiet_checker")
            .await
            .unwrap();
        assert!(matches!(verdict, Verdict::NoUpdate));
    }

    #[tokio::test]
    async fn test_hostile_function_names_are_refused() {
        let h = harness();
        let script = h.dir.path().join("checker.sh");
        fs::write(&script, "f() { echo '{\"status\": \"no_update\"}'; }\n").unwrap();
        let app = custom_app(&script.display().to_string(), "f");

        for name in ["rm -rf /", "f; touch /tmp/pwned", "$(reboot)", ""] {
            let err = run_checker(&h.runner, &h.settings, h.dir.path(), &app, &script.display().to_string(), name)
                .await
                .unwrap_err();
            assert_eq!(kind_of(&err), Some(ErrorKind::Config), "{name:?}");
        }
    }

    #[tokio::test]
    async fn test_missing_script_is_a_config_error() {
        let h = harness();
        let missing = h.dir.path().join("nope.sh");
        let app = custom_app(&missing.display().to_string(), "whatever");

        let err = run_checker(&h.runner, &h.settings, h.dir.path(), &app, &missing.display().to_string(), "whatever")
            .await
            .unwrap_err();
        assert_eq!(kind_of(&err), Some(ErrorKind::Config));
    }
}
