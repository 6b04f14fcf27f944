#[cfg(test)]
mod tests {
    use appwatch::libs::app_config::{AppConfig, ChecksumAlgorithm, RawAppFile};
    use appwatch::libs::cleanup::CleanupRegistry;
    use appwatch::libs::config::NetworkSettings;
    use appwatch::libs::error::{kind_of, ErrorKind};
    use appwatch::libs::exec::Runner;
    use appwatch::libs::http::HttpClient;
    use appwatch::libs::verify::{hash_file, normalize_fingerprint, parse_checksum_file, Verifier};
    use serde_json::json;
    use sha2::{Digest, Sha256};
    use std::fs;
    use tempfile::TempDir;

    const HELLO_SHA256: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";
    const HELLO_SHA1: &str = "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d";
    const HELLO_MD5: &str = "5d41402abc4b2a76b9719d911017c592";

    fn write_hello(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("foo.deb");
        fs::write(&path, "hello").unwrap();
        path
    }

    #[test]
    fn test_hash_file_all_algorithms() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_hello(&dir);

        assert_eq!(hash_file(&path, ChecksumAlgorithm::Sha256).unwrap(), HELLO_SHA256);
        assert_eq!(hash_file(&path, ChecksumAlgorithm::Sha1).unwrap(), HELLO_SHA1);
        assert_eq!(hash_file(&path, ChecksumAlgorithm::Md5).unwrap(), HELLO_MD5);
    }

    #[test]
    fn test_checksum_file_parsing_variants() {
        let text = format!(
            "{} *foo.deb\n{}  bar.deb\n   {} baz.deb   \ngarbage line\n",
            HELLO_SHA256, HELLO_SHA256, HELLO_MD5
        );
        assert_eq!(parse_checksum_file(&text, "foo.deb").as_deref(), Some(HELLO_SHA256));
        assert_eq!(parse_checksum_file(&text, "bar.deb").as_deref(), Some(HELLO_SHA256));
        assert_eq!(parse_checksum_file(&text, "baz.deb").as_deref(), Some(HELLO_MD5));
        assert_eq!(parse_checksum_file(&text, "missing.deb"), None);
    }

    #[test]
    fn test_checksum_parsing_is_case_insensitive_on_hex() {
        let upper = HELLO_SHA256.to_uppercase();
        let text = format!("{}  foo.deb\n", upper);
        assert_eq!(parse_checksum_file(&text, "foo.deb").as_deref(), Some(HELLO_SHA256));
    }

    #[test]
    fn test_fingerprint_normalization() {
        assert_eq!(
            normalize_fingerprint("5069 a233 d55a 0eeb 174a 5fc3 821a cd02 680d 16de"),
            "5069A233D55A0EEB174A5FC3821ACD02680D16DE"
        );
        assert_eq!(normalize_fingerprint("ABCDEF"), "ABCDEF");
    }

    fn app_with_policy(policy: serde_json::Value) -> AppConfig {
        let mut application = json!({
            "type": "direct_download",
            "download_url": "https://example.com/foo.deb"
        });
        application.as_object_mut().unwrap().extend(policy.as_object().unwrap().clone());
        let raw: RawAppFile = serde_json::from_value(json!({
            "app_key": "Foo",
            "enabled": true,
            "application": application
        }))
        .unwrap();
        AppConfig::from_raw("foo.json", raw).unwrap()
    }

    struct VerifyHarness {
        _dir: TempDir,
        http: HttpClient,
        runner: Runner,
        logs: std::path::PathBuf,
        artifact: std::path::PathBuf,
    }

    fn harness() -> VerifyHarness {
        let dir = tempfile::tempdir().unwrap();
        let http = HttpClient::new(&NetworkSettings::default(), dir.path().join("cache"), false).unwrap();
        let runner = Runner::new(CleanupRegistry::new());
        let logs = dir.path().join("logs");
        let artifact = dir.path().join("foo.deb");
        fs::write(&artifact, "hello").unwrap();
        VerifyHarness { _dir: dir, http, runner, logs, artifact }
    }

    #[tokio::test]
    async fn test_unconfigured_verification_is_a_no_op() {
        let h = harness();
        let app = app_with_policy(json!({}));
        let verifier = Verifier { http: &h.http, runner: &h.runner, logs_dir: h.logs.clone() };

        verifier
            .verify(&app, &h.artifact, "https://example.com/foo.deb", None, None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_explicit_checksum_match_and_mismatch() {
        let h = harness();
        let app = app_with_policy(json!({}));
        let verifier = Verifier { http: &h.http, runner: &h.runner, logs_dir: h.logs.clone() };

        verifier
            .verify(&app, &h.artifact, "https://example.com/foo.deb", Some(HELLO_SHA256), None)
            .await
            .unwrap();

        // Uppercase digests compare case-insensitively.
        verifier
            .verify(&app, &h.artifact, "https://example.com/foo.deb", Some(&HELLO_SHA256.to_uppercase()), None)
            .await
            .unwrap();

        let err = verifier
            .verify(&app, &h.artifact, "https://example.com/foo.deb", Some(&"cafe".repeat(16)), None)
            .await
            .unwrap_err();
        assert_eq!(kind_of(&err), Some(ErrorKind::Validation));
    }

    #[tokio::test]
    async fn test_release_digest_honored_only_when_configured() {
        let h = harness();
        let wrong = "deadbeef".repeat(8);

        // Not opted in: the release digest is ignored entirely.
        let app = app_with_policy(json!({}));
        let verifier = Verifier { http: &h.http, runner: &h.runner, logs_dir: h.logs.clone() };
        verifier
            .verify(&app, &h.artifact, "https://example.com/foo.deb", None, Some(&wrong))
            .await
            .unwrap();

        // Opted in: a wrong digest is a validation failure.
        let app = app_with_policy(json!({"checksum_from_release_digest": true}));
        let err = verifier
            .verify(&app, &h.artifact, "https://example.com/foo.deb", None, Some(&wrong))
            .await
            .unwrap_err();
        assert_eq!(kind_of(&err), Some(ErrorKind::Validation));
    }

    #[tokio::test]
    async fn test_checksum_url_consulted_through_cache() {
        let h = harness();
        let checksum_url = "https://example.com/SHA256SUMS";
        let app = app_with_policy(json!({"checksum_url": checksum_url}));

        // Pre-warm the response cache so no network traffic happens.
        let cache_path = h.http.cache_path_for(checksum_url);
        fs::create_dir_all(cache_path.parent().unwrap()).unwrap();
        fs::write(&cache_path, format!("{}  foo.deb\n", HELLO_SHA256)).unwrap();

        let verifier = Verifier { http: &h.http, runner: &h.runner, logs_dir: h.logs.clone() };
        verifier
            .verify(&app, &h.artifact, "https://example.com/foo.deb", None, None)
            .await
            .unwrap();

        // A checksum file without our entry is a validation failure.
        fs::write(&cache_path, format!("{}  other.deb\n", HELLO_SHA256)).unwrap();
        let err = verifier
            .verify(&app, &h.artifact, "https://example.com/foo.deb", None, None)
            .await
            .unwrap_err();
        assert_eq!(kind_of(&err), Some(ErrorKind::Validation));
    }

    #[tokio::test]
    async fn test_checksum_mismatch_from_checksum_url() {
        let h = harness();
        let checksum_url = "https://example.com/SHA256SUMS";
        let app = app_with_policy(json!({"checksum_url": checksum_url}));

        let bogus = hex::encode(Sha256::digest(b"something else"));
        let cache_path = h.http.cache_path_for(checksum_url);
        fs::create_dir_all(cache_path.parent().unwrap()).unwrap();
        fs::write(&cache_path, format!("{}  foo.deb\n", bogus)).unwrap();

        let verifier = Verifier { http: &h.http, runner: &h.runner, logs_dir: h.logs.clone() };
        let err = verifier
            .verify(&app, &h.artifact, "https://example.com/foo.deb", None, None)
            .await
            .unwrap_err();
        assert_eq!(kind_of(&err), Some(ErrorKind::Validation));
    }
}
