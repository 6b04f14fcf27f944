#[cfg(test)]
mod tests {
    use appwatch::libs::app_config::ChecksumAlgorithm;
    use appwatch::libs::config::NetworkSettings;
    use appwatch::libs::error::{kind_of, ErrorKind};
    use appwatch::libs::http::{ExpectedType, HttpClient};
    use sha2::{Digest, Sha256};
    use std::fs;
    use tempfile::TempDir;

    fn client(dir: &TempDir, dry_run: bool) -> HttpClient {
        HttpClient::new(&NetworkSettings::default(), dir.path().join("cache"), dry_run).unwrap()
    }

    #[test]
    fn test_cache_path_is_the_url_hash() {
        let dir = tempfile::tempdir().unwrap();
        let http = client(&dir, false);

        let url = "https://api.github.com/repos/example/example/releases";
        let expected = format!("{:x}", Sha256::digest(url.as_bytes()));
        let path = http.cache_path_for(url);

        assert_eq!(path.file_name().unwrap().to_str().unwrap(), expected);
        assert_eq!(path.parent().unwrap(), dir.path().join("cache"));
        // Deterministic across calls.
        assert_eq!(http.cache_path_for(url), path);
    }

    #[tokio::test]
    async fn test_fresh_cache_entry_satisfies_fetch_without_network() {
        let dir = tempfile::tempdir().unwrap();
        let http = client(&dir, false);

        // The host does not resolve; only a cache hit can make this pass.
        let url = "https://releases.invalid/index.json";
        let cache_path = http.cache_path_for(url);
        fs::write(&cache_path, r#"[{"tag_name": "v1.0.0", "assets": []}]"#).unwrap();

        let first = http.fetch_cached(url, ExpectedType::Json, false).await.unwrap();
        let second = http.fetch_cached(url, ExpectedType::Json, false).await.unwrap();
        assert_eq!(first, cache_path);
        assert_eq!(second, cache_path);
    }

    #[tokio::test]
    async fn test_plain_http_fetch_is_refused_without_waiver() {
        let dir = tempfile::tempdir().unwrap();
        let http = client(&dir, false);

        let err = http
            .fetch_cached("http://mirror.invalid/index.json", ExpectedType::Json, false)
            .await
            .unwrap_err();
        assert_eq!(kind_of(&err), Some(ErrorKind::Security));
    }

    #[tokio::test]
    async fn test_plain_http_download_is_refused_without_waiver() {
        let dir = tempfile::tempdir().unwrap();
        let http = client(&dir, false);
        let dest = dir.path().join("artifact.deb");

        let err = http
            .download("http://mirror.invalid/a.deb", &dest, None, ChecksumAlgorithm::Sha256, false, None)
            .await
            .unwrap_err();
        assert_eq!(kind_of(&err), Some(ErrorKind::Security));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_dry_run_download_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let http = client(&dir, true);
        let dest = dir.path().join("artifact.deb");

        http.download("https://releases.invalid/a.deb", &dest, None, ChecksumAlgorithm::Sha256, false, None)
            .await
            .unwrap();
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_url_exists_is_false_for_refused_schemes() {
        let dir = tempfile::tempdir().unwrap();
        let http = client(&dir, false);
        assert!(!http.url_exists("http://mirror.invalid/a.deb", false).await);
    }

    #[tokio::test]
    async fn test_effective_url_refuses_insecure_schemes() {
        let dir = tempfile::tempdir().unwrap();
        let http = client(&dir, false);

        let err = http.effective_url("http://mirror.invalid/a.deb", false).await.unwrap_err();
        assert_eq!(kind_of(&err), Some(ErrorKind::Security));
    }
}
