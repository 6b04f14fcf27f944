#[cfg(test)]
mod tests {
    use appwatch::libs::release::{asset_digest, asset_url, latest, latest_version, parse_index};
    use std::fs;
    use tempfile::TempDir;

    fn write_index(dir: &TempDir, body: &str) -> std::path::PathBuf {
        let path = dir.path().join("releases.json");
        fs::write(&path, body).unwrap();
        path
    }

    const INDEX: &str = r#"[
        {
            "tag_name": "v1.1.0",
            "assets": [
                {
                    "name": "test-app-v1.1.0.deb",
                    "browser_download_url": "https://releases.example.com/test-app-v1.1.0.deb",
                    "digest": "sha256:9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
                },
                {
                    "name": "test-app-v1.1.0.tar.gz",
                    "browser_download_url": "https://releases.example.com/test-app-v1.1.0.tar.gz"
                }
            ]
        },
        { "tag_name": "v1.0.0", "assets": [] }
    ]"#;

    #[test]
    fn test_element_zero_is_latest() {
        let dir = tempfile::tempdir().unwrap();
        let index = parse_index(&write_index(&dir, INDEX)).unwrap();
        let release = latest(&index).unwrap();
        assert_eq!(latest_version(release).unwrap(), "1.1.0");
    }

    #[test]
    fn test_empty_index_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let index = parse_index(&write_index(&dir, "[]")).unwrap();
        assert!(latest(&index).is_err());
    }

    #[test]
    fn test_malformed_index_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(parse_index(&write_index(&dir, r#"{"message": "rate limited"}"#)).is_err());
    }

    #[test]
    fn test_tag_normalization_variants() {
        let dir = tempfile::tempdir().unwrap();
        for (tag, expected) in [("v2.5.0", "2.5.0"), ("2.5.0", "2.5.0"), (" V3.0-rc1 ", "3.0-rc1")] {
            let body = format!(r#"[{{"tag_name": "{}", "assets": []}}]"#, tag);
            let index = parse_index(&write_index(&dir, &body)).unwrap();
            assert_eq!(latest_version(&index[0]).unwrap(), expected, "{tag}");
        }
    }

    #[test]
    fn test_unversioned_tag_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        for tag in ["", "  ", "nightly"] {
            let body = format!(r#"[{{"tag_name": "{}", "assets": []}}]"#, tag);
            let index = parse_index(&write_index(&dir, &body)).unwrap();
            assert!(latest_version(&index[0]).is_err(), "{tag:?}");
        }
    }

    #[test]
    fn test_asset_matched_by_exact_name() {
        let dir = tempfile::tempdir().unwrap();
        let index = parse_index(&write_index(&dir, INDEX)).unwrap();
        let url = asset_url(&index[0], "test-app-v1.1.0.deb", false).unwrap();
        assert_eq!(url, "https://releases.example.com/test-app-v1.1.0.deb");
    }

    #[test]
    fn test_asset_matched_by_pattern() {
        let dir = tempfile::tempdir().unwrap();
        let index = parse_index(&write_index(&dir, INDEX)).unwrap();
        let url = asset_url(&index[0], "test-app-%s.tar.gz", false).unwrap();
        assert_eq!(url, "https://releases.example.com/test-app-v1.1.0.tar.gz");
    }

    #[test]
    fn test_pattern_metacharacters_are_literal() {
        // The dot in ".deb" must not match "xdeb".
        let dir = tempfile::tempdir().unwrap();
        let body = r#"[{
            "tag_name": "v1.0",
            "assets": [
                {"name": "toolxdeb", "browser_download_url": "https://example.com/a"},
                {"name": "tool.deb", "browser_download_url": "https://example.com/b"}
            ]
        }]"#;
        let index = parse_index(&write_index(&dir, body)).unwrap();
        let url = asset_url(&index[0], "tool%s.deb", false).unwrap();
        assert_eq!(url, "https://example.com/b");
    }

    #[test]
    fn test_no_matching_asset_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let index = parse_index(&write_index(&dir, INDEX)).unwrap();
        assert!(asset_url(&index[0], "missing-%s.rpm", false).is_err());
    }

    #[test]
    fn test_insecure_asset_url_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let body = r#"[{
            "tag_name": "v1.0",
            "assets": [{"name": "tool.deb", "browser_download_url": "http://mirror.example.com/tool.deb"}]
        }]"#;
        let index = parse_index(&write_index(&dir, body)).unwrap();
        assert!(asset_url(&index[0], "tool.deb", false).is_err());
        assert!(asset_url(&index[0], "tool.deb", true).is_ok());
    }

    #[test]
    fn test_release_digest_extraction() {
        let dir = tempfile::tempdir().unwrap();
        let index = parse_index(&write_index(&dir, INDEX)).unwrap();

        assert_eq!(
            asset_digest(&index[0], "test-app-v1.1.0.deb").as_deref(),
            Some("9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08")
        );
        // No digest field, or no such asset: empty result, not an error.
        assert_eq!(asset_digest(&index[0], "test-app-v1.1.0.tar.gz"), None);
        assert_eq!(asset_digest(&index[0], "nope"), None);
    }

    #[test]
    fn test_malformed_digest_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let body = r#"[{
            "tag_name": "v1.0",
            "assets": [
                {"name": "a", "browser_download_url": "https://x/a", "digest": "md5:abcd"},
                {"name": "b", "browser_download_url": "https://x/b", "digest": "sha256:tooshort"}
            ]
        }]"#;
        let index = parse_index(&write_index(&dir, body)).unwrap();
        assert_eq!(asset_digest(&index[0], "a"), None);
        assert_eq!(asset_digest(&index[0], "b"), None);
    }
}
