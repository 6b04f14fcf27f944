#[cfg(test)]
mod tests {
    use appwatch::libs::app_config::InstallStrategy;
    use appwatch::libs::cleanup::CleanupRegistry;
    use appwatch::libs::config::NetworkSettings;
    use appwatch::libs::error::{kind_of, ErrorKind};
    use appwatch::libs::exec::Runner;
    use appwatch::libs::install::archive::{extract, install_archive, place_appimage};
    use appwatch::libs::install::InstallContext;
    use appwatch::libs::paths::Paths;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::fs::{self, File};
    use std::io::Write;
    use std::path::Path;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn build_targz(path: &Path, entries: &[(&str, &str)]) {
        let file = File::create(path).unwrap();
        let encoder = GzEncoder::new(file, Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (name, content) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            builder.append_data(&mut header, name, content.as_bytes()).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    struct InstallHarness {
        _dir: TempDir,
        paths: Paths,
        settings: NetworkSettings,
        runner: Runner,
        cleanup: Arc<CleanupRegistry>,
    }

    fn harness() -> InstallHarness {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::with_roots(dir.path().join("config"), dir.path().join("cache"));
        InstallHarness {
            paths,
            settings: NetworkSettings::default(),
            runner: Runner::new(CleanupRegistry::new()),
            cleanup: CleanupRegistry::new(),
            _dir: dir,
        }
    }

    impl InstallHarness {
        fn ctx(&self) -> InstallContext<'_> {
            InstallContext {
                runner: &self.runner,
                settings: &self.settings,
                paths: &self.paths,
                cleanup: &self.cleanup,
            }
        }
    }

    #[test]
    fn test_targz_extraction() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("pkg.tar.gz");
        build_targz(&archive, &[("pkg/bin/tool", "#!/bin/sh\n"), ("pkg/README.md", "docs")]);

        let out = dir.path().join("out");
        fs::create_dir_all(&out).unwrap();
        extract(&archive, &out, 1024 * 1024, 1).unwrap();

        assert!(out.join("pkg/bin/tool").is_file());
        assert_eq!(fs::read_to_string(out.join("pkg/README.md")).unwrap(), "docs");
    }

    #[test]
    fn test_unsupported_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("pkg.rar");
        fs::write(&archive, "junk").unwrap();
        let out = dir.path().join("out");
        fs::create_dir_all(&out).unwrap();

        let err = extract(&archive, &out, 1024, 1).unwrap_err();
        assert_eq!(kind_of(&err), Some(ErrorKind::Installation));
    }

    #[test]
    fn test_size_cap_guards_against_bombs() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("big.tar.gz");
        let payload = "x".repeat(4096);
        build_targz(&archive, &[("big/blob", &payload)]);

        let out = dir.path().join("out");
        fs::create_dir_all(&out).unwrap();

        let err = extract(&archive, &out, 1024, 0).unwrap_err();
        assert_eq!(kind_of(&err), Some(ErrorKind::Installation));
        assert!(err.to_string().contains("exceeds"));
    }

    #[test]
    fn test_zip_traversal_entries_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("evil.zip");
        let file = File::create(&archive).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        writer
            .start_file("../evil.txt", zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"gotcha").unwrap();
        writer.finish().unwrap();

        let out = dir.path().join("out");
        fs::create_dir_all(&out).unwrap();

        let err = extract(&archive, &out, 1024 * 1024, 1).unwrap_err();
        assert_eq!(kind_of(&err), Some(ErrorKind::Installation));
        assert!(!dir.path().join("evil.txt").exists());
    }

    #[test]
    fn test_zip_extraction() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("ok.zip");
        let file = File::create(&archive).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        writer.start_file("tool/data.txt", zip::write::SimpleFileOptions::default()).unwrap();
        writer.write_all(b"payload").unwrap();
        writer.finish().unwrap();

        let out = dir.path().join("out");
        fs::create_dir_all(&out).unwrap();
        extract(&archive, &out, 1024 * 1024, 1).unwrap();

        assert_eq!(fs::read_to_string(out.join("tool/data.txt")).unwrap(), "payload");
    }

    #[tokio::test]
    async fn test_copy_root_contents_requires_standard_dirs() {
        let h = harness();
        fs::create_dir_all(h.paths.tmp_dir()).unwrap();
        let archive = h.paths.cache_root().join("pkg.tar.gz");
        build_targz(&archive, &[("pkg/README.md", "only docs here")]);

        let err = install_archive(&h.ctx(), &archive, "TestApp", "1.0.0", None, None, InstallStrategy::CopyRootContents)
            .await
            .unwrap_err();
        assert_eq!(kind_of(&err), Some(ErrorKind::Installation));
        assert!(err.to_string().contains("bin/ lib/ share/"));

        // The extraction directory is removed on the failure path.
        let leftovers: Vec<_> = fs::read_dir(h.paths.tmp_dir()).unwrap().collect();
        assert!(leftovers.is_empty(), "extraction dir leaked: {leftovers:?}");
    }

    #[tokio::test]
    async fn test_move_binary_missing_binary_fails_cleanly() {
        let h = harness();
        fs::create_dir_all(h.paths.tmp_dir()).unwrap();
        let archive = h.paths.cache_root().join("pkg.tar.gz");
        build_targz(&archive, &[("pkg/docs/readme", "nothing executable")]);

        let err = install_archive(&h.ctx(), &archive, "TestApp", "1.0.0", Some("mytool"), None, InstallStrategy::MoveBinary)
            .await
            .unwrap_err();
        assert_eq!(kind_of(&err), Some(ErrorKind::Installation));
        assert!(err.to_string().contains("mytool"));
    }

    #[tokio::test]
    async fn test_compile_requires_a_build_system() {
        let h = harness();
        fs::create_dir_all(h.paths.tmp_dir()).unwrap();
        let archive = h.paths.cache_root().join("src.tar.gz");
        build_targz(&archive, &[("src/main.c", "int main(void) { return 0; }")]);

        let err = install_archive(&h.ctx(), &archive, "TestApp", "1.0.0", None, None, InstallStrategy::Compile)
            .await
            .unwrap_err();
        assert_eq!(kind_of(&err), Some(ErrorKind::Installation));
        assert!(err.to_string().contains("configure"));
    }

    #[test]
    fn test_place_appimage_installs_into_home() {
        let home = tempfile::tempdir().unwrap();
        std::env::set_var("HOME", home.path());

        let image = home.path().join("Download-2.0.1.AppImage");
        fs::write(&image, "#!AppImage").unwrap();

        place_appimage(&image, "TestApp", Some("testtool"), None).unwrap();

        let installed = home.path().join("Applications/testapp/testapp.AppImage");
        assert!(installed.is_file());
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&installed).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o755);
        }

        let link = home.path().join(".local/bin/testtool");
        assert_eq!(fs::read_link(&link).unwrap(), installed);

        // A configured install_path replaces the Applications default.
        let target = home.path().join("custom/tool.AppImage");
        place_appimage(&image, "TestApp", Some("customtool"), Some(&target.display().to_string())).unwrap();
        assert!(target.is_file());
        let custom_link = home.path().join(".local/bin/customtool");
        assert_eq!(fs::read_link(&custom_link).unwrap(), target);
    }
}
