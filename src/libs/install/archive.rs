//! Archive extraction and the archive-based installation strategies.
//!
//! Supported container formats: `tar.gz`/`tgz`, `tar.xz`/`txz`,
//! `tar.bz2`, `tar.zst`, and `zip`, dispatched on the artifact's filename.
//!
//! Extraction is fully validated before any strategy runs: entries may not
//! escape the extraction directory, the total extracted size is capped to
//! guard against decompression bombs, and an empty result is rejected.
//! The extraction directory is private to the run and removed on every
//! exit path, success or failure.
//!
//! ## Strategies
//!
//! - `move_binary`: find the named binary anywhere in the tree, install
//!   it (mode 0755) to `/usr/local/bin` or the configured `install_path`.
//! - `copy_root_contents`: the top directory must look like an install
//!   prefix (at least one of `bin/ lib/ share/ include/ etc/`); its
//!   contents are copied into `/usr/local/`.
//! - `compile`: `./configure --prefix=/usr/local` when a configure script
//!   exists, then `make -jN`, then `make install`, each step bounded by
//!   the compile timeout and logged to the artifact's `build.log`.
//! - `move_appimage`: the first `*.AppImage` in the tree is placed under
//!   `$HOME/Applications` and symlinked into `$HOME/.local/bin`; this is
//!   the one strategy that never elevates.

use super::{InstallContext, INSTALL_TIMEOUT};
use crate::libs::app_config::InstallStrategy;
use crate::libs::error::{engine_error, ErrorKind};
use crate::libs::exec::{self, RunSpec};
use crate::libs::messages::Message;
use crate::msg_debug;
use anyhow::Result;
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use xz2::read::XzDecoder;

/// Directories expected at an archive's top level for `copy_root_contents`.
const STANDARD_DIRS: [&str; 5] = ["bin", "lib", "share", "include", "etc"];

/// Extracts an archive and dispatches on the configured strategy.
pub async fn install_archive(
    ctx: &InstallContext<'_>,
    archive: &Path,
    app_key: &str,
    version: &str,
    binary_name: Option<&str>,
    install_path: Option<&str>,
    strategy: InstallStrategy,
) -> Result<()> {
    let tmp_root = ctx.paths.tmp_dir();
    crate::libs::paths::ensure_private_dir(&tmp_root)?;
    let workdir = tempfile::Builder::new()
        .prefix(&format!("{}-", app_key.to_lowercase()))
        .tempdir_in(&tmp_root)?;
    // The TempDir guard removes the tree when this function returns; the
    // registry covers the signal path.
    ctx.cleanup.register_path(workdir.path());

    let result = run_strategy(ctx, archive, workdir.path(), app_key, version, binary_name, install_path, strategy).await;

    ctx.cleanup.unregister_path(workdir.path());
    result
}

#[allow(clippy::too_many_arguments)]
async fn run_strategy(
    ctx: &InstallContext<'_>,
    archive: &Path,
    workdir: &Path,
    app_key: &str,
    version: &str,
    binary_name: Option<&str>,
    install_path: Option<&str>,
    strategy: InstallStrategy,
) -> Result<()> {
    let cap = ctx.settings.max_extracted_mb * 1024 * 1024;
    extract(archive, workdir, cap, ctx.settings.max_extracted_mb)?;

    if fs::read_dir(workdir)?.next().is_none() {
        return Err(engine_error(ErrorKind::Installation, Message::ArchiveEmpty.to_string()));
    }

    match strategy {
        InstallStrategy::MoveBinary => move_binary(ctx, workdir, app_key, binary_name, install_path).await,
        InstallStrategy::CopyRootContents => copy_root_contents(ctx, workdir, app_key, binary_name).await,
        InstallStrategy::Compile => compile(ctx, workdir, app_key, version).await,
        InstallStrategy::MoveAppimage => {
            let image = find_by_extension(workdir, "appimage")?
                .ok_or_else(|| engine_error(ErrorKind::Installation, Message::AppImageNotFoundInArchive.to_string()))?;
            place_appimage(&image, app_key, binary_name, install_path)
        }
    }
}

/// Extracts `archive` into `dest`, enforcing traversal and size limits.
pub fn extract(archive: &Path, dest: &Path, cap_bytes: u64, cap_mb: u64) -> Result<()> {
    let name = archive.file_name().and_then(|n| n.to_str()).unwrap_or_default().to_lowercase();

    if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        unpack_tar(GzDecoder::new(File::open(archive)?), dest, cap_bytes, cap_mb)
    } else if name.ends_with(".tar.xz") || name.ends_with(".txz") {
        unpack_tar(XzDecoder::new(File::open(archive)?), dest, cap_bytes, cap_mb)
    } else if name.ends_with(".tar.bz2") {
        unpack_tar(bzip2::read::BzDecoder::new(File::open(archive)?), dest, cap_bytes, cap_mb)
    } else if name.ends_with(".tar.zst") {
        unpack_tar(zstd::stream::read::Decoder::new(File::open(archive)?)?, dest, cap_bytes, cap_mb)
    } else if name.ends_with(".zip") {
        unpack_zip(archive, dest, cap_bytes, cap_mb)
    } else {
        Err(engine_error(ErrorKind::Installation, Message::ArchiveUnsupported(name).to_string()))
    }
}

fn unpack_tar<R: Read>(reader: R, dest: &Path, cap_bytes: u64, cap_mb: u64) -> Result<()> {
    let mut archive = tar::Archive::new(reader);
    let mut total: u64 = 0;

    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.into_owned();

        if path.components().any(|c| matches!(c, std::path::Component::ParentDir)) {
            return Err(engine_error(
                ErrorKind::Installation,
                Message::ArchiveEntryTraversal(path.display().to_string()).to_string(),
            ));
        }

        total = total.saturating_add(entry.header().size().unwrap_or(0));
        if total > cap_bytes {
            return Err(engine_error(
                ErrorKind::Installation,
                Message::ArchiveTooLarge { actual_mb: total / (1024 * 1024), cap_mb }.to_string(),
            ));
        }

        entry.unpack_in(dest)?;
    }

    Ok(())
}

fn unpack_zip(archive: &Path, dest: &Path, cap_bytes: u64, cap_mb: u64) -> Result<()> {
    let mut zip = zip::ZipArchive::new(File::open(archive)?)
        .map_err(|e| engine_error(ErrorKind::Installation, Message::CommandFailed { program: "unzip".to_string(), detail: e.to_string() }.to_string()))?;
    let mut total: u64 = 0;

    for i in 0..zip.len() {
        let mut file = zip
            .by_index(i)
            .map_err(|e| engine_error(ErrorKind::Installation, Message::CommandFailed { program: "unzip".to_string(), detail: e.to_string() }.to_string()))?;

        let relative = file.enclosed_name().ok_or_else(|| {
            engine_error(ErrorKind::Installation, Message::ArchiveEntryTraversal(file.name().to_string()).to_string())
        })?;
        let out_path = dest.join(relative);

        total = total.saturating_add(file.size());
        if total > cap_bytes {
            return Err(engine_error(
                ErrorKind::Installation,
                Message::ArchiveTooLarge { actual_mb: total / (1024 * 1024), cap_mb }.to_string(),
            ));
        }

        if file.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&out_path)?;
        std::io::copy(&mut file, &mut out)?;

        #[cfg(unix)]
        if let Some(mode) = file.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&out_path, fs::Permissions::from_mode(mode))?;
        }
    }

    Ok(())
}

/// Resolves where a binary lands: a configured `install_path` (a file
/// path, or a directory to drop the binary into), defaulting to
/// `/usr/local/bin/<binary_name>`.
fn binary_destination(install_path: Option<&str>, binary_name: &str) -> PathBuf {
    match install_path {
        Some(configured) => {
            let expanded = crate::libs::config::expand_tilde(configured);
            if configured.ends_with('/') || expanded.is_dir() {
                expanded.join(binary_name)
            } else {
                expanded
            }
        }
        None => PathBuf::from("/usr/local/bin").join(binary_name),
    }
}

/// Locates a regular file named `binary_name` anywhere under the tree and
/// installs it to its destination with mode 0755.
async fn move_binary(
    ctx: &InstallContext<'_>,
    workdir: &Path,
    app_key: &str,
    binary_name: Option<&str>,
    install_path: Option<&str>,
) -> Result<()> {
    let binary_name = binary_name.ok_or_else(|| {
        engine_error(
            ErrorKind::Config,
            Message::ConfigMissingField { app_key: app_key.to_string(), field: "binary_name".to_string() }.to_string(),
        )
    })?;

    let source = find_by_name(workdir, binary_name)?
        .ok_or_else(|| engine_error(ErrorKind::Installation, Message::BinaryNotFoundInArchive(binary_name.to_string()).to_string()))?;

    let dest = binary_destination(install_path, binary_name).display().to_string();
    let installed = ctx
        .runner
        .run(
            "install",
            &["-m".to_string(), "0755".to_string(), source.display().to_string(), dest.clone()],
            INSTALL_TIMEOUT,
            RunSpec {
                elevate: true,
                log_path: Some(exec::log_path(&ctx.paths.logs_dir(), app_key, "install")),
                ..Default::default()
            },
        )
        .await?;
    if !installed.success {
        return Err(engine_error(
            ErrorKind::Installation,
            Message::CommandFailed { program: "install".to_string(), detail: installed.combined() }.to_string(),
        ));
    }
    msg_debug!(format!("installed {}", dest));
    Ok(())
}

/// Copies the archive's top-level tree into `/usr/local/`.
async fn copy_root_contents(ctx: &InstallContext<'_>, workdir: &Path, app_key: &str, binary_name: Option<&str>) -> Result<()> {
    let top = top_directory(workdir)?;

    let has_standard_dir = STANDARD_DIRS.iter().any(|d| top.join(d).is_dir());
    if !has_standard_dir {
        return Err(engine_error(ErrorKind::Installation, Message::ArchiveMissingStandardDirs.to_string()));
    }

    let log = exec::log_path(&ctx.paths.logs_dir(), app_key, "install");
    let copied = ctx
        .runner
        .run(
            "cp",
            &["-a".to_string(), format!("{}/.", top.display()), "/usr/local/".to_string()],
            INSTALL_TIMEOUT,
            RunSpec { elevate: true, log_path: Some(log.clone()), ..Default::default() },
        )
        .await?;
    if !copied.success {
        return Err(engine_error(
            ErrorKind::Installation,
            Message::CommandFailed { program: "cp".to_string(), detail: copied.combined() }.to_string(),
        ));
    }

    if let Some(binary_name) = binary_name {
        let target = format!("/usr/local/bin/{}", binary_name);
        let chmod = ctx
            .runner
            .run(
                "chmod",
                &["0755".to_string(), target.clone()],
                INSTALL_TIMEOUT,
                RunSpec { elevate: true, log_path: Some(log), ..Default::default() },
            )
            .await?;
        if !chmod.success {
            return Err(engine_error(
                ErrorKind::Installation,
                Message::CommandFailed { program: "chmod".to_string(), detail: format!("{} is not installable", target) }.to_string(),
            ));
        }
    }

    Ok(())
}

/// Builds from source: `./configure --prefix=/usr/local`, `make -jN`,
/// `make install`, each step bounded by the compile timeout.
async fn compile(ctx: &InstallContext<'_>, workdir: &Path, app_key: &str, version: &str) -> Result<()> {
    let top = top_directory(workdir)?;

    let has_configure = top.join("configure").is_file();
    let has_makefile = top.join("Makefile").is_file() || top.join("makefile").is_file();
    if !has_configure && !has_makefile {
        return Err(engine_error(ErrorKind::Installation, Message::BuildSystemMissing.to_string()));
    }

    let build_log = ctx.paths.artifact_dir(app_key, version).join("build.log");
    let timeout = std::time::Duration::from_secs(ctx.settings.compile_timeout);
    let jobs = ctx.settings.compile_jobs.to_string();

    let mut steps: Vec<(&str, String, Vec<String>, bool)> = Vec::new();
    if has_configure {
        steps.push(("configure", "./configure".to_string(), vec!["--prefix=/usr/local".to_string()], false));
    }
    steps.push(("make", "make".to_string(), vec![format!("-j{}", jobs)], false));
    steps.push(("make install", "make".to_string(), vec!["install".to_string()], true));

    for (step, program, args, elevate) in steps {
        let output = ctx
            .runner
            .run(
                &program,
                &args,
                timeout,
                RunSpec {
                    current_dir: Some(top.clone()),
                    log_path: Some(build_log.clone()),
                    elevate,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| match crate::libs::error::kind_of(&e) {
                Some(ErrorKind::Timeout) => engine_error(
                    ErrorKind::Timeout,
                    Message::BuildStepTimedOut { step: step.to_string(), secs: ctx.settings.compile_timeout }.to_string(),
                ),
                _ => e,
            })?;

        if !output.success {
            return Err(engine_error(
                ErrorKind::Compilation,
                Message::BuildStepFailed {
                    step: step.to_string(),
                    detail: output.stderr.lines().last().unwrap_or("non-zero exit").to_string(),
                }
                .to_string(),
            ));
        }
    }

    Ok(())
}

/// Places an AppImage under `$HOME/Applications` (or a configured
/// `install_path`) and links it into `$HOME/.local/bin`. Runs entirely
/// unprivileged.
pub fn place_appimage(image: &Path, app_key: &str, binary_name: Option<&str>, install_path: Option<&str>) -> Result<()> {
    let home = dirs::home_dir()
        .ok_or_else(|| engine_error(ErrorKind::Installation, "cannot resolve home directory".to_string()))?;

    let key_lower = app_key.to_lowercase();
    let image_name = format!("{}.AppImage", key_lower);

    let dest = match install_path {
        Some(configured) => {
            let expanded = crate::libs::config::expand_tilde(configured);
            if configured.ends_with('/') || expanded.is_dir() {
                expanded.join(&image_name)
            } else {
                expanded
            }
        }
        None => home.join("Applications").join(&key_lower).join(&image_name),
    };
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(image, &dest)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&dest, fs::Permissions::from_mode(0o755))?;
    }

    let bin_dir = home.join(".local").join("bin");
    fs::create_dir_all(&bin_dir)?;
    let link = bin_dir.join(binary_name.unwrap_or(&key_lower));
    if link.symlink_metadata().is_ok() {
        fs::remove_file(&link)?;
    }
    #[cfg(unix)]
    std::os::unix::fs::symlink(&dest, &link)?;

    Ok(())
}

/// The archive's effective top directory: the single root entry when the
/// archive wraps one, otherwise the extraction directory itself.
fn top_directory(workdir: &Path) -> Result<PathBuf> {
    let entries: Vec<PathBuf> = fs::read_dir(workdir)?.filter_map(|e| e.ok().map(|e| e.path())).collect();
    if entries.len() == 1 && entries[0].is_dir() {
        Ok(entries[0].clone())
    } else {
        Ok(workdir.to_path_buf())
    }
}

/// Recursive search for a regular file with an exact name.
fn find_by_name(dir: &Path, name: &str) -> Result<Option<PathBuf>> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            if let Some(found) = find_by_name(&path, name)? {
                return Ok(Some(found));
            }
        } else if path.file_name().and_then(|n| n.to_str()) == Some(name) {
            return Ok(Some(path));
        }
    }
    Ok(None)
}

/// Recursive search for the first regular file with an extension
/// (case-insensitive).
fn find_by_extension(dir: &Path, extension: &str) -> Result<Option<PathBuf>> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            if let Some(found) = find_by_extension(&path, extension)? {
                return Ok(Some(found));
            }
        } else if path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(extension))
        {
            return Ok(Some(path));
        }
    }
    Ok(None)
}
