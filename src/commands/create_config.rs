//! Scaffolds a default configuration set under the config root.
//!
//! Writes a commented `network_settings.json` and a couple of disabled
//! sample app declarations into `conf.d/`. Existing files are never
//! touched, so re-running is always safe.

use crate::libs::messages::Message;
use crate::libs::paths::{ensure_private_dir, Paths};
use crate::{msg_info, msg_success};
use anyhow::Result;
use std::fs;
use std::path::Path;

const NETWORK_SETTINGS: &str = r#"{
  "_comment": "Scalar overrides for the update engine; delete keys to keep defaults.",
  "cache_duration": 300,
  "timeout": 15,
  "max_retries": 3,
  "retry_delay": 2,
  "rate_limit": 1
}
"#;

const VERACRYPT: &str = r#"{
  "app_key": "VeraCrypt",
  "enabled": false,
  "application": {
    "name": "VeraCrypt",
    "type": "github_release",
    "repo_owner": "veracrypt",
    "repo_name": "VeraCrypt",
    "filename_pattern_template": "veracrypt-%s-Debian-12-amd64.deb",
    "package_name": "veracrypt",
    "gpg_key_id": "0x680D16DE",
    "gpg_fingerprint": "5069A233D55A0EEB174A5FC3821ACD02680D16DE"
  }
}
"#;

const OBSIDIAN: &str = r#"{
  "app_key": "Obsidian",
  "enabled": false,
  "application": {
    "name": "Obsidian",
    "type": "appimage",
    "repo_owner": "obsidianmd",
    "repo_name": "obsidian-releases",
    "filename_pattern_template": "Obsidian-%s.AppImage",
    "binary_name": "obsidian",
    "checksum_from_release_digest": true
  }
}
"#;

/// Writes the default files, skipping any that already exist.
pub fn cmd() -> Result<()> {
    let paths = Paths::resolve();
    ensure_private_dir(paths.config_root())?;
    ensure_private_dir(&paths.conf_d())?;

    let mut written = 0usize;
    written += write_if_absent(&paths.network_settings_file(), NETWORK_SETTINGS)?;
    written += write_if_absent(&paths.conf_d().join("veracrypt.json"), VERACRYPT)?;
    written += write_if_absent(&paths.conf_d().join("obsidian.json"), OBSIDIAN)?;

    msg_success!(Message::CreateConfigDone(written));
    Ok(())
}

fn write_if_absent(path: &Path, contents: &str) -> Result<usize> {
    if path.exists() {
        msg_info!(Message::CreateConfigSkipped(path.display().to_string()));
        return Ok(0);
    }
    fs::write(path, contents)?;
    msg_info!(Message::CreateConfigWritten(path.display().to_string()));
    Ok(1)
}
