//! Releases-list probe.
//!
//! Speaks exactly one upstream discovery flavor: the public releases-list
//! endpoint of a code-hosting service, a JSON array whose element 0 is the
//! latest release. Each release carries a `tag_name` and an `assets` array
//! with `name`, `browser_download_url`, and an optional
//! `digest` of the form `"sha256:<hex>"`.
//!
//! All operations work on a file path produced by the fetch layer, so the
//! probe itself never touches the network and tests can feed it fixture
//! documents directly.
//!
//! ## Asset Matching
//!
//! An asset is resolved by exact filename first. When no asset carries the
//! exact name, the filename pattern is compiled into a regular expression:
//! the `%s` version slot becomes `.*` and every other character is taken
//! literally, so `tool-%s.deb` matches `tool-1.2.3.deb` but never
//! `toolx1.2.3xdeb`. Resolved download URLs are still subject to the
//! HTTPS-only transport policy.
//!
//! ## Published Digests
//!
//! Some hosting services publish a per-asset content digest. When present
//! and well-formed (`sha256:` followed by 64 hex characters) it is carried
//! to the verifier, where apps can opt in to it with
//! `checksum_from_release_digest`. A malformed digest reads as absent
//! rather than failing discovery.

use crate::libs::error::{engine_error, ErrorKind};
use crate::libs::messages::Message;
use crate::libs::version;
use anyhow::Result;
use regex::Regex;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// One release in the index.
#[derive(Deserialize, Debug, Clone)]
pub struct Release {
    /// The version tag name (e.g. "v1.2.3" or "1.2.3")
    pub tag_name: String,
    /// Downloadable assets attached to this release
    #[serde(default)]
    pub assets: Vec<Asset>,
}

/// A single downloadable asset within a release.
#[derive(Deserialize, Debug, Clone)]
pub struct Asset {
    /// Filename of the asset
    pub name: String,
    /// Direct download URL for this asset
    pub browser_download_url: String,
    /// Optional content digest published by the hosting service
    #[serde(default)]
    pub digest: Option<String>,
}

/// The releases-list API URL for a repository.
pub fn releases_url(repo_owner: &str, repo_name: &str) -> String {
    format!("https://api.github.com/repos/{}/{}/releases", repo_owner, repo_name)
}

/// Parses a fetched releases index document.
pub fn parse_index(path: &Path) -> Result<Vec<Release>> {
    let text = fs::read_to_string(path)?;
    serde_json::from_str(&text)
        .map_err(|e| engine_error(ErrorKind::Validation, Message::ReleaseIndexMalformed(e.to_string()).to_string()))
}

/// Element 0 of the index is the latest release.
pub fn latest(index: &[Release]) -> Result<&Release> {
    index
        .first()
        .ok_or_else(|| engine_error(ErrorKind::Validation, Message::ReleaseIndexEmpty.to_string()))
}

/// Normalized version of a release's tag.
pub fn latest_version(release: &Release) -> Result<String> {
    if release.tag_name.trim().is_empty() {
        return Err(engine_error(ErrorKind::Validation, Message::ReleaseTagEmpty.to_string()));
    }
    let normalized = version::normalize(&release.tag_name);
    if !normalized.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        return Err(engine_error(
            ErrorKind::Validation,
            Message::ReleaseIndexMalformed(format!("tag '{}' has no version prefix", release.tag_name)).to_string(),
        ));
    }
    Ok(normalized)
}

/// Resolves the download URL of the asset matching a filename pattern.
///
/// Assets are matched by exact name first. Failing that, the pattern's
/// `%s` slot becomes `.*` while every other character is taken literally,
/// and the resulting expression must match a full asset name. Resolved
/// URLs must be HTTPS unless the app allows insecure transport.
pub fn asset_url(release: &Release, filename_pattern: &str, allow_insecure: bool) -> Result<String> {
    let asset = match release.assets.iter().find(|a| a.name == filename_pattern) {
        Some(asset) => asset,
        None => {
            let expression = format!("^{}$", regex::escape(filename_pattern).replace("%s", ".*"));
            let re = Regex::new(&expression)
                .map_err(|e| engine_error(ErrorKind::Validation, Message::ReleaseIndexMalformed(e.to_string()).to_string()))?;
            release.assets.iter().find(|a| re.is_match(&a.name)).ok_or_else(|| {
                engine_error(ErrorKind::Validation, Message::ReleaseNoAssetMatch(filename_pattern.to_string()).to_string())
            })?
        }
    };

    let url = &asset.browser_download_url;
    if !url.starts_with("https://") && !allow_insecure {
        return Err(engine_error(ErrorKind::Security, Message::InsecureUrlRefused(url.clone()).to_string()));
    }
    Ok(url.clone())
}

/// The published sha256 digest of an asset, when present and well-formed.
pub fn asset_digest(release: &Release, filename: &str) -> Option<String> {
    let asset = release.assets.iter().find(|a| a.name == filename)?;
    let digest = asset.digest.as_deref()?;
    let hex_part = digest.strip_prefix("sha256:")?;
    if hex_part.len() == 64 && hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(hex_part.to_lowercase())
    } else {
        None
    }
}
