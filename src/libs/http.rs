//! Retrying, rate-limited HTTP layer with a content-addressed cache.
//!
//! All network traffic goes through one long-lived [`HttpClient`]. The
//! client enforces, for every request:
//!
//! - **Rate limiting**: a global minimum spacing between outbound
//!   requests; the calling flow sleeps when it sends too soon, and the
//!   timestamp is taken at send time, not at response time.
//! - **Retries**: up to the configured attempt count with exponential
//!   backoff, for transport errors and transient statuses (5xx, 408,
//!   429). Other 4xx responses fail immediately — retrying a 403 only
//!   burns the caller's rate budget.
//! - **Timeouts**: the connect timeout applies per attempt; the total
//!   per-attempt budget is the timeout times a multiplier (small for
//!   metadata, generous for artifact downloads).
//! - **Identity and transport policy**: a fixed User-Agent, redirects
//!   followed, and plain-HTTP URLs refused unless the app explicitly
//!   waived the HTTPS-only rule.
//!
//! ## Response Cache
//!
//! Responses that callers may want again soon (release indexes, checksum
//! files, version pages) are cached on disk keyed by `sha256(url)`;
//! freshness is the file's mtime against the configured cache duration.
//! Repeated fetches of the same URL inside the window produce zero
//! additional outbound requests. Large payloads always land on disk: the
//! fetch layer hands out paths, never in-memory buffers.
//!
//! Cache writes are last-writer-wins: concurrent fetchers of one URL each
//! download to their own temp file and rename it into place, which is
//! idempotent because the content is derived from the URL.

use crate::libs::app_config::ChecksumAlgorithm;
use crate::libs::config::NetworkSettings;
use crate::libs::error::{engine_error, ErrorKind};
use crate::libs::messages::Message;
use crate::libs::paths::ensure_private_dir;
use crate::libs::verify::hash_file;
use crate::{msg_debug, msg_warning};
use anyhow::Result;
use parking_lot::Mutex;
use reqwest::{Client, Response, StatusCode};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Payload validation applied to cached fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedType {
    Json,
    Html,
    Raw,
}

/// The engine's single HTTP client.
pub struct HttpClient {
    client: Client,
    settings: NetworkSettings,
    cache_dir: PathBuf,
    /// Timestamp of the last outbound request; updated on send, not return.
    last_request: Mutex<Option<Instant>>,
    dry_run: bool,
}

impl HttpClient {
    pub fn new(settings: &NetworkSettings, cache_dir: PathBuf, dry_run: bool) -> Result<Self> {
        ensure_private_dir(&cache_dir)?;

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(settings.timeout))
            .user_agent(settings.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            settings: settings.clone(),
            cache_dir,
            last_request: Mutex::new(None),
            dry_run,
        })
    }

    /// Whether this client is in dry-run mode (downloads are no-ops).
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// The cache file path for a URL: `<cache_dir>/<sha256(url)>`.
    pub fn cache_path_for(&self, url: &str) -> PathBuf {
        let digest = Sha256::digest(url.as_bytes());
        self.cache_dir.join(format!("{:x}", digest))
    }

    /// Fetches a URL through the cache and returns the cache file path.
    ///
    /// A cache entry younger than the configured cache duration satisfies
    /// the request without network traffic. On a miss the body is written
    /// to a temporary file, validated against `expected`, and renamed into
    /// place; concurrent fetchers of the same URL each rename their own
    /// temp file, so the last writer wins and the content stays consistent.
    pub async fn fetch_cached(&self, url: &str, expected: ExpectedType, allow_insecure: bool) -> Result<PathBuf> {
        let cache_path = self.cache_path_for(url);

        if self.is_fresh(&cache_path) {
            msg_debug!(Message::CacheHit(url.to_string()));
            return Ok(cache_path);
        }

        let timeout = Duration::from_secs(self.settings.timeout * self.settings.metadata_timeout_multiplier);
        let response = self.request_with_retries(url, timeout, allow_insecure).await?;
        let body = response
            .bytes()
            .await
            .map_err(|e| engine_error(ErrorKind::Network, Message::HttpRequestFailed { url: url.to_string(), detail: e.to_string() }.to_string()))?;

        match expected {
            ExpectedType::Json => {
                if serde_json::from_slice::<serde_json::Value>(&body).is_err() {
                    return Err(engine_error(
                        ErrorKind::Validation,
                        Message::CacheTypeMismatch { url: url.to_string(), expected: "json".to_string() }.to_string(),
                    ));
                }
            }
            ExpectedType::Html => {
                let head = String::from_utf8_lossy(&body[..body.len().min(2048)]).to_lowercase();
                if !head.contains("<html") && !head.contains("<!doctype html") {
                    msg_warning!(Message::HtmlDocumentSuspicious(url.to_string()));
                }
            }
            ExpectedType::Raw => {}
        }

        let mut tmp = tempfile::NamedTempFile::new_in(&self.cache_dir)?;
        tmp.write_all(&body)?;
        tmp.persist(&cache_path)?;

        Ok(cache_path)
    }

    /// Downloads a URL straight to `dest`, bypassing the cache.
    ///
    /// When `expected_checksum` is supplied the file's digest is verified
    /// before the destination is put in place. In dry-run mode this is a
    /// no-op that reports success.
    pub async fn download(
        &self,
        url: &str,
        dest: &Path,
        expected_checksum: Option<&str>,
        algorithm: ChecksumAlgorithm,
        allow_insecure: bool,
        expected_len: Option<u64>,
    ) -> Result<()> {
        if self.dry_run {
            msg_debug!(Message::DownloadDryRun(url.to_string()));
            return Ok(());
        }

        let dir = dest.parent().unwrap_or_else(|| Path::new("."));
        ensure_private_dir(dir)?;

        let timeout = Duration::from_secs(self.settings.timeout * self.settings.download_timeout_multiplier);
        let mut response = self.request_with_retries(url, timeout, allow_insecure).await?;

        // Content-Length is advisory; a missing or differing header is
        // worth a warning but never fails the download on its own.
        if let (Some(expected), Some(actual)) = (expected_len, response.content_length()) {
            if expected != actual {
                msg_warning!(Message::ContentLengthMismatch { expected, actual });
            }
        }

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| engine_error(ErrorKind::Network, Message::HttpRequestFailed { url: url.to_string(), detail: e.to_string() }.to_string()))?
        {
            tmp.write_all(&chunk)?;
        }
        tmp.flush()?;

        if let Some(expected) = expected_checksum {
            let actual = hash_file(tmp.path(), algorithm)?;
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(engine_error(
                    ErrorKind::Validation,
                    Message::ChecksumMismatch {
                        file: dest.display().to_string(),
                        expected: expected.to_string(),
                        actual,
                    }
                    .to_string(),
                ));
            }
        }

        tmp.persist(dest)?;
        msg_debug!(Message::DownloadComplete(dest.display().to_string()));
        Ok(())
    }

    /// Probes a URL with a HEAD request.
    pub async fn url_exists(&self, url: &str, allow_insecure: bool) -> bool {
        if self.check_scheme(url, allow_insecure).is_err() {
            return false;
        }
        self.rate_limit_wait().await;
        match self.client.head(url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    /// Resolves redirects and returns the final effective URL.
    pub async fn effective_url(&self, url: &str, allow_insecure: bool) -> Result<String> {
        self.check_scheme(url, allow_insecure)?;
        self.rate_limit_wait().await;
        let resp = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|e| engine_error(ErrorKind::Network, Message::HttpRequestFailed { url: url.to_string(), detail: e.to_string() }.to_string()))?;
        Ok(resp.url().to_string())
    }

    /// True when the cache entry exists and is younger than the cache window.
    fn is_fresh(&self, path: &Path) -> bool {
        let Ok(metadata) = fs::metadata(path) else {
            return false;
        };
        let Ok(modified) = metadata.modified() else {
            return false;
        };
        match modified.elapsed() {
            Ok(age) => age < Duration::from_secs(self.settings.cache_duration),
            // A future mtime counts as fresh rather than forcing a refetch.
            Err(_) => true,
        }
    }

    fn check_scheme(&self, url: &str, allow_insecure: bool) -> Result<()> {
        if url.starts_with("https://") {
            return Ok(());
        }
        if url.starts_with("http://") && allow_insecure {
            return Ok(());
        }
        Err(engine_error(ErrorKind::Security, Message::InsecureUrlRefused(url.to_string()).to_string()))
    }

    /// Sleeps until the global minimum request spacing has elapsed, then
    /// stamps the send time.
    async fn rate_limit_wait(&self) {
        let spacing = Duration::from_secs(self.settings.rate_limit);
        let wait = {
            let last = self.last_request.lock();
            match *last {
                Some(prev) => spacing.saturating_sub(prev.elapsed()),
                None => Duration::ZERO,
            }
        };
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
        *self.last_request.lock() = Some(Instant::now());
    }

    /// Issues a GET with the retry/backoff policy.
    ///
    /// Transport errors and retriable statuses (5xx, 408, 429) are retried
    /// up to the configured attempt count with exponential backoff;
    /// other 4xx responses fail immediately.
    async fn request_with_retries(&self, url: &str, timeout: Duration, allow_insecure: bool) -> Result<Response> {
        self.check_scheme(url, allow_insecure)?;

        let mut delay = Duration::from_secs(self.settings.retry_delay);
        let attempts = self.settings.max_retries.max(1);

        for attempt in 1..=attempts {
            self.rate_limit_wait().await;

            let result = self.client.get(url).timeout(timeout).send().await;
            let retriable = match result {
                Ok(resp) if resp.status().is_success() => return Ok(resp),
                Ok(resp) => {
                    let status = resp.status();
                    if is_retriable_status(status) {
                        Some(format!("status {}", status))
                    } else {
                        return Err(engine_error(
                            ErrorKind::Network,
                            Message::HttpRequestFailed { url: url.to_string(), detail: format!("status {}", status) }.to_string(),
                        ));
                    }
                }
                Err(e) => Some(e.to_string()),
            };

            if let Some(detail) = retriable {
                if attempt == attempts {
                    return Err(engine_error(
                        ErrorKind::Network,
                        Message::HttpRequestFailed { url: url.to_string(), detail }.to_string(),
                    ));
                }
                msg_warning!(Message::HttpRetrying {
                    url: url.to_string(),
                    attempt,
                    delay_secs: delay.as_secs()
                });
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
        }

        unreachable!("retry loop returns on the final attempt")
    }
}

/// 5xx plus the two 4xx statuses that signal a transient condition.
fn is_retriable_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT || status == StatusCode::TOO_MANY_REQUESTS
}
