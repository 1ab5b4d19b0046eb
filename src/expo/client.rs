//! HTTP page fetcher using wreq for browser emulation.

use crate::config::Config;
use crate::expo::error::FetchError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::Rng;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};
use wreq::Client;
use wreq_util::Emulation;

/// Trait for page fetching - enables mocking for tests.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetches one page and returns its HTML. A single attempt; retries are the caller's.
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// MedicalExpo HTTP client with browser impersonation and politeness delay.
pub struct ExpoClient {
    client: Client,
    delay_ms: u64,
    delay_jitter_ms: u64,
    snapshot_dir: Option<PathBuf>,
}

impl ExpoClient {
    /// Creates a new client with the given configuration.
    pub fn new(config: &Config) -> Result<Self> {
        let mut builder = Client::builder()
            .cookie_store(true)
            .gzip(true)
            .brotli(true)
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.timeout_secs.min(10)));

        if let Some(proxy_url) = &config.proxy {
            debug!("Configuring proxy: {}", proxy_url);
            let proxy = wreq::Proxy::all(proxy_url).context("Failed to configure proxy")?;
            builder = builder.proxy(proxy);
        }

        let client = builder.build().context("Failed to build HTTP client")?;

        // Without a visible browser, page snapshots are how an operator watches a run.
        let snapshot_dir = if config.headless { None } else { Some(config.snapshot_dir.clone()) };

        Ok(Self {
            client,
            delay_ms: config.delay_ms,
            delay_jitter_ms: config.delay_jitter_ms,
            snapshot_dir,
        })
    }

    /// Performs a GET request with browser emulation headers.
    async fn get(&self, url: &str) -> Result<String, FetchError> {
        self.delay().await;

        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .emulation(Emulation::Chrome131)
            .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .header("Accept-Language", "en-US,en;q=0.9")
            .header("Cache-Control", "no-cache")
            .header("Upgrade-Insecure-Requests", "1")
            .send()
            .await
            .map_err(|e| transport_error(url, e))?;

        let status = response.status();
        debug!("Response status: {}", status);

        if status == 429 {
            warn!("Rate limited (429) on {}. Consider increasing --delay.", url);
        }

        if !status.is_success() {
            return Err(FetchError::Status { url: url.to_string(), status: status.as_u16() });
        }

        let body = response.text().await.map_err(|e| transport_error(url, e))?;

        if let Some(dir) = &self.snapshot_dir {
            save_snapshot(dir, url, &body).await;
        }

        Ok(body)
    }

    /// Adds a random delay to mimic human browsing.
    async fn delay(&self) {
        if self.delay_ms == 0 && self.delay_jitter_ms == 0 {
            return;
        }

        let jitter = if self.delay_jitter_ms > 0 {
            rand::rng().random_range(0..=self.delay_jitter_ms)
        } else {
            0
        };

        let total_delay = self.delay_ms + jitter;
        debug!("Delaying {}ms", total_delay);
        tokio::time::sleep(Duration::from_millis(total_delay)).await;
    }
}

#[async_trait]
impl PageFetcher for ExpoClient {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        info!("Fetching: {}", url);
        self.get(url).await
    }
}

fn transport_error(url: &str, err: wreq::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout { url: url.to_string() }
    } else {
        FetchError::Transport { url: url.to_string(), reason: err.to_string() }
    }
}

/// File name for a page snapshot, derived from its URL.
pub fn snapshot_name(url: &str) -> String {
    let stem: String = url
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
        .take(150)
        .collect();
    let stem = stem.trim_end_matches(".html").trim_matches('_');
    format!("{}.html", if stem.is_empty() { "index" } else { stem })
}

async fn save_snapshot(dir: &Path, url: &str, body: &str) {
    let path = dir.join(snapshot_name(url));
    let result = async {
        tokio::fs::create_dir_all(dir).await?;
        tokio::fs::write(&path, body).await
    }
    .await;

    match result {
        Ok(()) => debug!("Saved snapshot {}", path.display()),
        Err(e) => warn!("Failed to save snapshot {}: {}", path.display(), e),
    }
}
