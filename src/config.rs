//! Configuration management with TOML, environment variables, and CLI overrides.

use crate::expo::selectors::SelectorMap;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;
use url::Url;

/// Default site root.
pub const DEFAULT_BASE_URL: &str = "https://www.medicalexpo.com/";

/// Application configuration with layered loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Site root; the homepage is fetched from here
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Proxy URL (e.g., socks5://host:port)
    #[serde(default)]
    pub proxy: Option<String>,

    /// Base delay before each request in milliseconds
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    /// Random jitter added to delay (0 to this value)
    #[serde(default = "default_delay_jitter_ms")]
    pub delay_jitter_ms: u64,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Attempts per page before the branch is given up
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// First retry backoff in milliseconds, doubled on each attempt
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Maximum pages fetched concurrently
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// When false, every fetched page is also saved to `snapshot_dir`
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Where page snapshots go when not headless
    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: PathBuf,

    /// Where export files go
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Export format
    #[serde(default)]
    pub format: OutputFormat,

    /// Only crawl the first N categories (trial runs)
    #[serde(default)]
    pub max_categories: Option<usize>,

    /// Selector overrides keyed by `<page>.<role>`
    #[serde(default)]
    pub selectors: BTreeMap<String, String>,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_delay_ms() -> u64 {
    800
}

fn default_delay_jitter_ms() -> u64 {
    1700
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    2000
}

fn default_concurrency() -> usize {
    4
}

fn default_headless() -> bool {
    true
}

fn default_snapshot_dir() -> PathBuf {
    PathBuf::from("snapshots")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("exports")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            proxy: None,
            delay_ms: default_delay_ms(),
            delay_jitter_ms: default_delay_jitter_ms(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            concurrency: default_concurrency(),
            headless: default_headless(),
            snapshot_dir: default_snapshot_dir(),
            output_dir: default_output_dir(),
            format: OutputFormat::default(),
            max_categories: None,
            selectors: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading config from: {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Loads configuration with fallback to default locations.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit_path {
            return Self::from_file(path);
        }

        let local_config = Path::new("expo-crawler.toml");
        if local_config.exists() {
            debug!("Found expo-crawler.toml in current directory");
            return Self::from_file(local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let xdg_config = config_dir.join("expo-crawler").join("config.toml");
            if xdg_config.exists() {
                debug!("Found config in XDG config directory");
                return Self::from_file(xdg_config);
            }
        }

        debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Applies environment variable overrides.
    pub fn with_env(mut self) -> Self {
        if let Ok(base_url) = std::env::var("EXPO_BASE_URL") {
            self.base_url = base_url;
        }

        if let Ok(proxy) = std::env::var("EXPO_PROXY") {
            self.proxy = Some(proxy);
        }

        if let Ok(delay) = std::env::var("EXPO_DELAY") {
            if let Ok(d) = delay.parse() {
                self.delay_ms = d;
            }
        }

        if let Ok(concurrency) = std::env::var("EXPO_CONCURRENCY") {
            if let Ok(c) = concurrency.parse() {
                self.concurrency = c;
            }
        }

        self
    }

    /// Parsed site root.
    pub fn base_url(&self) -> Result<Url> {
        Url::parse(&self.base_url).with_context(|| format!("Invalid base URL: {}", self.base_url))
    }

    /// Selector table with this config's overrides applied.
    pub fn selector_map(&self) -> Result<SelectorMap> {
        SelectorMap::with_overrides(&self.selectors).context("Invalid [selectors] configuration")
    }
}

/// Export format for results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Xlsx,
    Csv,
    Json,
    Table,
}

impl OutputFormat {
    /// File extension for formats written to disk.
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            OutputFormat::Xlsx => Some("xlsx"),
            OutputFormat::Csv => Some("csv"),
            OutputFormat::Json => Some("json"),
            OutputFormat::Table => None,
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "xlsx" | "excel" => Ok(OutputFormat::Xlsx),
            "csv" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            "table" => Ok(OutputFormat::Table),
            _ => Err(format!("Unknown format: {}. Use: xlsx, csv, json, table", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Xlsx => write!(f, "xlsx"),
            OutputFormat::Csv => write!(f, "csv"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Table => write!(f, "table"),
        }
    }
}
