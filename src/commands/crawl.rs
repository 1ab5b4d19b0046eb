//! Full catalog crawl command.

use crate::config::{Config, OutputFormat};
use crate::crawl::{CrawlSettings, Crawler};
use crate::expo::{ExpoClient, PageFetcher, Parser};
use crate::format::{self, Formatter};
use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::{info, warn};

/// Crawls the catalog and exports the results.
pub struct CrawlCommand {
    config: Config,
    output: Option<PathBuf>,
}

impl CrawlCommand {
    /// Creates a new crawl command.
    pub fn new(config: Config) -> Self {
        Self { config, output: None }
    }

    /// Writes the export to `path` instead of a timestamped file.
    pub fn with_output(mut self, path: Option<PathBuf>) -> Self {
        self.output = path;
        self
    }

    /// Runs the crawl and returns the summary to print.
    pub async fn execute(&self) -> Result<String> {
        let client = ExpoClient::new(&self.config).context("Failed to create HTTP client")?;

        self.execute_with_client(client).await
    }

    /// Runs the crawl with a provided fetcher (for testing).
    pub async fn execute_with_client(&self, client: impl PageFetcher + 'static) -> Result<String> {
        let parser = Parser::new(self.config.base_url()?, self.config.selector_map()?);
        let crawler = Crawler::new(client, parser, CrawlSettings::from_config(&self.config));

        info!("Starting crawl of {}", self.config.base_url);
        let report = crawler.run().await.context("Crawl aborted")?;

        if report.is_empty() {
            warn!("Crawl collected no data");
        }
        if report.is_partial() {
            warn!("{} branches were skipped; see the Failures sheet", report.failures.len());
        }

        let summary = Formatter::new(OutputFormat::Table).format_report(&report);

        let saved = format::export(
            &report,
            self.config.format,
            &self.config.output_dir,
            self.output.as_deref(),
        )?;

        Ok(match saved {
            Some(path) => {
                format!("{}\n\nSaved {} export to {}", summary, self.config.format, path.display())
            }
            None => summary,
        })
    }
}
