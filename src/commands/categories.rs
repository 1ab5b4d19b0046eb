//! Homepage category listing command.

use crate::config::Config;
use crate::crawl::{CrawlSettings, Crawler};
use crate::expo::{ExpoClient, PageFetcher, Parser};
use crate::format::Formatter;
use anyhow::{Context, Result};

/// Lists the categories in the homepage menu without crawling further.
pub struct CategoriesCommand {
    config: Config,
}

impl CategoriesCommand {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub async fn execute(&self) -> Result<String> {
        let client = ExpoClient::new(&self.config).context("Failed to create HTTP client")?;

        self.execute_with_client(client).await
    }

    /// Lists categories with a provided fetcher (for testing).
    pub async fn execute_with_client(&self, client: impl PageFetcher + 'static) -> Result<String> {
        let parser = Parser::new(self.config.base_url()?, self.config.selector_map()?);
        let crawler = Crawler::new(client, parser, CrawlSettings::from_config(&self.config));

        let mut categories =
            crawler.traverse_home().await.context("Failed to read the homepage menu")?;
        if let Some(max) = self.config.max_categories {
            categories.truncate(max);
        }

        Ok(Formatter::new(self.config.format).format_categories(&categories))
    }
}
