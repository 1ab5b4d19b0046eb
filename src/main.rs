//! expo-crawler - MedicalExpo catalog crawler CLI

use anyhow::Result;
use clap::{Parser, Subcommand};
use expo_crawler::commands::{CategoriesCommand, CrawlCommand};
use expo_crawler::config::{Config, OutputFormat};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "expo-crawler",
    version,
    about = "MedicalExpo catalog crawler",
    long_about = "Walks the MedicalExpo catalog (homepage menu, categories, product pages) and exports categories, product links, companies and manufacturers to a spreadsheet."
)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Site root to start from
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Proxy URL (e.g., socks5://host:port)
    #[arg(long, global = true, env = "EXPO_PROXY")]
    proxy: Option<String>,

    /// Base delay between requests in milliseconds
    #[arg(long, global = true, env = "EXPO_DELAY")]
    delay: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl the whole catalog and export the results
    Crawl {
        /// Export format (xlsx, csv, json, table)
        #[arg(short, long)]
        format: Option<OutputFormat>,

        /// Export file path (default: timestamped file in the output directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Maximum number of pages fetched at once
        #[arg(long)]
        concurrency: Option<usize>,

        /// Attempts per page before a branch is given up
        #[arg(long)]
        retries: Option<u32>,

        /// Only crawl the first N categories
        #[arg(long)]
        max_categories: Option<usize>,

        /// Run without saving page snapshots
        #[arg(long, overrides_with = "no_headless")]
        headless: bool,

        /// Save every fetched page to the snapshot directory
        #[arg(long)]
        no_headless: bool,
    },

    /// List the categories in the homepage menu
    #[command(alias = "cats")]
    Categories {
        /// Output format (table, csv, json)
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,

        /// Only list the first N categories
        #[arg(long)]
        max: Option<usize>,
    },

    /// Show the active selector table
    Selectors,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new(Level::DEBUG.to_string())
    } else {
        EnvFilter::from_default_env().add_directive(Level::WARN.into())
    };

    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    // Load config with layered overrides
    let mut config = Config::load(cli.config.as_deref())?.with_env();

    // Apply CLI overrides
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url;
    }
    if let Some(proxy) = cli.proxy {
        config.proxy = Some(proxy);
    }
    if let Some(delay) = cli.delay {
        config.delay_ms = delay;
    }

    match cli.command {
        Commands::Crawl {
            format,
            output,
            concurrency,
            retries,
            max_categories,
            headless,
            no_headless,
        } => {
            if let Some(format) = format {
                config.format = format;
            }
            if let Some(concurrency) = concurrency {
                config.concurrency = concurrency;
            }
            if let Some(retries) = retries {
                config.max_retries = retries;
            }
            if max_categories.is_some() {
                config.max_categories = max_categories;
            }
            if no_headless {
                config.headless = false;
            } else if headless {
                config.headless = true;
            }

            let cmd = CrawlCommand::new(config).with_output(output);
            let output = cmd.execute().await?;
            println!("{}", output);
        }

        Commands::Categories { format, max } => {
            config.format = format;
            if max.is_some() {
                config.max_categories = max;
            }

            let cmd = CategoriesCommand::new(config);
            let output = cmd.execute().await?;
            println!("{}", output);
        }

        Commands::Selectors => {
            let selectors = config.selector_map()?;

            println!("{:<10} {:<28} {}", "Page", "Key", "Selector");
            println!("{:-<10} {:-<28} {:-<40}", "", "", "");

            for (page, role, source) in selectors.iter() {
                println!("{:<10} {:<28} {}", page.to_string(), role.key(), source);
            }
        }
    }

    Ok(())
}
