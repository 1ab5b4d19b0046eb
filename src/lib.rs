//! expo-crawler - MedicalExpo catalog crawler
//!
//! Walks the catalog from the homepage menu through category pages to
//! product listing pages, collects categories, product links, companies and
//! manufacturers, and exports them as a spreadsheet.

pub mod commands;
pub mod config;
pub mod crawl;
pub mod expo;
pub mod format;

pub use config::Config;
pub use crawl::Crawler;
pub use expo::models::{Category, Company, CrawlReport, Manufacturer, ProductLink, ProductTile};
