//! CLI command implementations.

pub mod categories;
pub mod crawl;

pub use categories::CategoriesCommand;
pub use crawl::CrawlCommand;
