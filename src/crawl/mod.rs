//! Catalog traversal, retry handling and entity de-duplication.

pub mod engine;
pub mod registry;
pub mod retry;

pub use engine::{CrawlSettings, Crawler};
pub use registry::EntityRegistry;
pub use retry::RetryPolicy;
