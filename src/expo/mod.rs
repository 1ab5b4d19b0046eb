//! MedicalExpo-specific modules for fetching, parsing, and data models.

pub mod client;
pub mod error;
pub mod models;
pub mod parser;
pub mod selectors;

pub use client::{ExpoClient, PageFetcher};
pub use error::{FetchError, TraversalError};
pub use models::{
    Category, Characteristic, Company, CrawlReport, Manufacturer, ProductDetail, ProductLink,
    ProductTile,
};
pub use parser::Parser;
pub use selectors::{PageKind, Role, SelectorMap};
