//! Data models for catalog entities and crawl results.

use serde::{Deserialize, Serialize};

/// A product grouping discovered in the homepage menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Link text of the menu sub-link
    pub name: String,
    /// Absolute URL of the category listing page
    pub url: String,
    /// Label of the menu section the link sits under
    pub section: String,
}

/// A navigable product listing reference discovered on a category page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductLink {
    /// Entry title
    pub name: String,
    /// Absolute URL of the product listing page
    pub url: String,
    /// Name of the owning category
    pub category: String,
    /// Entry thumbnail, if any
    pub image_url: Option<String>,
}

/// A vendor batch-created from a product page's company list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub name: String,
    /// Product page that first listed this company
    pub source_url: String,
}

/// A manufacturer read from the sidebar filter inputs of a product page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manufacturer {
    pub name: String,
    /// Product link the manufacturer was first seen on
    pub product: String,
    /// Category of that product link
    pub category: String,
}

/// A product tile on a product listing page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductTile {
    pub title: String,
    pub description: String,
    pub features: Vec<String>,
    /// Absolute URL of the product detail page
    pub url: Option<String>,
    pub has_video: bool,
    /// Name of the product link the tile was listed under
    pub product: String,
}

/// Everything extracted from one product listing page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductPage {
    pub heading: String,
    /// Company count displayed on the page (0 when absent)
    pub company_count: u32,
    /// Names from the sidebar company list; empty when `company_count` is 0
    pub company_names: Vec<String>,
    /// Names from the sidebar manufacturer inputs
    pub manufacturer_names: Vec<String>,
    pub tiles: Vec<ProductTile>,
    /// Absolute URLs of further result pages
    pub pagination: Vec<String>,
}

/// One row of a product's characteristics table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Characteristic {
    pub name: String,
    pub value: String,
}

/// Full product record read from a product detail page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDetail {
    /// Absolute URL of the detail page
    pub url: String,
    /// Name of the product link the tile was listed under
    pub product: String,
    pub title: String,
    pub model: Option<String>,
    pub tags: Vec<String>,
    pub description: String,
    pub characteristics: Vec<Characteristic>,
    /// `None` when the page has no catalog section
    pub catalog_available: Option<bool>,
    pub video_url: Option<String>,
    pub supplier: Option<String>,
    pub supplier_location: Option<String>,
    /// Star count shown next to the supplier
    pub supplier_rating: u32,
    pub images: Vec<String>,
    /// Indicative price as displayed, e.g. "$1,250"
    pub price: Option<String>,
    pub currency: Option<String>,
}

/// Which kind of branch failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchKind {
    Category,
    Product,
    Listing,
    Detail,
}

impl std::fmt::Display for BranchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BranchKind::Category => write!(f, "category"),
            BranchKind::Product => write!(f, "product"),
            BranchKind::Listing => write!(f, "listing"),
            BranchKind::Detail => write!(f, "detail"),
        }
    }
}

/// A branch that was skipped, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: BranchKind,
    pub url: String,
    pub reason: String,
}

/// Flattened result of a crawl run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlReport {
    pub categories: Vec<Category>,
    pub product_links: Vec<ProductLink>,
    pub products: Vec<ProductTile>,
    #[serde(default)]
    pub details: Vec<ProductDetail>,
    pub companies: Vec<Company>,
    pub manufacturers: Vec<Manufacturer>,
    pub failures: Vec<Failure>,
}

impl CrawlReport {
    /// Returns true if nothing at all was collected.
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
            && self.product_links.is_empty()
            && self.products.is_empty()
            && self.details.is_empty()
            && self.companies.is_empty()
            && self.manufacturers.is_empty()
    }

    /// Returns true if any branch was skipped.
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}
