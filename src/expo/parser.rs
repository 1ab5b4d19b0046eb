//! HTML extraction for MedicalExpo homepage, category, product and detail pages.
//!
//! Everything here is a pure read of a parsed document. Text is trimmed and
//! whitespace-collapsed, and every href is resolved to an absolute URL before
//! it leaves this module.

use crate::expo::error::TraversalError;
use crate::expo::models::{
    Category, Characteristic, ProductDetail, ProductLink, ProductPage, ProductTile,
};
use crate::expo::selectors::{Role, SelectorMap};
use scraper::{ElementRef, Html};
use tracing::{debug, trace};
use url::Url;

/// Fallback label for menu sections without one.
pub const UNKNOWN_SECTION: &str = "Unknown Section";

/// Fallback title for group entries without one.
pub const UNTITLED: &str = "Untitled";

/// Headings and links read from a category listing page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryPage {
    pub heading: String,
    pub links: Vec<ProductLink>,
}

/// Parser for MedicalExpo HTML pages.
#[derive(Debug, Clone)]
pub struct Parser {
    base: Url,
    selectors: SelectorMap,
}

impl Parser {
    /// Creates a parser resolving relative links against `base`.
    pub fn new(base: Url, selectors: SelectorMap) -> Self {
        Self { base, selectors }
    }

    /// Base URL used for the homepage and as fallback for link resolution.
    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn selectors(&self) -> &SelectorMap {
        &self.selectors
    }

    /// Extracts one category per dropdown link of the homepage menu.
    ///
    /// Fails with a navigation error when the menu row is missing. A row
    /// without items is a valid, empty menu.
    pub fn parse_home(&self, html: &str) -> Result<Vec<Category>, TraversalError> {
        let document = Html::parse_document(html);

        let row = document
            .select(self.selectors.get(Role::MenuRow))
            .next()
            .ok_or_else(|| self.navigation(Role::MenuRow))?;

        let mut columns: Vec<ElementRef> =
            row.select(self.selectors.get(Role::MenuColumn)).collect();
        if columns.len() != 2 {
            debug!("Menu row has {} columns, expected 2", columns.len());
        }
        if columns.is_empty() {
            columns.push(row);
        }

        let mut categories = Vec::new();

        for column in columns {
            for item in column.select(self.selectors.get(Role::MenuItem)) {
                let section = item
                    .select(self.selectors.get(Role::SectionLabel))
                    .next()
                    .map(text_of)
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| UNKNOWN_SECTION.to_string());

                let before = categories.len();
                for link in item.select(self.selectors.get(Role::SubcategoryLink)) {
                    let name = text_of(link);
                    let url = link.value().attr("href").and_then(|h| resolve(&self.base, h));

                    match url {
                        Some(url) if !name.is_empty() => {
                            trace!("Category: {} / {}", section, name);
                            categories.push(Category { name, url, section: section.clone() });
                        }
                        _ => trace!("Skipping menu link without text or href in '{}'", section),
                    }
                }

                debug!("Section '{}': {} categories", section, categories.len() - before);
            }
        }

        Ok(categories)
    }

    /// Extracts the heading and group entries of a category listing page.
    pub fn parse_category(
        &self,
        html: &str,
        category: &Category,
    ) -> Result<CategoryPage, TraversalError> {
        let document = Html::parse_document(html);
        let page_url = self.page_url(&category.url);

        let heading = self.heading(&document, Role::CategoryHeading)?;

        let mut links = Vec::new();
        for item in document.select(self.selectors.get(Role::GroupItem)) {
            let Some(anchor) = item.select(self.selectors.get(Role::GroupLink)).next() else {
                trace!("Skipping group entry without a link");
                continue;
            };

            let Some(url) = anchor.value().attr("href").and_then(|h| resolve(&page_url, h))
            else {
                trace!("Skipping group entry with unusable href");
                continue;
            };

            let name = anchor
                .select(self.selectors.get(Role::GroupTitle))
                .next()
                .map(text_of)
                .filter(|s| !s.is_empty())
                .or_else(|| Some(text_of(anchor)).filter(|s| !s.is_empty()))
                .unwrap_or_else(|| UNTITLED.to_string());

            let image_url = anchor
                .select(self.selectors.get(Role::GroupImage))
                .next()
                .and_then(|img| img.value().attr("src"))
                .and_then(|src| resolve(&page_url, src));

            links.push(ProductLink { name, url, category: category.name.clone(), image_url });
        }

        debug!("Parsed {} product links from '{}'", links.len(), heading);

        Ok(CategoryPage { heading, links })
    }

    /// Extracts heading, company list, manufacturers, tiles and pagination of a
    /// product listing page.
    ///
    /// The company list is only read when the displayed company count is above zero.
    pub fn parse_product(
        &self,
        html: &str,
        link: &ProductLink,
    ) -> Result<ProductPage, TraversalError> {
        let document = Html::parse_document(html);
        let page_url = self.page_url(&link.url);

        let heading = self.heading(&document, Role::ProductHeading)?;

        let company_count = document
            .select(self.selectors.get(Role::CompanyCount))
            .next()
            .map(|e| parse_count(&text_of(e)))
            .unwrap_or(0);

        let company_names = if company_count > 0 {
            document
                .select(self.selectors.get(Role::CompanyName))
                .map(text_of)
                .filter(|s| !s.is_empty())
                .collect()
        } else {
            Vec::new()
        };

        let manufacturer_names = document
            .select(self.selectors.get(Role::ManufacturerInput))
            .filter_map(input_label)
            .collect();

        let tiles = self.tiles(&document, link, &page_url);

        let mut pagination: Vec<String> = Vec::new();
        for anchor in document.select(self.selectors.get(Role::Pagination)) {
            if let Some(url) = anchor.value().attr("href").and_then(|h| resolve(&page_url, h)) {
                if url != page_url.as_str() && url != link.url && !pagination.contains(&url) {
                    pagination.push(url);
                }
            }
        }

        debug!(
            "Product page '{}': {} companies shown, {} tiles, {} more pages",
            heading,
            company_count,
            tiles.len(),
            pagination.len()
        );

        Ok(ProductPage {
            heading,
            company_count,
            company_names,
            manufacturer_names,
            tiles,
            pagination,
        })
    }

    /// Extracts only the product tiles of a further result page.
    pub fn parse_listing(&self, html: &str, link: &ProductLink, url: &str) -> Vec<ProductTile> {
        let document = Html::parse_document(html);
        let page_url = self.page_url(url);
        self.tiles(&document, link, &page_url)
    }

    /// Extracts the full product record of a detail page reached from `tile`.
    ///
    /// Detail pages vary a lot between suppliers, so every field is optional and
    /// the title falls back to the tile's.
    pub fn parse_detail(&self, html: &str, tile: &ProductTile, url: &str) -> ProductDetail {
        let document = Html::parse_document(html);
        let page_url = self.page_url(url);

        let (title, model) = match document.select(self.selectors.get(Role::DetailTitle)).next() {
            Some(block) => {
                let parts: Vec<String> = block
                    .select(self.selectors.get(Role::DetailTitlePart))
                    .filter(|part| part.id() != block.id())
                    .map(text_of)
                    .filter(|s| !s.is_empty())
                    .collect();
                match parts.as_slice() {
                    [] => (text_of(block), None),
                    [title] => (title.clone(), None),
                    [title, model, ..] => (title.clone(), Some(model.clone())),
                }
            }
            None => {
                trace!("No title block on {}", url);
                (String::new(), None)
            }
        };

        let tags = document
            .select(self.selectors.get(Role::DetailTag))
            .map(text_of)
            .filter(|s| !s.is_empty())
            .collect();

        let description = document
            .select(self.selectors.get(Role::DetailDescription))
            .next()
            .map(text_of)
            .unwrap_or_default();

        let characteristics = document
            .select(self.selectors.get(Role::DetailCharacteristics))
            .next()
            .map(characteristics_of)
            .unwrap_or_default();

        let catalog_available = document
            .select(self.selectors.get(Role::DetailSectionHeading))
            .find(|h| text_of(*h).to_lowercase().contains("catalog"))
            .map(|h| {
                h.next_siblings()
                    .filter_map(ElementRef::wrap)
                    .find(|e| e.value().name() == "p")
                    .map(|p| !text_of(p).to_lowercase().contains("no catalogs"))
                    .unwrap_or(false)
            });

        let video_url = document
            .select(self.selectors.get(Role::DetailVideo))
            .find_map(|v| v.value().attr("src"))
            .and_then(|src| resolve(&page_url, src));

        let supplier = document
            .select(self.selectors.get(Role::SupplierName))
            .next()
            .map(text_of)
            .filter(|s| !s.is_empty());

        let supplier_location = document
            .select(self.selectors.get(Role::SupplierLocation))
            .next()
            .map(text_of)
            .filter(|s| !s.is_empty());

        let supplier_rating = document.select(self.selectors.get(Role::SupplierRating)).count();

        let mut images: Vec<String> = Vec::new();
        for img in document.select(self.selectors.get(Role::DetailImage)) {
            if let Some(src) = img.value().attr("data-src").and_then(|s| resolve(&page_url, s)) {
                if !images.contains(&src) {
                    images.push(src);
                }
            }
        }

        let price = document
            .select(self.selectors.get(Role::DetailPrice))
            .next()
            .map(text_of)
            .filter(|s| !s.is_empty());
        let currency = price.as_deref().and_then(currency_of).map(str::to_string);

        debug!(
            "Detail '{}': {} characteristics, {} images",
            title,
            characteristics.len(),
            images.len()
        );

        ProductDetail {
            url: url.to_string(),
            product: tile.product.clone(),
            title: if title.is_empty() { tile.title.clone() } else { title },
            model,
            tags,
            description,
            characteristics,
            catalog_available,
            video_url,
            supplier,
            supplier_location,
            supplier_rating: u32::try_from(supplier_rating).unwrap_or(u32::MAX),
            images,
            price,
            currency,
        }
    }

    fn tiles(&self, document: &Html, link: &ProductLink, page_url: &Url) -> Vec<ProductTile> {
        let mut tiles = Vec::new();

        for tile in document.select(self.selectors.get(Role::ProductTile)) {
            let title_el = tile.select(self.selectors.get(Role::TileTitle)).next();
            let title = title_el.map(text_of).unwrap_or_default();

            // Unrendered client-side template
            if title.contains("{{") {
                trace!("Skipping placeholder tile");
                continue;
            }

            // The detail link wraps the title; fall back to any link in the tile.
            let href = title_el
                .and_then(|t| t.parent())
                .and_then(ElementRef::wrap)
                .filter(|p| p.value().name() == "a")
                .and_then(|a| a.value().attr("href"))
                .or_else(|| {
                    tile.select(self.selectors.get(Role::TileLink))
                        .next()
                        .and_then(|a| a.value().attr("href"))
                });

            let description = tile
                .select(self.selectors.get(Role::TileDescription))
                .next()
                .map(text_of)
                .unwrap_or_default();

            let features = tile
                .select(self.selectors.get(Role::TileFeature))
                .map(text_of)
                .filter(|s| !s.is_empty())
                .collect();

            let has_video = tile.select(self.selectors.get(Role::TileVideo)).next().is_some();

            tiles.push(ProductTile {
                title: if title.is_empty() { UNTITLED.to_string() } else { title },
                description,
                features,
                url: href.and_then(|h| resolve(page_url, h)),
                has_video,
                product: link.name.clone(),
            });
        }

        tiles
    }

    fn heading(&self, document: &Html, role: Role) -> Result<String, TraversalError> {
        document
            .select(self.selectors.get(role))
            .next()
            .map(text_of)
            .ok_or_else(|| self.navigation(role))
    }

    fn navigation(&self, role: Role) -> TraversalError {
        TraversalError::Navigation {
            page: role.page(),
            role,
            selector: self.selectors.source(role).to_string(),
        }
    }

    fn page_url(&self, url: &str) -> Url {
        Url::parse(url).unwrap_or_else(|_| self.base.clone())
    }
}

/// Resolves `href` against `base`, keeping only http(s) targets.
pub fn resolve(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let mut url = base.join(href).ok()?;
    match url.scheme() {
        "http" | "https" => {
            url.set_fragment(None);
            Some(url.into())
        }
        _ => None,
    }
}

/// Trims and collapses internal whitespace.
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Case-insensitive, whitespace-insensitive heading comparison.
pub fn headings_match(expected: &str, found: &str) -> bool {
    clean_text(expected).to_lowercase() == clean_text(found).to_lowercase()
}

/// Reads the first number in text like "1,234 companies" or "(12)".
pub fn parse_count(text: &str) -> u32 {
    text.split_whitespace()
        .find(|token| token.chars().any(|c| c.is_ascii_digit()))
        .map(|token| token.chars().filter(|c| c.is_ascii_digit()).collect::<String>())
        .and_then(|digits| digits.parse().ok())
        .unwrap_or(0)
}

fn text_of(element: ElementRef) -> String {
    clean_text(&element.text().collect::<String>())
}

/// Pairs the `dt`/`dd` rows of a definition list.
fn characteristics_of(list: ElementRef) -> Vec<Characteristic> {
    let mut rows = Vec::new();
    let mut name: Option<String> = None;

    for child in list.descendants().filter_map(ElementRef::wrap) {
        match child.value().name() {
            "dt" => name = Some(text_of(child)),
            "dd" => {
                if let Some(name) = name.take().filter(|n| !n.is_empty()) {
                    rows.push(Characteristic { name, value: text_of(child) });
                }
            }
            _ => {}
        }
    }

    rows
}

/// Currency code for a displayed price.
fn currency_of(price: &str) -> Option<&'static str> {
    if price.contains('$') {
        Some("USD")
    } else if price.contains('€') {
        Some("EUR")
    } else if price.contains('£') {
        Some("GBP")
    } else {
        None
    }
}

fn input_label(input: ElementRef) -> Option<String> {
    let attrs = input.value();
    ["data-name", "aria-label", "value"]
        .iter()
        .filter_map(|name| attrs.attr(name))
        .map(clean_text)
        .find(|s| !s.is_empty())
}
