//! CSS selectors for MedicalExpo HTML parsing.
//!
//! Every DOM query the crawler makes lives in this table, keyed by the page it
//! applies to and the role the element plays on that page. Update the defaults
//! here when the site changes its markup, or override single entries from the
//! `[selectors]` table of the config file (`"home.menu_row" = "..."`).
//!
//! **Update process**: when a traversal reports a navigation error, capture the
//! HTML, fix the selector, and add a fixture under `tests/fixtures/`.

use scraper::Selector;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;

/// The page types the crawler visits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageKind {
    /// Site homepage with the "Products" mega menu.
    Home,
    /// Category listing page reached from a menu sub-link.
    Category,
    /// Product listing page reached from a category group entry.
    Product,
    /// Product detail page reached from a listing tile.
    Detail,
}

impl PageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageKind::Home => "home",
            PageKind::Category => "category",
            PageKind::Product => "product",
            PageKind::Detail => "detail",
        }
    }
}

impl fmt::Display for PageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The role an element plays on its page. Each role belongs to exactly one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    // Homepage menu
    MenuRow,
    MenuColumn,
    MenuItem,
    SectionLabel,
    SubcategoryLink,

    // Category listing
    CategoryHeading,
    GroupItem,
    GroupLink,
    GroupTitle,
    GroupImage,

    // Product listing
    ProductHeading,
    CompanyCount,
    CompanyName,
    ManufacturerInput,
    ProductTile,
    TileTitle,
    TileLink,
    TileDescription,
    TileFeature,
    TileVideo,
    Pagination,

    // Product detail
    DetailTitle,
    DetailTitlePart,
    DetailTag,
    DetailDescription,
    DetailCharacteristics,
    DetailSectionHeading,
    DetailVideo,
    SupplierName,
    SupplierLocation,
    SupplierRating,
    DetailImage,
    DetailPrice,
}

impl Role {
    /// All roles, in table order.
    pub const ALL: [Role; 33] = [
        Role::MenuRow,
        Role::MenuColumn,
        Role::MenuItem,
        Role::SectionLabel,
        Role::SubcategoryLink,
        Role::CategoryHeading,
        Role::GroupItem,
        Role::GroupLink,
        Role::GroupTitle,
        Role::GroupImage,
        Role::ProductHeading,
        Role::CompanyCount,
        Role::CompanyName,
        Role::ManufacturerInput,
        Role::ProductTile,
        Role::TileTitle,
        Role::TileLink,
        Role::TileDescription,
        Role::TileFeature,
        Role::TileVideo,
        Role::Pagination,
        Role::DetailTitle,
        Role::DetailTitlePart,
        Role::DetailTag,
        Role::DetailDescription,
        Role::DetailCharacteristics,
        Role::DetailSectionHeading,
        Role::DetailVideo,
        Role::SupplierName,
        Role::SupplierLocation,
        Role::SupplierRating,
        Role::DetailImage,
        Role::DetailPrice,
    ];

    /// The page this role is looked up on.
    pub fn page(&self) -> PageKind {
        match self {
            Role::MenuRow
            | Role::MenuColumn
            | Role::MenuItem
            | Role::SectionLabel
            | Role::SubcategoryLink => PageKind::Home,
            Role::CategoryHeading
            | Role::GroupItem
            | Role::GroupLink
            | Role::GroupTitle
            | Role::GroupImage => PageKind::Category,
            Role::ProductHeading
            | Role::CompanyCount
            | Role::CompanyName
            | Role::ManufacturerInput
            | Role::ProductTile
            | Role::TileTitle
            | Role::TileLink
            | Role::TileDescription
            | Role::TileFeature
            | Role::TileVideo
            | Role::Pagination => PageKind::Product,
            _ => PageKind::Detail,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::MenuRow => "menu_row",
            Role::MenuColumn => "menu_column",
            Role::MenuItem => "menu_item",
            Role::SectionLabel => "section_label",
            Role::SubcategoryLink => "subcategory_link",
            Role::CategoryHeading => "heading",
            Role::GroupItem => "group_item",
            Role::GroupLink => "group_link",
            Role::GroupTitle => "group_title",
            Role::GroupImage => "group_image",
            Role::ProductHeading => "heading",
            Role::CompanyCount => "company_count",
            Role::CompanyName => "company_name",
            Role::ManufacturerInput => "manufacturer_input",
            Role::ProductTile => "tile",
            Role::TileTitle => "tile_title",
            Role::TileLink => "tile_link",
            Role::TileDescription => "tile_description",
            Role::TileFeature => "tile_feature",
            Role::TileVideo => "tile_video",
            Role::Pagination => "pagination",
            Role::DetailTitle => "title",
            Role::DetailTitlePart => "title_part",
            Role::DetailTag => "tag",
            Role::DetailDescription => "description",
            Role::DetailCharacteristics => "characteristics",
            Role::DetailSectionHeading => "section_heading",
            Role::DetailVideo => "video",
            Role::SupplierName => "supplier_name",
            Role::SupplierLocation => "supplier_location",
            Role::SupplierRating => "supplier_rating",
            Role::DetailImage => "image",
            Role::DetailPrice => "price",
        }
    }

    /// Config key for this role, e.g. `home.menu_row`.
    pub fn key(&self) -> String {
        format!("{}.{}", self.page(), self.as_str())
    }

    /// Built-in selector for this role.
    fn default_selector(&self) -> &'static str {
        match self {
            // The row holding the two product columns of the mega menu.
            Role::MenuRow => "div.sc-6qd6g7-15, div[class*='universGroup__MenuRow']",
            Role::MenuColumn => "div.sc-ztyvp1-0, div[class*='universGroup__MenuColumn']",
            Role::MenuItem => "li[data-cy^='universGroupItemCy_'], li.sc-6qd6g7-3",
            Role::SectionLabel => "span[class*='UniverseGroupLabel']",
            // Dropdown links; the nested list is in the markup even when collapsed.
            Role::SubcategoryLink => "a[class*='CategoryLink'], ul li a",

            Role::CategoryHeading => "h1#category",
            Role::GroupItem => "ul.category-grouplist > li",
            Role::GroupLink => "a",
            Role::GroupTitle => "p.subCatTitle",
            Role::GroupImage => "div.imgSubCat > img",

            Role::ProductHeading => "h1#category",
            Role::CompanyCount => "[data-cy='companiesCount'], .companies-count",
            Role::CompanyName => "#sidebar ul.manufacturer-list li",
            Role::ManufacturerInput => {
                "#sidebar input[name='manufacturer'], \
                 #sidebar input[data-filter='manufacturer']"
            }
            Role::ProductTile => ".product-tile",
            Role::TileTitle => "h3.short-name",
            Role::TileLink => "a[href]",
            Role::TileDescription => "p.description-text",
            Role::TileFeature => "div.feature-values-container span",
            Role::TileVideo => ".icon-big video, .new-video",
            Role::Pagination => "div.pagination-wrapper a",

            // Title block: first span is the product name, second the model.
            Role::DetailTitle => "span[class^='sc-2mcr2-0'], h1[class*='productTitle']",
            Role::DetailTitlePart => "span",
            Role::DetailTag => "div[class^='sc-cw67gy-0'] span[class^='sc-cw67gy-1']",
            Role::DetailDescription => ".sc-3fi1by-0, div[class*='productDescription']",
            Role::DetailCharacteristics => "dl.sc-mgb5nu-0, dl[class*='characteristics']",
            Role::DetailSectionHeading => "h2",
            Role::DetailVideo => "video source[src], video[src]",
            Role::SupplierName => "div[class*='supplierDetails__Name']",
            Role::SupplierLocation => "div[class*='supplierDetails__Location']",
            // Hidden overlay spans, one per star
            Role::SupplierRating => {
                "div[class*='supplierDetails__RatingDetails'] span[style*='visibility: hidden']"
            }
            Role::DetailImage => "div[class*='imageViewer__NavPicsWrapper'] img[data-src]",
            Role::DetailPrice => "div[class*='mainSupplier__PriceValue'] span",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

impl FromStr for Role {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase();
        Role::ALL
            .iter()
            .copied()
            .find(|role| role.key() == key)
            .ok_or_else(|| SelectorError::UnknownKey(s.to_string()))
    }
}

/// Errors building a selector map.
#[derive(Debug, Error)]
pub enum SelectorError {
    #[error("unknown selector key '{0}' (expected <page>.<role>, e.g. home.menu_row)")]
    UnknownKey(String),

    #[error("invalid selector for {key}: '{selector}': {reason}")]
    Invalid { key: String, selector: String, reason: String },
}

#[derive(Debug, Clone)]
struct Entry {
    source: String,
    compiled: Selector,
}

/// Compiled lookup table from role to selector.
#[derive(Debug, Clone)]
pub struct SelectorMap {
    // Indexed by `Role as usize`, same order as `Role::ALL`.
    entries: Vec<Entry>,
}

static DEFAULT_MAP: LazyLock<SelectorMap> = LazyLock::new(|| {
    SelectorMap::with_overrides(&BTreeMap::new()).expect("built-in selectors must parse")
});

impl Default for SelectorMap {
    fn default() -> Self {
        DEFAULT_MAP.clone()
    }
}

impl SelectorMap {
    /// Builds the map from the defaults, replacing entries named in `overrides`.
    pub fn with_overrides(overrides: &BTreeMap<String, String>) -> Result<Self, SelectorError> {
        let mut sources: Vec<String> =
            Role::ALL.iter().map(|role| role.default_selector().to_string()).collect();

        for (key, selector) in overrides {
            let role: Role = key.parse()?;
            sources[role as usize] = selector.clone();
        }

        let entries = Role::ALL
            .iter()
            .zip(sources)
            .map(|(role, source)| {
                let compiled = Selector::parse(&source).map_err(|e| SelectorError::Invalid {
                    key: role.key(),
                    selector: source.clone(),
                    reason: e.to_string(),
                })?;
                Ok(Entry { source, compiled })
            })
            .collect::<Result<Vec<_>, SelectorError>>()?;

        Ok(Self { entries })
    }

    /// Compiled selector for a role.
    pub fn get(&self, role: Role) -> &Selector {
        &self.entries[role as usize].compiled
    }

    /// Selector source text for a role.
    pub fn source(&self, role: Role) -> &str {
        &self.entries[role as usize].source
    }

    /// Iterates `(page, role, selector)` in table order.
    pub fn iter(&self) -> impl Iterator<Item = (PageKind, Role, &str)> {
        Role::ALL.iter().map(move |role| (role.page(), *role, self.source(*role)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roles_in_table_order() {
        for (i, role) in Role::ALL.iter().enumerate() {
            assert_eq!(*role as usize, i, "{} out of order", role);
        }
    }

    #[test]
    fn test_default_map_parses() {
        let map = SelectorMap::default();
        assert_eq!(map.iter().count(), Role::ALL.len());
        assert_eq!(map.source(Role::CategoryHeading), "h1#category");
    }

    #[test]
    fn test_role_keys() {
        assert_eq!(Role::MenuRow.key(), "home.menu_row");
        assert_eq!(Role::CategoryHeading.key(), "category.heading");
        assert_eq!(Role::ProductHeading.key(), "product.heading");
        assert_eq!(Role::Pagination.key(), "product.pagination");
        assert_eq!(Role::DetailTitle.key(), "detail.title");
        assert_eq!(Role::SupplierRating.key(), "detail.supplier_rating");
    }

    #[test]
    fn test_role_from_key() {
        assert_eq!("home.menu_item".parse::<Role>().unwrap(), Role::MenuItem);
        assert_eq!("PRODUCT.HEADING".parse::<Role>().unwrap(), Role::ProductHeading);
        assert!(matches!("menu_item".parse::<Role>(), Err(SelectorError::UnknownKey(_))));
    }

    #[test]
    fn test_override_replaces_single_entry() {
        let mut overrides = BTreeMap::new();
        overrides.insert("category.heading".to_string(), "h1.title".to_string());

        let map = SelectorMap::with_overrides(&overrides).unwrap();
        assert_eq!(map.source(Role::CategoryHeading), "h1.title");
        assert_eq!(map.source(Role::ProductHeading), "h1#category");
    }

    #[test]
    fn test_override_invalid_selector() {
        let mut overrides = BTreeMap::new();
        overrides.insert("home.menu_row".to_string(), "div[[".to_string());

        let err = SelectorMap::with_overrides(&overrides).unwrap_err();
        assert!(err.to_string().contains("home.menu_row"));
    }

    #[test]
    fn test_override_unknown_key() {
        let mut overrides = BTreeMap::new();
        overrides.insert("checkout.button".to_string(), "button".to_string());

        assert!(matches!(
            SelectorMap::with_overrides(&overrides),
            Err(SelectorError::UnknownKey(_))
        ));
    }

    #[test]
    fn test_every_role_has_a_page() {
        let pages: Vec<_> = Role::ALL.iter().map(|r| r.page()).collect();
        assert!(pages.contains(&PageKind::Home));
        assert!(pages.contains(&PageKind::Category));
        assert!(pages.contains(&PageKind::Product));
        assert!(pages.contains(&PageKind::Detail));
    }
}
