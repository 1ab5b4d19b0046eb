//! Insert-only, name-keyed entity sets for companies and manufacturers.

use crate::expo::models::{Company, Manufacturer, ProductLink};
use std::collections::HashMap;

/// Identity key for a name: whitespace-collapsed and case-folded.
pub fn name_key(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// A set of records keyed by name. The first record for a name wins.
#[derive(Debug, Clone)]
pub struct Registry<T> {
    index: HashMap<String, usize>,
    records: Vec<T>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self { index: HashMap::new(), records: Vec::new() }
    }
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts the record built by `make` unless `name` is already present.
    ///
    /// Returns true when a record was created. Blank names are ignored.
    pub fn insert_with(&mut self, name: &str, make: impl FnOnce(String) -> T) -> bool {
        let key = name_key(name);
        if key.is_empty() || self.index.contains_key(&key) {
            return false;
        }

        let display = name.split_whitespace().collect::<Vec<_>>().join(" ");
        self.index.insert(key, self.records.len());
        self.records.push(make(display));
        true
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        self.index.get(&name_key(name)).map(|&i| &self.records[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(&name_key(name))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.records.iter()
    }

    pub fn into_vec(self) -> Vec<T> {
        self.records
    }
}

/// Companies and manufacturers collected over one run.
#[derive(Debug, Clone, Default)]
pub struct EntityRegistry {
    companies: Registry<Company>,
    manufacturers: Registry<Manufacturer>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Batch-creates companies listed on `source_url`. Returns how many were new.
    pub fn add_companies<'a>(
        &mut self,
        names: impl IntoIterator<Item = &'a String>,
        source_url: &str,
    ) -> usize {
        names
            .into_iter()
            .filter(|name| {
                self.companies
                    .insert_with(name, |name| Company { name, source_url: source_url.to_string() })
            })
            .count()
    }

    /// Adds manufacturers seen on `link`'s page. Returns how many were new.
    pub fn add_manufacturers<'a>(
        &mut self,
        names: impl IntoIterator<Item = &'a String>,
        link: &ProductLink,
    ) -> usize {
        names
            .into_iter()
            .filter(|name| {
                self.manufacturers.insert_with(name, |name| Manufacturer {
                    name,
                    product: link.name.clone(),
                    category: link.category.clone(),
                })
            })
            .count()
    }

    pub fn companies(&self) -> &Registry<Company> {
        &self.companies
    }

    pub fn manufacturers(&self) -> &Registry<Manufacturer> {
        &self.manufacturers
    }

    /// Consumes the registry into `(companies, manufacturers)`.
    pub fn into_parts(self) -> (Vec<Company>, Vec<Manufacturer>) {
        (self.companies.into_vec(), self.manufacturers.into_vec())
    }
}
