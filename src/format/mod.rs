//! Output formatting for crawl results (table, JSON, CSV, XLSX).

pub mod xlsx;

use crate::config::OutputFormat;
use crate::expo::models::{Category, CrawlReport, ProductDetail};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

/// One tabular view of the report: a sheet in XLSX, a section in CSV.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sheet {
    pub name: &'static str,
    pub headers: &'static [&'static str],
    pub rows: Vec<Vec<String>>,
}

/// Flattens a report into one sheet per entity type, plus failures.
pub fn sheets(report: &CrawlReport) -> Vec<Sheet> {
    vec![
        Sheet {
            name: "Categories",
            headers: &["Section", "Name", "URL"],
            rows: report
                .categories
                .iter()
                .map(|c| vec![c.section.clone(), c.name.clone(), c.url.clone()])
                .collect(),
        },
        Sheet {
            name: "Product Links",
            headers: &["Category", "Name", "URL", "Image"],
            rows: report
                .product_links
                .iter()
                .map(|l| {
                    vec![
                        l.category.clone(),
                        l.name.clone(),
                        l.url.clone(),
                        l.image_url.clone().unwrap_or_default(),
                    ]
                })
                .collect(),
        },
        Sheet {
            name: "Products",
            headers: &["Product Link", "Title", "Description", "Features", "Video", "URL"],
            rows: report
                .products
                .iter()
                .map(|p| {
                    vec![
                        p.product.clone(),
                        p.title.clone(),
                        p.description.clone(),
                        p.features.join("; "),
                        if p.has_video { "yes" } else { "no" }.to_string(),
                        p.url.clone().unwrap_or_default(),
                    ]
                })
                .collect(),
        },
        Sheet {
            name: "Product Details",
            headers: &[
                "Product Link",
                "Title",
                "Model",
                "Tags",
                "Description",
                "Characteristics",
                "Catalog",
                "Video",
                "Supplier",
                "Supplier Location",
                "Supplier Rating",
                "Images",
                "Price",
                "Currency",
                "URL",
            ],
            rows: report.details.iter().map(detail_row).collect(),
        },
        Sheet {
            name: "Companies",
            headers: &["Name", "Source URL"],
            rows: report
                .companies
                .iter()
                .map(|c| vec![c.name.clone(), c.source_url.clone()])
                .collect(),
        },
        Sheet {
            name: "Manufacturers",
            headers: &["Name", "Product Link", "Category"],
            rows: report
                .manufacturers
                .iter()
                .map(|m| vec![m.name.clone(), m.product.clone(), m.category.clone()])
                .collect(),
        },
        Sheet {
            name: "Failures",
            headers: &["Kind", "URL", "Reason"],
            rows: report
                .failures
                .iter()
                .map(|f| vec![f.kind.to_string(), f.url.clone(), f.reason.clone()])
                .collect(),
        },
    ]
}

fn detail_row(d: &ProductDetail) -> Vec<String> {
    let characteristics = d
        .characteristics
        .iter()
        .map(|c| format!("{}: {}", c.name, c.value))
        .collect::<Vec<_>>()
        .join("; ");
    let catalog = match d.catalog_available {
        Some(true) => "yes",
        Some(false) => "no",
        None => "",
    };

    vec![
        d.product.clone(),
        d.title.clone(),
        d.model.clone().unwrap_or_default(),
        d.tags.join("; "),
        d.description.clone(),
        characteristics,
        catalog.to_string(),
        d.video_url.clone().unwrap_or_default(),
        d.supplier.clone().unwrap_or_default(),
        d.supplier_location.clone().unwrap_or_default(),
        d.supplier_rating.to_string(),
        d.images.join("; "),
        d.price.clone().unwrap_or_default(),
        d.currency.clone().unwrap_or_default(),
        d.url.clone(),
    ]
}

/// Formats results for terminal or text-file output.
pub struct Formatter {
    format: OutputFormat,
}

impl Formatter {
    /// Creates a new formatter.
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a full crawl report. XLSX is binary, so it gets the table summary.
    pub fn format_report(&self, report: &CrawlReport) -> String {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string())
            }
            OutputFormat::Csv => Self::csv_sheets(&sheets(report)),
            OutputFormat::Table | OutputFormat::Xlsx => self.table_summary(report),
        }
    }

    /// Formats the category list read from the homepage menu.
    pub fn format_categories(&self, categories: &[Category]) -> String {
        if categories.is_empty() {
            return match self.format {
                OutputFormat::Json => "[]".to_string(),
                OutputFormat::Csv => "section,name,url".to_string(),
                _ => "No categories found.".to_string(),
            };
        }

        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(categories).unwrap_or_else(|_| "[]".to_string())
            }
            OutputFormat::Csv => {
                let mut lines = vec!["section,name,url".to_string()];
                for c in categories {
                    lines.push(format!(
                        "{},{},{}",
                        Self::csv_escape(&c.section),
                        Self::csv_escape(&c.name),
                        Self::csv_escape(&c.url)
                    ));
                }
                lines.join("\n")
            }
            OutputFormat::Table | OutputFormat::Xlsx => self.table_categories(categories),
        }
    }

    // Table formatting

    fn table_summary(&self, report: &CrawlReport) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Categories:     {}", report.categories.len()));
        lines.push(format!("Product links:  {}", report.product_links.len()));
        lines.push(format!("Products:       {}", report.products.len()));
        lines.push(format!("Details:        {}", report.details.len()));
        lines.push(format!("Companies:      {}", report.companies.len()));
        lines.push(format!("Manufacturers:  {}", report.manufacturers.len()));
        lines.push(format!("Failures:       {}", report.failures.len()));

        if report.is_partial() {
            lines.push(String::new());
            lines.push("Skipped branches:".to_string());
            for failure in &report.failures {
                lines.push(format!("  [{}] {}", failure.kind, failure.url));
                lines.push(format!("      {}", failure.reason));
            }
        }

        lines.join("\n")
    }

    fn table_categories(&self, categories: &[Category]) -> String {
        let section_width = 28;
        let name_width = 40;

        let mut lines = Vec::new();

        lines.push(format!("{:<section_width$}  {:<name_width$}  {}", "Section", "Name", "URL"));
        lines.push(format!("{:-<section_width$}  {:-<name_width$}  {:-<10}", "", "", ""));

        for c in categories {
            lines.push(format!(
                "{:<section_width$}  {:<name_width$}  {}",
                truncate(&c.section, section_width),
                truncate(&c.name, name_width),
                c.url
            ));
        }

        lines.push(String::new());
        lines.push(format!("Total: {} categories", categories.len()));

        lines.join("\n")
    }

    // CSV formatting

    fn csv_sheets(sheets: &[Sheet]) -> String {
        let mut sections = Vec::new();

        for sheet in sheets {
            let mut lines = Vec::new();
            lines.push(format!("# {}", sheet.name));
            lines.push(sheet.headers.iter().map(|h| Self::csv_escape(h)).collect::<Vec<_>>().join(","));
            for row in &sheet.rows {
                lines.push(row.iter().map(|v| Self::csv_escape(v)).collect::<Vec<_>>().join(","));
            }
            sections.push(lines.join("\n"));
        }

        sections.join("\n\n")
    }

    fn csv_escape(s: &str) -> String {
        if s.contains(',') || s.contains('"') || s.contains('\n') {
            format!("\"{}\"", s.replace('"', "\"\""))
        } else {
            s.to_string()
        }
    }
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() > width {
        let head: String = s.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", head)
    } else {
        s.to_string()
    }
}

/// Default export file name, stamped with the local time.
pub fn export_file_name(format: OutputFormat) -> Option<String> {
    let ext = format.extension()?;
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    Some(format!("expo_catalog_{}.{}", stamp, ext))
}

/// Writes the report to disk in the given format.
///
/// `output` names the file explicitly; otherwise a timestamped file is created
/// in `output_dir`. Returns `None` for formats that are only printed.
pub fn export(
    report: &CrawlReport,
    format: OutputFormat,
    output_dir: &Path,
    output: Option<&Path>,
) -> Result<Option<PathBuf>> {
    let Some(file_name) = export_file_name(format) else {
        return Ok(None);
    };

    let path = match output {
        Some(path) => path.to_path_buf(),
        None => output_dir.join(file_name),
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    match format {
        OutputFormat::Xlsx => xlsx::write_workbook(&sheets(report), &path)?,
        _ => {
            let body = Formatter::new(format).format_report(report);
            std::fs::write(&path, body)
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
    }

    info!("Exported results to {}", path.display());
    Ok(Some(path))
}
