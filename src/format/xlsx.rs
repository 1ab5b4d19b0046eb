//! XLSX workbook export, one worksheet per sheet.

use super::Sheet;
use anyhow::{Context, Result};
use rust_xlsxwriter::{Format, Workbook};
use std::collections::HashSet;
use std::path::Path;

/// Longest worksheet name Excel accepts.
const MAX_SHEET_NAME: usize = 31;

/// Makes `name` a valid worksheet name: no `/\*[]:?`, at most 31 characters.
pub fn sanitize_sheet_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !matches!(c, '/' | '\\' | '*' | '[' | ']' | ':' | '?'))
        .collect();
    let cleaned: String = cleaned.trim().trim_matches('\'').chars().take(MAX_SHEET_NAME).collect();

    if cleaned.trim().is_empty() {
        "Sheet".to_string()
    } else {
        cleaned.trim_end().to_string()
    }
}

/// Sanitized name that does not collide (case-insensitively) with `taken`.
fn unique_sheet_name(name: &str, taken: &mut HashSet<String>) -> String {
    let base = sanitize_sheet_name(name);
    let mut candidate = base.clone();
    let mut n = 2;

    while !taken.insert(candidate.to_lowercase()) {
        let suffix = format!(" ({})", n);
        let keep = MAX_SHEET_NAME.saturating_sub(suffix.len());
        candidate = format!("{}{}", base.chars().take(keep).collect::<String>().trim_end(), suffix);
        n += 1;
    }

    candidate
}

/// Writes `sheets` to an XLSX workbook at `path`.
pub fn write_workbook(sheets: &[Sheet], path: &Path) -> Result<()> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();
    let mut taken = HashSet::new();

    for sheet in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(unique_sheet_name(sheet.name, &mut taken))?;

        for (col, title) in sheet.headers.iter().enumerate() {
            worksheet.write_string_with_format(0, col as u16, *title, &header)?;
        }

        for (i, row) in sheet.rows.iter().enumerate() {
            let row_num = u32::try_from(i + 1).context("Too many rows for a worksheet")?;
            for (col, value) in row.iter().enumerate() {
                worksheet.write_string(row_num, col as u16, value)?;
            }
        }

        worksheet.set_freeze_panes(1, 0)?;
        worksheet.autofit();
    }

    workbook
        .save(path)
        .with_context(|| format!("Failed to save workbook {}", path.display()))?;
    Ok(())
}
