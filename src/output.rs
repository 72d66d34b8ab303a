//! Plain-text and CSV rendering of a list page

use anyhow::Result;
use serde_json::Value;
use std::io::Write;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::list_state::ListSnapshot;
use crate::models::Record;

const MAX_CELL_WIDTH: usize = 32;

/// A column to print: record key and header label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputColumn {
    pub key: String,
    pub label: String,
}

/// Columns to print for a snapshot: the user's visible columns, else the
/// server headers, else the keys of the first record
pub fn columns_for(snapshot: &ListSnapshot) -> Vec<OutputColumn> {
    let visible: Vec<OutputColumn> = snapshot
        .columns
        .custom_fields()
        .iter()
        .filter(|column| column.visible)
        .map(|column| OutputColumn {
            key: column.name.clone(),
            label: column.label.clone(),
        })
        .collect();
    if !visible.is_empty() {
        return visible;
    }

    if !snapshot.headers.is_empty() {
        return snapshot
            .headers
            .iter()
            .map(|header| OutputColumn {
                key: header.name.clone(),
                label: header.label.clone(),
            })
            .collect();
    }

    snapshot
        .docs
        .first()
        .map(|record| {
            record
                .keys()
                .filter(|key| !key.starts_with('_'))
                .map(|key| OutputColumn {
                    key: key.clone(),
                    label: key.clone(),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Display text of one record field
pub fn cell_text(record: &Record, key: &str) -> String {
    match record.get(key) {
        None | Some(Value::Null) => "-".to_string(),
        Some(Value::String(text)) => text.clone(),
        Some(Value::Bool(flag)) => (if *flag { "Yes" } else { "No" }).to_string(),
        Some(Value::Object(object)) => object
            .get("label")
            .or_else(|| object.get("name"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| Value::Object(object.clone()).to_string()),
        Some(other) => other.to_string(),
    }
}

/// Aligned table with one header row
pub fn render_table(columns: &[OutputColumn], docs: &[Record]) -> String {
    let rows: Vec<Vec<String>> = docs
        .iter()
        .map(|record| columns.iter().map(|c| cell_text(record, &c.key)).collect())
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, column)| {
            rows.iter()
                .map(|row| row[i].width())
                .chain(std::iter::once(column.label.width()))
                .max()
                .unwrap_or(0)
                .min(MAX_CELL_WIDTH)
        })
        .collect();

    let mut out = String::new();
    let header: Vec<String> = columns
        .iter()
        .zip(&widths)
        .map(|(column, width)| fit(&column.label, *width))
        .collect();
    out.push_str(header.join("  ").trim_end());
    out.push('\n');

    let rule: Vec<String> = widths.iter().map(|width| "-".repeat(*width)).collect();
    out.push_str(&rule.join("  "));
    out.push('\n');

    for row in rows {
        let cells: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, width)| fit(cell, *width))
            .collect();
        out.push_str(cells.join("  ").trim_end());
        out.push('\n');
    }
    out
}

/// Write the page as CSV with a header row of labels
pub fn write_csv<W: Write>(writer: W, columns: &[OutputColumn], docs: &[Record]) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(columns.iter().map(|column| column.label.as_str()))?;
    for record in docs {
        csv.write_record(columns.iter().map(|column| cell_text(record, &column.key)))?;
    }
    csv.flush()?;
    Ok(())
}

/// Summary line such as "Showing 16-30 of 100 (page 2 of 7)"
pub fn page_summary(snapshot: &ListSnapshot) -> String {
    let pagination = &snapshot.pagination;
    if snapshot.is_empty() {
        return "No records found".to_string();
    }
    format!(
        "Showing {}-{} of {} (page {} of {})",
        pagination.first_record(),
        pagination.last_record(),
        pagination.total,
        pagination.page,
        pagination.pages
    )
}

/// Pad or truncate to an exact display width
fn fit(s: &str, max_width: usize) -> String {
    let display_width = s.width();
    if display_width <= max_width {
        return format!("{}{}", s, " ".repeat(max_width - display_width));
    }

    let target_width = max_width.saturating_sub(1);
    let mut truncated = String::new();
    let mut current_width = 0;
    for ch in s.chars() {
        let ch_width = ch.width().unwrap_or(0);
        if current_width + ch_width > target_width {
            break;
        }
        truncated.push(ch);
        current_width += ch_width;
    }

    let padding = max_width.saturating_sub(current_width + 1);
    format!("{}…{}", truncated, " ".repeat(padding))
}
