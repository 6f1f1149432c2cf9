//! Command output rendering
//!
//! Results are serialized to JSON values first; the table view then picks
//! columns out of them by dotted path.

use anyhow::Result;
use clap::ValueEnum;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Yaml,
}

/// One table column
pub struct ColumnDef {
    pub header: &'static str,
    pub json_path: &'static str,
    pub width: usize,
}

const fn col(header: &'static str, json_path: &'static str, width: usize) -> ColumnDef {
    ColumnDef {
        header,
        json_path,
        width,
    }
}

pub const LOCATION_COLUMNS: &[ColumnDef] = &[col("NAME", "name", 20), col("DISPLAY NAME", "display_name", 30)];

pub const SIZE_COLUMNS: &[ColumnDef] = &[
    col("NAME", "name", 28),
    col("RAM (MB)", "ram_mb", 10),
    col("DISK (MB)", "disk_mb", 10),
    col("CORES", "extra.numberOfCores", 6),
];

pub const NODE_COLUMNS: &[ColumnDef] = &[
    col("NAME", "name", 24),
    col("STATE", "state", 10),
    col("PUBLIC IPS", "public_ips", 18),
    col("PRIVATE IPS", "private_ips", 18),
    col("LOCATION", "extra.location", 14),
    col("SIZE", "extra.vmSize", 18),
];

pub const IMAGE_COLUMNS: &[ColumnDef] = &[
    col("PUBLISHER", "publisher", 24),
    col("OFFER", "offer", 24),
    col("SKU", "sku", 20),
    col("OS", "os", 8),
    col("VERSION", "version", 18),
    col("LOCATION", "location", 14),
];

pub const NETWORK_COLUMNS: &[ColumnDef] = &[
    col("NAME", "name", 24),
    col("LOCATION", "location", 14),
    col("SUBNETS", "subnets", 10),
    col("ID", "id", 60),
];

pub const SUBNET_COLUMNS: &[ColumnDef] = &[col("NAME", "name", 24), col("ID", "id", 80)];

/// Read a value by dotted path and format it for a table cell
pub fn extract_json_value(item: &Value, path: &str) -> String {
    let mut current = item;

    for part in path.split('.') {
        let next = match part.parse::<usize>() {
            Ok(idx) => current.get(idx),
            Err(_) => current.get(part),
        };
        current = match next {
            Some(v) => v,
            None => return "-".to_string(),
        };
    }

    match current {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "-".to_string(),
        Value::Array(arr) if arr.iter().all(|v| v.is_string()) => {
            if arr.is_empty() {
                return "-".to_string();
            }
            arr.iter()
                .filter_map(|v| v.as_str())
                .collect::<Vec<_>>()
                .join(",")
        },
        Value::Array(arr) => format!("[{} items]", arr.len()),
        Value::Object(_) => "[object]".to_string(),
    }
}

fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        return value.to_string();
    }
    let mut cut: String = value.chars().take(width.saturating_sub(1)).collect();
    cut.push('~');
    cut
}

/// Render rows as a fixed-width table
pub fn render_table(rows: &[Value], columns: &[ColumnDef]) -> String {
    let mut lines = Vec::with_capacity(rows.len() + 1);

    let header: Vec<String> = columns
        .iter()
        .map(|c| format!("{:<width$}", c.header, width = c.width))
        .collect();
    lines.push(header.join("  ").trim_end().to_string());

    for row in rows {
        let cells: Vec<String> = columns
            .iter()
            .map(|c| {
                let value = truncate(&extract_json_value(row, c.json_path), c.width);
                format!("{:<width$}", value, width = c.width)
            })
            .collect();
        lines.push(cells.join("  ").trim_end().to_string());
    }

    lines.join("\n")
}

/// Render a list of results in the requested format
pub fn render<T: Serialize>(items: &[T], columns: &[ColumnDef], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(items)?),
        OutputFormat::Yaml => Ok(serde_yaml::to_string(items)?),
        OutputFormat::Table => {
            let rows = items
                .iter()
                .map(serde_json::to_value)
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(render_table(&rows, columns))
        },
    }
}
