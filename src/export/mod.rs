//! Output sinks for extracted permission records.

use crate::model::PermissionRecord;
use anyhow::{Context, Result};
use clap::ValueEnum;
use std::io::Write;
use std::path::Path;

pub mod csv;
pub mod graph;

#[derive(ValueEnum, Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExportFormat {
    /// Pretty-printed JSON array.
    Json,
    /// One JSON record per line.
    Jsonl,
    /// Comma separated, roles joined by `;`.
    Csv,
    /// JSON access graph of routes and roles.
    Graph,
    /// Cypher MERGE script for graph-store ingestion.
    Cypher,
}

pub fn render(records: &[PermissionRecord], format: ExportFormat) -> Result<String> {
    let rendered = match format {
        ExportFormat::Json => serde_json::to_string_pretty(records)? + "\n",
        ExportFormat::Jsonl => {
            let mut out = String::new();
            for record in records {
                out.push_str(&serde_json::to_string(record)?);
                out.push('\n');
            }
            out
        }
        ExportFormat::Csv => csv::to_csv(records),
        ExportFormat::Graph => {
            serde_json::to_string_pretty(&graph::AccessGraph::from_records(records))? + "\n"
        }
        ExportFormat::Cypher => graph::AccessGraph::from_records(records).to_cypher(),
    };
    Ok(rendered)
}

/// Writes to `out`, or stdout when no path is given.
pub fn write_output(content: &str, out: Option<&Path>) -> Result<()> {
    match out {
        Some(path) => {
            crate::util::ensure_parent_dir(path)?;
            std::fs::write(path, content).with_context(|| format!("write {}", path.display()))
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(content.as_bytes())
                .with_context(|| "write stdout")?;
            stdout.flush().with_context(|| "flush stdout")
        }
    }
}
