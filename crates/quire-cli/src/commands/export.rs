use std::collections::BTreeMap;
use std::path::Path;

use quire_core::export::{render_export, ExportFormat as RenderFormat};
use quire_core::HybridStorage;

use crate::cli::ExportFormat;
use crate::error::CliError;

pub fn run_export(
    format: ExportFormat,
    output_path: Option<&Path>,
    storage: &HybridStorage,
) -> Result<(), CliError> {
    let snapshot = storage.local().export()?;
    let rendered = render_export(&snapshot, render_format(format))?;

    if let Some(path) = output_path {
        std::fs::write(path, rendered)?;
        println!("{}", path.display());
    } else {
        println!("{rendered}");
    }

    Ok(())
}

/// Replace the local store with the articles of an export file. The hosted
/// table picks them up on the next sync.
pub fn run_import(path: &Path, storage: &HybridStorage) -> Result<(), CliError> {
    let raw = std::fs::read_to_string(path)?;
    let records = parse_import(&raw)?;

    let summary = storage.local().import(records)?;
    println!("Imported {} of {} articles", summary.imported, summary.total);
    Ok(())
}

/// Accept either a full export document or a bare id → article map.
pub fn parse_import(raw: &str) -> Result<BTreeMap<String, serde_json::Value>, CliError> {
    let value: serde_json::Value = serde_json::from_str(raw)?;
    let articles = match value {
        serde_json::Value::Object(mut document) if document.contains_key("articles") => {
            document.remove("articles").unwrap_or_default()
        }
        other => other,
    };

    match articles {
        serde_json::Value::Object(map) => Ok(map.into_iter().collect()),
        _ => Err(CliError::InvalidImport(
            "expected an object of articles keyed by id".to_string(),
        )),
    }
}

const fn render_format(format: ExportFormat) -> RenderFormat {
    match format {
        ExportFormat::Json => RenderFormat::Json,
        ExportFormat::Markdown => RenderFormat::Markdown,
    }
}
