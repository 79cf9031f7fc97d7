//! Report generation.
//!
//! Builds one [`SectionReport`] per section from storage and renders it
//! as Markdown, JSON or CSV into `card_averages_<section>.<ext>`.

use crate::analysis::aggregate;
use crate::cli::OutputFormat;
use crate::models::{format_median, AggregateRow, ReportMetadata, SectionKey, SectionReport};
use crate::storage::SectionStorage;
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Aggregate every section that has storage on disk.
///
/// Sections without a storage file are skipped entirely.
pub fn build_reports(storage: &SectionStorage) -> Result<Vec<SectionReport>> {
    let mut reports = Vec::new();

    for section in SectionKey::ALL {
        match storage.load(section)? {
            Some(store) => {
                let rows = aggregate(&store);
                info!("{}: {} lines, {} distinct cards", section, store.len(), rows.len());
                reports.push(SectionReport { section, rows });
            }
            None => {
                warn!(
                    "File {} not found, skipping {} report",
                    SectionStorage::file_name(section),
                    section
                );
            }
        }
    }

    Ok(reports)
}

/// File name for a section report in a given format.
pub fn report_file_name(section: SectionKey, format: OutputFormat) -> String {
    format!("card_averages_{}.{}", section.slug(), format.extension())
}

/// Render a section report.
pub fn render_report(
    report: &SectionReport,
    metadata: &ReportMetadata,
    format: OutputFormat,
) -> Result<String> {
    match format {
        OutputFormat::Markdown => Ok(generate_markdown_report(report, metadata)),
        OutputFormat::Json => generate_json_report(report, metadata),
        OutputFormat::Csv => Ok(generate_csv_report(report)),
    }
}

/// Write every section report into `dir`. Returns the written paths.
pub fn write_reports(
    dir: &Path,
    reports: &[SectionReport],
    metadata: &ReportMetadata,
    format: OutputFormat,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(reports.len());

    for report in reports {
        let path = dir.join(report_file_name(report.section, format));
        let content = render_report(report, metadata, format)?;
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;

        info!("Report '{}' saved", path.display());
        written.push(path);
    }

    Ok(written)
}

/// Cell values of a row, in column order.
fn row_cells(row: &AggregateRow) -> [String; 5] {
    [
        row.card_name.clone(),
        row.total_count.to_string(),
        format!("{:.2}", row.average),
        format_median(row.median),
        row.mode.to_string(),
    ]
}

/// Generate a Markdown report for one section.
pub fn generate_markdown_report(report: &SectionReport, metadata: &ReportMetadata) -> String {
    let mut output = String::new();

    output.push_str(&format!("# Card Averages - {}\n\n", report.section));

    output.push_str(&format!("- **Archetype:** {}\n", metadata.archetype));
    output.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    if let Some(decks) = metadata.decks_parsed {
        output.push_str(&format!("- **Decks Parsed:** {}\n", decks));
    }
    output.push_str(&format!("- **Distinct Cards:** {}\n", report.rows.len()));
    if !metadata.dedup_within_deck {
        output.push_str("- **Duplicate lines kept:** yes\n");
    }
    output.push('\n');

    if report.rows.is_empty() {
        output.push_str("No cards recorded for this section.\n");
        return output;
    }

    output.push_str(&format!("| {} |\n", SectionReport::COLUMNS.join(" | ")));
    output.push_str("|:---|---:|---:|---:|---:|\n");

    for row in &report.rows {
        let cells = row_cells(row);
        let name = cells[0].replace('|', "\\|");
        output.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            name, cells[1], cells[2], cells[3], cells[4]
        ));
    }

    output
}

#[derive(Serialize)]
struct JsonReport<'a> {
    metadata: &'a ReportMetadata,
    #[serde(flatten)]
    report: &'a SectionReport,
}

/// Generate a JSON report for one section.
pub fn generate_json_report(report: &SectionReport, metadata: &ReportMetadata) -> Result<String> {
    serde_json::to_string_pretty(&JsonReport { metadata, report }).map_err(Into::into)
}

fn needs_quotes(field: &str) -> bool {
    field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r')
}

fn csv_field(field: &str) -> String {
    if needs_quotes(field) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Generate a CSV report for one section, header row first.
pub fn generate_csv_report(report: &SectionReport) -> String {
    let mut output = SectionReport::COLUMNS.join(",");
    output.push('\n');

    for row in &report.rows {
        let cells: Vec<String> = row_cells(row).iter().map(|c| csv_field(c)).collect();
        output.push_str(&cells.join(","));
        output.push('\n');
    }

    output
}
