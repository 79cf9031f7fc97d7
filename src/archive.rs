//! Bundling of produced storage and report files.
//!
//! The bundle is a JSON manifest holding every file's contents, compressed
//! with ZStandard and named after the run identifier.

use crate::storage::SectionStorage;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// ZStandard compression level for bundles.
const COMPRESSION_LEVEL: i32 = 16;

/// One file inside a bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundledFile {
    /// File name relative to the output directory.
    pub name: String,
    /// Uncompressed size in bytes.
    pub bytes: u64,
    pub contents: String,
}

/// Contents of a `.bundle.json.zst` file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bundle {
    pub run_id: String,
    pub created_at: DateTime<Utc>,
    pub files: Vec<BundledFile>,
}

/// Bundle file name for a run; unsafe characters become `-`.
pub fn bundle_file_name(run_id: &str) -> String {
    let safe: String = run_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .collect();
    format!("{}.bundle.json.zst", safe)
}

/// Files belonging to a run: the section storage on disk plus the reports
/// this run wrote, sorted by name.
///
/// Reports left over from earlier runs are not included.
pub fn run_artifacts(storage: &SectionStorage, reports: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = storage.existing_files();
    files.extend(reports.iter().filter(|path| path.is_file()).cloned());
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    files.dedup();
    files
}

/// Write a bundle of `files` into `dir`. Returns the bundle path.
pub fn write_bundle(dir: &Path, run_id: &str, files: &[PathBuf]) -> Result<PathBuf> {
    let mut bundled = Vec::with_capacity(files.len());

    for path in files {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        debug!("Bundling {} ({} bytes)", name, contents.len());
        bundled.push(BundledFile {
            name,
            bytes: contents.len() as u64,
            contents,
        });
    }

    let bundle = Bundle {
        run_id: run_id.to_string(),
        created_at: Utc::now(),
        files: bundled,
    };

    let json = serde_json::to_vec(&bundle).context("Failed to serialize bundle")?;
    let compressed =
        zstd::bulk::compress(&json, COMPRESSION_LEVEL).context("Failed to compress bundle")?;

    let path = dir.join(bundle_file_name(run_id));
    std::fs::write(&path, &compressed)
        .with_context(|| format!("Failed to write bundle to {}", path.display()))?;

    info!(
        "Bundled {} files into {} ({} -> {} bytes)",
        bundle.files.len(),
        path.display(),
        json.len(),
        compressed.len()
    );
    Ok(path)
}

/// Read a bundle back.
#[allow(dead_code)] // Used to inspect bundles outside a run
pub fn read_bundle(path: &Path) -> Result<Bundle> {
    let compressed =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let json = zstd::decode_all(compressed.as_slice()).context("Failed to decompress bundle")?;
    serde_json::from_slice(&json).context("Failed to parse bundle")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::OutputFormat;
    use crate::models::ReportMetadata;
    use crate::parsing::{split, DedupPolicy};
    use crate::report;
    use tempfile::TempDir;

    #[test]
    fn test_bundle_file_name() {
        assert_eq!(bundle_file_name("niv-mizzet-parun"), "niv-mizzet-parun.bundle.json.zst");
        assert_eq!(bundle_file_name("izzet/2024 run"), "izzet-2024-run.bundle.json.zst");
    }

    #[test]
    fn test_run_artifacts_sorted_storage_and_reports() {
        let dir = TempDir::new().unwrap();
        let storage = SectionStorage::new(dir.path());
        for name in ["sideboard.txt", "deck.txt", "card_averages_deck.md", "notes.txt"] {
            std::fs::write(dir.path().join(name), "x").unwrap();
        }

        let reports = vec![dir.path().join("card_averages_deck.md")];
        let names: Vec<String> = run_artifacts(&storage, &reports)
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["card_averages_deck.md", "deck.txt", "sideboard.txt"]);
    }

    #[test]
    fn test_fresh_run_bundles_only_current_reports() {
        let dir = TempDir::new().unwrap();
        let storage = SectionStorage::new(dir.path());
        let metadata = ReportMetadata {
            archetype: "niv".to_string(),
            generated_at: Utc::now(),
            decks_parsed: None,
            dedup_within_deck: true,
        };

        // Earlier run: Companion and Deck, Markdown, plus a CSV from another format.
        storage.prepare(false).unwrap();
        storage
            .append_split(&split("Companion\n1 Lurrus\nDeck\n4 Opt", DedupPolicy::WithinDeck))
            .unwrap();
        let reports = report::build_reports(&storage).unwrap();
        report::write_reports(dir.path(), &reports, &metadata, OutputFormat::Markdown).unwrap();
        report::write_reports(dir.path(), &reports, &metadata, OutputFormat::Csv).unwrap();

        // Fresh run storing Deck only.
        storage.prepare(true).unwrap();
        storage.append_split(&split("Deck\n2 Shock", DedupPolicy::WithinDeck)).unwrap();
        let reports = report::build_reports(&storage).unwrap();
        let written =
            report::write_reports(dir.path(), &reports, &metadata, OutputFormat::Markdown).unwrap();

        let files = run_artifacts(&storage, &written);
        let path = write_bundle(dir.path(), "niv", &files).unwrap();
        let names: Vec<String> = read_bundle(&path)
            .unwrap()
            .files
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(names, vec!["card_averages_deck.md", "deck.txt"]);
    }

    #[test]
    fn test_write_and_read_bundle() {
        let dir = TempDir::new().unwrap();
        let storage = SectionStorage::new(dir.path());
        std::fs::write(dir.path().join("deck.txt"), "4 Opt\n\n").unwrap();
        std::fs::write(dir.path().join("card_averages_deck.csv"), "Card Name\n").unwrap();

        let files = run_artifacts(&storage, &[dir.path().join("card_averages_deck.csv")]);
        let path = write_bundle(dir.path(), "niv", &files).unwrap();
        assert!(path.ends_with("niv.bundle.json.zst"));

        let bundle = read_bundle(&path).unwrap();
        assert_eq!(bundle.run_id, "niv");
        assert_eq!(bundle.files.len(), 2);
        assert_eq!(bundle.files[1].name, "deck.txt");
        assert_eq!(bundle.files[1].contents, "4 Opt\n\n");
        assert_eq!(bundle.files[1].bytes, 7);
    }
}
