//! Per-section text storage.
//!
//! Every processed deck appends its accepted lines to one file per section
//! (`deck.txt`, `sideboard.txt`, ...) as `<quantity> <card name>` lines,
//! followed by a blank line marking the deck boundary. Reading a file back
//! and aggregating it reproduces the in-memory statistics.

use crate::analysis::SectionStore;
use crate::models::{SectionKey, SectionSplit};
use crate::parsing::parse_card_line;
use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};
use walkdir::WalkDir;

/// Section files rooted in an output directory.
#[derive(Debug, Clone)]
pub struct SectionStorage {
    dir: PathBuf,
}

impl SectionStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[allow(dead_code)]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name used for a section (`commander.txt`, ...).
    pub fn file_name(key: SectionKey) -> String {
        format!("{}.txt", key.slug())
    }

    pub fn path_for(&self, key: SectionKey) -> PathBuf {
        self.dir.join(Self::file_name(key))
    }

    /// Create the output directory; with `fresh`, drop existing section
    /// files and the section reports generated from them.
    pub fn prepare(&self, fresh: bool) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create output directory: {}", self.dir.display()))?;

        if fresh {
            for path in self.existing_files() {
                debug!("Removing previous storage file {}", path.display());
                fs::remove_file(&path)
                    .with_context(|| format!("Failed to remove {}", path.display()))?;
            }
            for path in self.previous_reports() {
                debug!("Removing previous report {}", path.display());
                fs::remove_file(&path)
                    .with_context(|| format!("Failed to remove {}", path.display()))?;
            }
        }

        Ok(())
    }

    /// `card_averages_<section>.*` files in the output directory, any format.
    fn previous_reports(&self) -> Vec<PathBuf> {
        let prefixes: Vec<String> = SectionKey::ALL
            .into_iter()
            .map(|key| format!("card_averages_{}.", key.slug()))
            .collect();

        WalkDir::new(&self.dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                let name = entry.file_name().to_string_lossy();
                prefixes.iter().any(|prefix| name.starts_with(prefix.as_str()))
            })
            .map(|entry| entry.into_path())
            .collect()
    }

    /// Append every non-empty section of a deck. Returns lines written.
    pub fn append_split(&self, split: &SectionSplit) -> Result<usize> {
        let mut written = 0;

        for (key, lines) in split.iter() {
            if lines.is_empty() {
                continue;
            }

            let mut block = String::new();
            for line in lines {
                block.push_str(&line.to_string());
                block.push('\n');
            }
            block.push('\n');

            let path = self.path_for(key);
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            file.write_all(block.as_bytes())
                .with_context(|| format!("Failed to append to {}", path.display()))?;

            written += lines.len();
        }

        Ok(written)
    }

    /// Load a section back from disk; `None` when its file does not exist.
    ///
    /// Blank lines and `#` comment lines are ignored, as are lines that do
    /// not parse as card lines.
    pub fn load(&self, key: SectionKey) -> Result<Option<SectionStore>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let lines = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| {
                let parsed = parse_card_line(line);
                if parsed.is_none() {
                    trace!("Skipping unparseable stored line in {}: {}", path.display(), line);
                }
                parsed
            })
            .collect();

        Ok(Some(SectionStore::from_lines(lines)))
    }

    /// Section files currently present on disk.
    pub fn existing_files(&self) -> Vec<PathBuf> {
        SectionKey::ALL
            .into_iter()
            .map(|key| self.path_for(key))
            .filter(|path| path.exists())
            .collect()
    }
}
