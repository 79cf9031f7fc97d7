//! Data models for the decklist harvester.
//!
//! This module contains the core data structures shared by the splitter,
//! the aggregator, storage and report generation.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// One of the four fixed card-list roles of a decklist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum SectionKey {
    Commander,
    Companion,
    Deck,
    Sideboard,
}

impl SectionKey {
    /// All sections, in header-matching order.
    pub const ALL: [SectionKey; 4] = [
        SectionKey::Commander,
        SectionKey::Companion,
        SectionKey::Deck,
        SectionKey::Sideboard,
    ];

    /// The literal keyword that introduces this section in a decklist.
    pub fn keyword(&self) -> &'static str {
        match self {
            SectionKey::Commander => "Commander",
            SectionKey::Companion => "Companion",
            SectionKey::Deck => "Deck",
            SectionKey::Sideboard => "Sideboard",
        }
    }

    /// Lower-case name used for storage and report file names.
    pub fn slug(&self) -> &'static str {
        match self {
            SectionKey::Commander => "commander",
            SectionKey::Companion => "companion",
            SectionKey::Deck => "deck",
            SectionKey::Sideboard => "sideboard",
        }
    }
}

impl fmt::Display for SectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.keyword())
    }
}

/// A single `"<quantity> <card name>"` record within a section.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CardLine {
    /// Leading integer token of the line.
    pub quantity: u32,
    /// Everything after the first whitespace run, verbatim.
    pub name: String,
}

impl CardLine {
    pub fn new(quantity: u32, name: impl Into<String>) -> Self {
        Self {
            quantity,
            name: name.into(),
        }
    }
}

impl fmt::Display for CardLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.quantity, self.name)
    }
}

/// Result of splitting one raw decklist.
///
/// A section whose header never appeared is absent; a section whose header
/// appeared without any accepted line is present with an empty sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionSplit {
    sections: BTreeMap<SectionKey, Vec<CardLine>>,
}

impl SectionSplit {
    /// Marks a section as seen without adding any line.
    pub fn open(&mut self, key: SectionKey) -> &mut Vec<CardLine> {
        self.sections.entry(key).or_default()
    }

    /// Lines for a section, or `None` if its header never appeared.
    #[allow(dead_code)] // Accessor for callers inspecting a single section
    pub fn get(&self, key: SectionKey) -> Option<&[CardLine]> {
        self.sections.get(&key).map(Vec::as_slice)
    }

    /// Whether the section's header appeared in the blob.
    #[allow(dead_code)] // Accessor for callers inspecting a single section
    pub fn contains(&self, key: SectionKey) -> bool {
        self.sections.contains_key(&key)
    }

    /// Iterate present sections in `SectionKey` order.
    pub fn iter(&self) -> impl Iterator<Item = (SectionKey, &[CardLine])> {
        self.sections.iter().map(|(k, v)| (*k, v.as_slice()))
    }

    /// True when no section header was recognized.
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Total number of accepted lines across every section.
    #[allow(dead_code)]
    pub fn line_count(&self) -> usize {
        self.sections.values().map(Vec::len).sum()
    }
}

/// Most frequent quantity of a card, or the marker for "no unique mode".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Value(u32),
    NotApplicable,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Value(v) => write!(f, "{}", v),
            Mode::NotApplicable => write!(f, "N/A"),
        }
    }
}

impl Serialize for Mode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Mode::Value(v) => serializer.serialize_u32(*v),
            Mode::NotApplicable => serializer.serialize_str("N/A"),
        }
    }
}

/// Statistical summary for one card within one section.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateRow {
    /// Card name exactly as printed in the decklists.
    pub card_name: String,
    /// Sum of quantities across every occurrence.
    pub total_count: u64,
    /// Arithmetic mean of quantities, rounded to 2 decimals.
    pub average: f64,
    /// Statistical median of quantities.
    pub median: f64,
    /// Unique most frequent quantity, if any.
    pub mode: Mode,
}

/// Format a median the way a spreadsheet would show it (`4`, `2.5`).
pub fn format_median(median: f64) -> String {
    if median.fract() == 0.0 {
        format!("{}", median as i64)
    } else {
        format!("{}", median)
    }
}

/// Report table for a single section.
#[derive(Debug, Clone, Serialize)]
pub struct SectionReport {
    pub section: SectionKey,
    pub rows: Vec<AggregateRow>,
}

impl SectionReport {
    /// Column headers shared by every report format.
    pub const COLUMNS: [&'static str; 5] =
        ["Card Name", "Total Count", "Average", "Median", "Mode"];
}

/// Metadata attached to generated reports.
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    /// Archetype slug the decks were harvested for.
    pub archetype: String,
    /// Time the report was generated.
    pub generated_at: DateTime<Utc>,
    /// Decks behind the report; known only when storage holds a single
    /// fresh run, since resumed runs append to earlier decks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decks_parsed: Option<usize>,
    /// Whether exact duplicate lines within a deck were dropped.
    pub dedup_within_deck: bool,
}

/// Counters produced by a harvest run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HarvestSummary {
    /// Listing pages requested.
    pub pages_visited: usize,
    /// Deck links found across all listing pages.
    pub decks_seen: usize,
    /// Decks whose text was fetched and split.
    pub decks_parsed: usize,
    /// Decks skipped because the fetcher returned nothing.
    pub decks_skipped: usize,
    /// Card lines accumulated across every section.
    pub lines_accepted: usize,
}
