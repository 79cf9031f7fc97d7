//! Section splitter for raw decklist text.
//!
//! A decklist is a sequence of sections, each introduced by a header line
//! starting with one of the section keywords and followed by
//! `<quantity> <card name>` lines:
//!
//! ```text
//! Commander
//! 1 Niv-Mizzet, Parun
//! Deck
//! 4 Opt
//! ```
//!
//! Lines before the first header and lines that do not parse are dropped
//! without failing the split.

use crate::models::{CardLine, SectionKey, SectionSplit};
use std::collections::{HashMap, HashSet};
use tracing::trace;

/// How exact duplicate lines inside a single decklist are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DedupPolicy {
    /// Keep only the first occurrence of an identical line within a section.
    #[default]
    WithinDeck,
    /// Keep every line, duplicates included.
    KeepAll,
}

impl DedupPolicy {
    pub fn from_flag(dedup_within_deck: bool) -> Self {
        if dedup_within_deck {
            DedupPolicy::WithinDeck
        } else {
            DedupPolicy::KeepAll
        }
    }
}

/// Classify a trimmed line as a section header.
///
/// Matching is a literal, case-sensitive prefix test, so any trailing text
/// (`Deck (60)`, or a card such as `Deckard's Dagger`) is part of the header.
pub fn classify_header(line: &str) -> Option<SectionKey> {
    SectionKey::ALL
        .into_iter()
        .find(|key| line.starts_with(key.keyword()))
}

/// Parse a `<quantity> <card name>` line.
///
/// Returns `None` when the quantity is not a positive integer or the card
/// name is missing.
pub fn parse_card_line(line: &str) -> Option<CardLine> {
    let (quantity, name) = line.trim().split_once(char::is_whitespace)?;
    let name = name.trim_start();
    if name.is_empty() {
        return None;
    }

    let quantity: u32 = quantity.parse().ok()?;
    if quantity == 0 {
        return None;
    }

    Some(CardLine::new(quantity, name))
}

/// Split a raw decklist into its sections.
pub fn split(raw: &str, policy: DedupPolicy) -> SectionSplit {
    let mut result = SectionSplit::default();
    let mut seen: HashMap<SectionKey, HashSet<&str>> = HashMap::new();
    let mut current: Option<SectionKey> = None;

    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(key) = classify_header(line) {
            result.open(key);
            current = Some(key);
            continue;
        }

        let Some(key) = current else {
            trace!("Dropping line before first header: {}", line);
            continue;
        };

        let Some(card) = parse_card_line(line) else {
            trace!("Dropping malformed line in {}: {}", key, line);
            continue;
        };

        if policy == DedupPolicy::WithinDeck && !seen.entry(key).or_default().insert(line) {
            trace!("Dropping duplicate line in {}: {}", key, line);
            continue;
        }

        result.open(key).push(card);
    }

    result
}
