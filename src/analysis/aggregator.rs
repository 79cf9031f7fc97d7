//! Cross-deck accumulation and per-card statistics.
//!
//! Each section keeps an append-only [`SectionStore`] of every accepted
//! card line across all processed decks. [`aggregate`] turns a store into
//! report rows: total count, mean, median and mode per card name.

use crate::models::{AggregateRow, CardLine, Mode, SectionKey, SectionSplit};
use std::collections::HashMap;

/// Accepted card lines for one section, in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionStore {
    lines: Vec<CardLine>,
}

impl SectionStore {
    #[allow(dead_code)] // Stores are normally created by SectionStores
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from lines read back from storage.
    pub fn from_lines(lines: Vec<CardLine>) -> Self {
        Self { lines }
    }

    /// Append a deck's lines in order. No cross-deck deduplication.
    pub fn accumulate(&mut self, new_lines: &[CardLine]) {
        self.lines.extend_from_slice(new_lines);
    }

    pub fn lines(&self) -> &[CardLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// The four section stores of a single run.
#[derive(Debug, Clone, Default)]
pub struct SectionStores {
    stores: HashMap<SectionKey, SectionStore>,
}

impl SectionStores {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulate every section present in a deck's split.
    ///
    /// Returns the number of lines appended.
    pub fn accumulate_split(&mut self, split: &SectionSplit) -> usize {
        let mut added = 0;
        for (key, lines) in split.iter() {
            self.stores.entry(key).or_default().accumulate(lines);
            added += lines.len();
        }
        added
    }

    /// Store for a section; empty if nothing was accumulated for it.
    pub fn get(&self, key: SectionKey) -> Option<&SectionStore> {
        self.stores.get(&key)
    }

    /// Total number of lines across all sections.
    pub fn total_lines(&self) -> usize {
        self.stores.values().map(SectionStore::len).sum()
    }
}

/// Group a store by card name and compute per-card statistics.
///
/// Rows are sorted by total count, highest first; equal totals keep the
/// order in which each card was first seen in the store.
pub fn aggregate(store: &SectionStore) -> Vec<AggregateRow> {
    let mut order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, Vec<u32>> = HashMap::new();

    for line in store.lines() {
        let quantities = groups.entry(line.name.as_str()).or_insert_with(|| {
            order.push(line.name.as_str());
            Vec::new()
        });
        quantities.push(line.quantity);
    }

    let mut rows: Vec<AggregateRow> = order
        .into_iter()
        .map(|name| {
            let quantities = &groups[name];
            AggregateRow {
                card_name: name.to_string(),
                total_count: quantities.iter().map(|&q| u64::from(q)).sum(),
                average: mean_rounded(quantities),
                median: median(quantities),
                mode: mode(quantities),
            }
        })
        .collect();

    // `sort_by` is stable, so first-seen order survives for ties.
    rows.sort_by(|a, b| b.total_count.cmp(&a.total_count));
    rows
}

/// Arithmetic mean rounded to 2 decimal places.
///
/// Ties go to the even hundredth, judged on the exact binary value of the
/// quotient: 9/8 gives 1.12 while 107/40 (stored just below 2.675) gives 2.67.
pub fn mean_rounded(values: &[u32]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let sum: u64 = values.iter().map(|&v| u64::from(v)).sum();
    let mean = sum as f64 / values.len() as f64;
    round_hundredths_ties_even(mean)
}

/// Round a finite, non-negative value to hundredths, ties to even.
///
/// `value * 100.0` can itself round, so the scaling is done exactly on the
/// mantissa instead.
fn round_hundredths_ties_even(value: f64) -> f64 {
    let bits = value.to_bits();
    let biased = ((bits >> 52) & 0x7ff) as i32;
    let fraction = bits & ((1u64 << 52) - 1);
    let (mantissa, exponent) = if biased == 0 {
        (fraction, -1074)
    } else {
        (fraction | (1u64 << 52), biased - 1075)
    };

    if exponent >= 0 {
        return value;
    }
    let shift = exponent.unsigned_abs();
    // mantissa * 100 < 2^60, so anything shifted further rounds to zero.
    if shift > 64 {
        return 0.0;
    }

    let scaled = u128::from(mantissa) * 100;
    let denominator = 1u128 << shift;
    let mut hundredths = scaled >> shift;
    let twice_remainder = (scaled & (denominator - 1)) * 2;
    if twice_remainder > denominator || (twice_remainder == denominator && hundredths % 2 == 1) {
        hundredths += 1;
    }

    hundredths as f64 / 100.0
}

/// Median; the mean of the two middle values for an even count.
pub fn median(values: &[u32]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (f64::from(sorted[mid - 1]) + f64::from(sorted[mid])) / 2.0
    } else {
        f64::from(sorted[mid])
    }
}

/// Unique most frequent value, or [`Mode::NotApplicable`] on a tie.
pub fn mode(values: &[u32]) -> Mode {
    let mut counts: HashMap<u32, usize> = HashMap::new();
    for &v in values {
        *counts.entry(v).or_default() += 1;
    }

    let Some(&best) = counts.values().max() else {
        return Mode::NotApplicable;
    };

    let mut winners = counts.iter().filter(|(_, c)| **c == best).map(|(v, _)| *v);
    match (winners.next(), winners.next()) {
        (Some(v), None) => Mode::Value(v),
        _ => Mode::NotApplicable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::{split, DedupPolicy};

    fn store(lines: &[(u32, &str)]) -> SectionStore {
        SectionStore::from_lines(lines.iter().map(|&(q, n)| CardLine::new(q, n)).collect())
    }

    #[test]
    fn test_accumulate_appends_in_order() {
        let mut store = SectionStore::new();
        store.accumulate(&[CardLine::new(4, "Opt")]);
        store.accumulate(&[CardLine::new(4, "Opt"), CardLine::new(1, "Shock")]);

        assert_eq!(store.len(), 3);
        assert_eq!(store.lines()[2], CardLine::new(1, "Shock"));
    }

    #[test]
    fn test_scenario_b_two_decks_same_line() {
        let mut stores = SectionStores::new();
        for _ in 0..2 {
            let deck = split("Deck\n4 Opt", DedupPolicy::WithinDeck);
            stores.accumulate_split(&deck);
        }

        let rows = aggregate(stores.get(SectionKey::Deck).unwrap());
        assert_eq!(
            rows,
            vec![AggregateRow {
                card_name: "Opt".to_string(),
                total_count: 8,
                average: 4.0,
                median: 4.0,
                mode: Mode::Value(4),
            }]
        );
    }

    #[test]
    fn test_scenario_c_headerless_deck_is_noop() {
        let mut stores = SectionStores::new();
        stores.accumulate_split(&split("Deck\n4 Opt", DedupPolicy::WithinDeck));
        let before = aggregate(stores.get(SectionKey::Deck).unwrap());

        let added = stores.accumulate_split(&split("4 Opt\n2 Shock", DedupPolicy::WithinDeck));

        assert_eq!(added, 0);
        assert_eq!(stores.total_lines(), 1);
        assert_eq!(aggregate(stores.get(SectionKey::Deck).unwrap()), before);
    }

    #[test]
    fn test_scenario_d_malformed_never_stored() {
        let mut stores = SectionStores::new();
        stores.accumulate_split(&split("Deck\nxyz Opt", DedupPolicy::WithinDeck));

        let deck = stores.get(SectionKey::Deck).unwrap();
        assert!(deck.is_empty());
        assert!(aggregate(deck).is_empty());
    }

    #[test]
    fn test_total_count_conservation() {
        let s = store(&[(4, "Opt"), (2, "Shock"), (3, "Opt"), (1, "Opt"), (2, "Shock")]);
        let rows = aggregate(&s);

        let opt = rows.iter().find(|r| r.card_name == "Opt").unwrap();
        let shock = rows.iter().find(|r| r.card_name == "Shock").unwrap();
        assert_eq!(opt.total_count, 8);
        assert_eq!(shock.total_count, 4);

        let stored: u64 = s.lines().iter().map(|l| u64::from(l.quantity)).sum();
        let reported: u64 = rows.iter().map(|r| r.total_count).sum();
        assert_eq!(stored, reported);
    }

    #[test]
    fn test_sort_descending_with_stable_ties() {
        let s = store(&[(2, "Shock"), (1, "Negate"), (4, "Opt"), (1, "Negate"), (2, "Duress")]);
        let names: Vec<_> = aggregate(&s).into_iter().map(|r| r.card_name).collect();

        // Shock, Negate and Duress all total 2; first-seen order is kept.
        assert_eq!(names, vec!["Opt", "Shock", "Negate", "Duress"]);
    }

    #[test]
    fn test_mode_tie_is_not_applicable() {
        assert_eq!(mode(&[1, 1, 2, 2]), Mode::NotApplicable);
        assert_eq!(mode(&[1, 2, 3]), Mode::NotApplicable);
        assert_eq!(mode(&[1, 1, 2]), Mode::Value(1));
    }

    #[test]
    fn test_single_occurrence_degenerate_case() {
        let rows = aggregate(&store(&[(3, "Counterspell")]));
        let row = &rows[0];
        assert_eq!(row.total_count, 3);
        assert_eq!(row.average, 3.0);
        assert_eq!(row.median, 3.0);
        assert_eq!(row.mode, Mode::Value(3));
    }

    #[test]
    fn test_median_even_and_odd() {
        assert_eq!(median(&[4, 1, 3]), 3.0);
        assert_eq!(median(&[1, 2, 3, 4]), 2.5);
        assert_eq!(median(&[2, 2]), 2.0);
    }

    #[test]
    fn test_mean_rounded_two_decimals() {
        assert_eq!(mean_rounded(&[1, 2, 2]), 1.67);
        assert_eq!(mean_rounded(&[1, 1, 2]), 1.33);
        assert_eq!(mean_rounded(&[4, 4]), 4.0);
    }

    #[test]
    fn test_mean_rounded_ties_to_even() {
        // 9/8 = 1.125 and 13/8 = 1.625 are exact ties.
        assert_eq!(mean_rounded(&[1, 1, 1, 1, 1, 1, 1, 2]), 1.12);
        assert_eq!(mean_rounded(&[1, 1, 1, 2, 2, 2, 2, 2]), 1.62);
        // 11/8 = 1.375 and 21/8 = 2.625.
        assert_eq!(mean_rounded(&[1, 1, 1, 1, 1, 2, 2, 2]), 1.38);
        assert_eq!(mean_rounded(&[2, 2, 2, 2, 3, 3, 3, 4]), 2.62);
    }

    #[test]
    fn test_mean_rounded_uses_binary_value() {
        // 107/40 is stored as 2.67499999..., so it rounds down.
        let mut values = vec![3; 27];
        values.extend([2; 13]);
        assert_eq!(mean_rounded(&values), 2.67);
        // 3/8 = 0.375 is an exact tie and 7 is odd.
        assert_eq!(mean_rounded(&[0, 0, 0, 0, 0, 1, 1, 1]), 0.38);
    }

    #[test]
    fn test_aggregate_empty_store() {
        assert!(aggregate(&SectionStore::new()).is_empty());
    }
}
