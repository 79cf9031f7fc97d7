//! Harvest loop: listing pages -> decklists -> section stores.
//!
//! Decks are processed strictly one at a time. Each deck is split,
//! accumulated into the in-memory stores and appended to storage before
//! the next one is fetched, so stopping early leaves consistent state.

use crate::analysis::SectionStores;
use crate::fetch::DeckSource;
use crate::models::HarvestSummary;
use crate::parsing::{split, DedupPolicy};
use crate::storage::SectionStorage;
use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Knobs for a harvest run.
#[derive(Debug, Clone)]
pub struct HarvestOptions {
    /// Highest listing page to request.
    pub max_pages: usize,
    /// Pause between consecutive requests.
    pub delay: Duration,
    pub dedup: DedupPolicy,
    pub show_progress: bool,
}

impl Default for HarvestOptions {
    fn default() -> Self {
        Self {
            max_pages: 25,
            delay: Duration::from_secs(2),
            dedup: DedupPolicy::WithinDeck,
            show_progress: true,
        }
    }
}

/// Drives a [`DeckSource`] and owns the run's section stores.
pub struct Harvester<'a, S: DeckSource> {
    source: &'a S,
    storage: SectionStorage,
    options: HarvestOptions,
    stores: SectionStores,
    summary: HarvestSummary,
}

impl<'a, S: DeckSource> Harvester<'a, S> {
    pub fn new(source: &'a S, storage: SectionStorage, options: HarvestOptions) -> Self {
        Self {
            source,
            storage,
            options,
            stores: SectionStores::new(),
            summary: HarvestSummary::default(),
        }
    }

    /// Stores accumulated so far; valid even after an early stop.
    pub fn stores(&self) -> &SectionStores {
        &self.stores
    }

    #[allow(dead_code)] // Counters are also returned by `run`
    pub fn summary(&self) -> &HarvestSummary {
        &self.summary
    }

    /// Split one decklist, accumulate it and persist it.
    ///
    /// Returns the number of card lines the deck contributed.
    pub fn process_deck(&mut self, raw: &str) -> Result<usize> {
        let deck = split(raw, self.options.dedup);
        if deck.is_empty() {
            debug!("Decklist has no recognized section headers");
        }

        let added = self.stores.accumulate_split(&deck);
        self.storage.append_split(&deck)?;

        self.summary.decks_parsed += 1;
        self.summary.lines_accepted += added;
        Ok(added)
    }

    /// Walk listing pages until one comes back empty or `max_pages` is hit.
    pub async fn run(&mut self) -> Result<HarvestSummary> {
        let progress = self.progress_bar();

        for page in 1..=self.options.max_pages {
            info!("Fetching listing page {}", page);
            progress.set_message(format!("page {}", page));

            let links = match self.source.fetch_listing_page(page).await {
                Ok(links) => links,
                Err(e) => {
                    warn!("Listing page {} failed, stopping: {}", page, e);
                    break;
                }
            };
            self.summary.pages_visited += 1;
            self.pause().await;

            if links.is_empty() {
                info!("Listing page {} is empty, no more decks", page);
                break;
            }
            self.summary.decks_seen += links.len();

            for deck_url in &links {
                debug!("Processing deck: {}", deck_url);
                progress.set_message(format!("page {} | {}", page, deck_url));

                match self.source.fetch_deck_text(deck_url).await {
                    Some(raw) => {
                        let added = self.process_deck(&raw)?;
                        debug!("Deck {} contributed {} lines", deck_url, added);
                    }
                    None => {
                        warn!("Skipping deck without text: {}", deck_url);
                        self.summary.decks_skipped += 1;
                    }
                }
                progress.inc(1);
                self.pause().await;
            }
        }

        progress.finish_and_clear();
        info!(
            "Harvest finished: {} pages, {} decks parsed, {} skipped, {} lines",
            self.summary.pages_visited,
            self.summary.decks_parsed,
            self.summary.decks_skipped,
            self.summary.lines_accepted
        );

        Ok(self.summary.clone())
    }

    async fn pause(&self) {
        if !self.options.delay.is_zero() {
            tokio::time::sleep(self.options.delay).await;
        }
    }

    fn progress_bar(&self) -> ProgressBar {
        if !self.options.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {pos} decks {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::aggregate;
    use crate::fetch::FetchError;
    use crate::models::SectionKey;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use tempfile::TempDir;

    /// In-memory deck website.
    struct FakeSource {
        pages: Vec<Vec<String>>,
        decks: HashMap<String, String>,
        fail_page: Option<usize>,
        requested_pages: RefCell<Vec<usize>>,
    }

    impl FakeSource {
        fn new(pages: &[&[&str]], decks: &[(&str, &str)]) -> Self {
            Self {
                pages: pages
                    .iter()
                    .map(|p| p.iter().map(|s| s.to_string()).collect())
                    .collect(),
                decks: decks
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                fail_page: None,
                requested_pages: RefCell::new(Vec::new()),
            }
        }
    }

    impl DeckSource for FakeSource {
        async fn fetch_listing_page(&self, page: usize) -> Result<Vec<String>, FetchError> {
            self.requested_pages.borrow_mut().push(page);
            if self.fail_page == Some(page) {
                return Err(FetchError::Status {
                    url: format!("page-{}", page),
                    status: 503,
                });
            }
            Ok(self.pages.get(page - 1).cloned().unwrap_or_default())
        }

        async fn fetch_deck_text(&self, deck_url: &str) -> Option<String> {
            self.decks.get(deck_url).cloned()
        }
    }

    fn options(max_pages: usize) -> HarvestOptions {
        HarvestOptions {
            max_pages,
            delay: Duration::ZERO,
            dedup: DedupPolicy::WithinDeck,
            show_progress: false,
        }
    }

    #[tokio::test]
    async fn test_run_accumulates_and_stops_on_empty_page() {
        let dir = TempDir::new().unwrap();
        let storage = SectionStorage::new(dir.path());
        storage.prepare(false).unwrap();

        let source = FakeSource::new(
            &[&["a", "b"], &["c"], &[], &["never"]],
            &[
                ("a", "Commander\n1 Niv-Mizzet, Parun\nDeck\n4 Opt\n4 Opt"),
                ("b", "Deck\n4 Opt\n2 Shock"),
                ("c", "no headers\n4 Opt"),
            ],
        );

        let mut harvester = Harvester::new(&source, storage.clone(), options(25));
        let summary = harvester.run().await.unwrap();

        assert_eq!(*source.requested_pages.borrow(), vec![1, 2, 3]);
        assert_eq!(summary.pages_visited, 3);
        assert_eq!(summary.decks_seen, 3);
        assert_eq!(summary.decks_parsed, 3);
        assert_eq!(summary.decks_skipped, 0);
        assert_eq!(summary.lines_accepted, 4);

        let deck = aggregate(harvester.stores().get(SectionKey::Deck).unwrap());
        assert_eq!(deck[0].card_name, "Opt");
        assert_eq!(deck[0].total_count, 8);

        let persisted = storage.load(SectionKey::Deck).unwrap().unwrap();
        assert_eq!(aggregate(&persisted), deck);
    }

    #[tokio::test]
    async fn test_run_skips_missing_decks() {
        let dir = TempDir::new().unwrap();
        let storage = SectionStorage::new(dir.path());

        let source = FakeSource::new(&[&["a", "missing"]], &[("a", "Deck\n4 Opt")]);
        let mut harvester = Harvester::new(&source, storage, options(1));
        let summary = harvester.run().await.unwrap();

        assert_eq!(summary.decks_parsed, 1);
        assert_eq!(summary.decks_skipped, 1);
        assert_eq!(harvester.stores().total_lines(), 1);
    }

    #[tokio::test]
    async fn test_run_respects_max_pages() {
        let dir = TempDir::new().unwrap();
        let storage = SectionStorage::new(dir.path());

        let source = FakeSource::new(
            &[&["a"], &["a"], &["a"]],
            &[("a", "Deck\n1 Opt")],
        );
        let mut harvester = Harvester::new(&source, storage, options(2));
        harvester.run().await.unwrap();

        assert_eq!(*source.requested_pages.borrow(), vec![1, 2]);
        // Same deck twice across pages counts twice.
        let rows = aggregate(harvester.stores().get(SectionKey::Deck).unwrap());
        assert_eq!(rows[0].total_count, 2);
    }

    #[tokio::test]
    async fn test_listing_failure_keeps_partial_state() {
        let dir = TempDir::new().unwrap();
        let storage = SectionStorage::new(dir.path());

        let mut source = FakeSource::new(&[&["a"], &["b"]], &[("a", "Deck\n4 Opt"), ("b", "Deck\n4 Shock")]);
        source.fail_page = Some(2);

        let mut harvester = Harvester::new(&source, storage, options(25));
        let summary = harvester.run().await.unwrap();

        assert_eq!(summary.pages_visited, 1);
        let rows = aggregate(harvester.stores().get(SectionKey::Deck).unwrap());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].card_name, "Opt");
    }

    #[test]
    fn test_process_deck_keep_all_policy() {
        let dir = TempDir::new().unwrap();
        let storage = SectionStorage::new(dir.path());
        let source = FakeSource::new(&[], &[]);

        let mut opts = options(1);
        opts.dedup = DedupPolicy::KeepAll;
        let mut harvester = Harvester::new(&source, storage, opts);

        assert_eq!(harvester.process_deck("Deck\n4 Opt\n4 Opt").unwrap(), 2);
        assert_eq!(harvester.summary().lines_accepted, 2);
    }
}
