//! Fetching listing pages and decklists from the deck website.
//!
//! The harvester only depends on the [`DeckSource`] trait; the HTTP
//! implementation lives in [`HttpDeckSource`].

use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// User-Agent string for outgoing requests.
const USER_AGENT: &str = concat!("deckstats/", env!("CARGO_PKG_VERSION"));

/// Errors raised while talking to the deck website.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("network error for {url}: {source}")]
    Network {
        url: String,
        source: reqwest::Error,
    },

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("invalid CSS selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    #[error("invalid URL '{0}'")]
    Url(String),
}

/// Source of deck links and decklist text.
#[allow(async_fn_in_trait)]
pub trait DeckSource {
    /// Deck URLs on a 1-indexed listing page. Empty means no more pages.
    async fn fetch_listing_page(&self, page: usize) -> Result<Vec<String>, FetchError>;

    /// Raw decklist text for a deck, or `None` when it could not be obtained.
    async fn fetch_deck_text(&self, deck_url: &str) -> Option<String>;
}

/// Settings for [`HttpDeckSource`].
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub base_url: String,
    pub archetype: String,
    pub timeout_seconds: u64,
    pub user_agent: Option<String>,
    /// Selects the deck links in a listing page.
    pub listing_selector: String,
    /// Selects the plain-text export link in a deck page.
    pub export_selector: String,
}

/// [`DeckSource`] backed by HTTP requests and HTML scraping.
pub struct HttpDeckSource {
    client: reqwest::Client,
    base: Url,
    archetype: String,
    listing_selector: Selector,
    export_selector: Selector,
}

fn parse_selector(selector: &str) -> Result<Selector, FetchError> {
    Selector::parse(selector).map_err(|e| FetchError::Selector {
        selector: selector.to_string(),
        message: e.to_string(),
    })
}

impl HttpDeckSource {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let base = Url::parse(&config.base_url).map_err(|_| FetchError::Url(config.base_url.clone()))?;

        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_deref().unwrap_or(USER_AGENT))
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|source| FetchError::Network {
                url: config.base_url.clone(),
                source,
            })?;

        Ok(Self {
            client,
            base,
            archetype: config.archetype.clone(),
            listing_selector: parse_selector(&config.listing_selector)?,
            export_selector: parse_selector(&config.export_selector)?,
        })
    }

    /// Listing URL for a page; page 1 carries no query string.
    pub fn listing_url(&self, page: usize) -> Result<Url, FetchError> {
        let path = format!("archetype/{}/decks", self.archetype);
        let mut url = self
            .base
            .join(&path)
            .map_err(|_| FetchError::Url(path.clone()))?;
        if page > 1 {
            url.query_pairs_mut().append_pair("page", &page.to_string());
        }
        Ok(url)
    }

    async fn get_text(&self, url: &Url) -> Result<String, FetchError> {
        let network = |source| FetchError::Network {
            url: url.to_string(),
            source,
        };

        let response = self.client.get(url.clone()).send().await.map_err(network)?;
        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        response.text().await.map_err(network)
    }

    async fn try_fetch_deck_text(&self, deck_url: &str) -> Result<Option<String>, FetchError> {
        let deck_url = self
            .base
            .join(deck_url)
            .map_err(|_| FetchError::Url(deck_url.to_string()))?;

        let page = self.get_text(&deck_url).await?;
        let Some(export_url) = extract_links(&page, &self.export_selector, &deck_url)
            .into_iter()
            .next()
        else {
            debug!("No export link on {}", deck_url);
            return Ok(None);
        };

        let export = self.get_text(&export_url).await?;
        let text = extract_deck_text(&export);
        Ok((!text.is_empty()).then_some(text))
    }
}

impl DeckSource for HttpDeckSource {
    async fn fetch_listing_page(&self, page: usize) -> Result<Vec<String>, FetchError> {
        let url = self.listing_url(page)?;
        debug!("Fetching listing page {}", url);

        let html = self.get_text(&url).await?;
        Ok(extract_links(&html, &self.listing_selector, &url)
            .into_iter()
            .map(String::from)
            .collect())
    }

    async fn fetch_deck_text(&self, deck_url: &str) -> Option<String> {
        match self.try_fetch_deck_text(deck_url).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to fetch deck {}: {}", deck_url, e);
                None
            }
        }
    }
}

/// Absolute URLs of every `href` matched by `selector`, in document order.
pub fn extract_links(html: &str, selector: &Selector, page_url: &Url) -> Vec<Url> {
    let document = Html::parse_document(html);
    document
        .select(selector)
        .filter_map(|el| el.value().attr("href"))
        .filter_map(|href| page_url.join(href).ok())
        .collect()
}

/// Decklist text from an export response.
///
/// HTML responses carry the list in a `textarea`; anything else is taken
/// as the plain-text list itself.
pub fn extract_deck_text(body: &str) -> String {
    if body.contains("<textarea") {
        let document = Html::parse_document(body);
        if let Ok(textarea) = Selector::parse("textarea") {
            if let Some(el) = document.select(&textarea).next() {
                return el.text().collect::<String>().trim().to_string();
            }
        }
    }
    body.trim().to_string()
}
