//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.deckstats.toml` files.

use crate::cli::OutputFormat;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".deckstats.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Website and request settings.
    #[serde(default)]
    pub fetch: FetchSettings,

    /// Decklist parsing settings.
    #[serde(default)]
    pub parse: ParseConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Directory for section storage, reports and bundles.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> String {
    "decks".to_string()
}

/// Website and request settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchSettings {
    /// Base URL of the deck-listing website.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Archetype slug to harvest.
    #[serde(default)]
    pub archetype: Option<String>,

    /// Maximum number of listing pages to visit.
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// Delay between requests in milliseconds.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Custom User-Agent header.
    #[serde(default)]
    pub user_agent: Option<String>,

    /// CSS selector for deck links on a listing page.
    #[serde(default = "default_listing_selector")]
    pub listing_selector: String,

    /// CSS selector for the plain-text export link on a deck page.
    #[serde(default = "default_export_selector")]
    pub export_selector: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            archetype: None,
            max_pages: default_max_pages(),
            delay_ms: default_delay_ms(),
            timeout_seconds: default_timeout(),
            user_agent: None,
            listing_selector: default_listing_selector(),
            export_selector: default_export_selector(),
        }
    }
}

fn default_base_url() -> String {
    "https://www.mtggoldfish.com".to_string()
}

fn default_max_pages() -> usize {
    25
}

fn default_delay_ms() -> u64 {
    2000
}

fn default_timeout() -> u64 {
    30
}

fn default_listing_selector() -> String {
    "table tbody tr td:nth-child(2) > a".to_string()
}

fn default_export_selector() -> String {
    r#"a[href*="/deck/download/"]"#.to_string()
}

/// Decklist parsing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseConfig {
    /// Drop exact duplicate lines within one decklist section.
    #[serde(default = "default_true")]
    pub dedup_within_deck: bool,
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            dedup_within_deck: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Report generation settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Report file format.
    #[serde(default)]
    pub format: OutputFormat,

    /// Bundle produced files after each run.
    #[serde(default)]
    pub archive: bool,
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref archetype) = args.archetype {
            self.fetch.archetype = Some(archetype.clone());
        }
        if let Some(ref base_url) = args.base_url {
            self.fetch.base_url = base_url.clone();
        }
        if let Some(max_pages) = args.max_pages {
            self.fetch.max_pages = max_pages;
        }
        if let Some(delay_ms) = args.delay_ms {
            self.fetch.delay_ms = delay_ms;
        }
        if let Some(timeout) = args.timeout {
            self.fetch.timeout_seconds = timeout;
        }

        if let Some(ref output_dir) = args.output_dir {
            self.general.output_dir = output_dir.display().to_string();
        }
        if let Some(format) = args.format {
            self.report.format = format;
        }

        // Flags always override
        if args.keep_duplicates {
            self.parse.dedup_within_deck = false;
        }
        if args.archive {
            self.report.archive = true;
        }
    }

    /// Archetype slug, required for any run that fetches.
    pub fn require_archetype(&self) -> Result<&str> {
        self.fetch.archetype.as_deref().ok_or_else(|| {
            anyhow::anyhow!(
                "No archetype given; use --archetype or set fetch.archetype in {}",
                CONFIG_FILE
            )
        })
    }

    /// Build the fetcher settings from this configuration.
    pub fn fetch_config(&self) -> Result<crate::fetch::FetchConfig> {
        Ok(crate::fetch::FetchConfig {
            base_url: self.fetch.base_url.clone(),
            archetype: self.require_archetype()?.to_string(),
            timeout_seconds: self.fetch.timeout_seconds,
            user_agent: self.fetch.user_agent.clone(),
            listing_selector: self.fetch.listing_selector.clone(),
            export_selector: self.fetch.export_selector.clone(),
        })
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
