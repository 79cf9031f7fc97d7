//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation. Options left unset fall back to the
//! configuration file and then to built-in defaults.

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// DeckStats - decklist harvester and card statistics
///
/// Collects every decklist of an archetype from a deck-listing website,
/// splits them into Commander / Companion / Deck / Sideboard and reports
/// total count, average, median and mode per card.
///
/// Examples:
///   deckstats --archetype niv-mizzet-parun
///   deckstats --archetype niv-mizzet-parun --max-pages 3 --format csv --archive
///   deckstats --aggregate-only --output-dir decks
///   deckstats --archetype niv-mizzet-parun --dry-run
///   deckstats --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Archetype slug as it appears in the listing URL
    ///
    /// Example: niv-mizzet-parun
    #[arg(short, long, value_name = "SLUG", env = "DECKSTATS_ARCHETYPE")]
    pub archetype: Option<String>,

    /// Base URL of the deck-listing website
    #[arg(long, value_name = "URL", env = "DECKSTATS_BASE_URL")]
    pub base_url: Option<String>,

    /// Maximum number of listing pages to visit
    #[arg(long, value_name = "COUNT")]
    pub max_pages: Option<usize>,

    /// Delay between requests in milliseconds
    #[arg(long, value_name = "MS")]
    pub delay_ms: Option<u64>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Directory for section storage, reports and bundles
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Report format (markdown, json, csv)
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Keep exact duplicate lines within a single decklist
    #[arg(long)]
    pub keep_duplicates: bool,

    /// Skip fetching; rebuild reports from existing section storage
    #[arg(long, conflicts_with_all = ["fresh", "dry_run"])]
    pub aggregate_only: bool,

    /// Discard existing section storage before harvesting
    #[arg(long)]
    pub fresh: bool,

    /// Bundle storage and report files into a compressed archive
    #[arg(long)]
    pub archive: bool,

    /// Identifier used to name the archive (defaults to the archetype)
    #[arg(long, value_name = "ID")]
    pub run_id: Option<String>,

    /// Dry run: fetch the first listing page and print the deck links
    #[arg(long)]
    pub dry_run: bool,

    /// Exit with code 2 when no card lines were collected
    #[arg(long)]
    pub fail_on_empty: bool,

    /// Path to configuration file
    ///
    /// If not specified, looks for .deckstats.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .deckstats.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for section reports.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown table (default)
    #[default]
    Markdown,
    /// JSON document
    Json,
    /// Comma-separated values
    Csv,
}

impl OutputFormat {
    /// File extension for reports in this format.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Markdown => "md",
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if let Some(ref archetype) = self.archetype {
            if archetype.is_empty()
                || archetype.contains(['/', '?', '#'])
                || archetype.contains(char::is_whitespace)
            {
                return Err(format!("Invalid archetype slug: '{}'", archetype));
            }
        }

        if let Some(ref base_url) = self.base_url {
            if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
                return Err("Base URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if self.max_pages == Some(0) {
            return Err("Max pages must be at least 1".to_string());
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            archetype: Some("niv-mizzet-parun".to_string()),
            base_url: None,
            max_pages: None,
            delay_ms: None,
            timeout: None,
            output_dir: None,
            format: None,
            keep_duplicates: false,
            aggregate_only: false,
            fresh: false,
            archive: false,
            run_id: None,
            dry_run: false,
            fail_on_empty: false,
            config: None,
            verbose: false,
            quiet: false,
            init_config: false,
        }
    }

    #[test]
    fn test_parse_flags() {
        let args = Args::try_parse_from([
            "deckstats",
            "--archetype",
            "izzet-phoenix",
            "--max-pages",
            "3",
            "--format",
            "csv",
            "--keep-duplicates",
        ])
        .unwrap();

        assert_eq!(args.archetype.as_deref(), Some("izzet-phoenix"));
        assert_eq!(args.max_pages, Some(3));
        assert_eq!(args.format, Some(OutputFormat::Csv));
        assert!(args.keep_duplicates);
    }

    #[test]
    fn test_aggregate_only_conflicts_with_fresh() {
        let result = Args::try_parse_from(["deckstats", "--aggregate-only", "--fresh"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_validation_ok() {
        assert!(make_args().validate().is_ok());
    }

    #[test]
    fn test_validation_invalid_archetype() {
        let mut args = make_args();
        args.archetype = Some("niv mizzet".to_string());
        assert!(args.validate().is_err());

        args.archetype = Some("a/b".to_string());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_invalid_base_url() {
        let mut args = make_args();
        args.base_url = Some("ftp://example.com".to_string());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_zero_pages() {
        let mut args = make_args();
        args.max_pages = Some(0);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }

    #[test]
    fn test_format_extension() {
        assert_eq!(OutputFormat::Markdown.extension(), "md");
        assert_eq!(OutputFormat::Json.extension(), "json");
        assert_eq!(OutputFormat::Csv.extension(), "csv");
    }
}
