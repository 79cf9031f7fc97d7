//! DeckStats - archetype decklist harvester
//!
//! A CLI tool that collects every decklist of an archetype from a
//! deck-listing website, splits them into sections and reports
//! per-card quantity statistics.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (config, network setup, disk write, etc.)
//!   2 - No card lines collected and --fail-on-empty set

mod analysis;
mod archive;
mod cli;
mod config;
mod fetch;
mod harvest;
mod models;
mod parsing;
mod report;
mod storage;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::Args;
use config::{Config, CONFIG_FILE};
use fetch::{DeckSource, HttpDeckSource};
use harvest::{HarvestOptions, Harvester};
use models::{HarvestSummary, ReportMetadata, SectionKey};
use parsing::DedupPolicy;
use std::path::PathBuf;
use std::time::Duration;
use storage::SectionStorage;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("DeckStats v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .deckstats.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", CONFIG_FILE);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Set fetch.archetype and adjust pages, delay and selectors as needed.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run the complete workflow. Returns exit code (0 or 2).
async fn run(args: Args) -> Result<i32> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let output_dir = PathBuf::from(&config.general.output_dir);
    let storage = SectionStorage::new(&output_dir);

    if args.dry_run {
        return handle_dry_run(&config).await;
    }

    let mut summary = HarvestSummary::default();

    if args.aggregate_only {
        println!("📂 Aggregating existing storage in {}", output_dir.display());
    } else {
        let fetch_config = config.fetch_config()?;
        storage.prepare(args.fresh)?;

        println!("📥 Harvesting archetype: {}", fetch_config.archetype);
        println!("   Site: {}", fetch_config.base_url);
        println!(
            "   Pages: up to {} | Delay: {}ms",
            config.fetch.max_pages, config.fetch.delay_ms
        );

        let source = HttpDeckSource::new(&fetch_config).context("Failed to set up fetcher")?;
        let options = HarvestOptions {
            max_pages: config.fetch.max_pages,
            delay: Duration::from_millis(config.fetch.delay_ms),
            dedup: DedupPolicy::from_flag(config.parse.dedup_within_deck),
            show_progress: !args.quiet,
        };

        let mut harvester = Harvester::new(&source, storage.clone(), options);
        summary = harvester.run().await?;

        for key in SectionKey::ALL {
            if let Some(store) = harvester.stores().get(key) {
                debug!("{}: {} lines collected this run", key, store.len());
            }
        }
    }

    // Build and write the reports
    println!("\n📝 Generating reports...");
    let reports = report::build_reports(&storage)?;
    if reports.is_empty() {
        warn!("No section storage found in {}", output_dir.display());
    }

    let metadata = ReportMetadata {
        archetype: config
            .fetch
            .archetype
            .clone()
            .unwrap_or_else(|| "unknown".to_string()),
        generated_at: Utc::now(),
        // Without --fresh, storage also holds decks from earlier runs.
        decks_parsed: (!args.aggregate_only && args.fresh).then_some(summary.decks_parsed),
        dedup_within_deck: config.parse.dedup_within_deck,
    };

    let written = report::write_reports(&output_dir, &reports, &metadata, config.report.format)?;

    if config.report.archive {
        let run_id = args
            .run_id
            .clone()
            .or_else(|| config.fetch.archetype.clone())
            .unwrap_or_else(|| "deckstats".to_string());
        let files = archive::run_artifacts(&storage, &written);
        let bundle = archive::write_bundle(&output_dir, &run_id, &files)?;
        println!("📦 Bundle saved to: {}", bundle.display());
    }

    // Print summary
    println!("\n📊 Summary:");
    if !args.aggregate_only {
        println!(
            "   Pages: {} | Decks found: {} | Parsed: {} | Skipped: {}",
            summary.pages_visited, summary.decks_seen, summary.decks_parsed, summary.decks_skipped
        );
        println!("   Card lines collected: {}", summary.lines_accepted);
    }
    for report in &reports {
        println!("   {}: {} distinct cards", report.section, report.rows.len());
    }
    println!("\n✅ Done! {} report(s) saved to: {}", written.len(), output_dir.display());

    let collected = reports.iter().any(|r| !r.rows.is_empty());
    if args.fail_on_empty && !collected {
        eprintln!("\n⛔ No card lines collected. Failing (exit code 2).");
        return Ok(2);
    }

    Ok(0)
}

/// Handle --dry-run: fetch the first listing page and print its deck links.
async fn handle_dry_run(config: &Config) -> Result<i32> {
    let fetch_config = config.fetch_config()?;
    let source = HttpDeckSource::new(&fetch_config).context("Failed to set up fetcher")?;

    println!("\n🔍 Dry run: fetching listing page 1 (no decks downloaded)...\n");

    let links = source
        .fetch_listing_page(1)
        .await
        .context("Failed to fetch listing page 1")?;

    if links.is_empty() {
        println!("   No deck links found.");
    } else {
        for link in &links {
            println!("     🃏 {}", link);
        }
        println!("\n   Total: {} decks on page 1", links.len());
    }

    println!("\n✅ Dry run complete. Nothing was written.");
    Ok(0)
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
