//! Carscout main entry point
//!
//! Command-line interface for the carscout listing harvester.

use carscout::browser::SessionManager;
use carscout::cache::PageCache;
use carscout::config::load_config_with_hash;
use carscout::lifecycle::ListingStatus;
use carscout::scrape::sites::Autoscout24Scraper;
use carscout::scrape::{Orchestrator, ScrapeProgress, SearchFilters, Source};
use carscout::storage::{ListingStore, SqliteListingStore};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

/// Carscout: a marketplace car-listing harvester
///
/// Carscout walks marketplace search results through a rotating browser
/// session, stores deduplicated listings with their price history, and
/// tracks which ads have disappeared from the market.
#[derive(Parser, Debug)]
#[command(name = "carscout")]
#[command(version = "1.0.0")]
#[command(about = "Marketplace car-listing harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Source to scrape (autoscout24_de, autoscout24_nl)
    #[arg(short, long)]
    source: Option<String>,

    /// Override the configured page budget
    #[arg(long)]
    max_pages: Option<u32>,

    /// Maximum price filter in EUR
    #[arg(long)]
    price_max: Option<u32>,

    /// Maximum mileage filter in km
    #[arg(long)]
    mileage_max: Option<u32>,

    /// Minimum first-registration year filter
    #[arg(long)]
    year_min: Option<u32>,

    /// Maximum first-registration year filter
    #[arg(long)]
    year_max: Option<u32>,

    /// Disable the HTML page cache for this run
    #[arg(long)]
    no_cache: bool,

    /// Run the browser with a visible window
    #[arg(long)]
    headful: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Show listing and cache statistics and exit
    #[arg(long, conflicts_with_all = ["cache_stats", "clear_expired_cache", "clear_cache"])]
    stats: bool,

    /// Show cache statistics and exit
    #[arg(long, conflicts_with_all = ["stats", "clear_expired_cache", "clear_cache"])]
    cache_stats: bool,

    /// Delete expired cache entries and exit
    #[arg(long, conflicts_with_all = ["stats", "cache_stats", "clear_cache"])]
    clear_expired_cache: bool,

    /// Delete the entire cache and exit
    #[arg(long, conflicts_with_all = ["stats", "cache_stats", "clear_expired_cache"])]
    clear_cache: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)?;
    tracing::info!("Configuration loaded (hash: {})", &config_hash[..12]);

    if cli.stats {
        handle_stats(&config)?;
    } else if cli.cache_stats {
        handle_cache_stats(&config)?;
    } else if cli.clear_expired_cache {
        let removed = PageCache::new(&config.output.cache_dir)?.clear_expired()?;
        println!("Removed {} expired cache entries", removed);
    } else if cli.clear_cache {
        let removed = PageCache::new(&config.output.cache_dir)?.clear()?;
        println!("Removed {} cache entries", removed);
    } else {
        handle_scrape(config, &cli).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("carscout=info,warn"),
            1 => EnvFilter::new("carscout=debug,info"),
            2 => EnvFilter::new("carscout=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Runs one scrape job with guaranteed browser teardown
async fn handle_scrape(config: carscout::Config, cli: &Cli) -> anyhow::Result<()> {
    let source = resolve_source(cli.source.as_deref())?;
    let max_pages = cli.max_pages.unwrap_or(config.scraper.max_pages);
    let filters = build_filters(cli);

    let store = Arc::new(Mutex::new(SqliteListingStore::new(Path::new(
        &config.output.database_path,
    ))?));

    let cache = if cli.no_cache {
        tracing::info!("Page cache disabled for this run");
        None
    } else {
        Some(PageCache::new(&config.output.cache_dir)?)
    };

    let mut browser_config = config.browser.clone();
    if cli.headful {
        browser_config.headless = false;
    }

    let mut session = SessionManager::new(browser_config);
    session.start().await?;

    let mut report_progress = |p: ScrapeProgress| {
        if let Some(title) = &p.current_listing {
            tracing::info!(
                "Page {}/{}: {} found, {} new, {} updated, {} skipped ({})",
                p.page,
                p.total_pages,
                p.listings_found,
                p.new_count,
                p.updated_count,
                p.skipped_count,
                title
            );
        } else {
            tracing::info!("Scraping page {}/{}", p.page, p.total_pages);
        }
    };

    let job_result = {
        let mut orchestrator = Orchestrator::new(
            Box::new(Autoscout24Scraper::for_source(source)),
            &mut session,
            store,
            cache,
            config.scraper.clone(),
            config.options.clone(),
        );
        orchestrator
            .run_scrape(max_pages, filters, Some(&mut report_progress))
            .await
    };

    // Teardown runs on the exit path regardless of the job outcome
    let stop_result = session.stop().await;
    let result = job_result?;
    stop_result?;

    println!("Scrape of {} complete:", source);
    println!("  Listings found:    {}", result.total_found);
    println!("  New listings:      {}", result.new_listings);
    println!("  Updated listings:  {}", result.updated_listings);
    println!("  Skipped unchanged: {}", result.skipped_unchanged);
    println!("  Details fetched:   {}", result.fetched_details);

    Ok(())
}

/// Handles the --stats mode: listing and cache statistics
fn handle_stats(config: &carscout::Config) -> anyhow::Result<()> {
    let store = SqliteListingStore::new(Path::new(&config.output.database_path))?;

    println!("Database: {}\n", config.output.database_path);
    println!("Listings:  {}", store.count_listings()?);
    println!(
        "  Active:    {}",
        store.count_listings_by_status(ListingStatus::Active)?
    );
    println!(
        "  Delisted:  {}",
        store.count_listings_by_status(ListingStatus::Delisted)?
    );
    println!("  Qualified: {}", store.count_qualified_listings()?);
    println!();

    handle_cache_stats(config)
}

/// Handles the --cache-stats mode
fn handle_cache_stats(config: &carscout::Config) -> anyhow::Result<()> {
    let cache = PageCache::new(&config.output.cache_dir)?;
    let stats = cache.stats()?;

    println!("Cache: {}", config.output.cache_dir);
    println!("  Entries:      {}", stats.total);
    println!("  Valid:        {}", stats.valid);
    println!("  Expired:      {}", stats.expired);
    println!("  Search pages: {}", stats.search_pages);
    println!("  Detail pages: {}", stats.detail_pages);

    Ok(())
}

fn resolve_source(source: Option<&str>) -> anyhow::Result<Source> {
    match source {
        None => Ok(Source::Autoscout24De),
        Some(s) => Source::from_db_string(s).ok_or_else(|| {
            let known = Source::all_sources()
                .iter()
                .map(|s| s.to_db_string())
                .collect::<Vec<_>>()
                .join(", ");
            anyhow::anyhow!("unknown source '{}'; expected one of: {}", s, known)
        }),
    }
}

fn build_filters(cli: &Cli) -> Option<SearchFilters> {
    let filters = SearchFilters {
        price_max_eur: cli.price_max,
        mileage_max_km: cli.mileage_max,
        year_min: cli.year_min,
        year_max: cli.year_max,
    };

    if filters == SearchFilters::default() {
        None
    } else {
        Some(filters)
    }
}
