//! Carscout: a marketplace car-listing harvester
//!
//! This crate implements the scrape orchestration and listing-lifecycle
//! engine: browser session management with context rotation, request
//! pacing, a disposable HTML page cache, deduplicating listing storage
//! with price history, and presence/absence tracking that delists ads
//! which have disappeared from the market.

pub mod browser;
pub mod cache;
pub mod config;
pub mod lifecycle;
pub mod matching;
pub mod scrape;
pub mod storage;

use thiserror::Error;

/// Main error type for carscout operations
#[derive(Debug, Error)]
pub enum ScoutError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Browser error: {0}")]
    Browser(#[from] browser::BrowserError),

    #[error("Storage error: {0}")]
    Store(#[from] storage::StoreError),

    #[error("Scrape error: {0}")]
    Scrape(#[from] scrape::ScrapeError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias for carscout operations
pub type Result<T> = std::result::Result<T, ScoutError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use lifecycle::{LifecycleTracker, ListingStatus};
pub use scrape::{Orchestrator, ScrapeProgress, ScrapeResult, SiteScraper, Source};
pub use storage::{ListingStore, SqliteListingStore};
