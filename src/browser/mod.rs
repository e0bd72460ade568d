//! Browser session management
//!
//! This module owns the Chromium process used for fetching, including:
//! - Launching with randomized fingerprints and anti-automation flags
//! - Rotating browsing contexts after a request threshold
//! - The `PageFetcher` capability consumed by the scrape orchestrator

mod fingerprint;
mod manager;

pub use fingerprint::Fingerprint;
pub use manager::SessionManager;

use async_trait::async_trait;
use thiserror::Error;

/// Errors from browser session operations
#[derive(Debug, Error)]
pub enum BrowserError {
    /// Operation attempted before `start()`. A programming error, never
    /// a transient condition, and therefore never retried.
    #[error("browser session not started")]
    NotStarted,

    #[error("failed to launch browser: {0}")]
    Launch(String),

    #[error("browser protocol error: {0}")]
    Protocol(String),

    #[error("chromium error: {0}")]
    Chromium(#[from] chromiumoxide::error::CdpError),
}

/// Capability to fetch the rendered HTML of a URL
///
/// `SessionManager` is the production implementation; tests substitute a
/// scripted fetcher so the orchestrator can run without a browser binary.
#[async_trait]
pub trait PageFetcher: Send {
    async fn fetch_page(&mut self, url: &str) -> Result<String, BrowserError>;
}
