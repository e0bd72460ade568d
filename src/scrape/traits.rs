//! The per-site scraper capability surface
//!
//! Site-specific knowledge (how to build a search URL, how to read a
//! result card, how to read a detail page) lives behind the `SiteScraper`
//! trait. The orchestrator consumes exactly these three operations and
//! nothing else, so adding a marketplace means implementing one trait.

use std::fmt;
use thiserror::Error;

/// Supported scraping sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    Autoscout24De,
    Autoscout24Nl,
}

impl Source {
    /// Converts the source to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Autoscout24De => "autoscout24_de",
            Self::Autoscout24Nl => "autoscout24_nl",
        }
    }

    /// Parses a source from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "autoscout24_de" => Some(Self::Autoscout24De),
            "autoscout24_nl" => Some(Self::Autoscout24Nl),
            _ => None,
        }
    }

    /// Returns all supported sources
    pub fn all_sources() -> Vec<Self> {
        vec![Self::Autoscout24De, Self::Autoscout24Nl]
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// Search criteria applied when building search URLs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilters {
    /// Maximum price in EUR
    pub price_max_eur: Option<u32>,
    /// Maximum mileage in km
    pub mileage_max_km: Option<u32>,
    /// Minimum first-registration year
    pub year_min: Option<u32>,
    /// Maximum first-registration year
    pub year_max: Option<u32>,
}

/// One listing summary as it appears on a search-result page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingCard {
    pub url: String,
    pub title: String,
    /// EUR, major units
    pub price: Option<i64>,
    pub mileage_km: Option<i64>,
    pub external_id: Option<String>,
    /// Raw "MM/YYYY" text as shown on the card
    pub first_registration: Option<String>,
}

/// The fields only a detail page provides
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingDetail {
    pub options_list: Vec<String>,
    pub description: Option<String>,
    pub location_city: Option<String>,
    pub location_zip: Option<String>,
    pub location_country: Option<String>,
    pub dealer_name: Option<String>,
    pub dealer_type: Option<String>,
}

/// Errors from site-specific parsing
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("invalid selector '{0}'")]
    Selector(String),

    #[error("malformed page: {0}")]
    MalformedPage(String),
}

/// Capability interface for one marketplace site
pub trait SiteScraper: Send + Sync {
    /// The source this scraper serves
    fn source(&self) -> Source;

    /// Builds the search URL for a 1-indexed result page
    fn build_search_url(&self, page: u32, filters: Option<&SearchFilters>) -> String;

    /// Extracts listing summaries from a search-result page
    fn parse_listing_cards(&self, html: &str) -> Result<Vec<ListingCard>, ScrapeError>;

    /// Extracts the detail-only fields from a listing page
    fn parse_listing_detail(&self, html: &str, url: &str) -> Result<ListingDetail, ScrapeError>;
}
