//! Listing storage
//!
//! Persistence for listings and their price history, behind the
//! `ListingStore` trait. The SQLite implementation is the production
//! backend; unit tests run against an in-memory database.

mod schema;
mod sqlite;
mod traits;

pub use schema::initialize_schema;
pub use sqlite::SqliteListingStore;
pub use traits::{ListingStore, StoreError, StoreResult};

use crate::lifecycle::ListingStatus;
use crate::scrape::Source;
use chrono::{DateTime, NaiveDate, Utc};
use sha2::{Digest, Sha256};

/// A listing as stored, one row per physical ad keyed by canonical URL
#[derive(Debug, Clone)]
pub struct ListingRecord {
    pub id: i64,
    pub source: Source,
    pub external_id: Option<String>,
    pub url: String,
    pub title: String,
    /// EUR, major units
    pub price: Option<i64>,
    pub mileage_km: Option<i64>,
    pub year: Option<i32>,
    pub first_registration: Option<NaiveDate>,
    pub location_city: Option<String>,
    pub location_zip: Option<String>,
    pub location_country: Option<String>,
    pub dealer_name: Option<String>,
    pub dealer_type: Option<String>,
    pub description: Option<String>,
    pub matched_options: Vec<String>,
    pub match_score: f64,
    pub is_qualified: bool,
    pub dedup_hash: String,
    pub status: ListingStatus,
    pub status_changed_at: Option<DateTime<Utc>>,
    pub consecutive_misses: u32,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

/// Data for creating or refreshing a listing via upsert
#[derive(Debug, Clone)]
pub struct NewListing {
    pub source: Source,
    pub external_id: Option<String>,
    pub url: String,
    pub title: String,
    pub price: Option<i64>,
    pub mileage_km: Option<i64>,
    pub year: Option<i32>,
    pub first_registration: Option<NaiveDate>,
    pub location_city: Option<String>,
    pub location_zip: Option<String>,
    pub location_country: Option<String>,
    pub dealer_name: Option<String>,
    pub dealer_type: Option<String>,
    pub description: Option<String>,
    pub matched_options: Vec<String>,
    pub match_score: f64,
    pub is_qualified: bool,
}

impl NewListing {
    /// Minimal candidate with only identity fields set
    pub fn bare(source: Source, url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            source,
            external_id: None,
            url: url.into(),
            title: title.into(),
            price: None,
            mileage_km: None,
            year: None,
            first_registration: None,
            location_city: None,
            location_zip: None,
            location_country: None,
            dealer_name: None,
            dealer_type: None,
            description: None,
            matched_options: Vec::new(),
            match_score: 0.0,
            is_qualified: false,
        }
    }
}

/// One observed price for a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceHistoryEntry {
    pub id: i64,
    pub listing_id: i64,
    pub price: i64,
    pub recorded_at: DateTime<Utc>,
}

/// Computes the deduplication fingerprint for a listing
///
/// Pure and deterministic: identical inputs always produce identical
/// output, and changing any one field changes the output. The hash joins
/// the source, the lowercased/trimmed title, and the decimal renderings of
/// price, mileage, and year (empty for absent values) and digests the
/// result with SHA-256. A collision between two distinct but
/// similarly-specified vehicles is an accepted risk.
pub fn compute_dedup_hash(
    source: Source,
    title: &str,
    price: Option<i64>,
    mileage_km: Option<i64>,
    year: Option<i32>,
) -> String {
    let parts = [
        source.to_db_string().to_string(),
        title.trim().to_lowercase(),
        price.map(|p| p.to_string()).unwrap_or_default(),
        mileage_km.map(|m| m.to_string()).unwrap_or_default(),
        year.map(|y| y.to_string()).unwrap_or_default(),
    ];
    let combined = parts.join("|");

    let mut hasher = Sha256::new();
    hasher.update(combined.as_bytes());
    hex::encode(hasher.finalize())
}
