//! Storage trait and error types

use crate::lifecycle::ListingStatus;
use crate::scrape::Source;
use crate::storage::{ListingRecord, NewListing, PriceHistoryEntry};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Listing not found: {0}")]
    ListingNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Trait for listing storage backends
///
/// Mutating operations are expected to retry internally on transient
/// "storage busy" contention; callers see only the final outcome.
pub trait ListingStore {
    // ===== Upsert / Dedup =====

    /// Creates or refreshes a listing keyed by its URL
    ///
    /// On create: the row starts ACTIVE with zero misses, and the initial
    /// price (when present) seeds the price history.
    ///
    /// On update: fields merge with a "prefer new value if present, else
    /// keep existing" rule, the dedup hash is recomputed over the merged
    /// values, `last_seen_at` is bumped, and a price history entry is
    /// appended iff the new price is present and differs from the stored
    /// one.
    ///
    /// # Returns
    ///
    /// The stored record and whether it was newly created.
    fn upsert_listing(&mut self, data: &NewListing) -> StoreResult<(ListingRecord, bool)>;

    // ===== Reads =====

    /// Gets a listing by ID
    fn get_listing(&self, listing_id: i64) -> StoreResult<ListingRecord>;

    /// Gets a listing by URL
    fn get_listing_by_url(&self, url: &str) -> StoreResult<Option<ListingRecord>>;

    /// Checks whether a listing exists for `url` with exactly this price
    ///
    /// This is the skip-eligibility probe: true means the expensive detail
    /// fetch can be omitted. Both prices being absent counts as equal; a
    /// stored price paired with an absent candidate price does not.
    fn listing_exists_with_price(&self, url: &str, price: Option<i64>) -> StoreResult<bool>;

    /// Gets all ACTIVE listings for a source (DELISTED rows are excluded)
    fn get_active_listings_by_source(&self, source: Source) -> StoreResult<Vec<ListingRecord>>;

    // ===== Observation bookkeeping =====

    /// Bumps `last_seen_at` without touching any other field
    fn touch_last_seen(&mut self, listing_id: i64) -> StoreResult<()>;

    // ===== Price history =====

    /// Gets the price history for a listing, newest first
    fn get_price_history(&self, listing_id: i64) -> StoreResult<Vec<PriceHistoryEntry>>;

    // ===== Lifecycle counters =====

    /// Resets `consecutive_misses` to 0 for the given listings
    fn reset_consecutive_misses(&mut self, listing_ids: &[i64]) -> StoreResult<usize>;

    /// Increments `consecutive_misses` by 1 for the given listings
    fn increment_consecutive_misses(&mut self, listing_ids: &[i64]) -> StoreResult<usize>;

    /// Transitions ACTIVE listings at or past the miss threshold to DELISTED
    ///
    /// Stamps `status_changed_at` and preserves the counter value; the
    /// count is the evidence that justified the transition.
    ///
    /// # Returns
    ///
    /// The number of listings delisted.
    fn mark_listings_at_delist_threshold(
        &mut self,
        listing_ids: &[i64],
        threshold: u32,
    ) -> StoreResult<usize>;

    // ===== Statistics =====

    /// Total number of listings
    fn count_listings(&self) -> StoreResult<u64>;

    /// Number of listings in a given lifecycle status
    fn count_listings_by_status(&self, status: ListingStatus) -> StoreResult<u64>;

    /// Number of qualified listings
    fn count_qualified_listings(&self) -> StoreResult<u64>;
}
