//! SQLite storage implementation
//!
//! Production `ListingStore` backend. Mutating operations retry on
//! SQLITE_BUSY / SQLITE_LOCKED with exponential backoff, since concurrent
//! jobs share one database and SQLite admits a single writer at a time.

use crate::lifecycle::ListingStatus;
use crate::scrape::Source;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{ListingStore, StoreError, StoreResult};
use crate::storage::{compute_dedup_hash, ListingRecord, NewListing, PriceHistoryEntry};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::time::Duration;

/// Retry budget for "storage busy" contention
const STORE_RETRY_MAX_ATTEMPTS: u32 = 5;
const STORE_RETRY_BASE_DELAY_MS: u64 = 100;
const STORE_RETRY_MAX_DELAY_MS: u64 = 1600;

const LISTING_COLUMNS: &str = "id, source, external_id, url, title, price, mileage_km, year, \
     first_registration, location_city, location_zip, location_country, dealer_name, dealer_type, \
     description, matched_options, match_score, is_qualified, dedup_hash, status, \
     status_changed_at, consecutive_misses, first_seen_at, last_seen_at";

/// SQLite storage backend
pub struct SqliteListingStore {
    conn: Connection,
}

impl SqliteListingStore {
    /// Opens (creating if needed) a database at the given path
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn insert_listing(&mut self, data: &NewListing, dedup_hash: &str) -> StoreResult<i64> {
        let now = Utc::now().to_rfc3339();
        let matched_options = encode_options(&data.matched_options)?;
        with_store_retry(|| {
            self.conn.execute(
                "INSERT INTO listings (source, external_id, url, title, price, mileage_km, year,
                     first_registration, location_city, location_zip, location_country,
                     dealer_name, dealer_type, description, matched_options, match_score,
                     is_qualified, dedup_hash, status, consecutive_misses, first_seen_at, last_seen_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                     ?17, ?18, ?19, 0, ?20, ?20)",
                params![
                    data.source.to_db_string(),
                    data.external_id,
                    data.url,
                    data.title,
                    data.price,
                    data.mileage_km,
                    data.year,
                    data.first_registration.map(format_date),
                    data.location_city,
                    data.location_zip,
                    data.location_country,
                    data.dealer_name,
                    data.dealer_type,
                    data.description,
                    matched_options,
                    data.match_score,
                    data.is_qualified,
                    dedup_hash,
                    ListingStatus::Active.to_db_string(),
                    now,
                ],
            )
        })?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update_listing(&mut self, id: i64, merged: &NewListing, dedup_hash: &str) -> StoreResult<()> {
        let now = Utc::now().to_rfc3339();
        let matched_options = encode_options(&merged.matched_options)?;
        with_store_retry(|| {
            self.conn.execute(
                "UPDATE listings SET external_id = ?1, title = ?2, price = ?3, mileage_km = ?4,
                     year = ?5, first_registration = ?6, location_city = ?7, location_zip = ?8,
                     location_country = ?9, dealer_name = ?10, dealer_type = ?11,
                     description = ?12, matched_options = ?13, match_score = ?14,
                     is_qualified = ?15, dedup_hash = ?16, last_seen_at = ?17
                 WHERE id = ?18",
                params![
                    merged.external_id,
                    merged.title,
                    merged.price,
                    merged.mileage_km,
                    merged.year,
                    merged.first_registration.map(format_date),
                    merged.location_city,
                    merged.location_zip,
                    merged.location_country,
                    merged.dealer_name,
                    merged.dealer_type,
                    merged.description,
                    matched_options,
                    merged.match_score,
                    merged.is_qualified,
                    dedup_hash,
                    now,
                    id,
                ],
            )
        })?;
        Ok(())
    }

    fn record_price(&mut self, listing_id: i64, price: i64) -> StoreResult<()> {
        let now = Utc::now().to_rfc3339();
        with_store_retry(|| {
            self.conn.execute(
                "INSERT INTO price_history (listing_id, price, recorded_at) VALUES (?1, ?2, ?3)",
                params![listing_id, price, now],
            )
        })?;
        Ok(())
    }

    fn update_misses(&mut self, listing_ids: &[i64], sql_fragment: &str) -> StoreResult<usize> {
        if listing_ids.is_empty() {
            return Ok(0);
        }

        let sql = format!(
            "UPDATE listings SET consecutive_misses = {} WHERE id IN ({})",
            sql_fragment,
            placeholders(listing_ids.len())
        );
        let count = with_store_retry(|| {
            self.conn
                .execute(&sql, rusqlite::params_from_iter(listing_ids.iter()))
        })?;
        Ok(count)
    }
}

impl ListingStore for SqliteListingStore {
    fn upsert_listing(&mut self, data: &NewListing) -> StoreResult<(ListingRecord, bool)> {
        match self.get_listing_by_url(&data.url)? {
            None => {
                let dedup_hash = compute_dedup_hash(
                    data.source,
                    &data.title,
                    data.price,
                    data.mileage_km,
                    data.year,
                );
                let id = self.insert_listing(data, &dedup_hash)?;
                // Seed the price history with the first observed price
                if let Some(price) = data.price {
                    self.record_price(id, price)?;
                }
                Ok((self.get_listing(id)?, true))
            }
            Some(existing) => {
                let merged = merge_candidate(&existing, data);
                let dedup_hash = compute_dedup_hash(
                    merged.source,
                    &merged.title,
                    merged.price,
                    merged.mileage_km,
                    merged.year,
                );
                self.update_listing(existing.id, &merged, &dedup_hash)?;

                if let Some(price) = data.price {
                    if existing.price != Some(price) {
                        self.record_price(existing.id, price)?;
                    }
                }

                Ok((self.get_listing(existing.id)?, false))
            }
        }
    }

    fn get_listing(&self, listing_id: i64) -> StoreResult<ListingRecord> {
        let sql = format!("SELECT {} FROM listings WHERE id = ?1", LISTING_COLUMNS);
        self.conn
            .query_row(&sql, params![listing_id], listing_from_row)
            .optional()?
            .ok_or(StoreError::ListingNotFound(listing_id))
    }

    fn get_listing_by_url(&self, url: &str) -> StoreResult<Option<ListingRecord>> {
        let sql = format!("SELECT {} FROM listings WHERE url = ?1", LISTING_COLUMNS);
        Ok(self
            .conn
            .query_row(&sql, params![url], listing_from_row)
            .optional()?)
    }

    fn listing_exists_with_price(&self, url: &str, price: Option<i64>) -> StoreResult<bool> {
        match self.get_listing_by_url(url)? {
            None => Ok(false),
            Some(listing) => Ok(listing.price == price),
        }
    }

    fn get_active_listings_by_source(&self, source: Source) -> StoreResult<Vec<ListingRecord>> {
        let sql = format!(
            "SELECT {} FROM listings WHERE source = ?1 AND status = ?2",
            LISTING_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let listings = stmt
            .query_map(
                params![
                    source.to_db_string(),
                    ListingStatus::Active.to_db_string()
                ],
                listing_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(listings)
    }

    fn touch_last_seen(&mut self, listing_id: i64) -> StoreResult<()> {
        let now = Utc::now().to_rfc3339();
        let count = with_store_retry(|| {
            self.conn.execute(
                "UPDATE listings SET last_seen_at = ?1 WHERE id = ?2",
                params![now, listing_id],
            )
        })?;
        if count == 0 {
            return Err(StoreError::ListingNotFound(listing_id));
        }
        Ok(())
    }

    fn get_price_history(&self, listing_id: i64) -> StoreResult<Vec<PriceHistoryEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, listing_id, price, recorded_at FROM price_history
             WHERE listing_id = ?1 ORDER BY recorded_at DESC, id DESC",
        )?;
        let entries = stmt
            .query_map(params![listing_id], |row| {
                Ok(PriceHistoryEntry {
                    id: row.get(0)?,
                    listing_id: row.get(1)?,
                    price: row.get(2)?,
                    recorded_at: parse_timestamp(3, &row.get::<_, String>(3)?)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    fn reset_consecutive_misses(&mut self, listing_ids: &[i64]) -> StoreResult<usize> {
        self.update_misses(listing_ids, "0")
    }

    fn increment_consecutive_misses(&mut self, listing_ids: &[i64]) -> StoreResult<usize> {
        self.update_misses(listing_ids, "consecutive_misses + 1")
    }

    fn mark_listings_at_delist_threshold(
        &mut self,
        listing_ids: &[i64],
        threshold: u32,
    ) -> StoreResult<usize> {
        if listing_ids.is_empty() {
            return Ok(0);
        }

        let now = Utc::now().to_rfc3339();
        let delisted = ListingStatus::Delisted.to_db_string();
        let active = ListingStatus::Active.to_db_string();
        let threshold = threshold as i64;

        let sql = format!(
            "UPDATE listings SET status = ?1, status_changed_at = ?2
             WHERE status = ?3 AND consecutive_misses >= ?4 AND id IN ({})",
            placeholders(listing_ids.len())
        );

        let mut sql_params: Vec<&dyn rusqlite::ToSql> =
            vec![&delisted, &now, &active, &threshold];
        for id in listing_ids {
            sql_params.push(id);
        }

        let count = with_store_retry(|| self.conn.execute(&sql, sql_params.as_slice()))?;
        Ok(count)
    }

    fn count_listings(&self) -> StoreResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM listings", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_listings_by_status(&self, status: ListingStatus) -> StoreResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM listings WHERE status = ?1",
            params![status.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_qualified_listings(&self) -> StoreResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM listings WHERE is_qualified = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

/// Merges an upsert candidate into an existing record
///
/// "Prefer new value if present, else keep existing" per field. The score
/// only replaces when positive (a failed detail fetch must not erase a
/// previously computed score); the qualification verdict always follows
/// the newest match run.
fn merge_candidate(existing: &ListingRecord, data: &NewListing) -> NewListing {
    NewListing {
        source: existing.source,
        external_id: data.external_id.clone().or_else(|| existing.external_id.clone()),
        url: existing.url.clone(),
        title: if data.title.is_empty() {
            existing.title.clone()
        } else {
            data.title.clone()
        },
        price: data.price.or(existing.price),
        mileage_km: data.mileage_km.or(existing.mileage_km),
        year: data.year.or(existing.year),
        first_registration: data.first_registration.or(existing.first_registration),
        location_city: data.location_city.clone().or_else(|| existing.location_city.clone()),
        location_zip: data.location_zip.clone().or_else(|| existing.location_zip.clone()),
        location_country: data
            .location_country
            .clone()
            .or_else(|| existing.location_country.clone()),
        dealer_name: data.dealer_name.clone().or_else(|| existing.dealer_name.clone()),
        dealer_type: data.dealer_type.clone().or_else(|| existing.dealer_type.clone()),
        description: data.description.clone().or_else(|| existing.description.clone()),
        matched_options: if data.matched_options.is_empty() {
            existing.matched_options.clone()
        } else {
            data.matched_options.clone()
        },
        match_score: if data.match_score > 0.0 {
            data.match_score
        } else {
            existing.match_score
        },
        is_qualified: data.is_qualified,
    }
}

fn listing_from_row(row: &Row<'_>) -> rusqlite::Result<ListingRecord> {
    let source_str: String = row.get(1)?;
    let source = Source::from_db_string(&source_str).ok_or_else(|| {
        conversion_error(1, format!("unknown source '{}'", source_str))
    })?;

    let first_registration = match row.get::<_, Option<String>>(8)? {
        Some(s) => Some(parse_date(8, &s)?),
        None => None,
    };

    let matched_options_json: String = row.get(15)?;
    let matched_options: Vec<String> =
        serde_json::from_str(&matched_options_json).unwrap_or_default();

    let status = ListingStatus::from_db_string(&row.get::<_, String>(19)?)
        .unwrap_or(ListingStatus::Active);

    let status_changed_at = match row.get::<_, Option<String>>(20)? {
        Some(s) => Some(parse_timestamp(20, &s)?),
        None => None,
    };

    Ok(ListingRecord {
        id: row.get(0)?,
        source,
        external_id: row.get(2)?,
        url: row.get(3)?,
        title: row.get(4)?,
        price: row.get(5)?,
        mileage_km: row.get(6)?,
        year: row.get(7)?,
        first_registration,
        location_city: row.get(9)?,
        location_zip: row.get(10)?,
        location_country: row.get(11)?,
        dealer_name: row.get(12)?,
        dealer_type: row.get(13)?,
        description: row.get(14)?,
        matched_options,
        match_score: row.get(16)?,
        is_qualified: row.get(17)?,
        dedup_hash: row.get(18)?,
        status,
        status_changed_at,
        consecutive_misses: row.get(21)?,
        first_seen_at: parse_timestamp(22, &row.get::<_, String>(22)?)?,
        last_seen_at: parse_timestamp(23, &row.get::<_, String>(23)?)?,
    })
}

fn encode_options(options: &[String]) -> StoreResult<String> {
    serde_json::to_string(options).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn parse_date(idx: usize, value: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e)))
}

fn parse_timestamp(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e)))
}

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, message.into())
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// Runs a storage operation, retrying on busy/locked errors
///
/// Exponential backoff up to `STORE_RETRY_MAX_ATTEMPTS` total attempts.
/// Non-contention errors propagate immediately; exhaustion propagates the
/// last busy error for this one operation only.
fn with_store_retry<T>(
    mut op: impl FnMut() -> Result<T, rusqlite::Error>,
) -> Result<T, rusqlite::Error> {
    let mut delay = Duration::from_millis(STORE_RETRY_BASE_DELAY_MS);
    let mut attempt = 1;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(e) if is_busy(&e) && attempt < STORE_RETRY_MAX_ATTEMPTS => {
                tracing::warn!(
                    "Storage busy (attempt {}/{}), retrying in {:?}",
                    attempt,
                    STORE_RETRY_MAX_ATTEMPTS,
                    delay
                );
                std::thread::sleep(delay);
                delay = std::cmp::min(delay * 2, Duration::from_millis(STORE_RETRY_MAX_DELAY_MS));
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

fn is_busy(error: &rusqlite::Error) -> bool {
    matches!(
        error,
        rusqlite::Error::SqliteFailure(inner, _) if matches!(
            inner.code,
            rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
        )
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_store() -> SqliteListingStore {
        SqliteListingStore::new_in_memory().unwrap()
    }

    fn sample_listing(url: &str) -> NewListing {
        NewListing {
            price: Some(45000),
            mileage_km: Some(12000),
            year: Some(2023),
            external_id: Some("abc-123".to_string()),
            ..NewListing::bare(Source::Autoscout24De, url, "BMW i4 eDrive40")
        }
    }

    #[test]
    fn test_upsert_creates_listing() {
        let mut store = create_store();

        let (listing, created) = store
            .upsert_listing(&sample_listing("https://example.com/1"))
            .unwrap();

        assert!(created);
        assert!(listing.id > 0);
        assert_eq!(listing.status, ListingStatus::Active);
        assert_eq!(listing.consecutive_misses, 0);
        assert!(listing.status_changed_at.is_none());
        assert_eq!(listing.price, Some(45000));
        assert!(!listing.dedup_hash.is_empty());
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let mut store = create_store();
        let data = sample_listing("https://example.com/1");

        let (first, created_first) = store.upsert_listing(&data).unwrap();
        let (second, created_second) = store.upsert_listing(&data).unwrap();

        assert!(created_first);
        assert!(!created_second);
        assert_eq!(first.id, second.id);
    }

    #[test]
    fn test_upsert_seeds_price_history() {
        let mut store = create_store();

        let (listing, _) = store
            .upsert_listing(&sample_listing("https://example.com/1"))
            .unwrap();

        let history = store.get_price_history(listing.id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].price, 45000);
    }

    #[test]
    fn test_upsert_without_price_seeds_nothing() {
        let mut store = create_store();
        let mut data = sample_listing("https://example.com/1");
        data.price = None;

        let (listing, _) = store.upsert_listing(&data).unwrap();

        assert!(store.get_price_history(listing.id).unwrap().is_empty());
    }

    #[test]
    fn test_price_change_appends_one_entry() {
        let mut store = create_store();
        let mut data = sample_listing("https://example.com/1");

        let (listing, _) = store.upsert_listing(&data).unwrap();

        data.price = Some(43500);
        store.upsert_listing(&data).unwrap();

        let history = store.get_price_history(listing.id).unwrap();
        assert_eq!(history.len(), 2);
        // Newest first
        assert_eq!(history[0].price, 43500);
        assert_eq!(history[1].price, 45000);
    }

    #[test]
    fn test_unchanged_price_appends_nothing() {
        let mut store = create_store();
        let data = sample_listing("https://example.com/1");

        let (listing, _) = store.upsert_listing(&data).unwrap();
        store.upsert_listing(&data).unwrap();

        assert_eq!(store.get_price_history(listing.id).unwrap().len(), 1);
    }

    #[test]
    fn test_merge_prefers_new_values() {
        let mut store = create_store();
        let mut data = sample_listing("https://example.com/1");
        store.upsert_listing(&data).unwrap();

        data.title = "BMW i4 eDrive40 Gran Coupe".to_string();
        data.mileage_km = Some(15000);
        let (listing, _) = store.upsert_listing(&data).unwrap();

        assert_eq!(listing.title, "BMW i4 eDrive40 Gran Coupe");
        assert_eq!(listing.mileage_km, Some(15000));
    }

    #[test]
    fn test_merge_keeps_existing_when_new_absent() {
        let mut store = create_store();
        let mut data = sample_listing("https://example.com/1");
        data.description = Some("Full options".to_string());
        store.upsert_listing(&data).unwrap();

        let sparse = NewListing::bare(Source::Autoscout24De, "https://example.com/1", "BMW i4");
        let (listing, _) = store.upsert_listing(&sparse).unwrap();

        assert_eq!(listing.description, Some("Full options".to_string()));
        assert_eq!(listing.price, Some(45000));
        assert_eq!(listing.external_id, Some("abc-123".to_string()));
    }

    #[test]
    fn test_merge_keeps_score_when_new_is_zero() {
        let mut store = create_store();
        let mut data = sample_listing("https://example.com/1");
        data.match_score = 80.0;
        store.upsert_listing(&data).unwrap();

        data.match_score = 0.0;
        let (listing, _) = store.upsert_listing(&data).unwrap();

        assert!((listing.match_score - 80.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_merge_recomputes_dedup_hash() {
        let mut store = create_store();
        let mut data = sample_listing("https://example.com/1");
        let (before, _) = store.upsert_listing(&data).unwrap();

        data.price = Some(39999);
        let (after, _) = store.upsert_listing(&data).unwrap();

        assert_ne!(before.dedup_hash, after.dedup_hash);
        assert_eq!(
            after.dedup_hash,
            compute_dedup_hash(
                Source::Autoscout24De,
                "BMW i4 eDrive40",
                Some(39999),
                Some(12000),
                Some(2023),
            )
        );
    }

    #[test]
    fn test_listing_exists_with_price() {
        let mut store = create_store();
        store
            .upsert_listing(&sample_listing("https://example.com/1"))
            .unwrap();

        let mut no_price = sample_listing("https://example.com/2");
        no_price.price = None;
        store.upsert_listing(&no_price).unwrap();

        // Same price: skip-eligible
        assert!(store
            .listing_exists_with_price("https://example.com/1", Some(45000))
            .unwrap());
        // Different price: fetch
        assert!(!store
            .listing_exists_with_price("https://example.com/1", Some(44000))
            .unwrap());
        // Stored price, absent candidate price: fetch
        assert!(!store
            .listing_exists_with_price("https://example.com/1", None)
            .unwrap());
        // Both absent: skip-eligible
        assert!(store
            .listing_exists_with_price("https://example.com/2", None)
            .unwrap());
        // Unknown URL: fetch
        assert!(!store
            .listing_exists_with_price("https://example.com/404", Some(45000))
            .unwrap());
    }

    #[test]
    fn test_touch_last_seen() {
        let mut store = create_store();
        let (listing, _) = store
            .upsert_listing(&sample_listing("https://example.com/1"))
            .unwrap();

        store.touch_last_seen(listing.id).unwrap();

        let after = store.get_listing(listing.id).unwrap();
        assert!(after.last_seen_at >= listing.last_seen_at);
    }

    #[test]
    fn test_touch_last_seen_unknown_listing() {
        let mut store = create_store();
        assert!(matches!(
            store.touch_last_seen(9999),
            Err(StoreError::ListingNotFound(9999))
        ));
    }

    #[test]
    fn test_get_active_listings_filters_source_and_status() {
        let mut store = create_store();
        let (de, _) = store
            .upsert_listing(&sample_listing("https://example.com/de/1"))
            .unwrap();
        store
            .upsert_listing(&NewListing::bare(
                Source::Autoscout24Nl,
                "https://example.com/nl/1",
                "BMW i4",
            ))
            .unwrap();
        let (delisted, _) = store
            .upsert_listing(&sample_listing("https://example.com/de/2"))
            .unwrap();

        store.increment_consecutive_misses(&[delisted.id]).unwrap();
        store.increment_consecutive_misses(&[delisted.id]).unwrap();
        store
            .mark_listings_at_delist_threshold(&[delisted.id], 2)
            .unwrap();

        let active = store
            .get_active_listings_by_source(Source::Autoscout24De)
            .unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, de.id);
    }

    #[test]
    fn test_miss_counters() {
        let mut store = create_store();
        let (a, _) = store
            .upsert_listing(&sample_listing("https://example.com/1"))
            .unwrap();
        let (b, _) = store
            .upsert_listing(&sample_listing("https://example.com/2"))
            .unwrap();

        store.increment_consecutive_misses(&[a.id, b.id]).unwrap();
        store.increment_consecutive_misses(&[a.id]).unwrap();

        assert_eq!(store.get_listing(a.id).unwrap().consecutive_misses, 2);
        assert_eq!(store.get_listing(b.id).unwrap().consecutive_misses, 1);

        store.reset_consecutive_misses(&[a.id]).unwrap();
        assert_eq!(store.get_listing(a.id).unwrap().consecutive_misses, 0);
        assert_eq!(store.get_listing(b.id).unwrap().consecutive_misses, 1);
    }

    #[test]
    fn test_miss_counters_empty_ids_are_no_ops() {
        let mut store = create_store();
        assert_eq!(store.increment_consecutive_misses(&[]).unwrap(), 0);
        assert_eq!(store.reset_consecutive_misses(&[]).unwrap(), 0);
        assert_eq!(store.mark_listings_at_delist_threshold(&[], 2).unwrap(), 0);
    }

    #[test]
    fn test_delist_threshold_transition() {
        let mut store = create_store();
        let (listing, _) = store
            .upsert_listing(&sample_listing("https://example.com/1"))
            .unwrap();

        store.increment_consecutive_misses(&[listing.id]).unwrap();
        assert_eq!(
            store.mark_listings_at_delist_threshold(&[listing.id], 2).unwrap(),
            0,
            "one miss must not delist"
        );

        store.increment_consecutive_misses(&[listing.id]).unwrap();
        assert_eq!(
            store.mark_listings_at_delist_threshold(&[listing.id], 2).unwrap(),
            1
        );

        let after = store.get_listing(listing.id).unwrap();
        assert_eq!(after.status, ListingStatus::Delisted);
        assert!(after.status_changed_at.is_some());
        // The counter survives the transition as evidence
        assert_eq!(after.consecutive_misses, 2);
    }

    #[test]
    fn test_delist_only_touches_given_ids() {
        let mut store = create_store();
        let (a, _) = store
            .upsert_listing(&sample_listing("https://example.com/1"))
            .unwrap();
        let (b, _) = store
            .upsert_listing(&sample_listing("https://example.com/2"))
            .unwrap();

        store.increment_consecutive_misses(&[a.id, b.id]).unwrap();
        store.increment_consecutive_misses(&[a.id, b.id]).unwrap();

        store.mark_listings_at_delist_threshold(&[a.id], 2).unwrap();

        assert_eq!(store.get_listing(a.id).unwrap().status, ListingStatus::Delisted);
        assert_eq!(store.get_listing(b.id).unwrap().status, ListingStatus::Active);
    }

    #[test]
    fn test_counts() {
        let mut store = create_store();
        let mut qualified = sample_listing("https://example.com/1");
        qualified.is_qualified = true;
        store.upsert_listing(&qualified).unwrap();
        store
            .upsert_listing(&sample_listing("https://example.com/2"))
            .unwrap();

        assert_eq!(store.count_listings().unwrap(), 2);
        assert_eq!(
            store.count_listings_by_status(ListingStatus::Active).unwrap(),
            2
        );
        assert_eq!(
            store.count_listings_by_status(ListingStatus::Delisted).unwrap(),
            0
        );
        assert_eq!(store.count_qualified_listings().unwrap(), 1);
    }

    #[test]
    fn test_get_listing_not_found() {
        let store = create_store();
        assert!(matches!(
            store.get_listing(42),
            Err(StoreError::ListingNotFound(42))
        ));
    }

    #[test]
    fn test_round_trips_optional_fields() {
        let mut store = create_store();
        let mut data = sample_listing("https://example.com/1");
        data.first_registration = NaiveDate::from_ymd_opt(2023, 6, 1);
        data.location_city = Some("München".to_string());
        data.dealer_type = Some("dealer".to_string());
        data.matched_options = vec!["Head-Up Display".to_string(), "Harman Kardon".to_string()];

        let (listing, _) = store.upsert_listing(&data).unwrap();

        assert_eq!(listing.first_registration, NaiveDate::from_ymd_opt(2023, 6, 1));
        assert_eq!(listing.location_city, Some("München".to_string()));
        assert_eq!(listing.dealer_type, Some("dealer".to_string()));
        assert_eq!(listing.matched_options.len(), 2);
    }

    #[test]
    fn test_is_busy_classification() {
        let busy = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        );
        assert!(is_busy(&busy));

        let other = rusqlite::Error::QueryReturnedNoRows;
        assert!(!is_busy(&other));
    }
}
