//! Database schema definitions
//!
//! All SQL schema for the carscout database lives here.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per physical ad, keyed by canonical URL
CREATE TABLE IF NOT EXISTS listings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source TEXT NOT NULL,
    external_id TEXT,
    url TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    price INTEGER,
    mileage_km INTEGER,
    year INTEGER,
    first_registration TEXT,
    location_city TEXT,
    location_zip TEXT,
    location_country TEXT,
    dealer_name TEXT,
    dealer_type TEXT,
    description TEXT,
    matched_options TEXT NOT NULL DEFAULT '[]',
    match_score REAL NOT NULL DEFAULT 0,
    is_qualified INTEGER NOT NULL DEFAULT 0,
    dedup_hash TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'active',
    status_changed_at TEXT,
    consecutive_misses INTEGER NOT NULL DEFAULT 0,
    first_seen_at TEXT NOT NULL,
    last_seen_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_listings_source ON listings(source);
CREATE INDEX IF NOT EXISTS idx_listings_status ON listings(status);
CREATE INDEX IF NOT EXISTS idx_listings_dedup_hash ON listings(dedup_hash);

-- Observed prices over time, newest rows appended on change only
CREATE TABLE IF NOT EXISTS price_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    listing_id INTEGER NOT NULL REFERENCES listings(id) ON DELETE CASCADE,
    price INTEGER NOT NULL,
    recorded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_price_history_listing ON price_history(listing_id);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_initializes() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(initialize_schema(&conn).is_ok());
    }

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        initialize_schema(&conn).unwrap();
        assert!(initialize_schema(&conn).is_ok());
    }

    #[test]
    fn test_tables_exist_after_init() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        for table in ["listings", "price_history"] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "Table {} should exist", table);
        }
    }

    #[test]
    fn test_url_unique_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        let insert = "INSERT INTO listings (source, url, title, dedup_hash, first_seen_at, last_seen_at)
                      VALUES ('autoscout24_de', 'https://example.com/1', 'A', 'h', 't', 't')";
        conn.execute(insert, []).unwrap();
        assert!(conn.execute(insert, []).is_err());
    }

    #[test]
    fn test_price_history_cascade_delete() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        initialize_schema(&conn).unwrap();

        conn.execute(
            "INSERT INTO listings (source, url, title, dedup_hash, first_seen_at, last_seen_at)
             VALUES ('autoscout24_de', 'https://example.com/1', 'A', 'h', 't', 't')",
            [],
        )
        .unwrap();
        let listing_id = conn.last_insert_rowid();
        conn.execute(
            "INSERT INTO price_history (listing_id, price, recorded_at) VALUES (?1, 45000, 't')",
            [listing_id],
        )
        .unwrap();

        conn.execute("DELETE FROM listings WHERE id = ?1", [listing_id])
            .unwrap();

        let remaining: i64 = conn
            .query_row("SELECT COUNT(*) FROM price_history", [], |row| row.get(0))
            .unwrap();
        assert_eq!(remaining, 0);
    }
}
