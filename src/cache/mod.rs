//! Disposable HTML page cache
//!
//! File-based cache for fetched page bodies, keyed by a stable hash of the
//! URL. Entirely a performance optimization: every entry (and the whole
//! directory) can be deleted at any time with no correctness impact, and a
//! corrupted entry is indistinguishable from a miss.
//!
//! TTL classes:
//! - Search/pagination pages change often: 1 hour
//! - Detail pages rarely change: 24 hours

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// TTL for search-result pages (seconds)
pub const SEARCH_TTL_SECS: i64 = 3600;

/// TTL for listing detail pages (seconds)
pub const DETAIL_TTL_SECS: i64 = 86400;

/// One cached page body with its fetch time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub url: String,
    pub html: String,
    /// Unix seconds at store time
    pub timestamp: i64,
}

/// Aggregate cache statistics for the housekeeping modes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub total: usize,
    pub valid: usize,
    pub expired: usize,
    pub search_pages: usize,
    pub detail_pages: usize,
}

/// File-backed page cache
pub struct PageCache {
    cache_dir: PathBuf,
}

impl PageCache {
    /// Opens (and creates if needed) a cache rooted at `cache_dir`
    pub fn new(cache_dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let cache_dir = cache_dir.into();
        std::fs::create_dir_all(&cache_dir)?;
        Ok(Self { cache_dir })
    }

    /// Returns the cached body for a URL if present and not expired
    ///
    /// Missing, expired, unreadable, and malformed entries all come back
    /// as `None`.
    pub fn get(&self, url: &str) -> Option<CacheEntry> {
        let path = self.entry_path(url);
        let content = std::fs::read_to_string(path).ok()?;
        let entry: CacheEntry = serde_json::from_str(&content).ok()?;

        let age = now_unix() - entry.timestamp;
        if age > ttl_for(url) {
            return None;
        }

        Some(entry)
    }

    /// Stores a page body under the URL's hash with the current timestamp
    pub fn set(&self, url: &str, html: &str) -> std::io::Result<()> {
        self.write_entry(url, html, now_unix())
    }

    fn write_entry(&self, url: &str, html: &str, timestamp: i64) -> std::io::Result<()> {
        let entry = CacheEntry {
            url: url.to_string(),
            html: html.to_string(),
            timestamp,
        };
        let json = serde_json::to_string(&entry)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(self.entry_path(url), json)
    }

    /// Deletes every cache file, returning how many were removed
    pub fn clear(&self) -> std::io::Result<usize> {
        let mut count = 0;
        for path in self.entry_files()? {
            std::fs::remove_file(path)?;
            count += 1;
        }
        Ok(count)
    }

    /// Deletes expired and unreadable entries, returning how many were removed
    pub fn clear_expired(&self) -> std::io::Result<usize> {
        let now = now_unix();
        let mut count = 0;

        for path in self.entry_files()? {
            let stale = match read_entry(&path) {
                Some(entry) => now - entry.timestamp > ttl_for(&entry.url),
                None => true,
            };
            if stale {
                std::fs::remove_file(path)?;
                count += 1;
            }
        }

        Ok(count)
    }

    /// Counts entries by TTL class and expiry state
    pub fn stats(&self) -> std::io::Result<CacheStats> {
        let now = now_unix();
        let mut stats = CacheStats::default();

        for path in self.entry_files()? {
            stats.total += 1;
            match read_entry(&path) {
                Some(entry) => {
                    if now - entry.timestamp > ttl_for(&entry.url) {
                        stats.expired += 1;
                    }
                    if is_search_url(&entry.url) {
                        stats.search_pages += 1;
                    } else {
                        stats.detail_pages += 1;
                    }
                }
                None => stats.expired += 1,
            }
        }

        stats.valid = stats.total - stats.expired;
        Ok(stats)
    }

    fn entry_path(&self, url: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", url_hash(url)))
    }

    fn entry_files(&self) -> std::io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.cache_dir)? {
            let path = entry?.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                files.push(path);
            }
        }
        Ok(files)
    }
}

/// Stable 16-hex-char filename key for a URL
fn url_hash(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..16].to_string()
}

/// Search pages are recognized by a listing path or a page-number marker
fn is_search_url(url: &str) -> bool {
    url.contains("/lst/") || url.contains("/aanbod?") || url.contains("page=")
}

fn ttl_for(url: &str) -> i64 {
    if is_search_url(url) {
        SEARCH_TTL_SECS
    } else {
        DETAIL_TTL_SECS
    }
}

fn read_entry(path: &Path) -> Option<CacheEntry> {
    let content = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&content).ok()
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_cache() -> (TempDir, PageCache) {
        let dir = TempDir::new().unwrap();
        let cache = PageCache::new(dir.path()).unwrap();
        (dir, cache)
    }

    #[test]
    fn test_set_then_get() {
        let (_dir, cache) = create_cache();

        cache.set("https://example.com/item/1", "<html>one</html>").unwrap();
        let entry = cache.get("https://example.com/item/1").unwrap();

        assert_eq!(entry.html, "<html>one</html>");
        assert_eq!(entry.url, "https://example.com/item/1");
    }

    #[test]
    fn test_miss_for_unknown_url() {
        let (_dir, cache) = create_cache();
        assert!(cache.get("https://example.com/never-stored").is_none());
    }

    #[test]
    fn test_search_url_classification() {
        assert!(is_search_url("https://www.autoscout24.de/lst/bmw/i4?page=2"));
        assert!(is_search_url("https://example.com/aanbod?prijs=30000"));
        assert!(is_search_url("https://example.com/results?page=3"));
        assert!(!is_search_url("https://example.com/angebote/bmw-i4-xyz"));
    }

    #[test]
    fn test_search_entry_expires_after_one_hour() {
        let (_dir, cache) = create_cache();
        let url = "https://example.com/lst/bmw?page=1";

        // Antedate the entry just past the search TTL
        cache
            .write_entry(url, "<html></html>", now_unix() - SEARCH_TTL_SECS - 1)
            .unwrap();

        assert!(cache.get(url).is_none());
    }

    #[test]
    fn test_detail_entry_survives_one_hour() {
        let (_dir, cache) = create_cache();
        let url = "https://example.com/angebote/bmw-i4-xyz";

        // Past the search TTL but well within the detail TTL
        cache
            .write_entry(url, "<html></html>", now_unix() - SEARCH_TTL_SECS - 1)
            .unwrap();

        assert!(cache.get(url).is_some());
    }

    #[test]
    fn test_detail_entry_expires_after_one_day() {
        let (_dir, cache) = create_cache();
        let url = "https://example.com/angebote/bmw-i4-xyz";

        cache
            .write_entry(url, "<html></html>", now_unix() - DETAIL_TTL_SECS - 1)
            .unwrap();

        assert!(cache.get(url).is_none());
    }

    #[test]
    fn test_corrupted_entry_is_a_miss() {
        let (_dir, cache) = create_cache();
        let url = "https://example.com/item/1";

        let path = cache.entry_path(url);
        std::fs::write(path, "{ not valid json").unwrap();

        assert!(cache.get(url).is_none());
    }

    #[test]
    fn test_overwrite_replaces_entry() {
        let (_dir, cache) = create_cache();
        let url = "https://example.com/item/1";

        cache.set(url, "<html>old</html>").unwrap();
        cache.set(url, "<html>new</html>").unwrap();

        assert_eq!(cache.get(url).unwrap().html, "<html>new</html>");
    }

    #[test]
    fn test_clear_removes_everything() {
        let (_dir, cache) = create_cache();

        cache.set("https://example.com/a", "a").unwrap();
        cache.set("https://example.com/b", "b").unwrap();

        assert_eq!(cache.clear().unwrap(), 2);
        assert!(cache.get("https://example.com/a").is_none());
        assert_eq!(cache.stats().unwrap().total, 0);
    }

    #[test]
    fn test_clear_expired_keeps_fresh_entries() {
        let (_dir, cache) = create_cache();

        cache.set("https://example.com/fresh", "fresh").unwrap();
        cache
            .write_entry(
                "https://example.com/old",
                "old",
                now_unix() - DETAIL_TTL_SECS - 10,
            )
            .unwrap();

        assert_eq!(cache.clear_expired().unwrap(), 1);
        assert!(cache.get("https://example.com/fresh").is_some());
    }

    #[test]
    fn test_clear_expired_removes_corrupted_files() {
        let (_dir, cache) = create_cache();

        let path = cache.entry_path("https://example.com/bad");
        std::fs::write(path, "garbage").unwrap();

        assert_eq!(cache.clear_expired().unwrap(), 1);
    }

    #[test]
    fn test_stats_counts_classes_and_expiry() {
        let (_dir, cache) = create_cache();

        cache
            .set("https://example.com/lst/bmw?page=1", "search")
            .unwrap();
        cache.set("https://example.com/angebote/one", "detail").unwrap();
        cache
            .write_entry(
                "https://example.com/angebote/two",
                "expired detail",
                now_unix() - DETAIL_TTL_SECS - 10,
            )
            .unwrap();

        let stats = cache.stats().unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.search_pages, 1);
        assert_eq!(stats.detail_pages, 2);
        assert_eq!(stats.expired, 1);
        assert_eq!(stats.valid, 2);
    }

    #[test]
    fn test_url_hash_is_stable_and_short() {
        let h1 = url_hash("https://example.com/a");
        let h2 = url_hash("https://example.com/a");
        let h3 = url_hash("https://example.com/b");

        assert_eq!(h1, h2);
        assert_ne!(h1, h3);
        assert_eq!(h1.len(), 16);
    }
}
