//! Presence/absence reconciliation after a scrape pass
//!
//! After the orchestrator finishes walking a source's result pages, the
//! tracker compares the set of listing ids observed in the pass against
//! the listings currently believed to be on the market. Listings that
//! resurfaced get their miss counter reset; listings that did not get it
//! incremented, and once the counter reaches the threshold the listing is
//! delisted.

use crate::scrape::Source;
use crate::storage::{ListingStore, SqliteListingStore, StoreResult};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Consecutive missed passes before a listing is considered gone
pub const DELIST_THRESHOLD: u32 = 2;

/// Outcome of one reconciliation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Active listings that resurfaced in this pass
    pub seen: usize,
    /// Active listings the pass failed to observe
    pub missed: usize,
    /// Listings transitioned to DELISTED by this pass
    pub delisted: usize,
}

/// Reconciles listing lifecycle state after each scrape pass
pub struct LifecycleTracker {
    store: Arc<Mutex<SqliteListingStore>>,
    threshold: u32,
}

impl LifecycleTracker {
    /// Creates a tracker with the default delist threshold
    pub fn new(store: Arc<Mutex<SqliteListingStore>>) -> Self {
        Self::with_threshold(store, DELIST_THRESHOLD)
    }

    /// Creates a tracker with a custom delist threshold
    pub fn with_threshold(store: Arc<Mutex<SqliteListingStore>>, threshold: u32) -> Self {
        Self { store, threshold }
    }

    /// Reconciles one source against the pass's observed listing ids
    ///
    /// Only listings that are currently ACTIVE participate; DELISTED rows
    /// are outside the comparison set and are never reconsidered here.
    /// Each counter update is an independent write; there is no
    /// source-wide transaction, so a crash mid-pass leaves some counters
    /// updated and the rest untouched until the next run.
    pub fn reconcile(
        &self,
        source: Source,
        seen_ids: &HashSet<i64>,
    ) -> StoreResult<ReconcileOutcome> {
        let mut store = match self.store.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let active = store.get_active_listings_by_source(source)?;

        let (seen, unseen): (Vec<i64>, Vec<i64>) = active
            .iter()
            .map(|listing| listing.id)
            .partition(|id| seen_ids.contains(id));

        store.reset_consecutive_misses(&seen)?;
        store.increment_consecutive_misses(&unseen)?;
        let delisted = store.mark_listings_at_delist_threshold(&unseen, self.threshold)?;

        if delisted > 0 {
            tracing::info!(
                "Delisted {} listing(s) from {} after {} consecutive misses",
                delisted,
                source,
                self.threshold
            );
        }
        tracing::debug!(
            "Lifecycle pass for {}: {} seen, {} missed, {} delisted",
            source,
            seen.len(),
            unseen.len(),
            delisted
        );

        Ok(ReconcileOutcome {
            seen: seen.len(),
            missed: unseen.len(),
            delisted,
        })
    }
}
