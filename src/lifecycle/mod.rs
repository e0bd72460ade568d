//! Listing lifecycle tracking
//!
//! Defines the ACTIVE/DELISTED state machine and the reconciliation pass
//! that advances it after each scrape.

mod status;
mod tracker;

pub use status::ListingStatus;
pub use tracker::{LifecycleTracker, ReconcileOutcome, DELIST_THRESHOLD};
