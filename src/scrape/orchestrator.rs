//! Scrape orchestration: the per-job crawl loop
//!
//! Walks a source's search-result pages, decides per listing whether the
//! expensive detail fetch can be skipped, upserts what it finds, and hands
//! the set of observed listings to the lifecycle tracker. Every fetch goes
//! through the cache, then the rate limiter, then the retry wrapper, and
//! only then the page fetcher.

use crate::browser::PageFetcher;
use crate::cache::PageCache;
use crate::config::{OptionsConfig, ScraperConfig};
use crate::lifecycle::LifecycleTracker;
use crate::matching::{calculate_score, match_options};
use crate::scrape::progress::{ScrapeProgress, ScrapeResult};
use crate::scrape::ratelimit::RateLimiter;
use crate::scrape::retry::{fetch_with_retry, RetryPolicy};
use crate::scrape::traits::{ListingCard, ListingDetail, SearchFilters, SiteScraper};
use crate::storage::{ListingStore, NewListing, SqliteListingStore};
use crate::ScoutError;
use chrono::{Datelike, NaiveDate};
use rand::Rng;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Callback receiving incremental progress updates
pub type ProgressCallback<'a> = &'a mut (dyn FnMut(ScrapeProgress) + Send);

/// What happened to one listing candidate
enum ListingOutcome {
    New(i64),
    Updated(i64),
    Skipped(i64),
}

/// Drives the page-by-page crawl for one job
///
/// The orchestrator borrows its page fetcher so the caller keeps ownership
/// of the browser session and can tear it down on the job's exit path
/// whether the job succeeded or failed.
pub struct Orchestrator<'f, F: PageFetcher> {
    scraper: Box<dyn SiteScraper>,
    fetcher: &'f mut F,
    store: Arc<Mutex<SqliteListingStore>>,
    tracker: LifecycleTracker,
    cache: Option<PageCache>,
    limiter: RateLimiter,
    retry: RetryPolicy,
    config: ScraperConfig,
    options: OptionsConfig,
}

impl<'f, F: PageFetcher> Orchestrator<'f, F> {
    /// Creates an orchestrator for one site
    ///
    /// Pacing and retry behavior derive from the scraper config; pass
    /// `None` for the cache to disable it (every fetch then hits the
    /// network).
    pub fn new(
        scraper: Box<dyn SiteScraper>,
        fetcher: &'f mut F,
        store: Arc<Mutex<SqliteListingStore>>,
        cache: Option<PageCache>,
        config: ScraperConfig,
        options: OptionsConfig,
    ) -> Self {
        let limiter = RateLimiter::new(config.requests_per_minute);
        let retry = RetryPolicy::new(
            config.max_retries,
            Duration::from_millis(config.retry_delay_ms),
        );
        let tracker = LifecycleTracker::new(store.clone());

        Self {
            scraper,
            fetcher,
            store,
            tracker,
            cache,
            limiter,
            retry,
            config,
            options,
        }
    }

    /// Runs one scrape job across up to `max_pages` result pages
    ///
    /// Stops early when a page yields no listings. A failing page is
    /// logged and skipped rather than aborting the job, so a run with
    /// partial failures still produces partial results. After the page
    /// loop, the observed listing ids are reconciled by the lifecycle
    /// tracker.
    pub async fn run_scrape(
        &mut self,
        max_pages: u32,
        filters: Option<SearchFilters>,
        mut progress: Option<ProgressCallback<'_>>,
    ) -> Result<ScrapeResult, ScoutError> {
        let source = self.scraper.source();
        tracing::info!("Starting scrape of {} ({} page budget)", source, max_pages);

        let mut result = ScrapeResult::default();
        let mut seen_ids: HashSet<i64> = HashSet::new();

        for page_num in 1..=max_pages {
            emit(&mut progress, progress_update(page_num, max_pages, &result, None));

            let url = self.scraper.build_search_url(page_num, filters.as_ref());
            let cards = match self.fetch_search_page(&url).await {
                Ok(cards) => cards,
                Err(e) => {
                    tracing::error!(
                        "Error scraping page {}, continuing to next page: {}",
                        page_num,
                        e
                    );
                    continue;
                }
            };

            if cards.is_empty() {
                tracing::info!("Page {} returned no listings, stopping early", page_num);
                break;
            }

            tracing::debug!("Page {}: {} listing cards", page_num, cards.len());

            for card in &cards {
                result.total_found += 1;
                match self.process_listing(card).await {
                    Ok(ListingOutcome::New(id)) => {
                        result.new_listings += 1;
                        result.fetched_details += 1;
                        seen_ids.insert(id);
                    }
                    Ok(ListingOutcome::Updated(id)) => {
                        result.updated_listings += 1;
                        result.fetched_details += 1;
                        seen_ids.insert(id);
                    }
                    Ok(ListingOutcome::Skipped(id)) => {
                        result.skipped_unchanged += 1;
                        seen_ids.insert(id);
                    }
                    Err(e) => {
                        tracing::warn!("Error processing listing {}: {}", card.url, e);
                    }
                }

                emit(
                    &mut progress,
                    progress_update(page_num, max_pages, &result, Some(card.title.clone())),
                );
            }

            self.human_pause().await;
        }

        let reconciled = self.tracker.reconcile(source, &seen_ids)?;
        tracing::info!(
            "Scrape of {} finished: {} found, {} new, {} updated, {} skipped; {} delisted",
            source,
            result.total_found,
            result.new_listings,
            result.updated_listings,
            result.skipped_unchanged,
            reconciled.delisted
        );

        Ok(result)
    }

    async fn fetch_search_page(&mut self, url: &str) -> Result<Vec<ListingCard>, ScoutError> {
        let html = self.fetch_page(url).await?;
        Ok(self.scraper.parse_listing_cards(&html)?)
    }

    /// Decides skip vs fetch-detail for one card and upserts accordingly
    ///
    /// Skip-eligible means a listing already exists for the URL with an
    /// identical price (both absent counts as identical); only
    /// `last_seen_at` is refreshed then. Otherwise the detail page is
    /// fetched (parse failures degrade to an empty detail rather than
    /// discarding the candidate), matched, scored, and upserted.
    async fn process_listing(&mut self, card: &ListingCard) -> Result<ListingOutcome, ScoutError> {
        let skip_eligible = self
            .lock_store()
            .listing_exists_with_price(&card.url, card.price)?;

        if skip_eligible {
            let mut store = self.lock_store();
            if let Some(existing) = store.get_listing_by_url(&card.url)? {
                store.touch_last_seen(existing.id)?;
                tracing::debug!("Skipping unchanged listing {}", card.url);
                return Ok(ListingOutcome::Skipped(existing.id));
            }
        }

        let detail = match self.fetch_detail(&card.url).await {
            Ok(detail) => detail,
            Err(e) => {
                tracing::warn!("Error fetching detail page {}: {}", card.url, e);
                ListingDetail::default()
            }
        };

        let searchable = match &detail.description {
            Some(description) => format!("{}\n{}", card.title, description),
            None => card.title.clone(),
        };
        let match_result = match_options(&detail.options_list, &self.options, Some(&searchable));
        let scored = calculate_score(&match_result, &self.options);

        let mut matched_options = match_result.matched_required;
        matched_options.extend(match_result.matched_nice_to_have);

        let first_registration = card
            .first_registration
            .as_deref()
            .and_then(parse_first_registration);

        let data = NewListing {
            source: self.scraper.source(),
            external_id: card.external_id.clone(),
            url: card.url.clone(),
            title: card.title.clone(),
            price: card.price,
            mileage_km: card.mileage_km,
            year: first_registration.map(|d| d.year()),
            first_registration,
            location_city: detail.location_city,
            location_zip: detail.location_zip,
            location_country: detail.location_country,
            dealer_name: detail.dealer_name,
            dealer_type: detail.dealer_type,
            description: detail.description,
            matched_options,
            match_score: scored.score,
            is_qualified: scored.is_qualified,
        };

        let (listing, created) = self.lock_store().upsert_listing(&data)?;
        Ok(if created {
            ListingOutcome::New(listing.id)
        } else {
            ListingOutcome::Updated(listing.id)
        })
    }

    async fn fetch_detail(&mut self, url: &str) -> Result<ListingDetail, ScoutError> {
        let html = self.fetch_page(url).await?;
        Ok(self.scraper.parse_listing_detail(&html, url)?)
    }

    /// Fetches a page body: cache first, then rate limit, retry, fetcher
    ///
    /// A cache write failure only costs a future refetch, so it is logged
    /// and swallowed.
    async fn fetch_page(&mut self, url: &str) -> Result<String, ScoutError> {
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(url) {
                tracing::debug!("Cache hit for {}", url);
                return Ok(hit.html);
            }
        }

        self.limiter.check_rate_limit().await;

        let policy = self.retry;
        let html = fetch_with_retry(&policy, &mut *self.fetcher, url).await?;

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.set(url, &html) {
                tracing::warn!("Failed to write cache entry for {}: {}", url, e);
            }
        }

        Ok(html)
    }

    /// Randomized pause between result pages, for human-like pacing
    async fn human_pause(&self) {
        if self.config.max_delay_ms == 0 {
            return;
        }
        let ms = {
            let mut rng = rand::thread_rng();
            rng.gen_range(self.config.min_delay_ms..=self.config.max_delay_ms)
        };
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    fn lock_store(&self) -> MutexGuard<'_, SqliteListingStore> {
        match self.store.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn progress_update(
    page: u32,
    total_pages: u32,
    result: &ScrapeResult,
    current_listing: Option<String>,
) -> ScrapeProgress {
    ScrapeProgress {
        page,
        total_pages,
        listings_found: result.total_found,
        new_count: result.new_listings,
        updated_count: result.updated_listings,
        skipped_count: result.skipped_unchanged,
        current_listing,
    }
}

fn emit(progress: &mut Option<ProgressCallback<'_>>, update: ScrapeProgress) {
    if let Some(callback) = progress.as_mut() {
        callback(update);
    }
}

/// Parses a first-registration string like "06/2023", "06-2023", or "2023"
///
/// Returns the first day of the given month (or year). "new" and anything
/// unparseable map to None.
pub fn parse_first_registration(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("new") {
        return None;
    }

    if let Some((month_str, year_str)) = value.split_once(|c| c == '/' || c == '-') {
        if year_str.len() != 4 {
            return None;
        }
        let month: u32 = month_str.parse().ok()?;
        let year: i32 = year_str.parse().ok()?;
        if (1..=12).contains(&month) && (2000..=2100).contains(&year) {
            return NaiveDate::from_ymd_opt(year, month, 1);
        }
        return None;
    }

    if value.len() == 4 {
        let year: i32 = value.parse().ok()?;
        if (2000..=2100).contains(&year) {
            return NaiveDate::from_ymd_opt(year, 1, 1);
        }
    }

    None
}
