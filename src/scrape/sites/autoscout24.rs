//! AutoScout24 site scraper (German and Dutch markets)
//!
//! The two markets share one implementation; they differ only in host and
//! country code. Cards are `<article>` elements carrying the listing data
//! as attributes, which makes the search-page extraction cheap and robust
//! against layout churn. Detail extraction degrades field by field: a
//! missing selector yields None, never an error.

use crate::scrape::traits::{
    ListingCard, ListingDetail, ScrapeError, SearchFilters, SiteScraper, Source,
};
use scraper::{ElementRef, Html, Selector};
use url::Url;

const SEARCH_PATH: &str = "/lst/bmw/i4";

/// Scraper for autoscout24.de / autoscout24.nl
pub struct Autoscout24Scraper {
    source: Source,
    base_url: &'static str,
    country_code: &'static str,
}

impl Autoscout24Scraper {
    /// Scraper for the German market
    pub fn germany() -> Self {
        Self {
            source: Source::Autoscout24De,
            base_url: "https://www.autoscout24.de",
            country_code: "D",
        }
    }

    /// Scraper for the Dutch market
    pub fn netherlands() -> Self {
        Self {
            source: Source::Autoscout24Nl,
            base_url: "https://www.autoscout24.nl",
            country_code: "NL",
        }
    }

    /// Scraper for whichever market a source names
    pub fn for_source(source: Source) -> Self {
        match source {
            Source::Autoscout24De => Self::germany(),
            Source::Autoscout24Nl => Self::netherlands(),
        }
    }

    fn parse_card(&self, article: ElementRef<'_>) -> Option<ListingCard> {
        let external_id = article.value().attr("data-guid").map(str::to_string);

        let price = article
            .value()
            .attr("data-price")
            .and_then(|v| v.parse::<i64>().ok());

        let mileage_km = article
            .value()
            .attr("data-mileage")
            .and_then(|v| v.parse::<i64>().ok());

        // "MM-YYYY" on the wire, "MM/YYYY" everywhere else; "new" passes
        // through and parses to no date downstream
        let first_registration = article
            .value()
            .attr("data-first-registration")
            .filter(|v| !v.is_empty())
            .map(|v| if v == "new" { v.to_string() } else { v.replace('-', "/") });

        let link_selector = selector("a[href]").ok()?;
        let href = article
            .select(&link_selector)
            .filter_map(|a| a.value().attr("href"))
            .find(|href| href.contains("/angebote/") || href.contains("/aanbod/"))?;

        let url = if href.starts_with("http") {
            href.to_string()
        } else {
            Url::parse(self.base_url)
                .ok()?
                .join(href)
                .ok()?
                .to_string()
        };

        let title_selector = selector("h2").ok()?;
        let title = article
            .select(&title_selector)
            .next()
            .map(|h| collect_text(h))
            .unwrap_or_default();

        Some(ListingCard {
            url,
            title,
            price,
            mileage_km,
            external_id,
            first_registration,
        })
    }
}

impl SiteScraper for Autoscout24Scraper {
    fn source(&self) -> Source {
        self.source
    }

    fn build_search_url(&self, page: u32, filters: Option<&SearchFilters>) -> String {
        let mut params = vec![
            "atype=C".to_string(),
            format!("cy={}", self.country_code),
            "desc=0".to_string(),
        ];

        if let Some(filters) = filters {
            if let Some(price) = filters.price_max_eur {
                params.push(format!("priceto={}", price));
            }
            if let Some(mileage) = filters.mileage_max_km {
                params.push(format!("kmto={}", mileage));
            }
            if let Some(year) = filters.year_min {
                params.push(format!("fregfrom={}", year));
            }
            if let Some(year) = filters.year_max {
                params.push(format!("fregto={}", year));
            }
        }

        params.push(format!("page={}", page));
        params.push("sort=standard".to_string());
        params.push("ustate=N%2CU".to_string());

        format!("{}{}?{}", self.base_url, SEARCH_PATH, params.join("&"))
    }

    fn parse_listing_cards(&self, html: &str) -> Result<Vec<ListingCard>, ScrapeError> {
        let document = Html::parse_document(html);
        let article_selector = selector("article[data-guid]")?;

        let cards = document
            .select(&article_selector)
            .filter_map(|article| self.parse_card(article))
            .collect();

        Ok(cards)
    }

    fn parse_listing_detail(&self, html: &str, url: &str) -> Result<ListingDetail, ScrapeError> {
        let document = Html::parse_document(html);
        let mut detail = ListingDetail::default();

        let equipment_selector = selector("[data-cy=\"equipment-section\"] li")?;
        detail.options_list = document
            .select(&equipment_selector)
            .map(collect_text)
            .filter(|text| !text.is_empty())
            .collect();

        let description_selector = selector("[data-cy=\"description\"]")?;
        detail.description = document
            .select(&description_selector)
            .next()
            .map(collect_text)
            .filter(|text| !text.is_empty());

        let location_selector = selector("[data-cy=\"location\"]")?;
        if let Some(location) = document.select(&location_selector).next() {
            let text = collect_text(location);
            let (zip, city) = split_location(&text);
            detail.location_zip = zip;
            detail.location_city = city;
            detail.location_country = Some(self.country_code.to_string());
        }

        let dealer_selector = selector("[data-cy=\"seller-name\"]")?;
        if let Some(dealer) = document.select(&dealer_selector).next() {
            let name = collect_text(dealer);
            if !name.is_empty() {
                let dealer_type = if name.to_lowercase().contains("privat") {
                    "private"
                } else {
                    "dealer"
                };
                detail.dealer_type = Some(dealer_type.to_string());
                detail.dealer_name = Some(name);
            }
        }

        tracing::trace!(
            "Parsed detail for {}: {} options, description {}",
            url,
            detail.options_list.len(),
            if detail.description.is_some() { "present" } else { "absent" }
        );

        Ok(detail)
    }
}

fn selector(css: &str) -> Result<Selector, ScrapeError> {
    Selector::parse(css).map_err(|_| ScrapeError::Selector(css.to_string()))
}

fn collect_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Splits "80331 München" into zip and city; text without a leading
/// numeric token becomes just the city
fn split_location(text: &str) -> (Option<String>, Option<String>) {
    let mut parts = text.splitn(2, ' ');
    let first = parts.next().unwrap_or_default();
    let rest = parts.next().unwrap_or_default();

    if !first.is_empty() && first.chars().all(|c| c.is_ascii_digit()) {
        let city = if rest.is_empty() {
            None
        } else {
            Some(rest.to_string())
        };
        (Some(first.to_string()), city)
    } else if text.trim().is_empty() {
        (None, None)
    } else {
        (None, Some(text.trim().to_string()))
    }
}
