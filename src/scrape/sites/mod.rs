//! Per-site scraper implementations

mod autoscout24;

pub use autoscout24::Autoscout24Scraper;
