//! Configuration validation rules
//!
//! Catches values that would make a scrape silently misbehave (a zero page
//! budget, an inverted pause range, an empty user-agent pool) before any
//! browser or database resource is touched.

use crate::config::types::Config;
use crate::ConfigError;

/// Validates a parsed configuration
///
/// # Arguments
///
/// * `config` - The parsed configuration to check
///
/// # Returns
///
/// * `Ok(())` - Configuration is usable
/// * `Err(ConfigError::Validation)` - A rule was violated
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.scraper.max_pages == 0 {
        return Err(ConfigError::Validation(
            "scraper.max-pages must be at least 1".to_string(),
        ));
    }

    if config.scraper.max_retries == 0 {
        return Err(ConfigError::Validation(
            "scraper.max-retries must be at least 1".to_string(),
        ));
    }

    if config.scraper.min_delay_ms > config.scraper.max_delay_ms {
        return Err(ConfigError::Validation(format!(
            "scraper.min-delay-ms ({}) exceeds scraper.max-delay-ms ({})",
            config.scraper.min_delay_ms, config.scraper.max_delay_ms
        )));
    }

    if config.browser.rotation_threshold == 0 {
        return Err(ConfigError::Validation(
            "browser.rotation-threshold must be at least 1".to_string(),
        ));
    }

    if config.browser.viewport_width == 0 || config.browser.viewport_height == 0 {
        return Err(ConfigError::Validation(
            "browser viewport dimensions must be non-zero".to_string(),
        ));
    }

    if config.browser.user_agents.is_empty() {
        return Err(ConfigError::Validation(
            "browser.user-agents must contain at least one entry".to_string(),
        ));
    }

    if config.output.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "output.database-path must not be empty".to_string(),
        ));
    }

    if config.output.cache_dir.is_empty() {
        return Err(ConfigError::Validation(
            "output.cache-dir must not be empty".to_string(),
        ));
    }

    for entry in config
        .options
        .required
        .iter()
        .chain(config.options.nice_to_have.iter())
    {
        if entry.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "option entries must have a non-empty name".to_string(),
            ));
        }
        if entry.is_bundle && entry.bundle_contents.is_empty() {
            return Err(ConfigError::Validation(format!(
                "option '{}' is marked as a bundle but lists no contents",
                entry.name
            )));
        }
    }

    Ok(())
}
