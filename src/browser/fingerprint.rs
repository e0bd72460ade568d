//! Randomized session fingerprints
//!
//! Each browsing context carries a fingerprint drawn from a pool of
//! realistic values. Rotating the context re-rolls the fingerprint, which
//! resets the accumulated correlation between requests.

use crate::config::BrowserConfig;
use rand::seq::SliceRandom;
use rand::Rng;

/// The identity one browsing context presents to the site
#[derive(Debug, Clone)]
pub struct Fingerprint {
    pub user_agent: String,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub locale: String,
    pub timezone: String,
}

/// Common desktop viewport sizes used to jitter the configured baseline
const VIEWPORT_POOL: [(u32, u32); 4] = [(1920, 1080), (1366, 768), (1536, 864), (1440, 900)];

impl Fingerprint {
    /// Draws a randomized fingerprint from the configured pools
    ///
    /// The user agent comes from the config's pool; the viewport is either
    /// the configured size or a common desktop size, picked at random.
    /// Locale and timezone are fixed per deployment so they stay coherent
    /// with the site being scraped.
    pub fn randomized(config: &BrowserConfig) -> Self {
        let mut rng = rand::thread_rng();

        let user_agent = config
            .user_agents
            .choose(&mut rng)
            .cloned()
            .unwrap_or_default();

        let (viewport_width, viewport_height) = if rng.gen_bool(0.5) {
            (config.viewport_width, config.viewport_height)
        } else {
            *VIEWPORT_POOL
                .choose(&mut rng)
                .unwrap_or(&(config.viewport_width, config.viewport_height))
        };

        Self {
            user_agent,
            viewport_width,
            viewport_height,
            locale: config.locale.clone(),
            timezone: config.timezone.clone(),
        }
    }
}
