use serde::Deserialize;

/// Main configuration structure for carscout
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub options: OptionsConfig,
}

/// Scrape pacing and resilience configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ScraperConfig {
    /// Maximum number of search-result pages to walk per job
    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: u32,

    /// Outbound request budget per minute; 0 disables pacing
    #[serde(rename = "requests-per-minute", default = "default_requests_per_minute")]
    pub requests_per_minute: u32,

    /// Total navigation attempts before a fetch is given up
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Fixed wait between navigation retries (milliseconds)
    #[serde(rename = "retry-delay-ms", default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Lower bound of the human-like pause between pages (milliseconds)
    #[serde(rename = "min-delay-ms", default = "default_min_delay_ms")]
    pub min_delay_ms: u64,

    /// Upper bound of the human-like pause between pages (milliseconds)
    #[serde(rename = "max-delay-ms", default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

/// Browser session configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserConfig {
    /// Run Chromium without a visible window
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Requests served by one browsing context before it is rotated
    #[serde(rename = "rotation-threshold", default = "default_rotation_threshold")]
    pub rotation_threshold: u32,

    /// Locale passed to the browser (Accept-Language and --lang)
    #[serde(default = "default_locale")]
    pub locale: String,

    /// IANA timezone applied to every page
    #[serde(default = "default_timezone")]
    pub timezone: String,

    #[serde(rename = "viewport-width", default = "default_viewport_width")]
    pub viewport_width: u32,

    #[serde(rename = "viewport-height", default = "default_viewport_height")]
    pub viewport_height: u32,

    /// User-agent pool to draw from at each context rotation
    #[serde(rename = "user-agents", default = "default_user_agents")]
    pub user_agents: Vec<String>,
}

/// Output locations
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Directory for disposable HTML cache files
    #[serde(rename = "cache-dir", default = "default_cache_dir")]
    pub cache_dir: String,
}

/// Option matching configuration: what to look for in listings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OptionsConfig {
    #[serde(default)]
    pub required: Vec<OptionEntry>,

    #[serde(rename = "nice-to-have", default)]
    pub nice_to_have: Vec<OptionEntry>,

    /// Plain phrases that disqualify a listing outright
    #[serde(default)]
    pub dealbreakers: Vec<String>,
}

/// One option to match, with its aliases and optional bundle contents
#[derive(Debug, Clone, Deserialize)]
pub struct OptionEntry {
    /// Canonical option name
    pub name: String,

    /// Alternative names, translations, and manufacturer codes
    #[serde(default)]
    pub aliases: Vec<String>,

    /// Whether this entry is a package that implies other options
    #[serde(rename = "is-bundle", default)]
    pub is_bundle: bool,

    /// Options implied when the bundle is present
    #[serde(rename = "bundle-contents", default)]
    pub bundle_contents: Vec<String>,
}

fn default_max_pages() -> u32 {
    10
}

fn default_requests_per_minute() -> u32 {
    20
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    5000
}

fn default_min_delay_ms() -> u64 {
    2000
}

fn default_max_delay_ms() -> u64 {
    5000
}

fn default_headless() -> bool {
    true
}

fn default_rotation_threshold() -> u32 {
    10
}

fn default_locale() -> String {
    "de-DE".to_string()
}

fn default_timezone() -> String {
    "Europe/Berlin".to_string()
}

fn default_viewport_width() -> u32 {
    1920
}

fn default_viewport_height() -> u32 {
    1080
}

fn default_cache_dir() -> String {
    ".cache/html".to_string()
}

/// Realistic Chrome user agents used when the config does not supply a pool
fn default_user_agents() -> Vec<String> {
    [
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            max_pages: default_max_pages(),
            requests_per_minute: default_requests_per_minute(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            rotation_threshold: default_rotation_threshold(),
            locale: default_locale(),
            timezone: default_timezone(),
            viewport_width: default_viewport_width(),
            viewport_height: default_viewport_height(),
            user_agents: default_user_agents(),
        }
    }
}
