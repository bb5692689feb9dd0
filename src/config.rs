//! Pipeline configuration.
//!
//! Every tunable lives on an explicit `Config` instance threaded through
//! the aggregator, so tests can construct isolated pipelines instead of
//! mutating process-wide state.

use crate::currency::{default_rate_providers, RateProvider};
use std::time::Duration;

/// Tunables for the secondary-market listing relevance filter. The
/// thresholds are heuristics, not derived constants.
#[derive(Debug, Clone)]
pub struct ListingFilterConfig {
    /// Minimum share of the requested set name's significant words that
    /// must appear in a listing title.
    pub set_overlap_threshold: f64,
    /// Listings priced below `median * outlier_low_factor` are discarded.
    pub outlier_low_factor: f64,
    /// Listings priced above `median * outlier_high_factor` are discarded.
    pub outlier_high_factor: f64,
    /// How many surviving listings to keep as supporting evidence.
    pub evidence_limit: usize,
}

impl Default for ListingFilterConfig {
    fn default() -> Self {
        Self {
            set_overlap_threshold: 0.6,
            outlier_low_factor: 0.25,
            outlier_high_factor: 4.0,
            evidence_limit: 5,
        }
    }
}

/// Pipeline configuration. Credentials are independently optional: a
/// missing one degrades the matching source to an "unavailable" quote
/// instead of failing the pipeline.
#[derive(Debug, Clone)]
pub struct Config {
    pub pokemontcg_api_key: Option<String>,
    pub justtcg_api_token: Option<String>,
    pub ebay_app_id: Option<String>,

    /// Concurrency limit for catalog lookups
    pub catalog_concurrency: usize,
    /// Concurrency limit for pricing lookups
    pub pricing_concurrency: usize,
    /// Cooldown window after a throttling signal
    pub rate_limit_cooldown: Duration,
    /// TTL for cached catalog search results
    pub cache_ttl: Duration,
    /// TTL for the cached exchange rate
    pub exchange_rate_ttl: Duration,
    /// Pause between per-card pricing passes during catalog searches
    pub per_card_delay: Duration,
    /// Call-level timeout applied to every outbound request
    pub request_timeout: Duration,

    pub listing_filter: ListingFilterConfig,

    pub tcgdex_base_url: String,
    pub pokemontcg_base_url: String,
    pub justtcg_base_url: String,
    pub ebay_base_url: String,
    pub rate_providers: Vec<RateProvider>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pokemontcg_api_key: None,
            justtcg_api_token: None,
            ebay_app_id: None,
            catalog_concurrency: 50,
            pricing_concurrency: 100,
            rate_limit_cooldown: Duration::from_secs(3600),
            cache_ttl: Duration::from_secs(600),
            exchange_rate_ttl: Duration::from_secs(6 * 3600),
            per_card_delay: Duration::from_millis(250),
            request_timeout: Duration::from_secs(20),
            listing_filter: ListingFilterConfig::default(),
            tcgdex_base_url: crate::sources::tcgdex::DEFAULT_BASE_URL.to_string(),
            pokemontcg_base_url: crate::sources::pokemontcg::DEFAULT_BASE_URL.to_string(),
            justtcg_base_url: crate::sources::justtcg::DEFAULT_BASE_URL.to_string(),
            ebay_base_url: crate::sources::ebay::DEFAULT_BASE_URL.to_string(),
            rate_providers: default_rate_providers(),
        }
    }
}

impl Config {
    /// Defaults plus credentials read from the environment.
    pub fn from_env() -> Self {
        let config = Self {
            pokemontcg_api_key: std::env::var("POKEMONTCG_API_KEY").ok(),
            justtcg_api_token: std::env::var("JUSTTCG_API_TOKEN").ok(),
            ebay_app_id: std::env::var("EBAY_APP_ID").ok(),
            ..Self::default()
        };
        for (name, value) in [
            ("pokemontcg", &config.pokemontcg_api_key),
            ("justtcg", &config.justtcg_api_token),
            ("ebay", &config.ebay_app_id),
        ] {
            if value.is_none() {
                log::info!("No credential configured for {}, source will be skipped", name);
            }
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_queue_limits_differ_per_category() {
        let config = Config::default();
        assert_eq!(config.catalog_concurrency, 50);
        assert_eq!(config.pricing_concurrency, 100);
    }

    #[test]
    fn default_filter_thresholds() {
        let filter = ListingFilterConfig::default();
        assert!((filter.set_overlap_threshold - 0.6).abs() < 1e-9);
        assert!(filter.outlier_low_factor < 1.0);
        assert!(filter.outlier_high_factor > 1.0);
        assert_eq!(filter.evidence_limit, 5);
    }
}
