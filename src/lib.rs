//! Card price aggregation pipeline.
//!
//! Resolves market prices for collectible card singles across several
//! independent catalog and pricing services: concurrency-bounded fetching,
//! per-source fallback chains, rate-limit cooldowns, TTL result caching
//! and a currency-conversion pass over the merged result.

pub mod aggregator;
pub mod cache;
pub mod config;
pub mod currency;
pub mod error;
pub mod models;
pub mod normalize;
pub mod queue;
pub mod rate_limit;
pub mod sources;

pub use aggregator::Aggregator;
pub use config::{Config, ListingFilterConfig};
pub use error::{FetchError, Result};
pub use models::{
    CardDescriptor, CardList, CardSummary, Currency, Price, PricingBundle, PricingQuote,
    SearchQuery, SoldListing, SourceId,
};

/// User-Agent header sent with every outbound request.
pub(crate) const USER_AGENT: &str = "card_pricer/1.0";
