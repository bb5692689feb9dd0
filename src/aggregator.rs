//! Orchestrates queues, fetchers, cache and currency conversion into the
//! two operations exposed to the surrounding application.

use crate::cache::ResultCache;
use crate::config::Config;
use crate::currency::CurrencyConverter;
use crate::error::Result;
use crate::models::{CardDescriptor, CardList, Price, PricingBundle, SearchQuery};
use crate::queue::RequestQueue;
use crate::rate_limit::RateLimitTracker;
use crate::sources::{EbayClient, JustTcgClient, PokemonTcgClient, TcgdexClient};
use std::sync::Arc;

/// The aggregation pipeline. One instance owns all pipeline state
/// (queues, cooldown tracker, caches, converter), so tests can construct
/// isolated pipelines from a `Config`.
pub struct Aggregator {
    config: Config,
    cache: ResultCache<CardList>,
    converter: CurrencyConverter,
    catalog_queue: RequestQueue,
    pricing_queue: RequestQueue,
    tcgdex: TcgdexClient,
    pokemontcg: PokemonTcgClient,
    justtcg: JustTcgClient,
    ebay: EbayClient,
}

impl Aggregator {
    /// Wire the full pipeline from one configuration. All clients share
    /// one HTTP client carrying the call-level request timeout.
    pub fn new(config: Config) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .expect("HTTP client construction failed");
        let limits = Arc::new(RateLimitTracker::new(config.rate_limit_cooldown));
        Self {
            cache: ResultCache::new(config.cache_ttl),
            converter: CurrencyConverter::new(
                config.rate_providers.clone(),
                config.exchange_rate_ttl,
                http.clone(),
            ),
            catalog_queue: RequestQueue::new(config.catalog_concurrency),
            pricing_queue: RequestQueue::new(config.pricing_concurrency),
            tcgdex: TcgdexClient::new(
                http.clone(),
                config.tcgdex_base_url.clone(),
                Arc::clone(&limits),
            ),
            pokemontcg: PokemonTcgClient::new(
                http.clone(),
                config.pokemontcg_base_url.clone(),
                config.pokemontcg_api_key.clone(),
                Arc::clone(&limits),
            ),
            justtcg: JustTcgClient::new(
                http.clone(),
                config.justtcg_base_url.clone(),
                config.justtcg_api_token.clone(),
                Arc::clone(&limits),
            ),
            ebay: EbayClient::new(
                http,
                config.ebay_base_url.clone(),
                config.ebay_app_id.clone(),
                Arc::clone(&limits),
                config.listing_filter.clone(),
            ),
            config,
        }
    }

    /// Resolve the full pricing bundle for one card.
    ///
    /// Always resolves: per-source failures surface as sentinel quotes
    /// inside the bundle, never as errors. The returned bundle carries an
    /// entry for every configured source.
    pub async fn resolve_pricing(&self, descriptor: &CardDescriptor) -> PricingBundle {
        log::info!(
            "Resolving pricing for \"{}\" (number: {:?}, set: {:?})",
            descriptor.name,
            descriptor.number,
            descriptor.set_name
        );
        let (catalog, community, market, listings) = tokio::join!(
            self.catalog_queue.submit(self.tcgdex.fetch_price(descriptor)),
            self.pricing_queue.submit(self.pokemontcg.fetch_price(descriptor)),
            self.pricing_queue.submit(self.justtcg.fetch_price(descriptor)),
            self.pricing_queue.submit(self.ebay.fetch_price(descriptor)),
        );

        let mut bundle = PricingBundle::default();
        bundle.insert(catalog);
        bundle.insert(community);
        bundle.insert(market);
        bundle.insert(listings);

        self.converter.convert_bundle(&mut bundle).await;
        bundle
    }

    /// Search the catalog, optionally attaching a pricing bundle per hit.
    ///
    /// `refresh` bypasses (and replaces) the cached entry. With
    /// `include_pricing` unset all pricing fetchers are skipped entirely.
    pub async fn search_catalog(&self, query: &SearchQuery, refresh: bool) -> Result<CardList> {
        let key = query.cache_key();
        if refresh {
            self.cache.invalidate(&key);
        } else if let Some(cached) = self.cache.get(&key) {
            log::debug!("Cache hit for {}", key);
            return Ok(cached);
        }

        let mut cards = self.catalog_queue.submit(self.tcgdex.search(query)).await?;
        log::info!("Catalog search \"{}\" returned {} cards", query.name, cards.len());

        if query.include_pricing {
            for card in &mut cards {
                let descriptor = CardDescriptor {
                    name: card.name.clone(),
                    number: card.number.clone(),
                    set_name: card.set_name.clone().or_else(|| query.set_name.clone()),
                    language: query.language.clone(),
                };
                card.pricing = Some(self.resolve_pricing(&descriptor).await);
                // deliberate pacing to stay under upstream per-second limits
                tokio::time::sleep(self.config.per_card_delay).await;
            }
        }

        let list = CardList { cards };
        self.cache.set(&key, list.clone());
        Ok(list)
    }

    /// Display formatter shared with the binary.
    pub fn format_price(&self, price: &Price) -> String {
        self.converter.format(price)
    }
}

#[cfg(test)]
#[path = "aggregator_tests.rs"]
mod tests;
