//! Pokémon TCG API client (community pricing).
//!
//! Carries TCGplayer market prices (USD) keyed by variant name. Requires
//! an API key; throttling is signalled with HTTP 429.

use crate::error::{FetchError, Result};
use crate::models::{CardDescriptor, Price, PricingQuote, SourceId};
use crate::normalize::{clean_name, normalize_card_number, set_name_match, SetNameMatch};
use crate::rate_limit::RateLimitTracker;
use crate::sources::{name_contains, pick_candidate, Candidate};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

pub const DEFAULT_BASE_URL: &str = "https://api.pokemontcg.io/v2";

/// Variant priority for TCGplayer price blocks, best first.
const VARIANT_PRIORITY: &[&str] = &[
    "holofoil",
    "reverseHolofoil",
    "normal",
    "1stEditionHolofoil",
    "unlimitedHolofoil",
];

#[derive(Debug, Deserialize, Clone)]
pub struct ApiSet {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct TcgplayerPriceBlock {
    pub low: Option<f64>,
    pub mid: Option<f64>,
    pub high: Option<f64>,
    pub market: Option<f64>,
    pub direct_low: Option<f64>,
}

impl TcgplayerPriceBlock {
    /// Market price with mid as fallback.
    fn representative(&self) -> Option<f64> {
        self.market.or(self.mid)
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TcgplayerPrices {
    #[serde(default)]
    pub prices: HashMap<String, TcgplayerPriceBlock>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiCard {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub set: Option<ApiSet>,
    #[serde(default)]
    pub rarity: Option<String>,
    #[serde(default)]
    pub tcgplayer: Option<TcgplayerPrices>,
}

impl Candidate for ApiCard {
    fn name(&self) -> &str {
        &self.name
    }
    fn number(&self) -> Option<&str> {
        self.number.as_deref()
    }
}

#[derive(Debug, Deserialize)]
struct CardSearchResponse {
    #[serde(default)]
    data: Vec<ApiCard>,
}

#[derive(Debug, Deserialize)]
struct SetSearchResponse {
    #[serde(default)]
    data: Vec<ApiSet>,
}

/// Community pricing client.
pub struct PokemonTcgClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    limits: Arc<RateLimitTracker>,
}

impl PokemonTcgClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        api_key: Option<String>,
        limits: Arc<RateLimitTracker>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key,
            limits,
        }
    }

    /// Resolve a card's community price through the fallback chain:
    /// set-scoped search first, then an unrestricted search filtered by
    /// name containment.
    pub async fn fetch_price(&self, descriptor: &CardDescriptor) -> PricingQuote {
        let source = SourceId::PokemonTcg;
        let Some(api_key) = self.api_key.as_deref() else {
            return PricingQuote::unavailable(source, "no API key configured");
        };
        if self.limits.is_limited(source) {
            return PricingQuote::unavailable(source, "rate limited");
        }

        let name = clean_name(&descriptor.name);
        let wanted = name.to_lowercase();

        // resolve the set name to the API's own identifier; an
        // unresolvable or unreachable set list degrades to a name filter
        let set_filter = match descriptor.set_name.as_deref() {
            Some(set_name) => match self.list_sets(api_key).await {
                Ok(sets) => match resolve_set(&sets, set_name) {
                    Some(set) => Some(format!(" set.id:\"{}\"", set.id)),
                    None => Some(format!(" set.name:\"{}\"", set_name)),
                },
                Err(FetchError::RateLimited) => {
                    return PricingQuote::unavailable(source, "rate limited");
                }
                Err(e) => {
                    log::warn!("pokemontcg set list failed: {}", e);
                    Some(format!(" set.name:\"{}\"", set_name))
                }
            },
            None => None,
        };

        // scoped search; a transient failure is a failed step, not an
        // abort
        let mut candidates = Vec::new();
        if set_filter.is_some() {
            match self.search(api_key, &name, set_filter.as_deref()).await {
                Ok(cards) => candidates = cards,
                Err(FetchError::RateLimited) => {
                    return PricingQuote::unavailable(source, "rate limited");
                }
                Err(e) => log::warn!("pokemontcg scoped search failed: {}", e),
            }
        }
        // unrestricted search filtered by name containment
        if candidates.is_empty() {
            candidates = match self.search(api_key, &name, None).await {
                Ok(cards) => cards
                    .into_iter()
                    .filter(|c| name_contains(&c.name, &wanted))
                    .collect(),
                Err(FetchError::RateLimited) => {
                    return PricingQuote::unavailable(source, "rate limited");
                }
                Err(e) => {
                    log::warn!("pokemontcg search failed: {}", e);
                    return PricingQuote::unavailable(source, format!("search failed: {}", e));
                }
            };
        }
        let Some(card) = pick_candidate(&candidates, descriptor) else {
            return PricingQuote::unavailable(source, "no candidate found");
        };

        let matched_name = Some(clean_name(&card.name));
        let matched_number = card.number.as_deref().map(normalize_card_number);
        match select_price(card) {
            Some((price, variants)) => {
                let mut quote = PricingQuote::priced(source, Price::usd(price))
                    .with_match(matched_name, matched_number);
                quote.variants = variants;
                quote
            }
            None => PricingQuote::unavailable(source, "no priced variant found")
                .with_match(matched_name, matched_number),
        }
    }

    /// GET /sets, used to resolve a requested set name to the API's own
    /// identifier.
    pub async fn list_sets(&self, api_key: &str) -> Result<Vec<ApiSet>> {
        let url = format!("{}/sets?pageSize=250", self.base_url);
        log::debug!("GET {}", url);
        let response = self
            .http
            .get(&url)
            .header("X-Api-Key", api_key)
            .header("User-Agent", crate::USER_AGENT)
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            self.limits.record_limited(SourceId::PokemonTcg);
            return Err(FetchError::RateLimited);
        }
        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(response.status()));
        }
        let body: SetSearchResponse = response.json().await?;
        Ok(body.data)
    }

    async fn search(
        &self,
        api_key: &str,
        name: &str,
        set_filter: Option<&str>,
    ) -> Result<Vec<ApiCard>> {
        let mut query = format!("name:\"{}\"", name);
        if let Some(filter) = set_filter {
            query.push_str(filter);
        }
        let url = format!(
            "{}/cards?q={}&pageSize=20",
            self.base_url,
            urlencoding::encode(&query)
        );
        log::debug!("GET {}", url);
        let response = self
            .http
            .get(&url)
            .header("X-Api-Key", api_key)
            .header("User-Agent", crate::USER_AGENT)
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            self.limits.record_limited(SourceId::PokemonTcg);
            return Err(FetchError::RateLimited);
        }
        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(response.status()));
        }
        let body: CardSearchResponse = response.json().await?;
        Ok(body.data)
    }
}

/// Exact set-name match first, then partial, mirroring the catalog
/// source's set resolution.
fn resolve_set<'a>(sets: &'a [ApiSet], wanted: &str) -> Option<&'a ApiSet> {
    sets.iter()
        .find(|s| set_name_match(&s.name, wanted) == SetNameMatch::Exact)
        .or_else(|| {
            sets.iter()
                .find(|s| set_name_match(&s.name, wanted) != SetNameMatch::None)
        })
}

/// Pick the representative price by variant priority; any priced variant
/// serves as last resort.
fn select_price(card: &ApiCard) -> Option<(f64, BTreeMap<String, Price>)> {
    let prices = &card.tcgplayer.as_ref()?.prices;
    let mut variants = BTreeMap::new();
    for (variant, block) in prices {
        if let Some(value) = block.representative() {
            variants.insert(variant.clone(), Price::usd(value));
        }
    }
    for wanted in VARIANT_PRIORITY {
        if let Some(value) = prices.get(*wanted).and_then(|b| b.representative()) {
            return Some((value, variants));
        }
    }
    let fallback = variants.values().next().and_then(|p| p.value())?;
    Some((fallback, variants))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card_with_prices(prices: serde_json::Value) -> ApiCard {
        let json = serde_json::json!({
            "id": "swsh4-44",
            "name": "Pikachu VMAX",
            "number": "044",
            "set": { "id": "swsh4", "name": "Vivid Voltage" },
            "tcgplayer": { "prices": prices }
        });
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn select_price_prefers_holofoil() {
        let card = card_with_prices(serde_json::json!({
            "normal": { "market": 1.0 },
            "reverseHolofoil": { "market": 2.0 },
            "holofoil": { "market": 3.0 }
        }));
        let (price, variants) = select_price(&card).unwrap();
        assert!((price - 3.0).abs() < 1e-9);
        assert_eq!(variants.len(), 3);
    }

    #[test]
    fn select_price_uses_mid_when_market_missing() {
        let card = card_with_prices(serde_json::json!({
            "holofoil": { "mid": 4.5 }
        }));
        let (price, _) = select_price(&card).unwrap();
        assert!((price - 4.5).abs() < 1e-9);
    }

    #[test]
    fn select_price_falls_back_to_any_priced_variant() {
        let card = card_with_prices(serde_json::json!({
            "specialArtRare": { "market": 9.0 }
        }));
        let (price, _) = select_price(&card).unwrap();
        assert!((price - 9.0).abs() < 1e-9);
    }

    #[test]
    fn select_price_none_without_prices() {
        let card = card_with_prices(serde_json::json!({
            "holofoil": { "low": 1.0 }
        }));
        // low alone does not qualify as a representative price
        assert!(select_price(&card).is_none());

        let bare: ApiCard = serde_json::from_value(serde_json::json!({
            "id": "x", "name": "Pikachu"
        }))
        .unwrap();
        assert!(select_price(&bare).is_none());
    }

    #[test]
    fn resolve_set_prefers_exact_match() {
        let sets: Vec<ApiSet> = serde_json::from_value(serde_json::json!([
            { "id": "swsh7", "name": "Evolving Skies" },
            { "id": "swsh7tg", "name": "Evolving Skies Trainer Gallery" }
        ]))
        .unwrap();
        assert_eq!(resolve_set(&sets, "evolving skies").unwrap().id, "swsh7");
        assert_eq!(
            resolve_set(&sets, "Trainer Gallery").unwrap().id,
            "swsh7tg"
        );
        assert!(resolve_set(&sets, "Lost Origin").is_none());
    }

    #[test]
    fn search_response_deserializes() {
        let json = r#"{
            "data": [
                { "id": "swsh4-44", "name": "Pikachu VMAX", "number": "044" }
            ]
        }"#;
        let response: CardSearchResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.data.len(), 1);
        assert_eq!(response.data[0].number.as_deref(), Some("044"));
    }
}
