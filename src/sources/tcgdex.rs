//! TCGdex catalog client.
//!
//! Primary catalog source: language-aware set and card lookup with
//! embedded Cardmarket pricing (EUR). No credential required.

use crate::error::{FetchError, Result};
use crate::models::{CardDescriptor, CardSummary, Price, PricingQuote, SearchQuery, SourceId};
use crate::normalize::{clean_name, normalize_card_number, set_name_match, SetNameMatch};
use crate::rate_limit::RateLimitTracker;
use crate::sources::{name_contains, pick_candidate, Candidate};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const DEFAULT_BASE_URL: &str = "https://api.tcgdex.net/v2";

/// Set list entry.
#[derive(Debug, Deserialize, Clone)]
pub struct SetBrief {
    pub id: String,
    pub name: String,
}

/// Card as returned by set and search endpoints.
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CardBrief {
    pub id: String,
    #[serde(default)]
    pub local_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
}

impl Candidate for CardBrief {
    fn name(&self) -> &str {
        &self.name
    }
    fn number(&self) -> Option<&str> {
        self.local_id.as_deref()
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SetDetail {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub cards: Vec<CardBrief>,
}

/// Cardmarket price block embedded in card detail, all values EUR.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct CardmarketPrices {
    pub avg: Option<f64>,
    pub low: Option<f64>,
    pub trend: Option<f64>,
    pub avg1: Option<f64>,
    pub avg7: Option<f64>,
    pub avg30: Option<f64>,
    #[serde(rename = "avg-holo")]
    pub avg_holo: Option<f64>,
    #[serde(rename = "low-holo")]
    pub low_holo: Option<f64>,
    #[serde(rename = "trend-holo")]
    pub trend_holo: Option<f64>,
    #[serde(rename = "avg-reverse")]
    pub avg_reverse: Option<f64>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CardPricing {
    #[serde(default)]
    pub cardmarket: Option<CardmarketPrices>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CardDetail {
    pub id: String,
    #[serde(default)]
    pub local_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub rarity: Option<String>,
    #[serde(default)]
    pub set: Option<SetBrief>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub pricing: Option<CardPricing>,
}

/// TCGdex catalog client.
pub struct TcgdexClient {
    http: reqwest::Client,
    base_url: String,
    limits: Arc<RateLimitTracker>,
}

impl TcgdexClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        limits: Arc<RateLimitTracker>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            limits,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        log::debug!("GET {}", url);
        let response = self
            .http
            .get(url)
            .header("User-Agent", crate::USER_AGENT)
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            self.limits.record_limited(SourceId::Tcgdex);
            return Err(FetchError::RateLimited);
        }
        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(response.status()));
        }
        Ok(response.json::<T>().await?)
    }

    /// List all sets for a language.
    pub async fn list_sets(&self, language: &str) -> Result<Vec<SetBrief>> {
        let url = format!("{}/{}/sets", self.base_url, language);
        self.get_json(&url).await
    }

    /// Set detail including its card list.
    pub async fn set_detail(&self, language: &str, set_id: &str) -> Result<SetDetail> {
        let url = format!("{}/{}/sets/{}", self.base_url, language, set_id);
        self.get_json(&url).await
    }

    /// Card detail including embedded pricing.
    pub async fn card_detail(&self, language: &str, card_id: &str) -> Result<CardDetail> {
        let url = format!("{}/{}/cards/{}", self.base_url, language, card_id);
        self.get_json(&url).await
    }

    /// Global card search by name, unrestricted by set.
    pub async fn search_cards(&self, language: &str, name: &str) -> Result<Vec<CardBrief>> {
        let url = format!(
            "{}/{}/cards?name={}",
            self.base_url,
            language,
            urlencoding::encode(name)
        );
        self.get_json(&url).await
    }

    /// Resolve a requested set name against the catalog: exact match,
    /// then partial match, then expansion to related sub-sets whose name
    /// contains the request's base name.
    pub(crate) fn resolve_sets(sets: &[SetBrief], wanted: &str) -> Vec<SetBrief> {
        if let Some(exact) = sets
            .iter()
            .find(|s| set_name_match(&s.name, wanted) == SetNameMatch::Exact)
        {
            return vec![exact.clone()];
        }
        let partial: Vec<SetBrief> = sets
            .iter()
            .filter(|s| set_name_match(&s.name, wanted) != SetNameMatch::None)
            .cloned()
            .collect();
        if !partial.is_empty() {
            return partial;
        }
        let base = wanted
            .split([':', '-'])
            .next()
            .unwrap_or(wanted)
            .trim()
            .to_lowercase();
        if base.is_empty() {
            return Vec::new();
        }
        sets.iter()
            .filter(|s| s.name.to_lowercase().contains(&base))
            .cloned()
            .collect()
    }

    /// Resolve a card's catalog price through the fallback chain.
    ///
    /// Never returns an error: every failure mode degrades to an
    /// unavailable quote whose note names the failing step.
    pub async fn fetch_price(&self, descriptor: &CardDescriptor) -> PricingQuote {
        let source = SourceId::Tcgdex;
        if self.limits.is_limited(source) {
            return PricingQuote::unavailable(source, "rate limited");
        }

        let candidates = match self.find_candidates(descriptor).await {
            Ok(candidates) => candidates,
            Err(FetchError::RateLimited) => {
                return PricingQuote::unavailable(source, "rate limited");
            }
            Err(e) => {
                log::warn!("tcgdex search failed: {}", e);
                return PricingQuote::unavailable(source, format!("search failed: {}", e));
            }
        };
        let Some(candidate) = pick_candidate(&candidates, descriptor) else {
            return PricingQuote::unavailable(source, "no candidate found");
        };

        let detail = match self.card_detail(&descriptor.language, &candidate.id).await {
            Ok(detail) => detail,
            Err(e) => {
                log::warn!("tcgdex card {} lookup failed: {}", candidate.id, e);
                return PricingQuote::unavailable(source, format!("card lookup failed: {}", e));
            }
        };
        let matched_name = Some(clean_name(&detail.name));
        let matched_number = detail.local_id.as_deref().map(normalize_card_number);

        match select_price(detail.pricing.as_ref()) {
            Some((price, variants)) => {
                let mut quote = PricingQuote::priced(source, Price::eur(price))
                    .with_match(matched_name, matched_number);
                quote.variants = variants;
                quote
            }
            None => PricingQuote::unavailable(source, "price unavailable")
                .with_match(matched_name, matched_number),
        }
    }

    /// Stage 1: search within the resolved set(s). Stage 2: unrestricted
    /// global search filtered by name containment.
    async fn find_candidates(&self, descriptor: &CardDescriptor) -> Result<Vec<CardBrief>> {
        let wanted = clean_name(&descriptor.name).to_lowercase();

        if let Some(set_name) = descriptor.set_name.as_deref() {
            match self.list_sets(&descriptor.language).await {
                Ok(sets) => {
                    for set in Self::resolve_sets(&sets, set_name) {
                        match self.set_detail(&descriptor.language, &set.id).await {
                            Ok(detail) => {
                                let hits: Vec<CardBrief> = detail
                                    .cards
                                    .into_iter()
                                    .filter(|c| name_contains(&c.name, &wanted))
                                    .collect();
                                if !hits.is_empty() {
                                    return Ok(hits);
                                }
                            }
                            Err(FetchError::RateLimited) => return Err(FetchError::RateLimited),
                            Err(e) => {
                                log::warn!("tcgdex set {} lookup failed: {}", set.id, e);
                            }
                        }
                    }
                    log::debug!(
                        "No candidates in sets matching \"{}\", falling back to global search",
                        set_name
                    );
                }
                Err(FetchError::RateLimited) => return Err(FetchError::RateLimited),
                Err(e) => log::warn!("tcgdex set list failed: {}", e),
            }
        }

        let hits = self
            .search_cards(&descriptor.language, &clean_name(&descriptor.name))
            .await?;
        Ok(hits
            .into_iter()
            .filter(|c| name_contains(&c.name, &wanted))
            .collect())
    }

    /// Catalog search for the surrounding application. Set restriction
    /// reuses the set-resolution chain; rarity and category filters are
    /// passed through to the global search endpoint.
    pub async fn search(&self, query: &SearchQuery) -> Result<Vec<CardSummary>> {
        let wanted = clean_name(&query.name).to_lowercase();

        if let Some(set_name) = query.set_name.as_deref() {
            let sets = self.list_sets(&query.language).await?;
            let mut cards = Vec::new();
            for set in Self::resolve_sets(&sets, set_name) {
                match self.set_detail(&query.language, &set.id).await {
                    Ok(detail) => {
                        for card in detail.cards {
                            if name_contains(&card.name, &wanted) {
                                cards.push(summary_from_brief(card, Some(detail.name.clone())));
                            }
                        }
                    }
                    Err(FetchError::RateLimited) => return Err(FetchError::RateLimited),
                    Err(e) => log::warn!("tcgdex set {} lookup failed: {}", set.id, e),
                }
            }
            if !cards.is_empty() {
                return Ok(cards);
            }
        }

        let mut url = format!(
            "{}/{}/cards?name={}",
            self.base_url,
            query.language,
            urlencoding::encode(query.name.trim())
        );
        if let Some(rarity) = query.rarity.as_deref() {
            url.push_str(&format!("&rarity={}", urlencoding::encode(rarity)));
        }
        if let Some(card_type) = query.card_type.as_deref() {
            url.push_str(&format!("&category={}", urlencoding::encode(card_type)));
        }
        let hits: Vec<CardBrief> = self.get_json(&url).await?;
        Ok(hits
            .into_iter()
            .filter(|c| name_contains(&c.name, &wanted))
            .map(|c| summary_from_brief(c, None))
            .collect())
    }
}

fn summary_from_brief(card: CardBrief, set_name: Option<String>) -> CardSummary {
    CardSummary {
        id: card.id,
        name: card.name,
        number: card.local_id.as_deref().map(normalize_card_number),
        set_name,
        rarity: None,
        image_url: card.image,
        pricing: None,
    }
}

/// Variant priority when picking the representative average: holo beats
/// reverse holo beats normal, with trend and windowed averages as a
/// final fallback.
fn select_price(pricing: Option<&CardPricing>) -> Option<(f64, BTreeMap<String, Price>)> {
    let cardmarket = pricing?.cardmarket.as_ref()?;
    let mut variants = BTreeMap::new();
    if let Some(v) = cardmarket.avg_holo {
        variants.insert("holo".to_string(), Price::eur(v));
    }
    if let Some(v) = cardmarket.avg_reverse {
        variants.insert("reverse_holo".to_string(), Price::eur(v));
    }
    if let Some(v) = cardmarket.avg {
        variants.insert("normal".to_string(), Price::eur(v));
    }
    if let Some(v) = cardmarket.trend {
        variants.insert("trend".to_string(), Price::eur(v));
    }
    let chosen = cardmarket
        .avg_holo
        .or(cardmarket.avg_reverse)
        .or(cardmarket.avg)
        .or(cardmarket.trend)
        .or(cardmarket.avg7)
        .or(cardmarket.avg30)
        .or(cardmarket.low)?;
    Some((chosen, variants))
}
