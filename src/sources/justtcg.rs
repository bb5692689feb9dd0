//! JustTCG aggregated market-price client.
//!
//! Bearer-token API with condition-priced variants (USD). Invalid or
//! expired keys are signalled with HTTP 403.

use crate::error::{FetchError, Result};
use crate::models::{CardDescriptor, Price, PricingQuote, SourceId};
use crate::normalize::{clean_name, normalize_card_number};
use crate::rate_limit::RateLimitTracker;
use crate::sources::{name_contains, pick_candidate, Candidate};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const DEFAULT_BASE_URL: &str = "https://api.justtcg.com/v1";

/// Condition preference, best first.
const CONDITION_PRIORITY: &[&str] = &[
    "Near Mint",
    "Lightly Played",
    "Moderately Played",
    "Heavily Played",
    "Damaged",
];

#[derive(Debug, Deserialize, Clone)]
pub struct CardVariant {
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub printing: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MarketCard {
    pub name: String,
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub set: Option<String>,
    #[serde(default)]
    pub variants: Vec<CardVariant>,
}

impl Candidate for MarketCard {
    fn name(&self) -> &str {
        &self.name
    }
    fn number(&self) -> Option<&str> {
        self.number.as_deref()
    }
}

#[derive(Debug, Deserialize)]
struct CardsResponse {
    #[serde(default)]
    data: Vec<MarketCard>,
}

/// Aggregated market-price client.
pub struct JustTcgClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
    limits: Arc<RateLimitTracker>,
}

impl JustTcgClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        token: Option<String>,
        limits: Arc<RateLimitTracker>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            token,
            limits,
        }
    }

    /// Resolve a card's aggregated market price: set-scoped search, then
    /// unrestricted search, then best-condition variant selection.
    pub async fn fetch_price(&self, descriptor: &CardDescriptor) -> PricingQuote {
        let source = SourceId::JustTcg;
        let Some(token) = self.token.as_deref() else {
            return PricingQuote::unavailable(source, "no API key configured");
        };
        if self.limits.is_limited(source) {
            return PricingQuote::unavailable(source, "rate limited");
        }

        let name = clean_name(&descriptor.name);
        let wanted = name.to_lowercase();

        // scoped search first; a transient failure falls through to the
        // unrestricted search, credential and throttling errors do not
        let mut candidates = Vec::new();
        if let Some(set_name) = descriptor.set_name.as_deref() {
            match self.search(token, &name, Some(set_name)).await {
                Ok(cards) => candidates = cards,
                Err(e @ FetchError::RateLimited) => return self.quote_from_error(e),
                Err(FetchError::HttpStatus(status))
                    if status == reqwest::StatusCode::FORBIDDEN =>
                {
                    return self.quote_from_error(FetchError::HttpStatus(status));
                }
                Err(e) => log::warn!("justtcg scoped search failed: {}", e),
            }
        }
        if candidates.is_empty() {
            candidates = match self.search(token, &name, None).await {
                Ok(cards) => cards
                    .into_iter()
                    .filter(|c| name_contains(&c.name, &wanted))
                    .collect(),
                Err(e) => return self.quote_from_error(e),
            };
        }
        let Some(card) = pick_candidate(&candidates, descriptor) else {
            return PricingQuote::unavailable(source, "no candidate found");
        };

        let matched_name = Some(clean_name(&card.name));
        let matched_number = card.number.as_deref().map(normalize_card_number);
        match select_price(&card.variants) {
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

    fn quote_from_error(&self, error: FetchError) -> PricingQuote {
        let source = SourceId::JustTcg;
        match error {
            FetchError::RateLimited => PricingQuote::unavailable(source, "rate limited"),
            FetchError::HttpStatus(status) if status == reqwest::StatusCode::FORBIDDEN => {
                PricingQuote::unavailable(source, "invalid or expired API key")
            }
            other => {
                log::warn!("justtcg search failed: {}", other);
                PricingQuote::unavailable(source, format!("search failed: {}", other))
            }
        }
    }

    async fn search(
        &self,
        token: &str,
        name: &str,
        set_name: Option<&str>,
    ) -> Result<Vec<MarketCard>> {
        let mut url = format!("{}/cards?q={}", self.base_url, urlencoding::encode(name));
        if let Some(set) = set_name {
            url.push_str(&format!("&set={}", urlencoding::encode(set)));
        }
        log::debug!("GET {}", url);
        let response = self
            .http
            .get(&url)
            .header("Authorization", format!("Bearer {}", token))
            .header("User-Agent", crate::USER_AGENT)
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            self.limits.record_limited(SourceId::JustTcg);
            return Err(FetchError::RateLimited);
        }
        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(response.status()));
        }
        let body: CardsResponse = response.json().await?;
        Ok(body.data)
    }
}

/// Best-condition variant first: Near Mint down to Damaged, then any
/// priced variant as last resort.
fn select_price(variants: &[CardVariant]) -> Option<(f64, BTreeMap<String, Price>)> {
    let mut tree = BTreeMap::new();
    for variant in variants {
        if let Some(price) = variant.price {
            let condition = variant.condition.as_deref().unwrap_or("unknown");
            let key = match variant.printing.as_deref() {
                Some(printing) => format!("{}/{}", condition, printing),
                None => condition.to_string(),
            };
            tree.insert(key, Price::usd(price));
        }
    }
    for wanted in CONDITION_PRIORITY {
        let hit = variants.iter().find(|v| {
            v.price.is_some()
                && v.condition
                    .as_deref()
                    .is_some_and(|c| c.eq_ignore_ascii_case(wanted))
        });
        if let Some(variant) = hit {
            // price checked above
            return variant.price.map(|p| (p, tree.clone()));
        }
    }
    let fallback = variants.iter().find_map(|v| v.price)?;
    Some((fallback, tree))
}
