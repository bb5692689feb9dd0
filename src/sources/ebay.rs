//! eBay Finding API client for completed-listing prices.
//!
//! Applies a strict relevance filter over sold listings before averaging:
//! graded and bulk listings, name/number/set mismatches and price
//! outliers are all discarded, and the surviving listings are kept as
//! supporting evidence on the quote.

use crate::config::ListingFilterConfig;
use crate::error::{FetchError, Result};
use crate::models::{CardDescriptor, Price, PricingQuote, SoldListing, SourceId};
use crate::normalize::{
    clean_name, extract_card_number, normalize_card_number, significant_words,
};
use crate::rate_limit::RateLimitTracker;
use serde::Deserialize;
use std::sync::Arc;

pub const DEFAULT_BASE_URL: &str = "https://svcs.ebay.com";

/// Tokens identifying professionally graded listings.
const GRADING_TOKENS: &[&str] = &[
    "psa", "bgs", "cgc", "sgc", "ace", "beckett", "graded", "gem mint",
];

/// Tokens identifying bulk lots and sealed product.
const BULK_TOKENS: &[&str] = &[
    "lot", "bundle", "sealed", "booster", "box", "pack", "packs", "collection", "bulk",
    "proxy", "custom", "jumbo", "deck", "tin", "case",
];

/// Sold listing reduced to the fields relevance filtering needs.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RawListing {
    pub title: String,
    pub price: f64,
}

// The Finding API wraps every field in an array of one element.
#[derive(Debug, Deserialize)]
struct FindingResponse {
    #[serde(rename = "findCompletedItemsResponse", default)]
    envelopes: Vec<Envelope>,
}

#[derive(Debug, Deserialize, Default)]
struct Envelope {
    #[serde(default)]
    ack: Vec<String>,
    #[serde(rename = "searchResult", default)]
    search_result: Vec<SearchResult>,
    #[serde(rename = "errorMessage", default)]
    error_message: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize, Default)]
struct SearchResult {
    #[serde(default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize, Default)]
struct Item {
    #[serde(default)]
    title: Vec<String>,
    #[serde(rename = "sellingStatus", default)]
    selling_status: Vec<SellingStatus>,
}

#[derive(Debug, Deserialize, Default)]
struct SellingStatus {
    #[serde(rename = "currentPrice", default)]
    current_price: Vec<CurrentPrice>,
}

#[derive(Debug, Deserialize, Default)]
#[allow(dead_code)]
struct CurrentPrice {
    #[serde(rename = "@currencyId", default)]
    currency_id: String,
    #[serde(rename = "__value__", default)]
    value: String,
}

impl Item {
    fn price(&self) -> Option<f64> {
        let price = self.selling_status.first()?.current_price.first()?;
        price.value.parse().ok()
    }
}

impl Envelope {
    fn is_failure(&self) -> bool {
        self.ack.iter().any(|a| a == "Failure")
    }

    fn is_rate_limited(&self) -> bool {
        self.error_message
            .iter()
            .any(|m| m.to_string().contains("RateLimiter"))
    }
}

/// Secondary-market listings client.
pub struct EbayClient {
    http: reqwest::Client,
    base_url: String,
    app_id: Option<String>,
    limits: Arc<RateLimitTracker>,
    filter: ListingFilterConfig,
}

impl EbayClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        app_id: Option<String>,
        limits: Arc<RateLimitTracker>,
        filter: ListingFilterConfig,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            app_id,
            limits,
            filter,
        }
    }

    /// Average sold price over listings surviving the relevance filter.
    pub async fn fetch_price(&self, descriptor: &CardDescriptor) -> PricingQuote {
        let source = SourceId::Ebay;
        let Some(app_id) = self.app_id.as_deref() else {
            return PricingQuote::unavailable(source, "no API key configured");
        };
        if self.limits.is_limited(source) {
            return PricingQuote::unavailable(source, "rate limited");
        }

        let keywords = build_keywords(descriptor);
        let listings = match self.find_completed_items(app_id, &keywords).await {
            Ok(listings) => listings,
            Err(FetchError::RateLimited) => {
                return PricingQuote::unavailable(source, "rate limited");
            }
            Err(e) => {
                log::warn!("ebay search failed: {}", e);
                return PricingQuote::unavailable(source, format!("search failed: {}", e));
            }
        };
        if listings.is_empty() {
            return PricingQuote::unavailable(source, "no sold listings found");
        }

        let survivors = filter_listings(&listings, descriptor, &self.filter);
        if survivors.is_empty() {
            return PricingQuote::unavailable(source, "no relevant sold listings");
        }

        let average =
            survivors.iter().map(|l| l.price).sum::<f64>() / survivors.len() as f64;
        let evidence: Vec<SoldListing> = survivors
            .iter()
            .take(self.filter.evidence_limit)
            .map(|l| SoldListing {
                title: l.title.clone(),
                price: Price::usd(l.price),
            })
            .collect();

        let mut quote = PricingQuote::priced(source, Price::usd(average)).with_match(
            Some(clean_name(&descriptor.name)),
            descriptor.number.as_deref().map(normalize_card_number),
        );
        quote.note = Some(format!(
            "{} of {} sold listings considered",
            survivors.len(),
            listings.len()
        ));
        quote.listings = evidence;
        quote
    }

    async fn find_completed_items(
        &self,
        app_id: &str,
        keywords: &str,
    ) -> Result<Vec<RawListing>> {
        let url = format!("{}/services/search/FindingService/v1", self.base_url);
        let payload = serde_json::json!({
            "keywords": keywords,
            "itemFilter": [{ "name": "SoldItemsOnly", "value": "true" }],
            "paginationInput": { "entriesPerPage": "50" },
        });
        log::debug!("POST {} keywords=\"{}\"", url, keywords);
        let response = self
            .http
            .post(&url)
            .header("X-EBAY-SOA-OPERATION-NAME", "findCompletedItems")
            .header("X-EBAY-SOA-SERVICE-VERSION", "1.13.0")
            .header("X-EBAY-SOA-SECURITY-APPNAME", app_id)
            .header("X-EBAY-SOA-REQUEST-DATA-FORMAT", "JSON")
            .header("X-EBAY-SOA-RESPONSE-DATA-FORMAT", "JSON")
            .header("User-Agent", crate::USER_AGENT)
            .json(&payload)
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            self.limits.record_limited(SourceId::Ebay);
            return Err(FetchError::RateLimited);
        }
        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(response.status()));
        }
        let body: FindingResponse = response.json().await?;
        let Some(envelope) = body.envelopes.first() else {
            return Ok(Vec::new());
        };
        if envelope.is_rate_limited() {
            self.limits.record_limited(SourceId::Ebay);
            return Err(FetchError::RateLimited);
        }
        if envelope.is_failure() {
            return Err(FetchError::NotFound("finding call failed".to_string()));
        }

        let items = envelope
            .search_result
            .first()
            .map(|r| r.item.as_slice())
            .unwrap_or(&[]);
        Ok(items
            .iter()
            .filter_map(|item| {
                let title = item.title.first()?.clone();
                let price = item.price()?;
                Some(RawListing { title, price })
            })
            .collect())
    }
}

/// Search keywords: cleaned name plus collector number when known.
fn build_keywords(descriptor: &CardDescriptor) -> String {
    let mut keywords = format!("pokemon {}", clean_name(&descriptor.name));
    if let Some(number) = descriptor.number.as_deref() {
        keywords.push(' ');
        keywords.push_str(number.trim());
    }
    keywords
}

fn has_token(title_lower: &str, token: &str) -> bool {
    if token.contains(' ') {
        title_lower.contains(token)
    } else {
        title_lower
            .split(|c: char| !c.is_alphanumeric())
            .any(|w| w == token)
    }
}

pub(crate) fn is_graded(title: &str) -> bool {
    let lower = title.to_lowercase();
    GRADING_TOKENS.iter().any(|t| has_token(&lower, t))
}

pub(crate) fn is_bulk(title: &str) -> bool {
    let lower = title.to_lowercase();
    BULK_TOKENS.iter().any(|t| has_token(&lower, t))
}

/// Every significant word of the cleaned card name must appear in the
/// listing title.
pub(crate) fn title_covers_name(title: &str, cleaned_name: &str) -> bool {
    let title_words = significant_words(title);
    significant_words(cleaned_name)
        .iter()
        .all(|w| title_words.contains(w))
}

/// A listing whose embedded card number disagrees with the requested one
/// is a different card; listings without a number pass.
pub(crate) fn number_conflicts(title: &str, wanted_number: Option<&str>) -> bool {
    let Some(wanted) = wanted_number else {
        return false;
    };
    match extract_card_number(title) {
        Some(found) => found != normalize_card_number(wanted),
        None => false,
    }
}

/// When a set name was requested, enough of its significant words must
/// appear in the title.
pub(crate) fn set_overlap_ok(title: &str, set_name: Option<&str>, threshold: f64) -> bool {
    let Some(set) = set_name else {
        return true;
    };
    let set_words = significant_words(set);
    if set_words.is_empty() {
        return true;
    }
    let title_words = significant_words(title);
    let matched = set_words.iter().filter(|w| title_words.contains(*w)).count();
    matched as f64 / set_words.len() as f64 >= threshold
}

fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    Some(values[values.len() / 2])
}

/// Discard prices outside the median-relative sanity bound.
fn filter_outliers(
    listings: Vec<RawListing>,
    low_factor: f64,
    high_factor: f64,
) -> Vec<RawListing> {
    let mut prices: Vec<f64> = listings.iter().map(|l| l.price).collect();
    let Some(mid) = median(&mut prices) else {
        return listings;
    };
    listings
        .into_iter()
        .filter(|l| l.price >= mid * low_factor && l.price <= mid * high_factor)
        .collect()
}

/// Apply every relevance rule; a listing must survive all of them.
pub(crate) fn filter_listings(
    listings: &[RawListing],
    descriptor: &CardDescriptor,
    filter: &ListingFilterConfig,
) -> Vec<RawListing> {
    let cleaned = clean_name(&descriptor.name);
    let relevant: Vec<RawListing> = listings
        .iter()
        .filter(|l| l.price > 0.0)
        .filter(|l| !is_graded(&l.title))
        .filter(|l| !is_bulk(&l.title))
        .filter(|l| title_covers_name(&l.title, &cleaned))
        .filter(|l| !number_conflicts(&l.title, descriptor.number.as_deref()))
        .filter(|l| {
            set_overlap_ok(
                &l.title,
                descriptor.set_name.as_deref(),
                filter.set_overlap_threshold,
            )
        })
        .cloned()
        .collect();
    filter_outliers(relevant, filter.outlier_low_factor, filter.outlier_high_factor)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(title: &str, price: f64) -> RawListing {
        RawListing {
            title: title.to_string(),
            price,
        }
    }

    fn descriptor() -> CardDescriptor {
        CardDescriptor {
            name: "Charizard VMAX".to_string(),
            number: Some("074/189".to_string()),
            set_name: Some("Darkness Ablaze".to_string()),
            language: "en".to_string(),
        }
    }

    #[test]
    fn grading_tokens_detected() {
        assert!(is_graded("Charizard VMAX PSA 10"));
        assert!(is_graded("Charizard CGC 9.5 Darkness Ablaze"));
        assert!(is_graded("charizard vmax gem mint"));
        assert!(!is_graded("Charizard VMAX 074/189 near mint"));
    }

    #[test]
    fn bulk_tokens_detected() {
        assert!(is_bulk("Charizard VMAX lot of 5"));
        assert!(is_bulk("Darkness Ablaze booster box sealed"));
        assert!(!is_bulk("Charizard VMAX single"));
    }

    #[test]
    fn title_must_cover_every_name_word() {
        assert!(title_covers_name(
            "Charizard VMAX 074/189 Darkness Ablaze",
            "Charizard VMAX"
        ));
        assert!(!title_covers_name("Charizard 074/189", "Charizard VMAX"));
    }

    #[test]
    fn conflicting_number_rejected() {
        assert!(number_conflicts(
            "Charizard VMAX 020/189",
            Some("074/189")
        ));
        assert!(!number_conflicts(
            "Charizard VMAX 074/189",
            Some("074/189")
        ));
        // no number in the title is not a conflict
        assert!(!number_conflicts("Charizard VMAX holo", Some("074/189")));
        assert!(!number_conflicts("Charizard VMAX 020/189", None));
    }

    #[test]
    fn set_overlap_threshold_applies() {
        assert!(set_overlap_ok(
            "Charizard VMAX Darkness Ablaze",
            Some("Darkness Ablaze"),
            0.6
        ));
        assert!(!set_overlap_ok(
            "Charizard VMAX Ablaze",
            Some("Darkness Ablaze"),
            0.6
        ));
        assert!(set_overlap_ok("Charizard VMAX", None, 0.6));
    }

    #[test]
    fn outliers_discarded_around_median() {
        let listings = vec![
            listing("a", 10.0),
            listing("b", 11.0),
            listing("c", 12.0),
            listing("d", 1.0),
            listing("e", 500.0),
        ];
        let kept = filter_outliers(listings, 0.25, 4.0);
        let prices: Vec<f64> = kept.iter().map(|l| l.price).collect();
        assert_eq!(prices, vec![10.0, 11.0, 12.0]);
    }

    #[test]
    fn filter_chain_composes() {
        let listings = vec![
            listing("Charizard VMAX 074/189 Darkness Ablaze holo", 95.0),
            listing("Charizard VMAX 074/189 Darkness Ablaze NM", 105.0),
            listing("Charizard VMAX PSA 10 074/189 Darkness Ablaze", 400.0),
            listing("Charizard VMAX 020/189 Darkness Ablaze", 90.0),
            listing("Charizard VMAX Darkness Ablaze booster box", 120.0),
            listing("Eevee VMAX 074/189 Darkness Ablaze", 80.0),
            listing("Charizard VMAX 074/189 Darkness Ablaze damaged", 1.0),
        ];
        let survivors = filter_listings(&listings, &descriptor(), &ListingFilterConfig::default());
        let prices: Vec<f64> = survivors.iter().map(|l| l.price).collect();
        assert_eq!(prices, vec![95.0, 105.0]);
    }

    #[test]
    fn finding_response_deserializes() {
        let json = r#"{
            "findCompletedItemsResponse": [{
                "ack": ["Success"],
                "searchResult": [{
                    "item": [{
                        "title": ["Charizard VMAX 074/189"],
                        "sellingStatus": [{
                            "currentPrice": [{ "@currencyId": "USD", "__value__": "95.00" }]
                        }]
                    }]
                }]
            }]
        }"#;
        let response: FindingResponse = serde_json::from_str(json).unwrap();
        let envelope = &response.envelopes[0];
        assert!(!envelope.is_failure());
        let item = &envelope.search_result[0].item[0];
        assert_eq!(item.price(), Some(95.0));
        assert_eq!(item.title[0], "Charizard VMAX 074/189");
    }

    #[test]
    fn rate_limiter_error_detected() {
        let json = r#"{
            "findCompletedItemsResponse": [{
                "ack": ["Failure"],
                "errorMessage": [{ "error": [{ "subdomain": ["RateLimiter"] }] }]
            }]
        }"#;
        let response: FindingResponse = serde_json::from_str(json).unwrap();
        assert!(response.envelopes[0].is_rate_limited());
        assert!(response.envelopes[0].is_failure());
    }
}
