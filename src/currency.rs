//! Currency conversion over heterogeneous pricing payloads.
//!
//! Keeps a TTL-cached USD to EUR rate sourced from a prioritized provider
//! list. Conversion never blocks on refresh failure: the previous (or
//! default) rate is retained.

use crate::error::{FetchError, Result};
use crate::models::{Currency, Price, PricingBundle};
use chrono::{DateTime, Utc};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Fallback rate used until a provider has answered at least once.
pub const DEFAULT_USD_EUR_RATE: f64 = 0.92;

/// One exchange-rate endpoint. The rate is extracted from the JSON
/// response via `json_pointer`, so interchangeable providers differ only
/// in data.
#[derive(Debug, Clone)]
pub struct RateProvider {
    pub name: &'static str,
    pub url: String,
    pub json_pointer: String,
}

/// Providers tried in priority order; the first positive numeric rate
/// wins.
pub fn default_rate_providers() -> Vec<RateProvider> {
    vec![
        RateProvider {
            name: "frankfurter",
            url: "https://api.frankfurter.app/latest?from=USD&to=EUR".to_string(),
            json_pointer: "/rates/EUR".to_string(),
        },
        RateProvider {
            name: "open-er-api",
            url: "https://open.er-api.com/v6/latest/USD".to_string(),
            json_pointer: "/rates/EUR".to_string(),
        },
        RateProvider {
            name: "exchangerate-host",
            url: "https://api.exchangerate.host/latest?base=USD&symbols=EUR".to_string(),
            json_pointer: "/rates/EUR".to_string(),
        },
    ]
}

#[derive(Debug)]
struct ExchangeRateState {
    rate: f64,
    fetched_at: Option<Instant>,
    last_updated: Option<DateTime<Utc>>,
}

/// TTL-cached USD to EUR converter applied uniformly over pricing
/// bundles.
pub struct CurrencyConverter {
    providers: Vec<RateProvider>,
    ttl: Duration,
    http: reqwest::Client,
    state: Mutex<ExchangeRateState>,
}

impl CurrencyConverter {
    pub fn new(providers: Vec<RateProvider>, ttl: Duration, http: reqwest::Client) -> Self {
        Self {
            providers,
            ttl,
            http,
            state: Mutex::new(ExchangeRateState {
                rate: DEFAULT_USD_EUR_RATE,
                fetched_at: None,
                last_updated: None,
            }),
        }
    }

    /// Current rate, refreshed opportunistically when stale.
    pub async fn rate(&self) -> f64 {
        let stale = {
            let state = self.state.lock().unwrap();
            match state.fetched_at {
                None => true,
                Some(at) => at.elapsed() >= self.ttl,
            }
        };
        if stale {
            self.refresh_rate().await;
        }
        self.state.lock().unwrap().rate
    }

    /// Try providers in priority order; the first positive numeric rate
    /// wins. Total failure keeps the previously cached rate.
    pub async fn refresh_rate(&self) {
        for provider in &self.providers {
            match self.fetch_rate(provider).await {
                Ok(rate) if rate > 0.0 => {
                    let mut state = self.state.lock().unwrap();
                    state.rate = rate;
                    state.fetched_at = Some(Instant::now());
                    state.last_updated = Some(Utc::now());
                    log::info!(
                        "Exchange rate updated from {}: 1 USD = {:.4} EUR",
                        provider.name,
                        rate
                    );
                    return;
                }
                Ok(rate) => {
                    log::warn!("{} returned non-positive rate {}", provider.name, rate);
                }
                Err(e) => {
                    log::warn!("Exchange rate provider {} failed: {}", provider.name, e);
                }
            }
        }
        // mark the attempt so a dead network is not retried on every call
        let mut state = self.state.lock().unwrap();
        state.fetched_at = Some(Instant::now());
        log::warn!(
            "All exchange rate providers failed, keeping rate {:.4}",
            state.rate
        );
    }

    async fn fetch_rate(&self, provider: &RateProvider) -> Result<f64> {
        log::debug!("GET {}", provider.url);
        let response = self
            .http
            .get(&provider.url)
            .header("User-Agent", crate::USER_AGENT)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(response.status()));
        }
        let body: serde_json::Value = response.json().await?;
        body.pointer(&provider.json_pointer)
            .and_then(|v| v.as_f64())
            .ok_or_else(|| {
                FetchError::NotFound(format!(
                    "no rate at {} in {} response",
                    provider.json_pointer, provider.name
                ))
            })
    }

    /// When the exchange rate last changed, if a provider ever answered.
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.state.lock().unwrap().last_updated
    }

    fn current_rate(&self) -> f64 {
        self.state.lock().unwrap().rate
    }

    /// Convert a price into EUR. EUR amounts and the unavailable sentinel
    /// pass through unchanged, so repeated conversion is a no-op.
    pub fn convert(&self, price: &Price) -> Price {
        match price {
            Price::Amount {
                value,
                currency: Currency::Usd,
            } => Price::Amount {
                value: value * self.current_rate(),
                currency: Currency::Eur,
            },
            other => other.clone(),
        }
    }

    /// Display form: "12.34 €" for EUR, "12.34 $" for unconverted USD,
    /// "N/A" for the sentinel.
    pub fn format(&self, price: &Price) -> String {
        match price {
            Price::Amount {
                value,
                currency: Currency::Eur,
            } => format!("{:.2} €", value),
            Price::Amount {
                value,
                currency: Currency::Usd,
            } => format!("{:.2} $", value),
            Price::Unavailable => "N/A".to_string(),
        }
    }

    /// Walk a bundle and convert every price field: per-source averages,
    /// the nested variant tree and listing evidence.
    pub async fn convert_bundle(&self, bundle: &mut PricingBundle) {
        let _ = self.rate().await;
        for quote in bundle.quotes.values_mut() {
            quote.average_price = self.convert(&quote.average_price);
            for price in quote.variants.values_mut() {
                *price = self.convert(price);
            }
            for listing in &mut quote.listings {
                listing.price = self.convert(&listing.price);
            }
        }
    }

    #[cfg(test)]
    fn set_rate(&self, rate: f64) {
        let mut state = self.state.lock().unwrap();
        state.rate = rate;
        state.fetched_at = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PricingQuote, SoldListing, SourceId};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn converter_with_rate(rate: f64) -> CurrencyConverter {
        let converter = CurrencyConverter::new(
            Vec::new(),
            Duration::from_secs(3600),
            reqwest::Client::new(),
        );
        converter.set_rate(rate);
        converter
    }

    #[test]
    fn converts_usd_to_eur() {
        let converter = converter_with_rate(0.9);
        let converted = converter.convert(&Price::usd(10.0));
        match converted {
            Price::Amount { value, currency } => {
                assert!((value - 9.0).abs() < 1e-9);
                assert_eq!(currency, Currency::Eur);
            }
            Price::Unavailable => panic!("expected an amount"),
        }
    }

    #[test]
    fn conversion_is_idempotent_and_keeps_sentinel() {
        let converter = converter_with_rate(0.9);
        let once = converter.convert(&Price::usd(10.0));
        let twice = converter.convert(&once);
        assert_eq!(once, twice);
        assert_eq!(converter.convert(&Price::Unavailable), Price::Unavailable);
    }

    #[test]
    fn unit_rate_is_numerically_neutral() {
        let converter = converter_with_rate(1.0);
        assert_eq!(converter.convert(&Price::usd(12.5)).value(), Some(12.5));
        assert_eq!(converter.convert(&Price::eur(12.5)).value(), Some(12.5));
    }

    #[test]
    fn formats_prices() {
        let converter = converter_with_rate(1.0);
        assert_eq!(converter.format(&Price::eur(3.456)), "3.46 €");
        assert_eq!(converter.format(&Price::usd(2.0)), "2.00 $");
        assert_eq!(converter.format(&Price::Unavailable), "N/A");
    }

    #[tokio::test]
    async fn convert_bundle_walks_variants_and_listings() {
        let converter = converter_with_rate(0.5);
        let mut quote = PricingQuote::priced(SourceId::PokemonTcg, Price::usd(10.0));
        quote
            .variants
            .insert("holofoil".to_string(), Price::usd(20.0));
        quote.variants.insert("normal".to_string(), Price::Unavailable);
        quote.listings.push(SoldListing {
            title: "listing".to_string(),
            price: Price::usd(8.0),
        });

        let mut bundle = PricingBundle::default();
        bundle.insert(quote);
        converter.convert_bundle(&mut bundle).await;

        let quote = bundle.get(SourceId::PokemonTcg).unwrap();
        assert_eq!(quote.average_price, Price::eur(5.0));
        assert_eq!(quote.variants["holofoil"], Price::eur(10.0));
        assert_eq!(quote.variants["normal"], Price::Unavailable);
        assert_eq!(quote.listings[0].price, Price::eur(4.0));
    }

    #[tokio::test]
    async fn refresh_falls_back_through_providers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rates"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "rates": { "EUR": 0.88 } })),
            )
            .mount(&server)
            .await;

        let providers = vec![
            RateProvider {
                name: "broken",
                url: format!("{}/broken", server.uri()),
                json_pointer: "/rates/EUR".to_string(),
            },
            RateProvider {
                name: "working",
                url: format!("{}/rates", server.uri()),
                json_pointer: "/rates/EUR".to_string(),
            },
        ];
        let converter = CurrencyConverter::new(
            providers,
            Duration::from_secs(3600),
            reqwest::Client::new(),
        );

        let rate = converter.rate().await;
        assert!((rate - 0.88).abs() < 1e-9);
        assert!(converter.last_updated().is_some());
    }

    #[tokio::test]
    async fn total_failure_retains_previous_rate() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let providers = vec![RateProvider {
            name: "down",
            url: format!("{}/latest", server.uri()),
            json_pointer: "/rates/EUR".to_string(),
        }];
        let converter = CurrencyConverter::new(
            providers,
            Duration::from_secs(3600),
            reqwest::Client::new(),
        );

        let rate = converter.rate().await;
        assert!((rate - DEFAULT_USD_EUR_RATE).abs() < 1e-9);
        assert!(converter.last_updated().is_none());
    }
}
