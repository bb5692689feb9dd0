//! Core data types shared across the pricing pipeline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// External sources contributing to a pricing bundle.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SourceId {
    /// Catalog lookup with embedded Cardmarket pricing
    Tcgdex,
    /// Community pricing with TCGplayer market prices
    PokemonTcg,
    /// Aggregated market-price API
    JustTcg,
    /// Secondary-market sold listings
    Ebay,
}

impl SourceId {
    /// Every configured source, in bundle order.
    pub const ALL: [SourceId; 4] = [
        SourceId::Tcgdex,
        SourceId::PokemonTcg,
        SourceId::JustTcg,
        SourceId::Ebay,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceId::Tcgdex => "tcgdex",
            SourceId::PokemonTcg => "pokemontcg",
            SourceId::JustTcg => "justtcg",
            SourceId::Ebay => "ebay",
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

fn default_language() -> String {
    "en".to_string()
}

/// Immutable description of the card a caller wants priced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardDescriptor {
    pub name: String,
    /// Collector number, e.g. "074/189" or "GG44"
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub set_name: Option<String>,
    #[serde(default = "default_language")]
    pub language: String,
}

impl CardDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            number: None,
            set_name: None,
            language: default_language(),
        }
    }
}

/// Currency of a price amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Eur,
    Usd,
}

/// A price value. "Unavailable" is a first-class value distinguished from
/// an error; amounts carry their currency so conversion is idempotent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Price {
    Amount { value: f64, currency: Currency },
    Unavailable,
}

impl Price {
    pub fn eur(value: f64) -> Self {
        Price::Amount {
            value,
            currency: Currency::Eur,
        }
    }

    pub fn usd(value: f64) -> Self {
        Price::Amount {
            value,
            currency: Currency::Usd,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Price::Amount { .. })
    }

    /// Numeric value, if any.
    pub fn value(&self) -> Option<f64> {
        match self {
            Price::Amount { value, .. } => Some(*value),
            Price::Unavailable => None,
        }
    }
}

/// One sold listing kept as supporting evidence for a secondary-market
/// quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoldListing {
    pub title: String,
    pub price: Price,
}

/// Result of asking one source about one card. Never mutated after
/// creation except by the currency-conversion pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingQuote {
    pub source: SourceId,
    pub average_price: Price,
    /// Diagnostic note, e.g. which resolution step failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Canonical name of the matched candidate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_name: Option<String>,
    /// Normalized number of the matched candidate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_number: Option<String>,
    /// Per-variant price tree (holo, reverse holo, ...)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variants: BTreeMap<String, Price>,
    /// Supporting sold listings (secondary-market source only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub listings: Vec<SoldListing>,
}

impl PricingQuote {
    /// Quote carrying a resolved price.
    pub fn priced(source: SourceId, price: Price) -> Self {
        Self {
            source,
            average_price: price,
            note: None,
            matched_name: None,
            matched_number: None,
            variants: BTreeMap::new(),
            listings: Vec::new(),
        }
    }

    /// Sentinel quote with a note naming the failing step.
    pub fn unavailable(source: SourceId, note: impl Into<String>) -> Self {
        Self {
            source,
            average_price: Price::Unavailable,
            note: Some(note.into()),
            matched_name: None,
            matched_number: None,
            variants: BTreeMap::new(),
            listings: Vec::new(),
        }
    }

    pub fn with_match(
        mut self,
        name: Option<String>,
        number: Option<String>,
    ) -> Self {
        self.matched_name = name;
        self.matched_number = number;
        self
    }
}

/// Aggregate pricing result: one quote per configured source, always,
/// including sources that were skipped (cooldown) or failed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PricingBundle {
    pub quotes: BTreeMap<SourceId, PricingQuote>,
}

impl PricingBundle {
    pub fn insert(&mut self, quote: PricingQuote) {
        self.quotes.insert(quote.source, quote);
    }

    pub fn get(&self, source: SourceId) -> Option<&PricingQuote> {
        self.quotes.get(&source)
    }

    /// True when every configured source has an entry.
    pub fn is_complete(&self) -> bool {
        SourceId::ALL.iter().all(|s| self.quotes.contains_key(s))
    }
}

/// One catalog search hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardSummary {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub set_name: Option<String>,
    #[serde(default)]
    pub rarity: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pricing: Option<PricingBundle>,
}

/// Catalog search result returned to the surrounding application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CardList {
    pub cards: Vec<CardSummary>,
}

/// Parameters of a catalog search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub name: String,
    #[serde(default)]
    pub set_name: Option<String>,
    #[serde(default)]
    pub rarity: Option<String>,
    #[serde(default)]
    pub card_type: Option<String>,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub include_pricing: bool,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            name: String::new(),
            set_name: None,
            rarity: None,
            card_type: None,
            language: default_language(),
            include_pricing: false,
        }
    }
}

impl SearchQuery {
    /// Deterministic cache key over the normalized parameters.
    ///
    /// Field order is fixed so semantically identical requests share an
    /// entry regardless of how the caller assembled them.
    pub fn cache_key(&self) -> String {
        fn norm(s: &str) -> String {
            s.trim().to_lowercase()
        }
        let opt = |o: &Option<String>| o.as_deref().map(norm).unwrap_or_default();
        format!(
            "name={}|set={}|rarity={}|type={}|lang={}|pricing={}",
            norm(&self.name),
            opt(&self.set_name),
            opt(&self.rarity),
            opt(&self.card_type),
            norm(&self.language),
            self.include_pricing
        )
    }
}
