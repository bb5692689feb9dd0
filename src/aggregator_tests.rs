//! Tests for the aggregator wiring: bundle completeness and result-cache
//! behavior. End-to-end fallback scenarios live in tests/pipeline_tests.rs.

use super::Aggregator;
use crate::config::Config;
use crate::models::{CardDescriptor, SearchQuery, SourceId};
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Isolated pipeline pointing every source at the mock server. No rate
/// providers, so the converter keeps its default rate without network.
fn test_config(server: &MockServer) -> Config {
    Config {
        tcgdex_base_url: server.uri(),
        pokemontcg_base_url: server.uri(),
        justtcg_base_url: server.uri(),
        ebay_base_url: server.uri(),
        rate_providers: Vec::new(),
        per_card_delay: Duration::from_millis(0),
        rate_limit_cooldown: Duration::from_millis(100),
        ..Config::default()
    }
}

#[tokio::test]
async fn bundle_is_complete_even_with_nothing_configured() {
    let server = MockServer::start().await;
    let aggregator = Aggregator::new(test_config(&server));

    let bundle = aggregator
        .resolve_pricing(&CardDescriptor::new("Pikachu"))
        .await;

    assert!(bundle.is_complete());
    for source in SourceId::ALL {
        let quote = bundle.get(source).unwrap();
        assert!(!quote.average_price.is_available());
        assert!(quote.note.is_some(), "{} quote carries no note", source);
    }
    assert_eq!(
        bundle.get(SourceId::PokemonTcg).unwrap().note.as_deref(),
        Some("no API key configured")
    );
}

#[tokio::test]
async fn warm_cache_returns_without_upstream_call() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/en/cards"))
        .and(query_param("name", "Pikachu"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            { "id": "base1-58", "localId": "58", "name": "Pikachu" }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let aggregator = Aggregator::new(test_config(&server));
    let query = SearchQuery {
        name: "Pikachu".to_string(),
        ..Default::default()
    };

    let first = aggregator.search_catalog(&query, false).await.unwrap();
    assert_eq!(first.cards.len(), 1);
    // pricing fetchers skipped entirely without include_pricing
    assert!(first.cards[0].pricing.is_none());

    let second = aggregator.search_catalog(&query, false).await.unwrap();
    assert_eq!(second.cards.len(), 1);
    // the mock's expect(1) verifies no second upstream call on drop
}

#[tokio::test]
async fn refresh_flag_bypasses_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/en/cards"))
        .and(query_param("name", "Pikachu"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            { "id": "base1-58", "localId": "58", "name": "Pikachu" }
        ])))
        .expect(2)
        .mount(&server)
        .await;

    let aggregator = Aggregator::new(test_config(&server));
    let query = SearchQuery {
        name: "Pikachu".to_string(),
        ..Default::default()
    };

    aggregator.search_catalog(&query, false).await.unwrap();
    aggregator.search_catalog(&query, true).await.unwrap();
}

#[tokio::test]
async fn semantically_identical_queries_share_the_cache_entry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/en/cards"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            { "id": "base1-58", "localId": "58", "name": "Pikachu" }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let aggregator = Aggregator::new(test_config(&server));
    let first = SearchQuery {
        name: "Pikachu".to_string(),
        language: "en".to_string(),
        ..Default::default()
    };
    let second = SearchQuery {
        name: "  pikachu ".to_string(),
        language: "EN".to_string(),
        ..Default::default()
    };
    // different spellings, same normalized key
    assert_eq!(first.cache_key(), second.cache_key());

    aggregator.search_catalog(&first, false).await.unwrap();
    aggregator.search_catalog(&second, false).await.unwrap();
}
