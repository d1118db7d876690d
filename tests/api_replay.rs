//! Integration tests for the direct API replay client.
//!
//! Uses `wiremock` to stand up a local shopping API so no real network
//! traffic is made: endpoint fallback, rate-limit surfacing, header
//! shape, and response parsing.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use awardscout::api::ReplayClient;
use awardscout::error::CrawlError;
use awardscout::request::SearchRequest;
use awardscout::token::{AuthToken, TokenSource};

fn test_client(base: &str) -> ReplayClient {
    ReplayClient::new(base, "scout-test/0.1", Duration::from_secs(5)).unwrap()
}

fn test_token() -> AuthToken {
    AuthToken::new("DAAAAtesttoken1234567890", TokenSource::Html)
}

fn award_request() -> SearchRequest {
    SearchRequest::new("ORD", "LAX", "2026-05-15", true).unwrap()
}

/// A one-trip shopping response with a single award flight.
fn trips_response() -> serde_json::Value {
    json!({
        "trips": [{
            "flights": [{
                "flightNumber": 1542,
                "origin": {"code": "ORD", "city": "Chicago", "time": "10:00"},
                "destination": {"code": "LAX", "city": "Los Angeles", "time": "12:21"},
                "price": {"miles": 27500},
                "stops": 0,
                "duration": "4h 21m"
            }]
        }]
    })
}

#[tokio::test]
async fn replay_parses_the_trips_envelope() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/flight/FetchFlights"))
        .respond_with(ResponseTemplate::new(200).set_body_json(trips_response()))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let candidates = client
        .fetch_flights(&award_request(), &test_token(), &[])
        .await
        .unwrap();

    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].flight_number.as_deref(), Some("UA1542"));
    assert_eq!(candidates[0].miles, Some(27_500));
    assert_eq!(candidates[0].origin.as_deref(), Some("ORD"));
    assert_eq!(candidates[0].depart_time.as_deref(), Some("10:00"));
}

#[tokio::test]
async fn replay_advances_past_failing_endpoints() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/flight/FetchFlights"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/flight/shop/flight"))
        .respond_with(ResponseTemplate::new(200).set_body_json(trips_response()))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let candidates = client
        .fetch_flights(&award_request(), &test_token(), &[])
        .await
        .unwrap();

    assert_eq!(candidates.len(), 1);
}

#[tokio::test]
async fn rate_limiting_stops_the_endpoint_walk() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/flight/FetchFlights"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let result = client
        .fetch_flights(&award_request(), &test_token(), &[])
        .await;

    match result {
        Err(CrawlError::RateLimited { endpoint }) => {
            assert!(endpoint.contains("FetchFlights"));
        }
        other => panic!("expected RateLimited, got {:?}", other),
    }
}

#[tokio::test]
async fn replay_sends_bearer_headers_and_search_payload() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/flight/FetchFlights"))
        .and(header(
            "Authorization",
            "bearer DAAAAtesttoken1234567890",
        ))
        .and(header(
            "X-Authorization-api",
            "bearer DAAAAtesttoken1234567890",
        ))
        .and(header_exists("X-Request-ID"))
        .and(body_partial_json(json!({
            "originCode": "ORD",
            "destinationCode": "LAX",
            "departDate": "2026-05-15",
            "awardTravel": true,
            "searchTypeSelection": "AWARD",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(trips_response()))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let candidates = client
        .fetch_flights(&award_request(), &test_token(), &[])
        .await
        .unwrap();
    assert_eq!(candidates.len(), 1);
}

#[tokio::test]
async fn replay_forwards_browser_cookies() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/flight/FetchFlights"))
        .and(wiremock::matchers::header_regex(
            "Cookie",
            "bm_sv=abc123",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(trips_response()))
        .expect(1)
        .mount(&server)
        .await;

    let cookies = vec![("bm_sv".to_string(), "abc123".to_string())];
    let client = test_client(&server.uri());
    let candidates = client
        .fetch_flights(&award_request(), &test_token(), &cookies)
        .await
        .unwrap();
    assert_eq!(candidates.len(), 1);
}

#[tokio::test]
async fn empty_answers_from_every_endpoint_yield_no_flights() {
    let server = MockServer::start().await;

    // Every endpoint answers 200 with an empty body; the walk exhausts
    // all five paths and reports no flights rather than erroring.
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(5)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let candidates = client
        .fetch_flights(&award_request(), &test_token(), &[])
        .await
        .unwrap();
    assert!(candidates.is_empty());
}
