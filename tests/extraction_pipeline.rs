//! End-to-end extraction tests: saved page HTML through the tier cascade
//! and normalizer, asserting on the final output schema.

use awardscout::extract;
use awardscout::models::{ExtractionTier, FlightRecord, TierStatus};
use awardscout::normalize;
use awardscout::request::SearchRequest;

const DOM_RESULTS_PAGE: &str = r#"
<html><body>
  <div class="app-components-Shopping-results">
    <div class="flightRow">
      <span class="flightNumber">UA 100</span>
      <span class="departTime">10:00</span>
      <span class="arriveTime">12:00</span>
      <span class="duration">2h 0m</span>
      <span class="stops">Nonstop</span>
      <span class="miles">25,000 miles</span>
    </div>
    <div class="flightRow">
      <span class="flightNumber">UA 482</span>
      <span class="departTime">14:20</span>
      <span class="arriveTime">18:05</span>
      <span class="duration">3h 45m</span>
      <span class="stops">1 stop</span>
      <span class="connection">Connect in DEN</span>
      <span class="miles">32,500 miles</span>
    </div>
  </div>
</body></html>
"#;

const EMBEDDED_RESULTS_PAGE: &str = r#"
<html><body>
  <div id="root">Loading your flights...</div>
  <script id="__NEXT_DATA__" type="application/json">
    {"props":{"pageProps":{"flights":[
      {"flightNumber":205,"origin":"SFO","destination":"NRT",
       "departTime":"11:05","arriveTime":"14:25","miles":40000,"stops":0}
    ]}}}
  </script>
</body></html>
"#;

fn award_request() -> SearchRequest {
    SearchRequest::new("SFO", "NRT", "2026-09-15", true).unwrap()
}

fn run_pipeline(html: &str, request: &SearchRequest) -> Vec<FlightRecord> {
    let (candidates, _) = extract::extract(html, request.award());
    normalize::normalize_batch(&candidates, request)
}

#[test]
fn dom_page_yields_normalized_records() {
    let request = award_request();
    let (candidates, report) = extract::extract(DOM_RESULTS_PAGE, true);
    assert_eq!(report.winning_tier, Some(ExtractionTier::Dom));

    let records = normalize::normalize_batch(&candidates, &request);
    assert_eq!(records.len(), 2);

    let first = &records[0];
    assert_eq!(first.airline, "United Airlines");
    assert_eq!(first.flight_number, "UA100");
    assert_eq!(first.departure.time, "10:00");
    assert_eq!(first.arrival.time, "12:00");
    assert_eq!(first.duration, "2h 0m");
    assert_eq!(first.stops, 0);
    assert_eq!(first.connecting_airport, "");
    assert_eq!(first.price.amount, 25_000);
    assert_eq!(first.price.currency, "miles");
    assert_eq!(first.price.formatted, "25K miles");
    // Endpoints missing from the page are filled from the request
    assert_eq!(first.departure.airport, "SFO");
    assert_eq!(first.departure.city, "San Francisco");
    assert_eq!(first.departure.date, "2026-09-15");
    assert_eq!(first.arrival.airport, "NRT");

    let second = &records[1];
    assert_eq!(second.flight_number, "UA482");
    assert_eq!(second.stops, 1);
    assert_eq!(second.connecting_airport, "DEN");
    assert_eq!(second.price.amount, 32_500);
}

#[test]
fn output_schema_uses_camel_case_keys() {
    let request = award_request();
    let records = run_pipeline(DOM_RESULTS_PAGE, &request);
    let json = serde_json::to_value(&records[0]).unwrap();

    assert!(json.get("flightNumber").is_some());
    assert!(json.get("fareClass").is_some());
    assert!(json.get("connectingAirport").is_some());
    assert_eq!(json["price"]["type"], "miles");
    assert!(json.get("flight_number").is_none());
    // Every record carries the full key set even where the page was silent
    for key in [
        "airline",
        "flightNumber",
        "aircraft",
        "fareClass",
        "departure",
        "arrival",
        "price",
        "duration",
        "stops",
        "seatsAvailable",
        "connectingAirport",
    ] {
        assert!(json.get(key).is_some(), "missing key {}", key);
    }
}

#[test]
fn embedded_page_falls_through_to_tier_two() {
    let request = award_request();
    let (candidates, report) = extract::extract(EMBEDDED_RESULTS_PAGE, true);

    // DOM ran first and came up empty, embedded won
    assert_eq!(report.attempts[0].tier, ExtractionTier::Dom);
    assert_eq!(report.attempts[0].status, TierStatus::Empty);
    assert_eq!(report.winning_tier, Some(ExtractionTier::Embedded));

    let records = normalize::normalize_batch(&candidates, &request);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].flight_number, "UA205");
    assert_eq!(records[0].price.amount, 40_000);
    assert_eq!(records[0].departure.airport, "SFO");
    assert_eq!(records[0].departure.time, "11:05");
}

#[test]
fn tiers_short_circuit_after_a_hit() {
    let (_, report) = extract::extract(DOM_RESULTS_PAGE, true);
    assert_eq!(report.attempts.len(), 1);
    assert!(!report.attempted(ExtractionTier::Embedded));
    assert!(!report.attempted(ExtractionTier::Text));
}

#[test]
fn empty_page_attempts_every_tier_and_reports_nothing() {
    let (candidates, report) = extract::extract("<html><body><p>maintenance</p></body></html>", true);
    assert!(candidates.is_empty());
    assert!(report.winning_tier.is_none());
    assert!(report.attempted(ExtractionTier::Dom));
    assert!(report.attempted(ExtractionTier::Embedded));
    assert!(report.attempted(ExtractionTier::Text));
    assert!(report.attempted(ExtractionTier::Table));
}

#[test]
fn duplicate_rows_collapse_in_normalization() {
    // Same flight rendered twice (mobile and desktop layouts)
    let html = r#"
      <div class="flightRow">
        <span class="flightNumber">UA 808</span>
        <span class="departTime">07:00</span>
        <span class="miles">12,500 miles</span>
      </div>
      <div data-test="flight-row">
        <span class="flightNumber">UA 808</span>
        <span class="departTime">07:00</span>
        <span class="miles">12,500 miles</span>
      </div>
    "#;
    let request = award_request();
    let records = run_pipeline(html, &request);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].flight_number, "UA808");
}

#[test]
fn pipeline_is_deterministic_for_a_fixed_page() {
    let request = award_request();
    let first = serde_json::to_string(&run_pipeline(DOM_RESULTS_PAGE, &request)).unwrap();
    let second = serde_json::to_string(&run_pipeline(DOM_RESULTS_PAGE, &request)).unwrap();
    assert_eq!(first, second);
}

#[test]
fn cash_search_skips_the_text_tier() {
    let (_, report) = extract::extract("<html><body></body></html>", false);
    assert!(!report.attempted(ExtractionTier::Text));
    assert!(report.attempted(ExtractionTier::Table));
}
