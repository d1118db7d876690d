//! Tier 3: heuristic text mining (award searches only).
//!
//! When the results page renders through markup we have no selectors
//! for, flight facts still surface as visible text. This tier walks
//! every text node in document order, keeps the lines that look
//! flight-related, clusters neighbouring lines, and mines each cluster
//! for a bounded mileage figure plus whatever context sits around it.
//! A cluster without a plausible award price is discarded whole, so
//! marketing copy ("earn 500 miles") cannot leak in as a flight.

use scraper::Html;
use tracing::debug;

use super::fields;
use crate::models::{ExtractionTier, FlightCandidate, TierOutcome};

/// Words that mark a text line as flight-related.
const INDICATORS: &[&str] = &[
    "flight",
    "depart",
    "arrive",
    "stop",
    "nonstop",
    "economy",
    "business",
    "first",
    "connect",
];

/// Lines more than this many text nodes apart belong to different
/// clusters.
const CLUSTER_GAP: usize = 5;

fn is_interesting(line: &str) -> bool {
    if fields::find_award_miles(line).is_some() {
        return true;
    }
    if fields::contains_time(line) || fields::parse_duration(line).is_some() {
        return true;
    }
    // The carrier marker must be a real flight number, not a substring
    // ("usually", "Guadalajara").
    if fields::flight_number_strict(line).is_some() {
        return true;
    }
    let lower = line.to_lowercase();
    INDICATORS.iter().any(|w| lower.contains(w))
}

fn candidate_from_cluster(lines: &[&str]) -> Option<FlightCandidate> {
    let combined = lines.join(" ");
    let miles = fields::find_award_miles_bounded(&combined)?;

    let mut c = FlightCandidate::new(ExtractionTier::Text).with_snippet(&combined);
    c.miles = Some(miles);
    c.flight_number = fields::flight_number_strict(&combined);
    let times = fields::find_times(&combined);
    c.depart_time = times.first().cloned();
    c.arrive_time = times.get(1).cloned();
    c.stops = fields::parse_stops(&combined);
    c.duration = fields::parse_duration(&combined);
    Some(c)
}

pub fn run(html: &str) -> TierOutcome {
    let doc = Html::parse_document(html);
    let lines: Vec<&str> = doc
        .root_element()
        .text()
        .map(str::trim)
        .filter(|t| t.len() > 3)
        .collect();

    let mut candidates = Vec::new();
    let mut cluster: Vec<&str> = Vec::new();
    let mut last_index: Option<usize> = None;

    for (i, line) in lines.iter().enumerate() {
        if !is_interesting(line) {
            continue;
        }
        let gap_exceeded = last_index.is_some_and(|last| i - last > CLUSTER_GAP);
        if gap_exceeded && !cluster.is_empty() {
            if let Some(c) = candidate_from_cluster(&cluster) {
                candidates.push(c);
            }
            cluster.clear();
        }
        cluster.push(line);
        last_index = Some(i);
    }
    if !cluster.is_empty() {
        if let Some(c) = candidate_from_cluster(&cluster) {
            candidates.push(c);
        }
    }

    if candidates.is_empty() {
        TierOutcome::Empty
    } else {
        debug!("Text tier: {} flight clusters mined", candidates.len());
        TierOutcome::Hit(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mines_flight_facts_from_loose_markup() {
        let html = r#"<html><body>
            <div><span>UA 523</span><span>Departs 7:30 AM</span></div>
            <div><span>Arrives 10:05 AM</span><span>Nonstop</span></div>
            <div><span>6h 35m</span><span>33,500 miles</span></div>
        </body></html>"#;
        let TierOutcome::Hit(candidates) = run(html) else {
            panic!("expected a hit");
        };
        assert_eq!(candidates.len(), 1);
        let c = &candidates[0];
        assert_eq!(c.flight_number.as_deref(), Some("UA523"));
        assert_eq!(c.miles, Some(33_500));
        assert_eq!(c.depart_time.as_deref(), Some("7:30 AM"));
        assert_eq!(c.arrive_time.as_deref(), Some("10:05 AM"));
        assert_eq!(c.stops, Some(0));
        assert_eq!(c.duration.as_deref(), Some("6h 35m"));
        assert_eq!(c.tier, ExtractionTier::Text);
    }

    #[test]
    fn test_cluster_without_plausible_miles_is_dropped() {
        // promotional copy mentions miles below the sanity floor
        let html = r#"<html><body>
            <p>Earn 500 miles on every flight with our dining program</p>
        </body></html>"#;
        assert!(matches!(run(html), TierOutcome::Empty));
    }

    #[test]
    fn test_distant_lines_form_separate_clusters() {
        let html = r#"<html><body>
            <div><span>UA 100 departs 8:00 AM</span><span>25,000 miles</span></div>
            <p>lorem ipsum dolor</p><p>amet sed elit</p><p>tempor magna</p>
            <p>minim dolore</p><p>nostrud nisi</p><p>aliquip commodo</p>
            <div><span>UA 200 departs 9:00 AM</span><span>30,000 miles</span></div>
        </body></html>"#;
        let TierOutcome::Hit(candidates) = run(html) else {
            panic!("expected a hit");
        };
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].flight_number.as_deref(), Some("UA100"));
        assert_eq!(candidates[0].miles, Some(25_000));
        assert_eq!(candidates[1].flight_number.as_deref(), Some("UA200"));
        assert_eq!(candidates[1].miles, Some(30_000));
    }

    #[test]
    fn test_ua_substring_filler_does_not_bridge_clusters() {
        // Copy containing "ua" inside ordinary words must not count as
        // flight-related, or it glues the two flights into one cluster.
        let html = r#"<html><body>
            <div><span>UA 100 departs 8:00 AM</span><span>25,000 miles</span></div>
            <p>quality amenities</p><p>usually included</p>
            <p>Guadalajara travel</p><p>visual gallery</p>
            <p>annual savings</p><p>manual upgrades</p>
            <div><span>UA 200 departs 9:00 AM</span><span>30,000 miles</span></div>
        </body></html>"#;
        let TierOutcome::Hit(candidates) = run(html) else {
            panic!("expected a hit");
        };
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].flight_number.as_deref(), Some("UA100"));
        assert_eq!(candidates[1].flight_number.as_deref(), Some("UA200"));
    }

    #[test]
    fn test_no_flight_text_is_empty() {
        let html = "<html><body><p>holiday photography gallery</p></body></html>";
        assert!(matches!(run(html), TierOutcome::Empty));
    }
}
