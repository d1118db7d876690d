//! Flight candidate and record types.
//!
//! Extraction tiers produce [`FlightCandidate`] values with whatever fields
//! they could actually recover; nothing is defaulted at that stage. The
//! normalizer turns candidates into [`FlightRecord`] values with every
//! field populated, in the camelCase shape downstream consumers expect.

use serde::{Deserialize, Serialize};

/// Which extraction tier produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionTier {
    /// Structured DOM rows matched by the selector tables.
    Dom,
    /// JSON embedded in the page (initial state, framework payloads).
    Embedded,
    /// Heuristic text mining over the rendered page text.
    Text,
    /// Generic HTML table parsing.
    Table,
}

impl ExtractionTier {
    pub fn name(&self) -> &'static str {
        match self {
            ExtractionTier::Dom => "dom",
            ExtractionTier::Embedded => "embedded",
            ExtractionTier::Text => "text",
            ExtractionTier::Table => "table",
        }
    }
}

impl std::fmt::Display for ExtractionTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Result of running a single extraction tier.
#[derive(Debug)]
pub enum TierOutcome {
    /// Tier found at least one candidate.
    Hit(Vec<FlightCandidate>),
    /// Tier ran cleanly but matched nothing.
    Empty,
    /// Tier could not run (malformed input, etc.).
    Failed(String),
}

/// Summarized tier outcome kept in the extraction report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum TierStatus {
    Hit { candidates: usize },
    Empty,
    Failed { reason: String },
}

/// One attempted tier and what it produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierAttempt {
    pub tier: ExtractionTier,
    pub status: TierStatus,
}

/// Record of which tiers ran and which one won.
///
/// Only tiers that actually executed appear; a run that stops at the DOM
/// tier reports a single attempt.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionReport {
    pub attempts: Vec<TierAttempt>,
    pub winning_tier: Option<ExtractionTier>,
}

impl ExtractionReport {
    pub fn record(&mut self, tier: ExtractionTier, status: TierStatus) {
        self.attempts.push(TierAttempt { tier, status });
    }

    pub fn attempted(&self, tier: ExtractionTier) -> bool {
        self.attempts.iter().any(|a| a.tier == tier)
    }
}

/// A partially-extracted flight. Every field is optional: tiers record
/// only what the page actually said, and the normalizer fills the rest.
#[derive(Debug, Clone, Serialize)]
pub struct FlightCandidate {
    pub flight_number: Option<String>,
    pub depart_time: Option<String>,
    pub arrive_time: Option<String>,
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub origin_city: Option<String>,
    pub destination_city: Option<String>,
    pub depart_date: Option<String>,
    pub arrive_date: Option<String>,
    pub duration: Option<String>,
    pub stops: Option<u8>,
    pub seats: Option<u8>,
    /// Award price in miles.
    pub miles: Option<u64>,
    /// Cash price in whole currency units.
    pub cash: Option<u64>,
    pub currency: Option<String>,
    pub aircraft: Option<String>,
    pub cabin: Option<String>,
    pub connecting_airport: Option<String>,
    pub tier: ExtractionTier,
    /// Truncated source context, for debugging extraction quality.
    pub snippet: String,
}

impl FlightCandidate {
    pub fn new(tier: ExtractionTier) -> Self {
        Self {
            flight_number: None,
            depart_time: None,
            arrive_time: None,
            origin: None,
            destination: None,
            origin_city: None,
            destination_city: None,
            depart_date: None,
            arrive_date: None,
            duration: None,
            stops: None,
            seats: None,
            miles: None,
            cash: None,
            currency: None,
            aircraft: None,
            cabin: None,
            connecting_airport: None,
            tier,
            snippet: String::new(),
        }
    }

    pub fn with_snippet(mut self, text: &str) -> Self {
        self.snippet = truncate_snippet(text, 200);
        self
    }

    /// Whether any price information was recovered.
    pub fn has_price(&self) -> bool {
        self.miles.is_some() || self.cash.is_some()
    }
}

/// Truncate to at most `max` bytes without splitting a UTF-8 character.
fn truncate_snippet(s: &str, max: usize) -> String {
    let s = s.trim();
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

/// One side of a flight: where and when.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightEndpoint {
    pub airport: String,
    pub city: String,
    pub time: String,
    pub date: String,
}

/// Price block of a normalized record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightPrice {
    pub amount: u64,
    pub currency: String,
    #[serde(rename = "type")]
    pub price_type: String,
    pub formatted: String,
}

/// Fully normalized flight. Serializes with the exact camelCase keys the
/// output schema requires; every field is always present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightRecord {
    pub airline: String,
    pub flight_number: String,
    pub aircraft: String,
    pub fare_class: String,
    pub departure: FlightEndpoint,
    pub arrival: FlightEndpoint,
    pub price: FlightPrice,
    pub duration: String,
    pub stops: u8,
    /// Bookable seats at the quoted price; 1 when the page did not say.
    pub seats_available: u8,
    /// Empty string for nonstop flights.
    pub connecting_airport: String,
}

impl FlightRecord {
    /// One-line summary used by the CLI.
    pub fn summary_line(&self) -> String {
        format!(
            "{} | {} - {} | {} | {} stops | {}",
            self.flight_number,
            self.departure.time,
            self.arrival.time,
            self.duration,
            self.stops,
            self.price.formatted
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> FlightRecord {
        FlightRecord {
            airline: "United Airlines".to_string(),
            flight_number: "UA100".to_string(),
            aircraft: "Boeing 737".to_string(),
            fare_class: "Economy".to_string(),
            departure: FlightEndpoint {
                airport: "ORD".to_string(),
                city: "Chicago".to_string(),
                time: "10:00".to_string(),
                date: "2025-05-15".to_string(),
            },
            arrival: FlightEndpoint {
                airport: "LAX".to_string(),
                city: "Los Angeles".to_string(),
                time: "12:00".to_string(),
                date: "2025-05-15".to_string(),
            },
            price: FlightPrice {
                amount: 25000,
                currency: "miles".to_string(),
                price_type: "miles".to_string(),
                formatted: "25K miles".to_string(),
            },
            duration: "2h 0m".to_string(),
            stops: 0,
            seats_available: 1,
            connecting_airport: String::new(),
        }
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let json = serde_json::to_value(sample_record()).unwrap();
        assert_eq!(json["flightNumber"], "UA100");
        assert_eq!(json["fareClass"], "Economy");
        assert_eq!(json["connectingAirport"], "");
        assert_eq!(json["seatsAvailable"], 1);
        assert_eq!(json["price"]["type"], "miles");
        assert_eq!(json["price"]["amount"], 25000);
        assert_eq!(json["departure"]["airport"], "ORD");
        // No snake_case leakage
        assert!(json.get("flight_number").is_none());
    }

    #[test]
    fn test_record_round_trips() {
        let record = sample_record();
        let json = serde_json::to_string(&record).unwrap();
        let back: FlightRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_candidate_price_presence() {
        let mut c = FlightCandidate::new(ExtractionTier::Dom);
        assert!(!c.has_price());
        c.miles = Some(25000);
        assert!(c.has_price());
    }

    #[test]
    fn test_snippet_truncation() {
        let long = "x".repeat(500);
        let c = FlightCandidate::new(ExtractionTier::Text).with_snippet(&long);
        assert_eq!(c.snippet.len(), 200);

        // Multibyte content must not be split mid-character.
        let accented = "é".repeat(150);
        let c = FlightCandidate::new(ExtractionTier::Text).with_snippet(&accented);
        assert!(c.snippet.len() <= 200);
        assert!(c.snippet.chars().all(|ch| ch == 'é'));
    }

    #[test]
    fn test_report_tracks_attempts() {
        let mut report = ExtractionReport::default();
        report.record(ExtractionTier::Dom, TierStatus::Empty);
        report.record(ExtractionTier::Embedded, TierStatus::Hit { candidates: 2 });
        report.winning_tier = Some(ExtractionTier::Embedded);

        assert!(report.attempted(ExtractionTier::Dom));
        assert!(!report.attempted(ExtractionTier::Table));
        assert_eq!(report.attempts.len(), 2);
    }

    #[test]
    fn test_summary_line() {
        let line = sample_record().summary_line();
        assert_eq!(line, "UA100 | 10:00 - 12:00 | 2h 0m | 0 stops | 25K miles");
    }
}
