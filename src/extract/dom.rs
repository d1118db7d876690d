//! Tier 1: structured DOM extraction via the selector tables.

use std::collections::HashSet;

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::fields;
use super::selectors::*;
use crate::models::{ExtractionTier, FlightCandidate, TierOutcome};

/// Collapse an element's text nodes into a single normalized string.
pub(crate) fn element_text(el: ElementRef) -> String {
    let joined = el.text().collect::<Vec<_>>().join(" ");
    joined.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First matching element's text, trying each selector in order.
fn select_first_text(row: ElementRef, selector_list: &[&str]) -> Option<String> {
    for sel in selector_list {
        let Ok(selector) = Selector::parse(sel) else {
            continue;
        };
        if let Some(el) = row.select(&selector).next() {
            let text = element_text(el);
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}

/// Award price needs a positive signal: the wide `[class*='price']`
/// selectors match cabin upsell chips too.
fn select_miles(row: ElementRef) -> Option<u64> {
    for sel in MILES_PRICE_SELECTORS {
        let Ok(selector) = Selector::parse(sel) else {
            continue;
        };
        for el in row.select(&selector) {
            let text = element_text(el);
            if text.is_empty() || !fields::looks_like_miles(&text) {
                continue;
            }
            if let Some(miles) = fields::parse_miles_amount(&text) {
                return Some(miles);
            }
        }
    }
    None
}

fn select_cash(row: ElementRef) -> Option<u64> {
    for sel in CASH_PRICE_SELECTORS {
        let Ok(selector) = Selector::parse(sel) else {
            continue;
        };
        for el in row.select(&selector) {
            let text = element_text(el);
            if text.is_empty() || !fields::looks_like_cash(&text) {
                continue;
            }
            if let Some(cash) = fields::parse_cash_amount(&text) {
                return Some(cash);
            }
        }
    }
    None
}

/// Connection cell shows either a bare airport code or prose like
/// "Connect in DEN". Prefer the code.
fn parse_connection(text: &str) -> Option<String> {
    let code = text
        .split_whitespace()
        .find(|word| word.len() == 3 && word.chars().all(|c| c.is_ascii_uppercase()));
    match code {
        Some(c) => Some(c.to_string()),
        None if !text.trim().is_empty() => Some(text.trim().to_string()),
        None => None,
    }
}

fn parse_row(row: ElementRef, award: bool) -> Option<FlightCandidate> {
    let row_text = element_text(row);
    let mut candidate = FlightCandidate::new(ExtractionTier::Dom).with_snippet(&row_text);

    candidate.flight_number = select_first_text(row, FLIGHT_NUMBER_SELECTORS)
        .and_then(|t| fields::flight_number_loose(&t))
        .or_else(|| fields::flight_number_strict(&row_text));

    candidate.depart_time = select_first_text(row, DEPART_TIME_SELECTORS)
        .and_then(|t| fields::find_times(&t).into_iter().next());
    candidate.arrive_time = select_first_text(row, ARRIVE_TIME_SELECTORS)
        .and_then(|t| fields::find_times(&t).into_iter().next());
    if candidate.depart_time.is_none() || candidate.arrive_time.is_none() {
        let times = fields::find_times(&row_text);
        if times.len() >= 2 {
            candidate.depart_time.get_or_insert(times[0].clone());
            candidate.arrive_time.get_or_insert(times[1].clone());
        }
    }

    candidate.duration = select_first_text(row, DURATION_SELECTORS)
        .and_then(|t| fields::parse_duration(&t))
        .or_else(|| fields::parse_duration(&row_text));

    candidate.stops = select_first_text(row, STOPS_SELECTORS)
        .and_then(|t| fields::parse_stops(&t).or_else(|| fields::first_number(&t)));

    if award {
        candidate.miles = select_miles(row).or_else(|| fields::find_award_miles(&row_text));
    } else {
        candidate.cash = select_cash(row);
        candidate.currency = candidate.cash.map(|_| "USD".to_string());
    }

    candidate.aircraft = select_first_text(row, AIRCRAFT_SELECTORS);
    candidate.cabin = select_first_text(row, FARE_CLASS_SELECTORS);
    candidate.connecting_airport =
        select_first_text(row, CONNECTION_SELECTORS).and_then(|t| parse_connection(&t));

    // A row without a price is an upsell banner or layout shell, not a fare
    if !candidate.has_price() {
        return None;
    }
    Some(candidate)
}

pub fn run(html: &str, award: bool) -> TierOutcome {
    let doc = Html::parse_document(html);

    // Collect rows from every selector, deduplicating elements that match
    // more than one (hashed and substring selectors overlap).
    let mut seen = HashSet::new();
    let mut rows = Vec::new();
    for sel in FLIGHT_ROW_SELECTORS {
        let Ok(selector) = Selector::parse(sel) else {
            continue;
        };
        for el in doc.select(&selector) {
            if seen.insert(el.html()) {
                rows.push(el);
            }
        }
    }

    if rows.is_empty() {
        return TierOutcome::Empty;
    }
    debug!("DOM tier matched {} flight rows", rows.len());

    let candidates: Vec<FlightCandidate> = rows
        .into_iter()
        .filter_map(|row| parse_row(row, award))
        .collect();

    if candidates.is_empty() {
        TierOutcome::Empty
    } else {
        TierOutcome::Hit(candidates)
    }
}
