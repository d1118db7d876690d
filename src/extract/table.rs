//! Tier 4: plain `<table>` results.
//!
//! Last resort for degraded or legacy renderings of the results page.
//! The first table whose headers mention flight vocabulary is treated
//! as the results table; every later row becomes one candidate.

use scraper::{Html, Selector};
use tracing::debug;

use super::dom::element_text;
use super::fields;
use crate::models::{ExtractionTier, FlightCandidate, TierOutcome};

const HEADER_WORDS: &[&str] = &["flight", "depart", "arrive", "duration", "price", "miles"];

fn row_candidate(cells: &[String], award: bool) -> Option<FlightCandidate> {
    let mut c =
        FlightCandidate::new(ExtractionTier::Table).with_snippet(&cells.join(" "));

    let mut times = Vec::new();
    for cell in cells {
        if c.flight_number.is_none() {
            c.flight_number = fields::flight_number_strict(cell);
        }
        if award {
            if c.miles.is_none() {
                c.miles = fields::find_award_miles_bounded(cell);
            }
        } else if c.cash.is_none() && fields::looks_like_cash(cell) {
            c.cash = fields::parse_cash_amount(cell);
            if c.cash.is_some() {
                c.currency = Some("USD".to_string());
            }
        }
        if times.len() < 2 {
            times.extend(fields::find_times(cell));
        }
        if c.stops.is_none() {
            c.stops = fields::parse_stops(cell);
        }
        if c.duration.is_none() {
            c.duration = fields::parse_duration(cell);
        }
    }
    c.depart_time = times.first().cloned();
    c.arrive_time = times.get(1).cloned();

    if c.has_price() {
        Some(c)
    } else {
        None
    }
}

pub fn run(html: &str, award: bool) -> TierOutcome {
    let doc = Html::parse_document(html);
    let table_sel = Selector::parse("table").unwrap();
    let th_sel = Selector::parse("th").unwrap();
    let tr_sel = Selector::parse("tr").unwrap();
    let cell_sel = Selector::parse("td, th").unwrap();

    let Some(table) = doc.select(&table_sel).find(|t| {
        let headers = t
            .select(&th_sel)
            .map(|h| element_text(h).to_lowercase())
            .collect::<Vec<_>>()
            .join(" ");
        HEADER_WORDS.iter().any(|w| headers.contains(w))
    }) else {
        return TierOutcome::Empty;
    };

    let mut candidates = Vec::new();
    for row in table.select(&tr_sel).skip(1) {
        let cells: Vec<String> = row.select(&cell_sel).map(element_text).collect();
        if cells.len() < 3 {
            continue;
        }
        if let Some(c) = row_candidate(&cells, award) {
            candidates.push(c);
        }
    }

    if candidates.is_empty() {
        TierOutcome::Failed("matched table had no parsable rows".to_string())
    } else {
        debug!("Table tier: {} flights parsed", candidates.len());
        TierOutcome::Hit(candidates)
    }
}
