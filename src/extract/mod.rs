//! Tiered flight extraction.
//!
//! Four parsers run against a results page in order of fidelity:
//!
//! 1. [`dom`] - known CSS selectors against rendered rows
//! 2. [`embedded`] - JSON payloads shipped inside the document
//! 3. [`text`] - heuristic text mining (award searches only)
//! 4. [`table`] - plain HTML tables
//!
//! The first tier to produce candidates wins and later tiers never
//! run. Every tier is a pure function of the page text, so the whole
//! cascade can be replayed offline against a saved page.

pub mod dom;
pub mod embedded;
pub mod fields;
pub mod selectors;
pub mod table;
pub mod text;

use tracing::debug;

use crate::models::{ExtractionReport, ExtractionTier, FlightCandidate, TierOutcome, TierStatus};

fn settle(
    tier: ExtractionTier,
    outcome: TierOutcome,
    report: &mut ExtractionReport,
) -> Option<Vec<FlightCandidate>> {
    match outcome {
        TierOutcome::Hit(candidates) => {
            debug!("{} tier produced {} candidates", tier, candidates.len());
            report.record(tier, TierStatus::Hit { candidates: candidates.len() });
            report.winning_tier = Some(tier);
            Some(candidates)
        }
        TierOutcome::Empty => {
            report.record(tier, TierStatus::Empty);
            None
        }
        TierOutcome::Failed(reason) => {
            debug!("{} tier failed: {}", tier, reason);
            report.record(tier, TierStatus::Failed { reason });
            None
        }
    }
}

/// Run the cascade over a results page. Always returns a report listing
/// which tiers ran and how each fared, alongside whatever candidates the
/// winning tier produced.
pub fn extract(html: &str, award: bool) -> (Vec<FlightCandidate>, ExtractionReport) {
    let mut report = ExtractionReport::default();

    if let Some(c) = settle(ExtractionTier::Dom, dom::run(html, award), &mut report) {
        return (c, report);
    }
    if let Some(c) = settle(ExtractionTier::Embedded, embedded::run(html, award), &mut report) {
        return (c, report);
    }
    if award {
        if let Some(c) = settle(ExtractionTier::Text, text::run(html), &mut report) {
            return (c, report);
        }
    }
    if let Some(c) = settle(ExtractionTier::Table, table::run(html, award), &mut report) {
        return (c, report);
    }

    (Vec::new(), report)
}
