//! Field-level text parsers shared by the extraction tiers.

use std::sync::LazyLock;

use regex::Regex;

static TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\d{1,2}:\d{2}(?:\s*[ap]m)?").unwrap());

static DURATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+h\s*\d*m|\d+\s*hr\s*\d*\s*min)").unwrap());

static UA_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)UA\s*(\d+)").unwrap());

static BARE_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)").unwrap());

static STOP_COUNT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)(\d+)\s*stop").unwrap());

static AMOUNT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d[\d,\.]*)").unwrap());

static AMOUNT_K_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d[\d,\.]*)\s*k\b").unwrap());

static CASH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\$€£]?\s*(\d[\d,\.]+)").unwrap());

/// Award price mentions in free text, most specific first. The second
/// tuple element is the multiplier applied to the captured digits:
/// abbreviated forms ("40K miles") and short forms ("87 miles") are
/// quoted in thousands.
static AWARD_PATTERNS: LazyLock<Vec<(Regex, u64)>> = LazyLock::new(|| {
    vec![
        (
            Regex::new(r"(?i)\b(\d{1,3}(?:,\d{3})+)\s*miles?\b").unwrap(),
            1,
        ),
        (Regex::new(r"(?i)\b(\d{4,6})\s*miles?\b").unwrap(), 1),
        (Regex::new(r"(?i)\b(\d{1,3})\s*k\s*miles?\b").unwrap(), 1000),
        (Regex::new(r"(?i)\b(\d{1,2})\s*miles?\b").unwrap(), 1000),
        (
            Regex::new(r"(?i)miles?[:\s]*\b(\d{1,3}(?:,\d{3})+)\b").unwrap(),
            1,
        ),
        (Regex::new(r"(?i)miles?[:\s]*\b(\d{4,6})\b").unwrap(), 1),
        (
            Regex::new(r"(?i)award[:\s]*\b(\d{1,3}(?:,\d{3})+)\b").unwrap(),
            1,
        ),
        (Regex::new(r"(?i)award[:\s]*\b(\d{4,6})\b").unwrap(), 1),
    ]
});

fn digits_to_u64(s: &str) -> Option<u64> {
    let cleaned: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok()
}

/// Parse a miles amount from a dedicated price element.
///
/// Values under 100 without a K suffix are quoted in thousands
/// ("25" on an award button means 25,000 miles), and a K suffix
/// adjacent to the number always multiplies by 1000.
pub fn parse_miles_amount(text: &str) -> Option<u64> {
    if let Some(cap) = AMOUNT_K_RE.captures(text) {
        return digits_to_u64(&cap[1]).map(|n| n * 1000);
    }
    let cap = AMOUNT_RE.captures(text)?;
    let n = digits_to_u64(&cap[1])?;
    if n < 100 {
        Some(n * 1000)
    } else {
        Some(n)
    }
}

/// Find an award price mentioned anywhere in free text.
pub fn find_award_miles(text: &str) -> Option<u64> {
    for (pattern, multiplier) in AWARD_PATTERNS.iter() {
        if let Some(cap) = pattern.captures(text) {
            if let Some(n) = digits_to_u64(&cap[1]) {
                return Some(n * multiplier);
            }
        }
    }
    None
}

/// Find an award price and keep it only if it is plausible
/// (between 5,000 and 500,000 miles).
pub fn find_award_miles_bounded(text: &str) -> Option<u64> {
    find_award_miles(text).filter(|n| (5_000..=500_000).contains(n))
}

/// Parse a cash price, rounding to whole currency units.
pub fn parse_cash_amount(text: &str) -> Option<u64> {
    let cap = CASH_RE.captures(text)?;
    let cleaned: String = cap[1].chars().filter(|c| *c != ',').collect();
    let value: f64 = cleaned.parse().ok()?;
    if value.is_finite() && value >= 0.0 {
        Some(value.round() as u64)
    } else {
        None
    }
}

/// Whether an element's text plausibly holds a cash price.
pub fn looks_like_cash(text: &str) -> bool {
    text.contains('$') || text.contains('€') || text.contains('£') || CASH_RE.is_match(text)
}

/// Whether an element's text plausibly holds an award price.
pub fn looks_like_miles(text: &str) -> bool {
    text.to_lowercase().contains("mile") || find_award_miles(text).is_some()
}

/// Flight number from text that should contain one: `UA 123` wins,
/// otherwise the first bare number is taken as a United flight.
pub fn flight_number_loose(text: &str) -> Option<String> {
    if let Some(cap) = UA_NUMBER_RE.captures(text) {
        return Some(format!("UA{}", &cap[1]));
    }
    BARE_NUMBER_RE
        .captures(text)
        .map(|cap| format!("UA{}", &cap[1]))
}

/// Flight number only when an explicit `UA` marker is present.
pub fn flight_number_strict(text: &str) -> Option<String> {
    UA_NUMBER_RE
        .captures(text)
        .map(|cap| format!("UA{}", &cap[1]))
}

/// All departure/arrival style times in order of appearance.
pub fn find_times(text: &str) -> Vec<String> {
    TIME_RE
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

pub fn parse_duration(text: &str) -> Option<String> {
    DURATION_RE
        .captures(text)
        .map(|cap| cap[1].trim().to_string())
}

/// Stop count from text like "nonstop", "1 stop", "2 stops".
pub fn parse_stops(text: &str) -> Option<u8> {
    let lower = text.to_lowercase();
    if lower.contains("nonstop") || lower.contains("direct") || lower.contains("0 stop") {
        return Some(0);
    }
    STOP_COUNT_RE
        .captures(&lower)
        .and_then(|cap| cap[1].parse().ok())
}

/// First bare number, used as a last-resort stop count on dedicated
/// stops elements.
pub fn first_number(text: &str) -> Option<u8> {
    BARE_NUMBER_RE
        .captures(text)
        .and_then(|cap| cap[1].parse().ok())
}

/// Whether text contains a time of day.
pub fn contains_time(text: &str) -> bool {
    TIME_RE.is_match(text)
}
