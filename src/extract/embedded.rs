//! Tier 2: flight data embedded in page JSON.
//!
//! Single-page frontends ship their result set inside the document:
//! `window.__INITIAL_STATE__`, framework hydration payloads, JSON-LD
//! structured data, and plain `application/json` scripts. Sources are
//! tried in that order and the first one that yields candidates wins.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use super::fields;
use crate::models::{ExtractionTier, FlightCandidate, TierOutcome};

static INITIAL_STATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)window\.__INITIAL_STATE__\s*=\s*(\{.*?\});").unwrap());

static NEXT_DATA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<script id="__NEXT_DATA__" type="application/json">(.*?)</script>"#).unwrap()
});

static JSON_SCRIPT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<script[^>]*type="application/json"[^>]*>(.*?)</script>"#).unwrap()
});

static JSON_LD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<script[^>]*type="application/ld\+json"[^>]*>(.*?)</script>"#).unwrap()
});

/// Keys whose array values are likely flight collections.
const FLIGHT_CONTAINER_KEYS: &[&str] =
    &["flights", "tripOptions", "trips", "flightResults", "segments"];

/// Keys that mark an object as flight-shaped.
const FLIGHT_FIELD_KEYS: &[&str] = &[
    "flightNumber",
    "origin",
    "destination",
    "miles",
    "cabin",
    "stops",
    "duration",
];

/// Wider net used when deciding whether a single object is worth
/// turning into a candidate at all.
const ACCEPT_KEYS: &[&str] = &[
    "flightNumber",
    "flight",
    "origin",
    "destination",
    "miles",
    "award",
    "price",
    "cabin",
    "stops",
    "duration",
    "departTime",
    "arriveTime",
    "aircraft",
    "connection",
];

#[derive(Debug, Clone)]
enum Seg {
    Key(String),
    Index(usize),
}

fn value_to_u64(v: &Value) -> Option<u64> {
    v.as_u64()
        .or_else(|| v.as_f64().map(|f| f.round() as u64))
        .or_else(|| v.as_str().and_then(|s| s.replace(',', "").trim().parse().ok()))
}

fn value_str(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// "205" and 205 become "UA205"; strings already carrying the carrier
/// prefix pass through uppercased.
fn format_flight_number(v: &Value) -> Option<String> {
    if let Some(n) = v.as_u64() {
        return Some(format!("UA{}", n));
    }
    let s = v.as_str()?.trim();
    if s.is_empty() {
        return None;
    }
    let upper = s.to_uppercase().replace(' ', "");
    if upper.starts_with("UA") {
        Some(upper)
    } else {
        Some(format!("UA{}", upper))
    }
}

/// Build a candidate from one flight-shaped object. Field names vary
/// between the page payloads and the shopping API, so each field tries
/// the known spellings in turn.
fn candidate_from_value(flight: &Value, award: bool) -> Option<FlightCandidate> {
    let obj = flight.as_object()?;
    if !ACCEPT_KEYS.iter().any(|k| obj.contains_key(*k)) {
        return None;
    }

    let mut c = FlightCandidate::new(ExtractionTier::Embedded).with_snippet(&flight.to_string());

    c.flight_number = obj
        .get("flightNumber")
        .or_else(|| obj.get("flight"))
        .and_then(format_flight_number);

    // origin/destination appear as objects ({code, city, time}) in page
    // state and as bare code strings in simpler payloads
    if let Some(origin) = obj.get("origin") {
        match origin {
            Value::Object(o) => {
                c.origin = o.get("code").and_then(value_str);
                c.origin_city = o.get("city").and_then(value_str);
                c.depart_time = o.get("time").and_then(value_str);
            }
            Value::String(s) if !s.trim().is_empty() => c.origin = Some(s.trim().to_string()),
            _ => {}
        }
    }
    if let Some(destination) = obj.get("destination") {
        match destination {
            Value::Object(o) => {
                c.destination = o.get("code").and_then(value_str);
                c.destination_city = o.get("city").and_then(value_str);
                c.arrive_time = o.get("time").and_then(value_str);
            }
            Value::String(s) if !s.trim().is_empty() => {
                c.destination = Some(s.trim().to_string())
            }
            _ => {}
        }
    }

    if c.depart_time.is_none() {
        c.depart_time = obj
            .get("departTime")
            .or_else(|| obj.get("departureTime"))
            .and_then(value_str);
    }
    if c.arrive_time.is_none() {
        c.arrive_time = obj
            .get("arrivalTime")
            .or_else(|| obj.get("arriveTime"))
            .and_then(value_str);
    }
    c.depart_date = obj.get("departDate").and_then(value_str);
    c.arrive_date = obj.get("arrivalDate").and_then(value_str);

    let price = obj.get("price");
    if award {
        c.miles = obj
            .get("miles")
            .and_then(value_to_u64)
            .or_else(|| price.and_then(|p| p.get("miles")).and_then(value_to_u64))
            .or_else(|| obj.get("award").and_then(value_to_u64))
            .or_else(|| price.and_then(|p| p.get("amount")).and_then(value_to_u64));
    } else if let Some(p) = price {
        c.cash = p.get("amount").and_then(value_to_u64);
        c.currency = p.get("currency").and_then(value_str);
    }

    c.stops = obj
        .get("stops")
        .and_then(value_to_u64)
        .map(|n| n.min(u8::MAX as u64) as u8);
    c.seats = obj
        .get("seatsAvailable")
        .or_else(|| obj.get("seats"))
        .and_then(value_to_u64)
        .map(|n| n.min(u8::MAX as u64) as u8);
    c.duration = obj.get("duration").and_then(value_str);
    c.cabin = obj.get("cabin").and_then(value_str);
    c.aircraft = obj.get("aircraft").and_then(|a| match a {
        Value::Object(o) => o.get("type").and_then(value_str),
        other => value_str(other),
    });

    c.connecting_airport = obj
        .get("connections")
        .and_then(|v| v.get(0))
        .and_then(|v| v.get("airport"))
        .and_then(value_str)
        .or_else(|| {
            obj.get("connection").and_then(|v| match v {
                Value::Object(o) => o.get("code").and_then(value_str),
                other => value_str(other),
            })
        });

    Some(c)
}

/// Turn an array into candidates. Items that are trip wrappers (carrying
/// a nested `flights` array) are descended into instead of being emitted
/// as near-empty candidates themselves.
pub(crate) fn collect_from_array(items: &[Value], award: bool) -> Vec<FlightCandidate> {
    let mut out = Vec::new();
    for item in items {
        if let Some(Value::Array(flights)) = item.get("flights") {
            for flight in flights {
                if let Some(c) = candidate_from_value(flight, award) {
                    out.push(c);
                }
            }
        } else if let Some(c) = candidate_from_value(item, award) {
            out.push(c);
        }
    }
    out
}

fn navigate<'a>(root: &'a Value, path: &[Seg]) -> Option<&'a Value> {
    let mut cur = root;
    for seg in path {
        cur = match seg {
            Seg::Key(k) => cur.get(k)?,
            Seg::Index(i) => cur.get(i)?,
        };
    }
    Some(cur)
}

/// Recursively locate arrays that look like flight collections: named by
/// a container key, or lists of objects carrying flight fields. Arrays
/// are probed through their first element only.
fn find_flight_paths(value: &Value, prefix: &mut Vec<Seg>, depth: usize, out: &mut Vec<Vec<Seg>>) {
    if depth == 0 {
        return;
    }
    match value {
        Value::Object(map) => {
            for key in FLIGHT_CONTAINER_KEYS {
                if let Some(Value::Array(arr)) = map.get(*key) {
                    if !arr.is_empty() {
                        let mut path = prefix.clone();
                        path.push(Seg::Key(key.to_string()));
                        out.push(path);
                    }
                }
            }
            for (k, v) in map {
                prefix.push(Seg::Key(k.clone()));
                find_flight_paths(v, prefix, depth - 1, out);
                prefix.pop();
            }
        }
        Value::Array(arr) if !arr.is_empty() => {
            if arr.iter().all(|i| i.is_object())
                && arr
                    .iter()
                    .any(|i| FLIGHT_FIELD_KEYS.iter().any(|k| i.get(k).is_some()))
            {
                out.push(prefix.clone());
            }
            prefix.push(Seg::Index(0));
            find_flight_paths(&arr[0], prefix, depth - 1, out);
            prefix.pop();
        }
        _ => {}
    }
}

fn from_initial_state(data: &Value, award: bool) -> Vec<FlightCandidate> {
    let Some(trip_options) = data
        .pointer("/shoppingPage/results/tripOptions")
        .and_then(|v| v.as_array())
    else {
        return Vec::new();
    };
    collect_from_array(trip_options, award)
}

/// Known hydration paths, checked before falling back to the walker.
const NEXT_DATA_PATHS: &[&[&str]] = &[
    &["initialState", "shoppingPage", "results", "tripOptions"],
    &["initialState", "flightResults", "trips"],
    &["flightResults", "trips"],
    &["flightData", "results"],
];

fn from_next_data(data: &Value, award: bool) -> Vec<FlightCandidate> {
    let Some(page_props) = data.pointer("/props/pageProps") else {
        return Vec::new();
    };
    for path in NEXT_DATA_PATHS {
        let mut cur = page_props;
        let mut ok = true;
        for key in *path {
            match cur.get(key) {
                Some(next) => cur = next,
                None => {
                    ok = false;
                    break;
                }
            }
        }
        if !ok {
            continue;
        }
        if let Some(arr) = cur.as_array() {
            let candidates = collect_from_array(arr, award);
            if !candidates.is_empty() {
                return candidates;
            }
        }
    }
    Vec::new()
}

fn from_json_script(data: &Value, award: bool) -> Vec<FlightCandidate> {
    if let Some(flights) = data.get("flights").and_then(|v| v.as_array()) {
        let candidates = collect_from_array(flights, award);
        if !candidates.is_empty() {
            return candidates;
        }
    }

    let mut paths = Vec::new();
    find_flight_paths(data, &mut Vec::new(), 5, &mut paths);
    for path in paths {
        if let Some(arr) = navigate(data, &path).and_then(|v| v.as_array()) {
            let candidates = collect_from_array(arr, award);
            if !candidates.is_empty() {
                return candidates;
            }
        }
    }
    Vec::new()
}

/// JSON-LD `@type: "Flight"` entries with miles-denominated offers.
fn from_json_ld(data: &Value, out: &mut Vec<FlightCandidate>) {
    let entries: Vec<&Value> = match data {
        Value::Array(arr) => arr.iter().collect(),
        other => vec![other],
    };
    for entry in entries {
        if entry.get("@type").and_then(|t| t.as_str()) != Some("Flight") {
            continue;
        }
        let flight_number = entry.get("flightNumber").and_then(format_flight_number);
        let depart = entry.get("departureTime").and_then(value_str);
        let arrive = entry.get("arrivalTime").and_then(value_str);
        let Some(offers) = entry.get("offers").and_then(|o| o.as_array()) else {
            continue;
        };
        for offer in offers {
            let Some(price_text) = offer.get("price").and_then(|p| p.as_str()) else {
                continue;
            };
            let Some(miles) = fields::find_award_miles(price_text) else {
                continue;
            };
            let mut c =
                FlightCandidate::new(ExtractionTier::Embedded).with_snippet(price_text);
            c.flight_number = flight_number.clone();
            c.depart_time = depart.clone();
            c.arrive_time = arrive.clone();
            c.miles = Some(miles);
            out.push(c);
        }
    }
}

pub fn run(html: &str, award: bool) -> TierOutcome {
    let mut malformed: Option<String> = None;

    if let Some(cap) = INITIAL_STATE_RE.captures(html) {
        match serde_json::from_str::<Value>(&cap[1]) {
            Ok(data) => {
                let candidates = from_initial_state(&data, award);
                if !candidates.is_empty() {
                    debug!("Embedded tier: {} flights from initial state", candidates.len());
                    return TierOutcome::Hit(candidates);
                }
            }
            Err(e) => {
                debug!("Unparseable __INITIAL_STATE__ payload: {}", e);
                malformed.get_or_insert(format!("initial state JSON: {}", e));
            }
        }
    }

    if let Some(cap) = NEXT_DATA_RE.captures(html) {
        match serde_json::from_str::<Value>(&cap[1]) {
            Ok(data) => {
                let candidates = from_next_data(&data, award);
                if !candidates.is_empty() {
                    debug!("Embedded tier: {} flights from __NEXT_DATA__", candidates.len());
                    return TierOutcome::Hit(candidates);
                }
            }
            Err(e) => {
                debug!("Unparseable __NEXT_DATA__ payload: {}", e);
                malformed.get_or_insert(format!("__NEXT_DATA__ JSON: {}", e));
            }
        }
    }

    if award {
        let mut candidates = Vec::new();
        for cap in JSON_LD_RE.captures_iter(html) {
            if let Ok(data) = serde_json::from_str::<Value>(&cap[1]) {
                from_json_ld(&data, &mut candidates);
            }
        }
        if !candidates.is_empty() {
            debug!("Embedded tier: {} flights from JSON-LD", candidates.len());
            return TierOutcome::Hit(candidates);
        }
    }

    for cap in JSON_SCRIPT_RE.captures_iter(html) {
        let Ok(data) = serde_json::from_str::<Value>(&cap[1]) else {
            continue;
        };
        let candidates = from_json_script(&data, award);
        if !candidates.is_empty() {
            debug!("Embedded tier: {} flights from json script", candidates.len());
            return TierOutcome::Hit(candidates);
        }
    }

    match malformed {
        Some(reason) => TierOutcome::Failed(reason),
        None => TierOutcome::Empty,
    }
}

/// Parse a shopping API response body: `trips[].flights[]`, falling back
/// to the page-payload walker for responses with a different envelope.
pub fn from_api_response(body: &Value, award: bool) -> Vec<FlightCandidate> {
    if let Some(trips) = body.get("trips").and_then(|v| v.as_array()) {
        let candidates = collect_from_array(trips, award);
        if !candidates.is_empty() {
            return candidates;
        }
    }
    from_json_script(body, award)
}
