//! Selector tables for the structured DOM tier.
//!
//! The shopping frontend ships hashed CSS-module class names that rotate
//! between deploys, so every field is looked up through a fallback list:
//! exact hashed classes first, then substring and data-test variants.
//! Update the hashed entries when the frontend redeploys; the substring
//! entries usually survive.

/// Selectors that identify one flight result row.
pub const FLIGHT_ROW_SELECTORS: &[&str] = &[
    ".app-components-Shopping-Results-styles__flightRow--2HuQV",
    ".app-components-Shopping-FlightRow-styles__flightRow--C8XQA",
    ".flightRow",
    "[data-test='flight-row']",
    "[class*='flightRow']",
    "[class*='flight-row']",
    "[class*='FlightRow']",
    "[data-test='flight-result']",
    "[data-test='flight-listing']",
];

pub const FLIGHT_NUMBER_SELECTORS: &[&str] = &[
    "[class*='flightNumber']",
    "[class*='flight-number']",
    "[data-test='flight-number']",
    "[class*='FlightNumber']",
    "[class*='flight_number']",
];

pub const DEPART_TIME_SELECTORS: &[&str] = &[
    "[class*='departTime']",
    "[class*='depart-time']",
    "[data-test='depart-time']",
    "[class*='DepartTime']",
    "[class*='depart_time']",
];

pub const ARRIVE_TIME_SELECTORS: &[&str] = &[
    "[class*='arriveTime']",
    "[class*='arrive-time']",
    "[data-test='arrive-time']",
    "[class*='ArriveTime']",
    "[class*='arrive_time']",
];

pub const DURATION_SELECTORS: &[&str] = &[
    "[class*='duration']",
    "[data-test='duration']",
    "[class*='Duration']",
    "[class*='flight-time']",
];

pub const STOPS_SELECTORS: &[&str] = &[
    "[class*='stops']",
    "[data-test='stops']",
    "[class*='Stops']",
    "[class*='stop-count']",
];

/// Award price elements. A match is only accepted when the element text
/// actually mentions miles, since `[class*='price']` is a wide net.
pub const MILES_PRICE_SELECTORS: &[&str] = &[
    "[class*='miles']",
    "[class*='award']",
    "[data-test='miles']",
    "[data-test='award']",
    "[class*='Miles']",
    "[class*='Award']",
    "[class*='price']",
    "[data-test='price']",
];

pub const CASH_PRICE_SELECTORS: &[&str] = &[
    "[class*='price']",
    "[data-test='price']",
    "[class*='Price']",
    "[class*='cost']",
];

pub const AIRCRAFT_SELECTORS: &[&str] = &[
    "[class*='aircraft']",
    "[data-test='aircraft']",
    "[class*='Aircraft']",
    "[class*='plane-type']",
];

pub const FARE_CLASS_SELECTORS: &[&str] = &[
    "[class*='fareClass']",
    "[class*='fare-class']",
    "[data-test='fare-class']",
    "[class*='FareClass']",
    "[class*='cabin-type']",
];

pub const CONNECTION_SELECTORS: &[&str] = &[
    "[class*='connection']",
    "[data-test='connection']",
    "[class*='Connection']",
    "[class*='layover']",
    "[class*='stopover']",
];
