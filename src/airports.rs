//! Static airport metadata used when a page or API response omits city names.

/// Map an IATA airport code to a display city name.
///
/// Only the hubs that show up in practice are listed; anything else
/// resolves to "Unknown" and downstream consumers treat that as cosmetic.
pub fn city_name(code: &str) -> &'static str {
    match code {
        "ORD" => "Chicago",
        "LAX" => "Los Angeles",
        "SFO" => "San Francisco",
        "JFK" => "New York",
        "IAD" => "Washington",
        "DEN" => "Denver",
        "IAH" => "Houston",
        "EWR" => "Newark",
        "DFW" => "Dallas",
        _ => "Unknown",
    }
}

/// Check that a string looks like an IATA airport code.
pub fn is_valid_code(code: &str) -> bool {
    code.len() == 3 && code.chars().all(|c| c.is_ascii_uppercase())
}
