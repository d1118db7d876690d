//! Search request parameters and results-page URL construction.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::Serialize;
use url::Url;

use crate::airports;
use crate::error::CrawlError;

/// Cabin class requested for the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Cabin {
    Economy,
    Business,
    First,
}

impl Cabin {
    /// Value expected by the shopping API payload.
    pub fn api_value(&self) -> &'static str {
        match self {
            Cabin::Economy => "ECONOMY",
            Cabin::Business => "BUSINESS",
            Cabin::First => "FIRST",
        }
    }

    /// Display form used for fare-class fields in output records.
    pub fn display_name(&self) -> &'static str {
        match self {
            Cabin::Economy => "Economy",
            Cabin::Business => "Business",
            Cabin::First => "First",
        }
    }
}

impl FromStr for Cabin {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "economy" | "coach" => Ok(Cabin::Economy),
            "business" => Ok(Cabin::Business),
            "first" => Ok(Cabin::First),
            _ => Err(format!("Unknown cabin class: {}", s)),
        }
    }
}

impl fmt::Display for Cabin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// A validated one-way search: route, date, and fare mode.
#[derive(Debug, Clone, Serialize)]
pub struct SearchRequest {
    origin: String,
    destination: String,
    date: String,
    award: bool,
    cabin: Cabin,
    passengers: u8,
}

impl SearchRequest {
    /// Build a request, normalizing airport codes to uppercase and
    /// rejecting anything that is not a 3-letter code or ISO date.
    pub fn new(
        origin: &str,
        destination: &str,
        date: &str,
        award: bool,
    ) -> Result<Self, CrawlError> {
        let origin = origin.trim().to_uppercase();
        let destination = destination.trim().to_uppercase();

        if !airports::is_valid_code(&origin) {
            return Err(CrawlError::InvalidRequest(format!(
                "origin must be a 3-letter airport code, got '{}'",
                origin
            )));
        }
        if !airports::is_valid_code(&destination) {
            return Err(CrawlError::InvalidRequest(format!(
                "destination must be a 3-letter airport code, got '{}'",
                destination
            )));
        }
        if origin == destination {
            return Err(CrawlError::InvalidRequest(
                "origin and destination are the same airport".to_string(),
            ));
        }
        if NaiveDate::parse_from_str(date, "%Y-%m-%d").is_err() {
            return Err(CrawlError::InvalidRequest(format!(
                "date must be YYYY-MM-DD, got '{}'",
                date
            )));
        }

        Ok(Self {
            origin,
            destination,
            date: date.to_string(),
            award,
            cabin: Cabin::Economy,
            passengers: 1,
        })
    }

    pub fn with_cabin(mut self, cabin: Cabin) -> Self {
        self.cabin = cabin;
        self
    }

    pub fn with_passengers(mut self, passengers: u8) -> Self {
        self.passengers = passengers.max(1);
        self
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn date(&self) -> &str {
        &self.date
    }

    pub fn award(&self) -> bool {
        self.award
    }

    pub fn cabin(&self) -> Cabin {
        self.cabin
    }

    pub fn passengers(&self) -> u8 {
        self.passengers
    }

    /// Results-page URL with the query parameters the shopping frontend
    /// expects. Award searches add `at=1`.
    pub fn search_url(&self, base_url: &str) -> Result<String, CrawlError> {
        let mut url = Url::parse(base_url)
            .map_err(|e| CrawlError::InvalidRequest(format!("invalid base URL: {}", e)))?;
        url.set_path("/en/us/fsr/choose-flights");
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("f", &self.origin);
            query.append_pair("t", &self.destination);
            query.append_pair("d", &self.date);
            query.append_pair("tt", "1");
            query.append_pair("sc", "7");
            query.append_pair("px", &self.passengers.to_string());
            query.append_pair("taxng", "1");
            query.append_pair("newHP", "True");
            query.append_pair("clm", "7");
            query.append_pair("st", "bestmatches");
            query.append_pair("tqp", "A");
            if self.award {
                query.append_pair("at", "1");
            }
        }
        Ok(url.to_string())
    }

    /// Base URL for the shopping API endpoints.
    pub fn api_base(&self, base_url: &str) -> String {
        format!("{}/api/flight", base_url.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_normalizes_codes() {
        let req = SearchRequest::new("ord", "lax", "2025-05-15", true).unwrap();
        assert_eq!(req.origin(), "ORD");
        assert_eq!(req.destination(), "LAX");
        assert!(req.award());
    }

    #[test]
    fn test_request_rejects_bad_codes() {
        assert!(SearchRequest::new("ORDX", "LAX", "2025-05-15", true).is_err());
        assert!(SearchRequest::new("OR", "LAX", "2025-05-15", true).is_err());
        assert!(SearchRequest::new("ORD", "L4X", "2025-05-15", true).is_err());
        assert!(SearchRequest::new("ORD", "ORD", "2025-05-15", true).is_err());
    }

    #[test]
    fn test_request_rejects_bad_date() {
        assert!(SearchRequest::new("ORD", "LAX", "05/15/2025", true).is_err());
        assert!(SearchRequest::new("ORD", "LAX", "2025-13-01", true).is_err());
        assert!(SearchRequest::new("ORD", "LAX", "tomorrow", true).is_err());
    }

    #[test]
    fn test_search_url_award() {
        let req = SearchRequest::new("ORD", "LAX", "2025-05-15", true).unwrap();
        let url = req.search_url("https://www.united.com").unwrap();
        assert!(url.starts_with("https://www.united.com/en/us/fsr/choose-flights?"));
        assert!(url.contains("f=ORD"));
        assert!(url.contains("t=LAX"));
        assert!(url.contains("d=2025-05-15"));
        assert!(url.contains("st=bestmatches"));
        assert!(url.contains("at=1"));
    }

    #[test]
    fn test_search_url_cash_omits_award_flag() {
        let req = SearchRequest::new("ORD", "LAX", "2025-05-15", false).unwrap();
        let url = req.search_url("https://www.united.com").unwrap();
        assert!(!url.contains("at=1"));
    }

    #[test]
    fn test_search_url_passengers() {
        let req = SearchRequest::new("ORD", "LAX", "2025-05-15", true)
            .unwrap()
            .with_passengers(2);
        let url = req.search_url("https://www.united.com").unwrap();
        assert!(url.contains("px=2"));
    }

    #[test]
    fn test_api_base() {
        let req = SearchRequest::new("ORD", "LAX", "2025-05-15", true).unwrap();
        assert_eq!(
            req.api_base("https://www.united.com/"),
            "https://www.united.com/api/flight"
        );
    }

    #[test]
    fn test_cabin_parsing() {
        assert_eq!(Cabin::from_str("economy").unwrap(), Cabin::Economy);
        assert_eq!(Cabin::from_str("Business").unwrap(), Cabin::Business);
        assert_eq!(Cabin::from_str("FIRST").unwrap(), Cabin::First);
        assert!(Cabin::from_str("premium").is_err());
        assert_eq!(Cabin::Business.api_value(), "BUSINESS");
    }
}
