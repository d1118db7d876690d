//! Direct API replay.
//!
//! When a harvested bearer token is in hand, the shopping API can be
//! queried without a browser. Endpoints are tried in a fixed order with
//! the token attached the way the site's own frontend does it; the
//! response reuses the embedded-tier JSON parsing. A rate-limit answer
//! burns the token (the caller moves to the next one), while timeouts
//! and error statuses just advance to the next endpoint.

use std::time::Duration;

use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::CrawlError;
use crate::extract::embedded;
use crate::models::FlightCandidate;
use crate::request::SearchRequest;
use crate::token::AuthToken;

/// Shopping endpoints relative to the `/api/flight` base, in trial order.
const ENDPOINT_PATHS: &[&str] = &[
    "FetchFlights",
    "shop/flight",
    "search",
    "award/search",
    "award/shop",
];

pub struct ReplayClient {
    http: reqwest::Client,
    base_url: String,
    user_agent: String,
}

impl ReplayClient {
    pub fn new(base_url: &str, user_agent: &str, timeout: Duration) -> Result<Self, CrawlError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            user_agent: user_agent.to_string(),
        })
    }

    /// The search body the site's frontend posts. Session identifiers are
    /// freshly minted per call.
    fn payload(&self, request: &SearchRequest) -> Value {
        let mut body = json!({
            "originCode": request.origin(),
            "destinationCode": request.destination(),
            "departDate": request.date(),
            "returnDate": "",
            "tripType": "ONE_WAY",
            "numOfAdults": request.passengers(),
            "numOfSeniors": 0,
            "numOfChildren04": 0,
            "numOfChildren03": 0,
            "numOfChildren02": 0,
            "numOfChildren01": 0,
            "numOfInfants": 0,
            "numOfLapInfants": 0,
            "cabinType": request.cabin().api_value(),
            "awardTravel": request.award(),
            "langCode": "en-US",
            "countryCode": "US",
            "siteId": "US",
            "deviceType": "DESKTOP",
            "searchTypeSelection": "AWARD",
            "promotionCode": "",
            "corporateCode": "",
            "enableBundleSearch": true,
            "sessionId": Uuid::new_v4().to_string(),
            "metricId": Uuid::new_v4().to_string(),
        });
        if request.award() {
            body["searchType"] = json!("AWARD");
            body["fareType"] = json!("AWARD");
            body["fareOption"] = json!("MILESANDMONEY");
        }
        body
    }

    /// Post the search to each endpoint in turn until one yields flights.
    ///
    /// `browser_cookies` are whatever the harvesting session collected;
    /// they ride along with a fresh device-id pair.
    pub async fn fetch_flights(
        &self,
        request: &SearchRequest,
        token: &AuthToken,
        browser_cookies: &[(String, String)],
    ) -> Result<Vec<FlightCandidate>, CrawlError> {
        let api_base = request.api_base(&self.base_url);
        let referer = request.search_url(&self.base_url)?;
        let payload = self.payload(request);
        let cookie = cookie_header(browser_cookies);
        debug!(
            "Replaying token {} against {} endpoints",
            token.preview(),
            ENDPOINT_PATHS.len()
        );

        for path in ENDPOINT_PATHS {
            let endpoint = format!("{}/{}", api_base, path);
            debug!("Trying endpoint: {}", endpoint);

            let result = self
                .http
                .post(&endpoint)
                .header("Accept", "application/json")
                .header("Content-Type", "application/json")
                .header("X-Authorization-api", format!("bearer {}", token.value))
                .header("Authorization", format!("bearer {}", token.value))
                .header("Origin", &self.base_url)
                .header("Referer", &referer)
                .header("User-Agent", &self.user_agent)
                .header("Connection", "keep-alive")
                .header("Cache-Control", "no-cache")
                .header("Pragma", "no-cache")
                .header("Sec-Fetch-Dest", "empty")
                .header("Sec-Fetch-Mode", "cors")
                .header("Sec-Fetch-Site", "same-origin")
                .header("DNT", "1")
                .header("X-Request-ID", Uuid::new_v4().to_string())
                .header("Cookie", &cookie)
                .json(&payload)
                .send()
                .await;

            let response = match result {
                Ok(r) => r,
                Err(e) if e.is_timeout() => {
                    warn!("Timeout calling {}", endpoint);
                    continue;
                }
                Err(e) => {
                    warn!("Transport error calling {}: {}", endpoint, e);
                    continue;
                }
            };

            let status = response.status();
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                warn!("Rate limited at {}", endpoint);
                return Err(CrawlError::RateLimited { endpoint });
            }
            if !status.is_success() {
                debug!("Endpoint {} answered {}", endpoint, status);
                continue;
            }

            let body: Value = match response.json().await {
                Ok(v) => v,
                Err(e) => {
                    debug!("Endpoint {} returned an unreadable body: {}", endpoint, e);
                    continue;
                }
            };
            let candidates = embedded::from_api_response(&body, request.award());
            if candidates.is_empty() {
                debug!("Endpoint {} answered 200 with no parsable flights", endpoint);
                continue;
            }
            info!("Recovered {} flights from {}", candidates.len(), endpoint);
            return Ok(candidates);
        }

        Ok(Vec::new())
    }
}

fn cookie_header(browser_cookies: &[(String, String)]) -> String {
    let mut parts = vec![
        format!("united_device_id=web-{}", Uuid::new_v4()),
        "united_customer_segmentation=anonymous".to_string(),
    ];
    parts.extend(browser_cookies.iter().map(|(k, v)| format!("{}={}", k, v)));
    parts.join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Cabin;

    fn client() -> ReplayClient {
        ReplayClient::new(
            "https://www.united.com",
            "test-agent",
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_award_payload_carries_award_markers() {
        let request = SearchRequest::new("ORD", "LAX", "2025-05-15", true)
            .unwrap()
            .with_cabin(Cabin::Business);
        let payload = client().payload(&request);
        assert_eq!(payload["originCode"], "ORD");
        assert_eq!(payload["cabinType"], "BUSINESS");
        assert_eq!(payload["awardTravel"], true);
        assert_eq!(payload["fareOption"], "MILESANDMONEY");
        assert_eq!(payload["tripType"], "ONE_WAY");
    }

    #[test]
    fn test_cash_payload_omits_award_markers() {
        let request = SearchRequest::new("ORD", "LAX", "2025-05-15", false).unwrap();
        let payload = client().payload(&request);
        assert_eq!(payload["awardTravel"], false);
        assert!(payload.get("fareOption").is_none());
        assert!(payload.get("fareType").is_none());
    }

    #[test]
    fn test_session_identifiers_are_fresh_per_payload() {
        let request = SearchRequest::new("ORD", "LAX", "2025-05-15", true).unwrap();
        let c = client();
        let a = c.payload(&request);
        let b = c.payload(&request);
        assert_ne!(a["sessionId"], b["sessionId"]);
        assert_ne!(a["metricId"], b["metricId"]);
    }

    #[test]
    fn test_cookie_header_includes_session_cookies() {
        let cookies = vec![("bm_sv".to_string(), "abc123".to_string())];
        let header = cookie_header(&cookies);
        assert!(header.contains("united_device_id=web-"));
        assert!(header.contains("united_customer_segmentation=anonymous"));
        assert!(header.ends_with("bm_sv=abc123"));
    }
}
