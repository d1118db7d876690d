//! Browser-emulating HTTP transport.
//!
//! Fallback for when a real browser is unavailable or keeps getting
//! blocked. `wreq` impersonates a browser at the TLS and HTTP/2 layers;
//! the emulation profile is matched to the identity's user agent so the
//! fingerprint and the UA string tell the same story.

use std::time::Duration;

use tracing::debug;
use wreq::redirect::Policy;
use wreq_util::Emulation;

use crate::error::CrawlError;
use crate::identity::Identity;

/// A fetched document plus where the server actually sent us.
pub struct FetchedPage {
    pub final_url: String,
    pub status: u16,
    pub body: String,
}

impl FetchedPage {
    pub fn ok(&self) -> bool {
        self.status == 200
    }
}

fn emulation_for(user_agent: &str) -> Emulation {
    if user_agent.contains("Firefox") {
        Emulation::Firefox133
    } else if user_agent.contains("Edg/") {
        Emulation::Edge131
    } else if user_agent.contains("Version/") {
        Emulation::Safari18_5
    } else {
        Emulation::Chrome131
    }
}

/// The site's soft-block redirect target.
fn is_error_page(url: &str) -> bool {
    url::Url::parse(url)
        .map(|u| u.path().starts_with("/en/us/error"))
        .unwrap_or(false)
}

pub struct EmulatedClient {
    http: wreq::Client,
}

impl EmulatedClient {
    pub fn new(identity: &Identity, timeout: Duration) -> Result<Self, CrawlError> {
        let mut builder = wreq::Client::builder()
            .emulation(emulation_for(&identity.user_agent))
            .redirect(Policy::default())
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10));
        if let Some(proxy) = &identity.proxy {
            builder = builder.proxy(wreq::Proxy::all(proxy.url())?);
        }
        Ok(Self {
            http: builder.build()?,
        })
    }

    /// GET a page with top-level navigation headers. Follows redirects;
    /// landing on the site's error page is reported as a block rather
    /// than a success with useless HTML.
    pub async fn fetch_page(
        &self,
        url: &str,
        referer: Option<&str>,
    ) -> Result<FetchedPage, CrawlError> {
        debug!("Fetching {} with emulated TLS", url);
        let fetch_site = if referer.is_some() { "same-origin" } else { "none" };
        let mut req = self
            .http
            .get(url)
            .header(
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            )
            .header("Accept-Language", "en-US,en;q=0.5")
            .header("DNT", "1")
            .header("Connection", "keep-alive")
            .header("Upgrade-Insecure-Requests", "1")
            .header("Sec-Fetch-Dest", "document")
            .header("Sec-Fetch-Mode", "navigate")
            .header("Sec-Fetch-Site", fetch_site)
            .header("Sec-Fetch-User", "?1")
            .header("Cache-Control", "max-age=0");
        if let Some(referer) = referer {
            req = req.header("Referer", referer);
        }

        let response = req.send().await?;
        let final_url = response.url().to_string();
        if is_error_page(&final_url) {
            return Err(CrawlError::NavigationBlocked { url: final_url });
        }
        let status = response.status().as_u16();
        let body = response.text().await?;
        debug!("Fetched {} (status {}, {} bytes)", final_url, status, body.len());
        Ok(FetchedPage {
            final_url,
            status,
            body,
        })
    }
}
