//! Managed Chrome session with stealth hardening and token interception.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::{
    SetDeviceMetricsOverrideParams, SetGeolocationOverrideParams, SetTimezoneOverrideParams,
    SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::network::{self, EventRequestWillBeSent, GetCookiesParams};
use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, CaptureScreenshotFormat,
    NavigateParams, SetBypassCspParams,
};
use chromiumoxide::layout::Point;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::browser::{form, humanize, modal, stealth};
use crate::config::Settings;
use crate::error::CrawlError;
use crate::extract::selectors::FLIGHT_ROW_SELECTORS;
use crate::identity::{self, Identity};
use crate::request::SearchRequest;
use crate::token::{self, AuthToken, TokenSet, TokenSource};

/// Chrome flags that suppress the obvious automation tells.
const STEALTH_ARGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--disable-dev-shm-usage",
    "--no-sandbox",
    "--disable-setuid-sandbox",
    "--disable-infobars",
    "--disable-notifications",
    "--disable-popup-blocking",
    "--disable-save-password-bubble",
    "--disable-single-click-autofill",
    "--disable-autofill-keyboard-accessory-view",
    "--disable-features=IsolateOrigins,site-per-process",
    "--disable-site-isolation-trials",
];

/// Common Chrome executable paths to check.
const CHROME_PATHS: &[&str] = &[
    // Linux
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
    // macOS
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    // Common install locations
    "/opt/google/chrome/google-chrome",
];

/// Find a Chrome executable, preferring the configured override.
///
/// An explicitly configured path that does not exist is an error rather
/// than a fallback; silently launching a different Chrome would defeat
/// the point of pinning one.
fn find_chrome(settings: &Settings) -> Result<PathBuf, CrawlError> {
    if let Some(ref configured) = settings.chrome_executable {
        let p = std::path::Path::new(configured);
        if p.exists() {
            return Ok(p.to_path_buf());
        }
        return Err(CrawlError::Launch(format!(
            "Configured Chrome executable not found: {}",
            configured
        )));
    }

    for path in CHROME_PATHS {
        let p = std::path::Path::new(path);
        if p.exists() {
            info!("Found Chrome at: {}", path);
            return Ok(p.to_path_buf());
        }
    }

    for cmd in &[
        "google-chrome",
        "google-chrome-stable",
        "chromium",
        "chromium-browser",
    ] {
        if let Ok(output) = std::process::Command::new("which").arg(cmd).output() {
            if output.status.success() {
                let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !path.is_empty() {
                    info!("Found Chrome in PATH: {}", path);
                    return Ok(PathBuf::from(path));
                }
            }
        }
    }

    Err(CrawlError::Launch(
        "Chrome/Chromium not found. Install it or set AWARDSCOUT_CHROME".to_string(),
    ))
}

/// A live Chrome session bound to a single [`Identity`].
///
/// Owns the CDP event loop and a background listener that sweeps outgoing
/// request headers for bearer tokens. Call [`BrowserSession::close`] when
/// done; dropping without closing leaks the Chrome process until the
/// handler task is aborted.
pub struct BrowserSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    listener_task: JoinHandle<()>,
    tokens: Arc<Mutex<TokenSet>>,
    error_prefix: String,
}

impl BrowserSession {
    /// Launch Chrome configured for the given identity.
    ///
    /// With `stealth` set, the fingerprint patch scripts are registered to
    /// run before any site script on every new document.
    pub async fn launch(
        settings: &Settings,
        identity: &Identity,
        stealth: bool,
    ) -> Result<Self, CrawlError> {
        let chrome_path = find_chrome(settings)?;

        info!(
            "Launching browser (headless={}, stealth={})",
            settings.headless, stealth
        );

        let mut builder = BrowserConfig::builder().chrome_executable(chrome_path);

        // Set headless mode (with_head means NOT headless, confusingly)
        if !settings.headless {
            builder = builder.with_head();
        }

        for arg in STEALTH_ARGS {
            builder = builder.arg(*arg);
        }

        builder = builder
            .arg(format!("--user-agent={}", identity.user_agent))
            .arg(format!(
                "--window-size={},{}",
                identity.viewport.width, identity.viewport.height
            ));

        if let Some(ref proxy) = identity.proxy {
            if proxy.has_credentials() {
                // Chrome ignores credentials embedded in --proxy-server; the
                // proxy must allow this host by IP or the session will stall.
                warn!(
                    "Proxy {} has credentials that Chrome cannot send; \
                     use an IP-allowlisted proxy for browser strategies",
                    proxy.redacted()
                );
            }
            builder = builder.arg(format!("--proxy-server={}", proxy.server_arg()));
        }

        for arg in &settings.chrome_args {
            builder = builder.arg(arg);
        }

        let config = builder
            .build()
            .map_err(|e| CrawlError::Launch(format!("Failed to build browser config: {}", e)))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| CrawlError::Launch(format!("Failed to launch browser: {}", e)))?;

        // Spawn handler task to drive the CDP connection
        let handler_task = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        let page = browser.new_page("about:blank").await?;

        let ua_override = SetUserAgentOverrideParams::builder()
            .user_agent(identity.user_agent.to_string())
            .accept_language(identity.locale.clone())
            .build()
            .map_err(CrawlError::Launch)?;
        page.execute(ua_override).await?;

        let metrics = SetDeviceMetricsOverrideParams::builder()
            .width(identity.viewport.width as i64)
            .height(identity.viewport.height as i64)
            .device_scale_factor(1.)
            .mobile(false)
            .build()
            .map_err(CrawlError::Launch)?;
        page.execute(metrics).await?;

        page.execute(SetTimezoneOverrideParams::new(identity.timezone.clone()))
            .await?;

        let (latitude, longitude) = identity::geolocation_for(&identity.timezone);
        let geo = SetGeolocationOverrideParams::builder()
            .latitude(latitude)
            .longitude(longitude)
            .accuracy(100.)
            .build();
        page.execute(geo).await?;

        page.execute(SetBypassCspParams::new(true)).await?;

        if stealth {
            for (name, script) in stealth::PATCHES {
                let params = AddScriptToEvaluateOnNewDocumentParams::new(script.to_string());
                if let Err(e) = page.execute(params).await {
                    warn!("Could not register {} patch: {}", name, e);
                }
            }
        }

        // Enable network events so the listener sees outgoing headers
        page.execute(network::EnableParams::default()).await?;

        let tokens: Arc<Mutex<TokenSet>> = Arc::new(Mutex::new(TokenSet::new()));
        let sink = Arc::clone(&tokens);
        let mut events = page.event_listener::<EventRequestWillBeSent>().await?;
        let listener_task = tokio::spawn(async move {
            while let Some(ev) = events.next().await {
                trace!("{} {}", ev.request.method, ev.request.url);
                let Ok(headers) = serde_json::to_value(&ev.request.headers) else {
                    continue;
                };
                let Some(map) = headers.as_object() else {
                    continue;
                };
                for (name, value) in map {
                    let lowered = name.to_ascii_lowercase();
                    if lowered != "authorization" && lowered != "x-authorization-api" {
                        continue;
                    }
                    let Some(raw) = value.as_str() else { continue };
                    let lower = raw.to_ascii_lowercase();
                    let Some(idx) = lower.find("bearer ") else {
                        continue;
                    };
                    let Some(tail) = raw.get(idx + 7..) else {
                        continue;
                    };
                    let candidate = tail.trim();
                    if !candidate.starts_with(token::TOKEN_PREFIX) {
                        continue;
                    }
                    debug!("Intercepted bearer token in {} header", name);
                    if let Ok(mut set) = sink.lock() {
                        set.insert(AuthToken::new(candidate, TokenSource::Intercepted));
                    }
                }
            }
        });

        Ok(Self {
            browser,
            page,
            handler_task,
            listener_task,
            tokens,
            error_prefix: format!("{}/en/us/error", settings.base_url.trim_end_matches('/')),
        })
    }

    /// Navigate and wait for the document to become interactive.
    ///
    /// Returns the final URL after redirects. Landing on the site's error
    /// page is reported as [`CrawlError::NavigationBlocked`].
    pub async fn navigate(&self, url: &str, timeout: Duration) -> Result<String, CrawlError> {
        info!("Navigating to {}", url);
        let nav_params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(|e| CrawlError::InvalidRequest(format!("Invalid URL: {}", e)))?;

        self.page.execute(nav_params).await?;
        self.wait_ready(timeout).await;

        let final_url = self
            .page
            .url()
            .await?
            .map(|u| u.to_string())
            .unwrap_or_else(|| url.to_string());

        if final_url.starts_with(&self.error_prefix) {
            return Err(CrawlError::NavigationBlocked { url: final_url });
        }

        Ok(final_url)
    }

    /// Wait for document.readyState without relying on a fixed sleep.
    pub async fn wait_ready(&self, timeout: Duration) {
        let wait_for_ready_script = r#"
            new Promise((resolve) => {
                if (document.readyState === 'complete' || document.readyState === 'interactive') {
                    resolve(document.readyState);
                } else {
                    document.addEventListener('DOMContentLoaded', () => resolve(document.readyState));
                    // Fallback timeout in case event never fires
                    setTimeout(() => resolve('timeout'), 10000);
                }
            })
        "#;

        match tokio::time::timeout(
            timeout,
            self.page.evaluate(wait_for_ready_script.to_string()),
        )
        .await
        {
            Ok(Ok(result)) => {
                let state: String = result
                    .into_value()
                    .unwrap_or_else(|_| "unknown".to_string());
                debug!("Page ready state: {}", state);
            }
            Ok(Err(e)) => {
                debug!("Could not check ready state: {}", e);
            }
            Err(_) => {
                warn!("Timeout waiting for page ready state");
            }
        }
    }

    /// Current page URL, if the target reports one.
    pub async fn current_url(&self) -> Result<String, CrawlError> {
        Ok(self
            .page
            .url()
            .await?
            .map(|u| u.to_string())
            .unwrap_or_default())
    }

    /// Serialized HTML of the current document.
    pub async fn content(&self) -> Result<String, CrawlError> {
        Ok(self.page.content().await?)
    }

    /// Full-page PNG screenshot.
    pub async fn screenshot(&self) -> Result<Vec<u8>, CrawlError> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(true)
            .build();
        Ok(self.page.screenshot(params).await?)
    }

    /// Cookies for the current document as name/value pairs.
    ///
    /// Never fails: CDP errors fall back to the page-level getter and then
    /// to an empty list.
    pub async fn cookies(&self) -> Vec<(String, String)> {
        let url = self
            .current_url()
            .await
            .ok()
            .filter(|u| !u.is_empty());

        let cookies = if let Some(url) = url {
            let params = GetCookiesParams::builder().urls(vec![url]).build();
            match self.page.execute(params).await {
                Ok(result) => result.result.cookies,
                Err(e) => {
                    warn!(
                        "Failed to get cookies via CDP: {}, trying page.get_cookies()",
                        e
                    );
                    self.page.get_cookies().await.unwrap_or_default()
                }
            }
        } else {
            self.page.get_cookies().await.unwrap_or_default()
        };

        debug!("Got {} cookies from browser", cookies.len());
        cookies
            .iter()
            .map(|c| (c.name.clone(), c.value.clone()))
            .collect()
    }

    /// Run the in-page probe script and collect any tokens it finds.
    pub async fn probe_tokens(&self) -> TokenSet {
        let mut set = TokenSet::new();
        match self.page.evaluate(token::PROBE_SCRIPT.to_string()).await {
            Ok(result) => match result.into_value::<Value>() {
                Ok(value) => {
                    for token in token::parse_probe_hits(&value) {
                        set.insert(token);
                    }
                }
                Err(e) => debug!("Probe script returned unparseable value: {}", e),
            },
            Err(e) => debug!("Probe script failed: {}", e),
        }
        set
    }

    /// Tokens the network listener has captured so far.
    pub fn intercepted_tokens(&self) -> TokenSet {
        self.tokens
            .lock()
            .map(|set| set.clone())
            .unwrap_or_default()
    }

    /// Close any blocking overlay. Returns true if the page looks clear.
    pub async fn dismiss_modals(&self) -> bool {
        modal::dismiss(&self.page).await
    }

    /// Run one randomized burst of human-like activity.
    pub async fn humanize(&self) {
        humanize::run(&self.page).await;
    }

    /// Scroll through the document in randomized steps.
    pub async fn scroll_page(&self) {
        humanize::scroll_page(&self.page).await;
    }

    /// Click at viewport coordinates. Returns false on CDP failure.
    pub async fn click_at(&self, x: f64, y: f64) -> bool {
        let point = Point::new(x, y);
        if self.page.move_mouse(point).await.is_err() {
            return false;
        }
        self.page.click(point).await.is_ok()
    }

    /// Fill the booking form on the current page. Returns fields filled.
    pub async fn fill_search_form(&self, request: &SearchRequest) -> usize {
        form::fill(&self.page, request).await
    }

    /// Poll for a recognizable flight-result element until the deadline.
    pub async fn wait_for_results(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            for selector in FLIGHT_ROW_SELECTORS {
                if self.page.find_element(*selector).await.is_ok() {
                    debug!("Results matched selector: {}", selector);
                    return true;
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    }

    /// Heuristic captcha check. Solving is out of scope; callers should
    /// log and move on to the next identity.
    pub async fn has_captcha(&self) -> bool {
        for selector in [
            "iframe[src*='recaptcha']",
            "iframe[src*='challenge']",
            "[class*='captcha']",
        ] {
            if self.page.find_element(selector).await.is_ok() {
                return true;
            }
        }
        false
    }

    /// Tear down the page, listener, and browser process.
    pub async fn close(mut self) {
        let _ = self.page.close().await;
        self.listener_task.abort();
        if let Err(e) = self.browser.close().await {
            debug!("Browser close reported: {}", e);
        }
        self.handler_task.abort();
        let _ = self.handler_task.await;
    }
}
