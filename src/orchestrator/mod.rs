//! Drives the acquisition cascade: browser sessions, token banking,
//! tiered extraction, and direct API replay.

mod strategy;

pub use strategy::{CrawlState, Strategy};

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use rand::Rng;
use tracing::{debug, info, warn};

use crate::api::ReplayClient;
use crate::artifacts::ArtifactStore;
use crate::config::Settings;
use crate::error::CrawlError;
use crate::extract;
use crate::identity::{Identity, IdentityPool};
use crate::models::{ExtractionReport, FlightRecord};
use crate::normalize;
use crate::request::SearchRequest;
use crate::token::{self, AuthToken, TokenSet};
use crate::transport::EmulatedClient;

#[cfg(feature = "browser")]
use crate::browser::BrowserSession;

/// How long to poll the results page for recognizable flight rows.
#[cfg(feature = "browser")]
const RESULTS_POLL: Duration = Duration::from_secs(20);

/// What a finished crawl hands back to the caller.
#[derive(Debug)]
pub struct CrawlOutcome {
    pub records: Vec<FlightRecord>,
    pub report: Option<ExtractionReport>,
    /// Name of the strategy that produced the records.
    pub strategy: &'static str,
    /// Total attempts consumed across all strategies.
    pub attempts: usize,
    pub results_path: Option<PathBuf>,
}

/// Draw a pause length without holding the rng across an await.
fn jitter(lo: f64, hi: f64) -> Duration {
    let secs = rand::rng().random_range(lo..hi);
    Duration::from_secs_f64(secs)
}

async fn pause(lo: f64, hi: f64) {
    tokio::time::sleep(jitter(lo, hi)).await;
}

/// Owns one search request end to end.
///
/// Strategies run strictly sequentially, one browser at a time, each
/// attempt on a fresh identity drawn from a single per-run pool so no
/// fingerprint is ever presented twice. Tokens harvested anywhere along
/// the way are banked for the whole run; a final replay pass spends
/// whatever is left before giving up.
pub struct Orchestrator {
    settings: Settings,
    artifacts: ArtifactStore,
}

impl Orchestrator {
    pub fn new(settings: Settings) -> Self {
        let artifacts = ArtifactStore::from_settings(&settings);
        Self {
            settings,
            artifacts,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Run the full cascade, bounded by the configured search deadline.
    pub async fn run(&self, request: &SearchRequest) -> Result<CrawlOutcome, CrawlError> {
        let attempts = AtomicUsize::new(0);
        match tokio::time::timeout(
            self.settings.search_deadline(),
            self.run_inner(request, &attempts),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    "Search deadline of {}s expired",
                    self.settings.search_deadline_secs
                );
                Err(CrawlError::AllStrategiesExhausted {
                    attempts: attempts.load(Ordering::Relaxed),
                })
            }
        }
    }

    async fn run_inner(
        &self,
        request: &SearchRequest,
        attempts: &AtomicUsize,
    ) -> Result<CrawlOutcome, CrawlError> {
        info!(
            "Searching {} -> {} on {} ({})",
            request.origin(),
            request.destination(),
            request.date(),
            if request.award() { "award" } else { "cash" }
        );

        let mut state = CrawlState::Idle;
        let mut bank = TokenSet::new();
        let mut cookie_jar: Vec<(String, String)> = Vec::new();
        let mut last_identity: Option<Identity> = None;

        // One pool for the whole run: a later strategy never re-presents
        // a fingerprint an earlier one already burned, and draining the
        // pool ends the cascade rather than refilling it.
        let mut pool = IdentityPool::from_settings(&self.settings);

        'strategies: for strategy in Strategy::all() {
            info!("Strategy: {}", strategy.name());

            for attempt in 0..self.settings.attempts_per_strategy.max(1) {
                let Some(identity) = pool.next() else {
                    warn!(
                        "Identity pool drained during {}; no further attempts",
                        strategy.name()
                    );
                    break 'strategies;
                };
                if attempt > 0 {
                    pause(2.0, 5.0).await;
                }
                let n = attempts.fetch_add(1, Ordering::Relaxed) + 1;
                state.advance(CrawlState::StrategySelected);
                debug!(
                    "Attempt {} ({} #{}) using {}",
                    n,
                    strategy.name(),
                    attempt + 1,
                    identity.describe()
                );

                let result = self
                    .attempt(
                        strategy,
                        request,
                        &identity,
                        &mut state,
                        &mut bank,
                        &mut cookie_jar,
                    )
                    .await;
                last_identity = Some(identity);

                match result {
                    Ok(mut outcome) => {
                        state.advance(CrawlState::Succeeded);
                        outcome.attempts = attempts.load(Ordering::Relaxed);
                        return Ok(outcome);
                    }
                    Err(e @ CrawlError::NoResultsFound { .. }) => {
                        // page parsed cleanly, no award space
                        debug!("{} attempt: {}", strategy.name(), e);
                        state.advance(CrawlState::StrategyExhausted);
                    }
                    Err(e) if e.is_terminal() => return Err(e),
                    Err(e) => {
                        warn!("{} attempt failed: {}", strategy.name(), e);
                        state.advance(CrawlState::StrategyExhausted);
                    }
                }
            }
        }

        // Every strategy is spent. Banked tokens may still be live; one
        // last replay pass before reporting failure.
        if !bank.is_empty() {
            let identity = last_identity.unwrap_or_default();
            if let Some(records) = self
                .final_replay(request, &identity, &mut bank, &cookie_jar)
                .await
            {
                state.advance(CrawlState::Succeeded);
                let mut outcome = self.finish(request, records, None, "token-replay");
                outcome.attempts = attempts.load(Ordering::Relaxed);
                return Ok(outcome);
            }
        }

        state.advance(CrawlState::AllStrategiesExhausted);
        Err(CrawlError::AllStrategiesExhausted {
            attempts: attempts.load(Ordering::Relaxed),
        })
    }

    async fn attempt(
        &self,
        strategy: Strategy,
        request: &SearchRequest,
        identity: &Identity,
        state: &mut CrawlState,
        bank: &mut TokenSet,
        cookie_jar: &mut Vec<(String, String)>,
    ) -> Result<CrawlOutcome, CrawlError> {
        match strategy {
            Strategy::EmulatedHttp => {
                self.http_attempt(request, identity, state, bank, cookie_jar)
                    .await
            }
            Strategy::StealthBrowser | Strategy::PlainBrowser => {
                self.browser_attempt(strategy, request, identity, state, bank, cookie_jar)
                    .await
            }
        }
    }

    /// One attempt through a live Chrome session.
    #[cfg(feature = "browser")]
    async fn browser_attempt(
        &self,
        strategy: Strategy,
        request: &SearchRequest,
        identity: &Identity,
        state: &mut CrawlState,
        bank: &mut TokenSet,
        cookie_jar: &mut Vec<(String, String)>,
    ) -> Result<CrawlOutcome, CrawlError> {
        let stealth = strategy == Strategy::StealthBrowser;
        let session = BrowserSession::launch(&self.settings, identity, stealth).await?;
        state.advance(CrawlState::BrowserActive);

        // The session is closed on every exit path before the result is
        // examined; a browser left open here leaks a Chrome process.
        let before = bank.len();
        let driven = self
            .drive_browser(&session, request, bank, cookie_jar)
            .await;
        session.close().await;
        let html = driven?;

        if bank.len() > before {
            state.advance(CrawlState::TokenHarvested);
        }
        state.advance(CrawlState::Extracting);

        let (candidates, report) = extract::extract(&html, request.award());
        let records = normalize::normalize_batch(&candidates, request);
        if !records.is_empty() {
            return Ok(self.finish(request, records, Some(report), strategy.name()));
        }

        if let Some(records) = self
            .replay_bank(request, identity, bank, cookie_jar)
            .await?
        {
            return Ok(self.finish(request, records, Some(report), strategy.name()));
        }

        self.artifacts.save_report(&report);
        Err(CrawlError::NoResultsFound {
            origin: request.origin().to_string(),
            destination: request.destination().to_string(),
        })
    }

    #[cfg(not(feature = "browser"))]
    async fn browser_attempt(
        &self,
        _strategy: Strategy,
        _request: &SearchRequest,
        _identity: &Identity,
        _state: &mut CrawlState,
        _bank: &mut TokenSet,
        _cookie_jar: &mut Vec<(String, String)>,
    ) -> Result<CrawlOutcome, CrawlError> {
        Err(CrawlError::Launch(
            "Browser support not compiled. Rebuild with: cargo build --features browser"
                .to_string(),
        ))
    }

    /// Page interaction sequence for a launched session: warm up on the
    /// homepage, fill the booking form, load the search URL, harvest
    /// tokens and cookies, and return the settled results HTML.
    #[cfg(feature = "browser")]
    async fn drive_browser(
        &self,
        session: &BrowserSession,
        request: &SearchRequest,
        bank: &mut TokenSet,
        cookie_jar: &mut Vec<(String, String)>,
    ) -> Result<String, CrawlError> {
        let nav_timeout = self.settings.navigation_timeout();
        let base = self.settings.base_url.trim_end_matches('/');

        // First-party cookies from the homepage make the search URL load
        // look like a returning visitor rather than a cold deep link.
        let homepage = format!("{}/en/us", base);
        session.navigate(&homepage, nav_timeout).await?;
        pause(2.0, 4.0).await;
        session.dismiss_modals().await;
        session.humanize().await;

        let filled = session.fill_search_form(request).await;
        debug!("Filled {} booking form fields", filled);

        let search_url = request.search_url(&self.settings.base_url)?;
        session.navigate(&search_url, nav_timeout).await?;
        pause(2.0, 5.0).await;
        session.dismiss_modals().await;

        if let Ok(png) = session.screenshot().await {
            self.artifacts.save_screenshot("results_page", &png);
        }

        if session.has_captcha().await {
            warn!("Captcha detected; no solver is configured, proceeding anyway");
        }

        session.humanize().await;
        pause(3.0, 5.0).await;

        // Probe ladder: passive sweep first, then a neutral click to kick
        // lazy XHRs loose, then a full scroll to trigger the rest.
        let mut probed = session.probe_tokens().await;
        if probed.is_empty() {
            session.click_at(500.0, 500.0).await;
            pause(1.0, 2.0).await;
            probed = session.probe_tokens().await;
        }
        if probed.is_empty() {
            session.scroll_page().await;
            probed = session.probe_tokens().await;
        }
        bank.merge(probed);
        bank.merge(session.intercepted_tokens());

        for (name, value) in session.cookies().await {
            if !cookie_jar.iter().any(|(n, _)| n == &name) {
                cookie_jar.push((name, value));
            }
        }

        if !session.wait_for_results(RESULTS_POLL).await {
            debug!("No recognizable flight rows before the poll deadline");
        }
        pause(2.0, 4.0).await;

        let html = session.content().await?;
        self.artifacts.save_html("results_page", &html);

        for token in token::harvest_from_html(&html) {
            bank.insert(token);
        }

        Ok(html)
    }

    /// One attempt through the TLS-fingerprint-matching HTTP client.
    async fn http_attempt(
        &self,
        request: &SearchRequest,
        identity: &Identity,
        state: &mut CrawlState,
        bank: &mut TokenSet,
        cookie_jar: &mut Vec<(String, String)>,
    ) -> Result<CrawlOutcome, CrawlError> {
        let client = EmulatedClient::new(identity, self.settings.request_timeout())?;
        state.advance(CrawlState::BrowserActive);

        let search_url = request.search_url(&self.settings.base_url)?;
        let page = client.fetch_page(&search_url, None).await?;
        if !page.ok() {
            warn!("Search page returned HTTP {}", page.status);
            return Err(CrawlError::NavigationBlocked { url: search_url });
        }
        self.artifacts.save_html("search_page", &page.body);

        let before = bank.len();
        for token in token::harvest_from_html(&page.body) {
            bank.insert(token);
        }
        if bank.len() > before {
            state.advance(CrawlState::TokenHarvested);
        }
        state.advance(CrawlState::Extracting);

        let (candidates, report) = extract::extract(&page.body, request.award());
        let records = normalize::normalize_batch(&candidates, request);
        if !records.is_empty() {
            return Ok(self.finish(
                request,
                records,
                Some(report),
                Strategy::EmulatedHttp.name(),
            ));
        }

        if let Some(records) = self
            .replay_bank(request, identity, bank, cookie_jar)
            .await?
        {
            return Ok(self.finish(
                request,
                records,
                Some(report),
                Strategy::EmulatedHttp.name(),
            ));
        }

        self.artifacts.save_report(&report);
        Err(CrawlError::NoResultsFound {
            origin: request.origin().to_string(),
            destination: request.destination().to_string(),
        })
    }

    /// Spend banked tokens against the internal API, oldest first.
    ///
    /// Rate-limited tokens are burned from the bank so no later pass
    /// retries them. Returns the first non-empty normalized batch.
    async fn replay_bank(
        &self,
        request: &SearchRequest,
        identity: &Identity,
        bank: &mut TokenSet,
        cookie_jar: &[(String, String)],
    ) -> Result<Option<Vec<FlightRecord>>, CrawlError> {
        if bank.is_empty() {
            return Ok(None);
        }
        info!("Replaying {} banked token(s)", bank.len());

        let client = ReplayClient::new(
            &self.settings.base_url,
            &identity.user_agent,
            self.settings.request_timeout(),
        )?;

        let tokens: Vec<AuthToken> = bank.iter().cloned().collect();
        for token in tokens {
            match client.fetch_flights(request, &token, cookie_jar).await {
                Ok(candidates) if !candidates.is_empty() => {
                    let records = normalize::normalize_batch(&candidates, request);
                    if !records.is_empty() {
                        return Ok(Some(records));
                    }
                }
                Ok(_) => {
                    debug!("Token {} produced no flights", token.preview());
                }
                Err(CrawlError::RateLimited { endpoint }) => {
                    warn!(
                        "Token {} rate limited at {}; burning it",
                        token.preview(),
                        endpoint
                    );
                    bank.remove(&token.value);
                }
                Err(e) => {
                    warn!("Replay with token {} failed: {}", token.preview(), e);
                }
            }
        }
        Ok(None)
    }

    /// Last-chance pass over the bank once every strategy is spent.
    ///
    /// Replay failures here are logged and swallowed: after the final
    /// pass the run's answer is records or the exhaustion error, never a
    /// stray transport error.
    async fn final_replay(
        &self,
        request: &SearchRequest,
        identity: &Identity,
        bank: &mut TokenSet,
        cookie_jar: &[(String, String)],
    ) -> Option<Vec<FlightRecord>> {
        match self.replay_bank(request, identity, bank, cookie_jar).await {
            Ok(found) => found,
            Err(e) => {
                warn!("Final token replay failed: {}", e);
                None
            }
        }
    }

    fn finish(
        &self,
        request: &SearchRequest,
        records: Vec<FlightRecord>,
        report: Option<ExtractionReport>,
        strategy: &'static str,
    ) -> CrawlOutcome {
        info!("Extracted {} flight(s) via {}", records.len(), strategy);
        if let Some(ref report) = report {
            self.artifacts.save_report(report);
        }
        let results_path = self.artifacts.save_results(request, &records);
        CrawlOutcome {
            records,
            report,
            strategy,
            attempts: 0,
            results_path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_settings(dir: &std::path::Path) -> Settings {
        let mut settings = Settings::with_data_dir(dir.to_path_buf());
        settings.base_url = "http://127.0.0.1:9".to_string();
        settings.identity_pool_size = 3;
        settings.attempts_per_strategy = 1;
        settings.request_timeout_secs = 2;
        settings.search_deadline_secs = 60;
        settings.save_artifacts = false;
        // A pinned-but-missing executable fails launch immediately, so
        // browser strategies never spawn a real Chrome in tests.
        settings.chrome_executable = Some("/nonexistent/chrome-for-tests".to_string());
        settings
    }

    #[test]
    fn jitter_stays_in_bounds() {
        for _ in 0..50 {
            let d = jitter(0.5, 1.5);
            assert!(d >= Duration::from_secs_f64(0.5));
            assert!(d < Duration::from_secs_f64(1.5));
        }
    }

    #[tokio::test]
    async fn replay_with_empty_bank_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = Orchestrator::new(test_settings(dir.path()));
        let request = SearchRequest::new("SFO", "NRT", "2026-09-15", true).unwrap();
        let identity = Identity::default();
        let mut bank = TokenSet::new();

        let result = orchestrator
            .replay_bank(&request, &identity, &mut bank, &[])
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn dead_endpoint_exhausts_every_strategy() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = Orchestrator::new(test_settings(dir.path()));
        let request = SearchRequest::new("ORD", "LAX", "2026-10-01", false).unwrap();

        match orchestrator.run(&request).await {
            Err(CrawlError::AllStrategiesExhausted { attempts }) => {
                assert_eq!(attempts, 3);
            }
            other => panic!("expected exhaustion, got {:?}", other.map(|o| o.records)),
        }
    }

    #[tokio::test]
    async fn drained_pool_ends_the_run_across_strategies() {
        // One pool serves the whole cascade: with 2 identities and 5
        // attempts allowed per strategy, the run stops after 2 attempts
        // instead of refilling for the next strategy.
        let dir = tempfile::tempdir().unwrap();
        let mut settings = test_settings(dir.path());
        settings.identity_pool_size = 2;
        settings.attempts_per_strategy = 5;
        let orchestrator = Orchestrator::new(settings);
        let request = SearchRequest::new("ORD", "LAX", "2026-10-01", false).unwrap();

        match orchestrator.run(&request).await {
            Err(CrawlError::AllStrategiesExhausted { attempts }) => {
                assert_eq!(attempts, 2);
            }
            other => panic!("expected exhaustion, got {:?}", other.map(|o| o.records)),
        }
    }

    #[tokio::test]
    async fn final_replay_swallows_errors() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = Orchestrator::new(test_settings(dir.path()));
        let request = SearchRequest::new("SFO", "NRT", "2026-09-15", true).unwrap();
        let identity = Identity::default();
        let mut bank = TokenSet::new();
        bank.insert(crate::token::AuthToken::new(
            "DAAAAdeadbeef",
            crate::token::TokenSource::Html,
        ));

        // Every endpoint is unreachable; the pass must end quietly with
        // no records rather than surfacing a transport error.
        let result = orchestrator
            .final_replay(&request, &identity, &mut bank, &[])
            .await;
        assert!(result.is_none());
    }

    #[test]
    fn finish_reports_strategy_name() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = Orchestrator::new(test_settings(dir.path()));
        let request = SearchRequest::new("SFO", "NRT", "2026-09-15", true).unwrap();

        let mut candidate =
            crate::models::FlightCandidate::new(crate::models::ExtractionTier::Dom);
        candidate.miles = Some(60_000);
        let records = normalize::normalize_batch(&[candidate], &request);

        let outcome = orchestrator.finish(&request, records, None, Strategy::StealthBrowser.name());
        assert_eq!(outcome.strategy, "stealth-browser");
        assert_eq!(outcome.records.len(), 1);
        // Result dumps are written even with artifacts disabled
        assert!(outcome.results_path.is_some());
    }
}
