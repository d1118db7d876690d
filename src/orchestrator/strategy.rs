//! Acquisition strategies and the crawl state machine.

use tracing::debug;

/// One end-to-end acquisition path, tried in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Chrome with the full fingerprint patch set.
    StealthBrowser,
    /// TLS-fingerprint-matching HTTP client, no browser process.
    EmulatedHttp,
    /// Chrome without patches. Last resort: detectable but sometimes
    /// the patched profile is what trips the defenses.
    PlainBrowser,
}

impl Strategy {
    pub fn all() -> [Strategy; 3] {
        [
            Strategy::StealthBrowser,
            Strategy::EmulatedHttp,
            Strategy::PlainBrowser,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Strategy::StealthBrowser => "stealth-browser",
            Strategy::EmulatedHttp => "emulated-http",
            Strategy::PlainBrowser => "plain-browser",
        }
    }

    pub fn uses_browser(&self) -> bool {
        matches!(self, Strategy::StealthBrowser | Strategy::PlainBrowser)
    }
}

/// Where a crawl currently stands.
///
/// `StrategyExhausted` marks the end of one failed attempt; the next
/// attempt re-enters through `StrategySelected` with a fresh identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlState {
    Idle,
    StrategySelected,
    BrowserActive,
    TokenHarvested,
    Extracting,
    Succeeded,
    StrategyExhausted,
    AllStrategiesExhausted,
}

impl CrawlState {
    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition(self, next: CrawlState) -> bool {
        use CrawlState::*;
        matches!(
            (self, next),
            (Idle, StrategySelected)
                | (StrategySelected, BrowserActive)
                | (StrategySelected, StrategyExhausted)
                | (StrategySelected, AllStrategiesExhausted)
                | (BrowserActive, TokenHarvested)
                | (BrowserActive, Extracting)
                | (BrowserActive, StrategyExhausted)
                | (TokenHarvested, Extracting)
                | (TokenHarvested, StrategyExhausted)
                | (Extracting, Succeeded)
                | (Extracting, StrategyExhausted)
                | (StrategyExhausted, StrategySelected)
                | (StrategyExhausted, Succeeded)
                | (StrategyExhausted, AllStrategiesExhausted)
        )
    }

    /// Move to `next`, logging the edge. Illegal edges are a logic error.
    pub fn advance(&mut self, next: CrawlState) {
        debug_assert!(
            self.can_transition(next),
            "illegal transition {:?} -> {:?}",
            self,
            next
        );
        debug!("Crawl state: {:?} -> {:?}", self, next);
        *self = next;
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, CrawlState::Succeeded | CrawlState::AllStrategiesExhausted)
    }
}
