//! Error types for the crawl pipeline.

use thiserror::Error;

/// Errors surfaced by search, extraction, and replay operations.
///
/// Strategy-level failures (a blocked navigation, a rate-limited endpoint)
/// are recoverable: the orchestrator logs them and moves on to the next
/// identity or strategy. Only `AllStrategiesExhausted` is terminal.
#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("invalid search request: {0}")]
    InvalidRequest(String),

    #[error("failed to launch browser: {0}")]
    Launch(String),

    #[error("navigation blocked at {url}")]
    NavigationBlocked { url: String },

    #[error("rate limited by {endpoint}")]
    RateLimited { endpoint: String },

    #[error("no flight results found for {origin}-{destination}")]
    NoResultsFound { origin: String, destination: String },

    #[error("all strategies exhausted after {attempts} attempts")]
    AllStrategiesExhausted { attempts: usize },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("emulated transport error: {0}")]
    Transport(#[from] wreq::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "browser")]
    #[error("browser protocol error: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),
}

impl CrawlError {
    /// Whether this error should abort the whole search rather than just
    /// the current attempt.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CrawlError::InvalidRequest(_) | CrawlError::AllStrategiesExhausted { .. }
        )
    }
}
