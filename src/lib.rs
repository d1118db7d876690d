//! AwardScout - award availability extraction pipeline.
//!
//! Drives a hardened browser (or fingerprint-matching HTTP fallback)
//! through an airline's fare search, harvests the short-lived bearer
//! tokens the site mints for its own shopping API, and recovers flight
//! availability through a tiered extraction cascade. Output is a list of
//! normalized flight records; the pipeline reports failure rather than
//! ever inventing data.

pub mod airports;
pub mod api;
pub mod artifacts;
pub mod browser;
pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod identity;
pub mod models;
pub mod normalize;
pub mod orchestrator;
pub mod request;
pub mod token;
pub mod transport;

pub use config::Settings;
pub use error::CrawlError;
pub use models::FlightRecord;
pub use orchestrator::{CrawlOutcome, Orchestrator};
pub use request::{Cabin, SearchRequest};
