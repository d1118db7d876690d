//! Data models for extraction candidates and normalized flight records.

mod flight;

pub use flight::{
    ExtractionReport, ExtractionTier, FlightCandidate, FlightEndpoint, FlightPrice, FlightRecord,
    TierAttempt, TierOutcome, TierStatus,
};
