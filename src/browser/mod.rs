//! Chrome automation: stealth launch, human-like interaction, token capture.

#[cfg(feature = "browser")]
pub mod form;
#[cfg(feature = "browser")]
pub mod humanize;
#[cfg(feature = "browser")]
pub mod modal;
#[cfg(feature = "browser")]
pub mod session;
#[cfg(feature = "browser")]
pub mod stealth;

#[cfg(feature = "browser")]
pub use session::BrowserSession;
