//! Best-effort search form interaction.
//!
//! The search URL already carries every parameter, so the form is
//! belt-and-braces: filling it out on the homepage makes the session
//! look like a person planning a trip, and keeps working when the site
//! ignores deep-link parameters. Every field is attempted through a
//! selector fallback list with its own timeout; failures are logged and
//! never abort the attempt.

use std::time::Duration;

use chromiumoxide::Page;
use tracing::{debug, warn};

use crate::request::SearchRequest;

const ORIGIN_SELECTORS: &[&str] = &[
    "#bookFlightOriginInput",
    "input[id*='origin']",
    "input[name*='origin']",
    "input[placeholder*='From']",
    "input[aria-label*='From']",
];

const DESTINATION_SELECTORS: &[&str] = &[
    "#bookFlightDestinationInput",
    "input[id*='destination']",
    "input[name*='destination']",
    "input[placeholder*='To']",
    "input[aria-label*='To']",
];

const DATE_SELECTORS: &[&str] = &[
    "#DepartDate",
    "input[id*='depart']",
    "input[name*='depart']",
    "input[placeholder*='Depart']",
];

const AWARD_TOGGLE_SELECTORS: &[&str] = &[
    "#award-toggle",
    "input[type='checkbox'][id*='award']",
    "input[type='checkbox'][name*='award']",
    "input[type='checkbox'][id*='miles']",
    "input[type='checkbox'][name*='miles']",
];

const FIELD_TIMEOUT: Duration = Duration::from_secs(5);

async fn fill_field(page: &Page, selectors: &[&str], value: &str, label: &str) -> bool {
    for sel in selectors {
        let attempt = async {
            let element = page.find_element(*sel).await.ok()?;
            element.click().await.ok()?;
            // clear whatever the widget pre-filled
            let clear = format!(
                "(() => {{ const el = document.querySelector({sel:?}); if (el) el.value = ''; }})()"
            );
            let _ = page.evaluate(clear).await;
            element.type_str(value).await.ok()?;
            element.press_key("Tab").await.ok()?;
            Some(())
        };
        match tokio::time::timeout(FIELD_TIMEOUT, attempt).await {
            Ok(Some(())) => {
                debug!("Filled {} via {}", label, sel);
                return true;
            }
            Ok(None) => continue,
            Err(_) => {
                debug!("Timed out filling {} via {}", label, sel);
                continue;
            }
        }
    }
    warn!("Could not fill {} field; relying on URL parameters", label);
    false
}

async fn toggle_award(page: &Page) -> bool {
    for sel in AWARD_TOGGLE_SELECTORS {
        let attempt = async {
            let element = page.find_element(*sel).await.ok()?;
            element.click().await.ok()?;
            Some(())
        };
        match tokio::time::timeout(FIELD_TIMEOUT, attempt).await {
            Ok(Some(())) => {
                debug!("Toggled award search via {}", sel);
                return true;
            }
            _ => continue,
        }
    }
    warn!("Could not find award toggle; relying on URL parameters");
    false
}

/// Fill origin, destination and date, and flip the award toggle when
/// searching with miles. Returns how many interactions landed.
pub async fn fill(page: &Page, request: &SearchRequest) -> usize {
    let mut filled = 0;
    if fill_field(page, ORIGIN_SELECTORS, request.origin(), "origin").await {
        filled += 1;
    }
    if fill_field(page, DESTINATION_SELECTORS, request.destination(), "destination").await {
        filled += 1;
    }
    if fill_field(page, DATE_SELECTORS, request.date(), "date").await {
        filled += 1;
    }
    if request.award() && toggle_award(page).await {
        filled += 1;
    }
    filled
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Selector;

    #[test]
    fn test_field_selectors_are_valid_css() {
        let all = ORIGIN_SELECTORS
            .iter()
            .chain(DESTINATION_SELECTORS)
            .chain(DATE_SELECTORS)
            .chain(AWARD_TOGGLE_SELECTORS);
        for sel in all {
            assert!(Selector::parse(sel).is_ok(), "bad selector: {}", sel);
        }
    }
}
