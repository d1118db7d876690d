//! Promo/consent modal dismissal.
//!
//! The site interrupts sessions with layered modals that swallow every
//! click. Dismissal runs a ladder from polite to forceful: close buttons
//! inside the modal, clicking outside plus Escape, and finally removing
//! the nodes and restoring page scroll. The return value reports whether
//! the page takes clicks again.

use std::time::Duration;

use chromiumoxide::layout::Point;
use chromiumoxide::Page;
use tracing::debug;

/// Things that look like an active modal, most specific first.
const MODAL_SELECTORS: &[&str] = &[
    ".atm-c-modal.atm-is-active",
    "[class*='modal'][class*='active']",
    "[class*='dialog'][class*='active']",
    "[class*='overlay'][class*='active']",
    "div[role='dialog']",
    "div[aria-modal='true']",
];

/// Close affordances searched inside a matched modal.
const CLOSE_SELECTORS: &[&str] = &[
    "[class*='close']",
    "[class*='dismiss']",
    "[class*='cancel']",
    "button",
    "a[role='button']",
    "[aria-label='Close']",
    "[data-dismiss='modal']",
];

/// Hide and remove modal/overlay nodes, then restore the scroll state
/// modals lock.
const REMOVE_MODAL_JS: &str = r#"
(() => {
    const modals = document.querySelectorAll('.atm-c-modal.atm-is-active, [class*="modal"][class*="active"], [aria-modal="true"]');
    modals.forEach(modal => {
        modal.style.display = 'none';
        modal.style.visibility = 'hidden';
        modal.style.opacity = '0';
        modal.style.pointerEvents = 'none';
        modal.remove();
    });
    const overlays = document.querySelectorAll('.modal-backdrop, .atm-c-overlay, [class*="overlay"], [class*="backdrop"]');
    overlays.forEach(overlay => {
        overlay.style.display = 'none';
        overlay.style.visibility = 'hidden';
        overlay.style.opacity = '0';
        overlay.style.pointerEvents = 'none';
        overlay.remove();
    });
    document.body.style.overflow = 'auto';
    document.body.style.marginRight = '0';
    document.documentElement.style.overflow = 'auto';
    return modals.length + overlays.length;
})()
"#;

/// Whether any modal selector matches a visible element right now.
async fn modal_visible(page: &Page) -> bool {
    let Ok(selectors) = serde_json::to_string(&MODAL_SELECTORS) else {
        return false;
    };
    let script = format!(
        r#"(() => {{
            for (const sel of {selectors}) {{
                for (const el of document.querySelectorAll(sel)) {{
                    const style = window.getComputedStyle(el);
                    if (style.display !== 'none' && style.visibility !== 'hidden' && el.offsetParent !== null) {{
                        return true;
                    }}
                }}
            }}
            return false;
        }})()"#
    );
    match page.evaluate(script).await {
        Ok(result) => result.into_value::<bool>().unwrap_or(false),
        Err(e) => {
            debug!("Modal visibility check failed: {}", e);
            false
        }
    }
}

/// Run the dismissal ladder. Returns true when the page is interactable.
pub async fn dismiss(page: &Page) -> bool {
    if !modal_visible(page).await {
        return true;
    }
    debug!("Active modal detected, attempting dismissal");

    for modal_sel in MODAL_SELECTORS {
        let Ok(modal) = page.find_element(*modal_sel).await else {
            continue;
        };
        for close_sel in CLOSE_SELECTORS {
            let Ok(button) = modal.find_element(*close_sel).await else {
                continue;
            };
            if button.click().await.is_ok() {
                tokio::time::sleep(Duration::from_secs(1)).await;
                if !modal_visible(page).await {
                    debug!("Modal dismissed via close button {}", close_sel);
                    return true;
                }
            }
        }
    }

    // click outside the modal, then Escape
    let _ = page.click(Point::new(10.0, 10.0)).await;
    if let Ok(body) = page.find_element("body").await {
        let _ = body.press_key("Escape").await;
    }
    tokio::time::sleep(Duration::from_millis(500)).await;
    if !modal_visible(page).await {
        debug!("Modal dismissed via outside click / Escape");
        return true;
    }

    debug!("Removing modal nodes directly");
    if let Err(e) = page.evaluate(REMOVE_MODAL_JS).await {
        debug!("Modal removal script failed: {}", e);
    }

    page.click(Point::new(500.0, 500.0)).await.is_ok()
}
