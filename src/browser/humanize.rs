//! Human-ish interaction noise.
//!
//! Bot heuristics score sessions that load a page and immediately rip
//! the DOM. Between navigation and extraction we wander the mouse,
//! scroll in uneven bursts and occasionally click a neutral spot. All
//! randomness is drawn up front into a plan; the thread-local generator
//! cannot be held across await points.

use std::time::Duration;

use chromiumoxide::layout::Point;
use chromiumoxide::Page;
use rand::Rng;
use tracing::debug;

use super::modal;

struct Plan {
    moves: Vec<(f64, f64, Duration)>,
    scrolls: Vec<(i64, Duration)>,
    hover: (f64, f64, Duration),
    click_pause: Option<Duration>,
    final_scroll: (i64, Duration),
    settle: Duration,
}

fn secs(rng: &mut impl Rng, range: std::ops::Range<f64>) -> Duration {
    Duration::from_secs_f64(rng.random_range(range))
}

fn plan() -> Plan {
    let mut rng = rand::rng();
    let moves = (0..rng.random_range(5..=10))
        .map(|_| {
            (
                rng.random_range(100..=1000) as f64,
                rng.random_range(100..=700) as f64,
                secs(&mut rng, 0.1..0.3),
            )
        })
        .collect();
    let scrolls = (0..rng.random_range(1..=3))
        .map(|_| (rng.random_range(100..=400), secs(&mut rng, 0.5..1.5)))
        .collect();
    let hover = (
        rng.random_range(500..=800) as f64,
        rng.random_range(300..=500) as f64,
        secs(&mut rng, 0.2..0.5),
    );
    // skip the click sometimes so we do not poke modals open
    let click_pause = rng.random_bool(0.7).then(|| secs(&mut rng, 0.5..1.0));
    let final_scroll = (rng.random_range(-200..=200), secs(&mut rng, 0.5..1.0));
    let settle = secs(&mut rng, 2.0..3.0);
    Plan {
        moves,
        scrolls,
        hover,
        click_pause,
        final_scroll,
        settle,
    }
}

async fn scroll_by(page: &Page, amount: i64) {
    if let Err(e) = page.evaluate(format!("window.scrollBy(0, {})", amount)).await {
        debug!("Scroll failed: {}", e);
    }
}

async fn eval_px(page: &Page, script: &str) -> Option<i64> {
    page.evaluate(script)
        .await
        .ok()?
        .into_value::<f64>()
        .ok()
        .map(|v| v as i64)
}

/// Wander, scroll, maybe click, then settle.
pub async fn run(page: &Page) {
    let plan = plan();
    modal::dismiss(page).await;

    for (x, y, pause) in &plan.moves {
        let _ = page.move_mouse(Point::new(*x, *y)).await;
        tokio::time::sleep(*pause).await;
    }
    for (amount, pause) in &plan.scrolls {
        scroll_by(page, *amount).await;
        tokio::time::sleep(*pause).await;
    }

    modal::dismiss(page).await;

    let (x, y, pause) = plan.hover;
    let _ = page.move_mouse(Point::new(x, y)).await;
    tokio::time::sleep(pause).await;
    if let Some(pause) = plan.click_pause {
        if page.click(Point::new(x, y)).await.is_err() {
            modal::dismiss(page).await;
        }
        tokio::time::sleep(pause).await;
    }

    let (amount, pause) = plan.final_scroll;
    scroll_by(page, amount).await;
    tokio::time::sleep(pause).await;
    tokio::time::sleep(plan.settle).await;
}

/// Scroll the whole document a viewport at a time with uneven pauses,
/// clearing any modal that pops up along the way. Lazy-rendered results
/// and deferred scripts only materialize once their region is seen.
pub async fn scroll_page(page: &Page) {
    let Some(height) = eval_px(page, "document.body.scrollHeight").await else {
        return;
    };
    let viewport = eval_px(page, "window.innerHeight").await.unwrap_or(800).max(1);
    if height <= 0 {
        return;
    }

    let steps = ((height / viewport) + 1).min(30) as usize;
    let pauses: Vec<Duration> = {
        let mut rng = rand::rng();
        (0..steps).map(|_| secs(&mut rng, 0.5..1.5)).collect()
    };

    let mut offset = 0;
    for pause in pauses {
        if let Err(e) = page.evaluate(format!("window.scrollTo(0, {})", offset)).await {
            debug!("Segmented scroll failed: {}", e);
            return;
        }
        tokio::time::sleep(pause).await;
        modal::dismiss(page).await;
        offset += viewport;
        if offset >= height {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_stays_in_bounds() {
        for _ in 0..50 {
            let plan = plan();
            assert!((5..=10).contains(&plan.moves.len()));
            assert!((1..=3).contains(&plan.scrolls.len()));
            for (x, y, pause) in &plan.moves {
                assert!((100.0..=1000.0).contains(x));
                assert!((100.0..=700.0).contains(y));
                assert!(pause.as_secs_f64() < 0.3);
            }
            for (amount, _) in &plan.scrolls {
                assert!((100..=400).contains(amount));
            }
            assert!((-200..=200).contains(&plan.final_scroll.0));
            assert!(plan.settle >= Duration::from_secs(2));
        }
    }
}
