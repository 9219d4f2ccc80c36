use crate::passage::{PassageStats, PracticeRecord};
use crate::util::round2;
use chrono::{DateTime, Local};

/// Percentage points of health lost per full day without practice.
pub const DECAY_PER_DAY: f64 = 1.0;

/// Fraction of the latest score added back as a boost.
pub const SCORE_BOOST_FACTOR: f64 = 0.1;

const SECS_PER_DAY: f64 = 86_400.0;

/// Fold a finished practice into a passage's health score.
///
/// Health starts at 100 for a passage with no history, decays linearly
/// while the passage sits unpracticed, and gets a boost proportional to
/// the latest score. The result is always clamped to [0, 100] and
/// rounded to two decimals; `now` is injected so tests can pin time.
pub fn calculate_health(
    prior: Option<&PassageStats>,
    latest: &PracticeRecord,
    now: DateTime<Local>,
) -> f64 {
    let mut health = prior.map(|s| s.health).unwrap_or(100.0);

    if let Some(last) = prior.and_then(|s| s.last_practiced) {
        let days_since = (now - last).num_seconds() as f64 / SECS_PER_DAY;
        health -= days_since * DECAY_PER_DAY;
    }
    health = health.clamp(0.0, 100.0);

    health += latest.score_percent * SCORE_BOOST_FACTOR;
    round2(health.clamp(0.0, 100.0))
}
