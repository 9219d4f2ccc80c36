use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// A stored passage plus whatever practice history exists for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub name: String,
    pub text: String,
    pub stats: Option<PassageStats>,
}

impl Passage {
    /// A passage that has never been practiced.
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            stats: None,
        }
    }
}

/// Accumulated statistics for one passage. `health` is a decaying score
/// in [0, 100] summarizing how fresh the memorization is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassageStats {
    pub health: f64,
    pub last_practiced: Option<DateTime<Local>>,
    pub practices: Vec<PracticeRecord>,
}

/// Outcome of one completed practice session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PracticeRecord {
    pub date: DateTime<Local>,
    pub score_percent: f64,
    pub missed_points: u32,
    pub hints_used: u32,
}

/// Row shown in the passage picker; avoids loading full texts and
/// histories for the list view.
#[derive(Debug, Clone, PartialEq)]
pub struct PassageSummary {
    pub name: String,
    pub health: Option<f64>,
    pub last_practiced: Option<DateTime<Local>>,
    pub practice_count: usize,
}
