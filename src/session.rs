use crate::health::calculate_health;
use crate::passage::{Passage, PassageStats, PracticeRecord};
use crate::tokenizer::{guessable_count, tokenize, Segment, SegmentKind};
use crate::util::{mask_text, round2};
use chrono::Local;
use std::time::{Duration, SystemTime};

/// Consecutive wrong guesses before a segment is force-revealed.
pub const MISS_REVEAL_THRESHOLD: u32 = 3;

/// Points a guessable segment is worth when hit on the first try.
pub const POINTS_PER_SEGMENT: u32 = 3;

/// How long the miss flash stays visible. Cosmetic only; expiry never
/// affects game state.
pub const FLASH_DURATION: Duration = Duration::from_millis(200);

/// Per-segment visibility, parallel to the segment list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reveal {
    Hidden,
    /// Revealed normally: guessed, or auto-revealed non-guessable.
    Shown,
    /// Force-revealed after exhausting the miss threshold.
    ShownMiss,
    /// Temporarily revealed by hint mode; reverts on release.
    ShownHint,
}

/// Render representation of one segment, in segment order.
#[derive(Debug, Clone, PartialEq)]
pub enum SegmentView {
    /// Not yet revealed; carries masked text so layout is stable.
    Hidden(String),
    Plain(String),
    /// Verse marker, shown but styled apart from regular text.
    Verse(String),
    Miss(String),
    Hint(String),
    Heading { level: u8, text: String },
}

/// Snapshot handed to the host for drawing. Percentages are 0 when the
/// passage has no guessable segments.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderModel {
    pub segments: Vec<SegmentView>,
    pub progress_percent: f64,
    pub missed_percent: f64,
    pub flash_active: bool,
}

/// Terminal result of a session, delivered exactly once.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOutcome {
    pub record: PracticeRecord,
    pub new_health: f64,
}

/// State machine for one practice run over one passage.
///
/// Consumes serialized key / hint events, tracks per-segment reveal
/// state and scoring, and produces a [`SessionOutcome`] when the cursor
/// walks off the end. Dropped mid-session it leaves no trace; only
/// completion emits a record.
#[derive(Debug)]
pub struct PracticeSession {
    pub passage_name: String,
    segments: Vec<Segment>,
    reveals: Vec<Reveal>,
    /// Index of the next guessable segment awaiting input. Monotonically
    /// non-decreasing; >= segments.len() once completed.
    cursor: usize,
    /// Consecutive misses against the segment at the cursor.
    misses: u32,
    earned_points: u32,
    missed_points: u32,
    total_points: u32,
    hints_used: u32,
    /// Reveal state captured on hint activation; `Some` while held.
    hint_snapshot: Option<Vec<Reveal>>,
    flash_started: Option<SystemTime>,
    prior_stats: Option<PassageStats>,
    outcome: Option<SessionOutcome>,
    completed: bool,
}

impl PracticeSession {
    pub fn new(passage: &Passage) -> Self {
        let segments = tokenize(&passage.text);
        let total_points = POINTS_PER_SEGMENT * guessable_count(&segments) as u32;
        let reveals = vec![Reveal::Hidden; segments.len()];

        let mut session = Self {
            passage_name: passage.name.clone(),
            segments,
            reveals,
            cursor: 0,
            misses: 0,
            earned_points: 0,
            missed_points: 0,
            total_points,
            hints_used: 0,
            hint_snapshot: None,
            flash_started: None,
            prior_stats: passage.stats.clone(),
            outcome: None,
            completed: false,
        };

        // Leading headings, markers and whitespace need no input; a
        // passage with no guessable segments completes on the spot.
        session.auto_advance();
        if session.cursor >= session.segments.len() {
            session.finish();
        }
        session
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn is_hint_active(&self) -> bool {
        self.hint_snapshot.is_some()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn earned_points(&self) -> u32 {
        self.earned_points
    }

    pub fn missed_points(&self) -> u32 {
        self.missed_points
    }

    pub fn total_points(&self) -> u32 {
        self.total_points
    }

    pub fn hints_used(&self) -> u32 {
        self.hints_used
    }

    /// Feed one typed character. Only ASCII letters count as guesses;
    /// everything else is ignored, as is any input while a hint is held
    /// or after completion.
    pub fn submit_key(&mut self, c: char) {
        if self.completed || self.hint_snapshot.is_some() || !c.is_ascii_alphabetic() {
            return;
        }

        // auto_advance guarantees the cursor sits on a guessable segment
        let expected = self.segments[self.cursor].match_char();
        let guessed = expected == Some(c.to_ascii_lowercase());

        if guessed {
            self.reveals[self.cursor] = Reveal::Shown;
            self.earned_points += POINTS_PER_SEGMENT.saturating_sub(self.misses);
            self.misses = 0;
            self.advance();
        } else {
            self.misses += 1;
            self.missed_points += 1;
            self.flash_started = Some(SystemTime::now());
            if self.misses >= MISS_REVEAL_THRESHOLD {
                self.reveals[self.cursor] = Reveal::ShownMiss;
                self.misses = 0;
                self.advance();
            }
        }
    }

    /// Activate hint mode: reveal the rest of the current line without
    /// awarding points. Re-entry while already held is a no-op, so the
    /// snapshot baseline and `hints_used` cannot double up.
    pub fn hold_hint(&mut self) {
        if self.completed || self.hint_snapshot.is_some() {
            return;
        }

        self.hint_snapshot = Some(self.reveals.clone());
        self.hints_used += 1;

        for i in self.cursor..self.segments.len() {
            if self.segments[i].kind == SegmentKind::Newline {
                break;
            }
            if self.reveals[i] == Reveal::Hidden {
                self.reveals[i] = if self.segments[i].is_guessable() {
                    Reveal::ShownHint
                } else {
                    Reveal::Shown
                };
            }
        }
    }

    /// Deactivate hint mode, restoring the pre-hint reveal state.
    pub fn release_hint(&mut self) {
        if let Some(snapshot) = self.hint_snapshot.take() {
            self.reveals = snapshot;
        }
    }

    /// The completion result, if any. Consumes it; the host gets the
    /// record exactly once per session.
    pub fn take_outcome(&mut self) -> Option<SessionOutcome> {
        self.outcome.take()
    }

    /// Build the current render representation.
    pub fn render_model(&self, now: SystemTime) -> RenderModel {
        let segments = self
            .segments
            .iter()
            .zip(&self.reveals)
            .map(|(seg, reveal)| view_of(seg, *reveal))
            .collect();

        let (progress, missed) = if self.total_points == 0 {
            (0.0, 0.0)
        } else {
            (
                self.earned_points as f64 / self.total_points as f64 * 100.0,
                self.missed_points as f64 / self.total_points as f64 * 100.0,
            )
        };

        let flash_active = self
            .flash_started
            .and_then(|t| now.duration_since(t).ok())
            .map(|elapsed| elapsed < FLASH_DURATION)
            .unwrap_or(false);

        RenderModel {
            segments,
            progress_percent: progress,
            missed_percent: missed,
            flash_active,
        }
    }

    /// Move the cursor past the just-resolved segment and through any
    /// non-guessable segments behind it, revealing them as it goes.
    fn advance(&mut self) {
        self.cursor += 1;
        self.auto_advance();
        if self.cursor >= self.segments.len() && !self.completed {
            self.finish();
        }
    }

    fn auto_advance(&mut self) {
        while self.cursor < self.segments.len() && !self.segments[self.cursor].is_guessable() {
            if self.reveals[self.cursor] == Reveal::Hidden {
                self.reveals[self.cursor] = Reveal::Shown;
            }
            self.cursor += 1;
        }
    }

    fn finish(&mut self) {
        self.completed = true;
        // A held hint cannot survive completion
        self.hint_snapshot = None;

        let score_percent = if self.total_points == 0 {
            0.0
        } else {
            round2(self.earned_points as f64 / self.total_points as f64 * 100.0)
        };

        let record = PracticeRecord {
            date: Local::now(),
            score_percent,
            missed_points: self.missed_points,
            hints_used: self.hints_used,
        };
        let new_health = calculate_health(self.prior_stats.as_ref(), &record, Local::now());

        self.outcome = Some(SessionOutcome { record, new_health });
    }
}

fn view_of(seg: &Segment, reveal: Reveal) -> SegmentView {
    match reveal {
        Reveal::Hidden => SegmentView::Hidden(mask_text(&seg.text, '_')),
        Reveal::ShownMiss => SegmentView::Miss(seg.text.clone()),
        Reveal::ShownHint => SegmentView::Hint(seg.text.clone()),
        Reveal::Shown => match seg.kind {
            SegmentKind::Heading => SegmentView::Heading {
                level: seg.level.unwrap_or(1),
                text: seg.display_text().to_string(),
            },
            SegmentKind::VerseMarker => SegmentView::Verse(seg.text.clone()),
            _ => SegmentView::Plain(seg.text.clone()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn session(text: &str) -> PracticeSession {
        PracticeSession::new(&Passage::new("test", text))
    }

    fn now() -> SystemTime {
        SystemTime::now()
    }

    #[test]
    fn perfect_run_scores_full_points() {
        let mut s = session("## Ps 23\n1. The LORD is my shepherd.");
        assert_eq!(s.total_points(), 15);

        for c in ['t', 'l', 'i', 'm', 's'] {
            s.submit_key(c);
        }

        assert!(s.is_completed());
        assert_eq!(s.earned_points(), 15);
        assert_eq!(s.missed_points(), 0);
        let outcome = s.take_outcome().unwrap();
        assert_eq!(outcome.record.score_percent, 100.0);
        assert_eq!(outcome.record.missed_points, 0);
        assert_eq!(outcome.record.hints_used, 0);
    }

    #[test]
    fn outcome_is_delivered_exactly_once() {
        let mut s = session("hi");
        s.submit_key('h');
        assert!(s.take_outcome().is_some());
        assert!(s.take_outcome().is_none());
    }

    #[test]
    fn three_misses_force_reveal_with_zero_points() {
        let mut s = session("cat");
        for _ in 0..3 {
            s.submit_key('d');
        }

        assert!(s.is_completed());
        assert_eq!(s.earned_points(), 0);
        assert_eq!(s.missed_points(), 3);
        assert_eq!(s.total_points(), 3);

        let outcome = s.take_outcome().unwrap();
        assert_eq!(outcome.record.score_percent, 0.0);

        let model = s.render_model(now());
        assert_matches!(&model.segments[0], SegmentView::Miss(t) if t == "cat");
    }

    #[test]
    fn points_decrease_per_miss_before_success() {
        let mut s = session("cat dog");
        s.submit_key('x');
        s.submit_key('c'); // 2 points after one miss
        s.submit_key('x');
        s.submit_key('x');
        s.submit_key('d'); // 1 point after two misses

        assert!(s.is_completed());
        assert_eq!(s.earned_points(), 3);
        assert_eq!(s.missed_points(), 3);
    }

    #[test]
    fn miss_counter_resets_on_advance() {
        let mut s = session("cat dog");
        s.submit_key('x');
        s.submit_key('x');
        s.submit_key('c'); // resolves with 1 point, resets misses
        s.submit_key('x'); // first miss on "dog", not third overall
        s.submit_key('d');

        assert!(s.is_completed());
        assert_eq!(s.earned_points(), 1 + 2);
        assert_eq!(s.missed_points(), 3);
    }

    #[test]
    fn matching_is_case_insensitive() {
        let mut s = session("LORD bless");
        s.submit_key('l');
        s.submit_key('B');
        assert!(s.is_completed());
        assert_eq!(s.earned_points(), 6);
    }

    #[test]
    fn non_letter_keys_are_ignored() {
        let mut s = session("cat");
        for c in ['1', ' ', '.', '\n', '#'] {
            s.submit_key(c);
        }
        assert_eq!(s.missed_points(), 0);
        assert_eq!(s.cursor(), 0);
        assert!(!s.is_completed());
    }

    #[test]
    fn input_after_completion_is_ignored() {
        let mut s = session("a");
        s.submit_key('a');
        assert!(s.is_completed());
        s.submit_key('z');
        assert_eq!(s.missed_points(), 0);
    }

    #[test]
    fn empty_passage_completes_immediately() {
        let mut s = session("");
        assert!(s.is_completed());
        let outcome = s.take_outcome().unwrap();
        assert_eq!(outcome.record.score_percent, 0.0);
        assert_eq!(s.total_points(), 0);
    }

    #[test]
    fn passage_without_guessables_completes_immediately() {
        let mut s = session("# Title\n1. ...\n");
        assert!(s.is_completed());
        assert_eq!(s.total_points(), 0);
        let model = s.render_model(now());
        // Everything auto-revealed on the way through
        assert!(model
            .segments
            .iter()
            .all(|v| !matches!(v, SegmentView::Hidden(_))));
    }

    #[test]
    fn cursor_is_monotonic() {
        let mut s = session("one two three");
        let mut last = s.cursor();
        for c in ['x', 'o', 'x', 'x', 'x', 't', 'q', 't'] {
            s.submit_key(c);
            assert!(s.cursor() >= last);
            last = s.cursor();
        }
    }

    #[test]
    fn leading_non_guessables_auto_reveal() {
        let s = session("## Ps 23\n1. The LORD");
        let model = s.render_model(now());
        assert_matches!(
            &model.segments[0],
            SegmentView::Heading { level: 2, text } if text == "Ps 23"
        );
        assert_matches!(&model.segments[1], SegmentView::Verse(t) if t == "1. ");
        assert_matches!(&model.segments[2], SegmentView::Hidden(t) if t == "___ ");
    }

    #[test]
    fn hint_reveals_to_end_of_line_and_reverts() {
        let mut s = session("one two\nthree");
        s.hold_hint();
        assert!(s.is_hint_active());
        assert_eq!(s.hints_used(), 1);

        let model = s.render_model(now());
        assert_matches!(&model.segments[0], SegmentView::Hint(t) if t == "one ");
        assert_matches!(&model.segments[1], SegmentView::Hint(t) if t == "two");
        // Next line stays hidden
        assert_matches!(&model.segments[3], SegmentView::Hidden(_));

        s.release_hint();
        assert!(!s.is_hint_active());
        let model = s.render_model(now());
        assert_matches!(&model.segments[0], SegmentView::Hidden(_));
        assert_matches!(&model.segments[1], SegmentView::Hidden(_));
    }

    #[test]
    fn hint_hold_is_idempotent() {
        let mut s = session("one two");
        s.hold_hint();
        s.hold_hint();
        assert_eq!(s.hints_used(), 1);

        s.release_hint();
        // Baseline restored to the true pre-hint state
        let model = s.render_model(now());
        assert_matches!(&model.segments[0], SegmentView::Hidden(_));
    }

    #[test]
    fn hint_does_not_disturb_prior_reveals() {
        let mut s = session("one two three");
        s.submit_key('o');
        s.hold_hint();
        s.release_hint();

        let model = s.render_model(now());
        assert_matches!(&model.segments[0], SegmentView::Plain(t) if t == "one ");
        assert_matches!(&model.segments[1], SegmentView::Hidden(_));
    }

    #[test]
    fn keys_are_ignored_while_hint_held() {
        let mut s = session("one two");
        s.hold_hint();
        s.submit_key('o');
        assert_eq!(s.earned_points(), 0);
        assert_eq!(s.cursor(), 0);

        s.release_hint();
        s.submit_key('o');
        assert_eq!(s.earned_points(), 3);
    }

    #[test]
    fn hints_count_into_record() {
        let mut s = session("one two");
        s.hold_hint();
        s.release_hint();
        s.hold_hint();
        s.release_hint();
        s.submit_key('o');
        s.submit_key('t');
        let outcome = s.take_outcome().unwrap();
        assert_eq!(outcome.record.hints_used, 2);
    }

    #[test]
    fn miss_starts_flash_that_expires() {
        let mut s = session("cat");
        s.submit_key('x');
        let t0 = SystemTime::now();
        assert!(s.render_model(t0).flash_active);
        assert!(!s.render_model(t0 + Duration::from_millis(500)).flash_active);
    }

    #[test]
    fn score_bounds_hold_under_mixed_input() {
        let mut s = session("alpha beta gamma delta");
        for c in "xaxxbxxxgxd".chars() {
            s.submit_key(c);
        }
        assert!(s.earned_points() <= s.total_points());
        let outcome = s.take_outcome().unwrap();
        assert!((0.0..=100.0).contains(&outcome.record.score_percent));
    }

    #[test]
    fn unknown_segments_resolve_via_miss_path() {
        // "4" never matches a letter key, so it costs three misses
        let mut s = session("4 cats");
        assert_eq!(s.total_points(), 6);
        s.submit_key('x');
        s.submit_key('x');
        s.submit_key('x');
        assert_eq!(s.cursor(), 2);
        s.submit_key('c');
        assert!(s.is_completed());
        assert_eq!(s.earned_points(), 3);
    }

    #[test]
    fn first_ever_practice_health_defaults_to_full() {
        let mut s = session("hi");
        s.submit_key('h');
        let outcome = s.take_outcome().unwrap();
        assert_eq!(outcome.new_health, 100.0);
    }

    #[test]
    fn completion_health_uses_prior_stats() {
        let mut passage = Passage::new("p", "hi");
        passage.stats = Some(PassageStats {
            health: 50.0,
            last_practiced: Some(Local::now()),
            practices: vec![],
        });
        let mut s = PracticeSession::new(&passage);
        s.submit_key('h');
        let outcome = s.take_outcome().unwrap();
        // 50 + 0.1 * 100, no meaningful decay within the test run
        assert_eq!(outcome.new_health, 60.0);
    }
}
