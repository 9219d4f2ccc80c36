use itertools::Itertools;

/// Kind of an atomic token produced by [`tokenize`].
///
/// Only `Word` and `Unknown` segments require a keystroke during practice;
/// everything else is revealed automatically as the cursor passes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum SegmentKind {
    Heading,
    VerseMarker,
    Word,
    Punctuation,
    Whitespace,
    Newline,
    Unknown,
}

/// One token of a passage. `text` is the exact substring consumed, so
/// concatenating all segment texts reproduces the passage byte for byte.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub kind: SegmentKind,
    pub text: String,
    /// Number of `#` markers, headings only.
    pub level: Option<u8>,
}

impl Segment {
    pub fn is_guessable(&self) -> bool {
        matches!(self.kind, SegmentKind::Word | SegmentKind::Unknown)
    }

    /// First character the user must type to reveal this segment,
    /// lowercased. `None` for empty text (cannot happen for tokenizer
    /// output, every segment consumes at least one character).
    pub fn match_char(&self) -> Option<char> {
        self.text
            .trim()
            .chars()
            .next()
            .map(|c| c.to_lowercase().next().unwrap_or(c))
    }

    /// Text with markup stripped, for display. Headings lose their `#`
    /// markers and surrounding whitespace; everything else renders
    /// exactly as consumed.
    pub fn display_text(&self) -> &str {
        match self.kind {
            SegmentKind::Heading => self
                .text
                .trim_start_matches('#')
                .trim_start_matches([' ', '\t'])
                .trim_end(),
            _ => &self.text,
        }
    }
}

/// Split a passage into an ordered sequence of segments.
///
/// Pure and stateless; every call consumes at least one character per
/// produced segment, so it terminates on any finite input. Empty input
/// yields an empty vec.
pub fn tokenize(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut rest = text;
    let mut at_line_start = true;

    while !rest.is_empty() {
        let seg = next_segment(rest, at_line_start);
        debug_assert!(!seg.text.is_empty(), "tokenizer must always consume");
        at_line_start = seg.text.ends_with('\n') || seg.text.ends_with('\r');
        rest = &rest[seg.text.len()..];
        segments.push(seg);
    }

    segments
}

/// Number of guessable segments in a token sequence.
pub fn guessable_count(segments: &[Segment]) -> usize {
    segments.iter().filter(|s| s.is_guessable()).count()
}

fn next_segment(rest: &str, at_line_start: bool) -> Segment {
    let first = rest.chars().next().expect("rest is non-empty");

    // Heading: `#`-run at the start of a line, consumed through the
    // line terminator so the following line starts fresh.
    if at_line_start && first == '#' {
        let level = rest.chars().take_while(|&c| c == '#').count();
        let line_end = rest
            .find('\n')
            .map(|i| i + 1)
            .unwrap_or(rest.len());
        return Segment {
            kind: SegmentKind::Heading,
            text: rest[..line_end].to_string(),
            level: Some(level.min(u8::MAX as usize) as u8),
        };
    }

    // Verse marker: digit run immediately followed by a period, with any
    // trailing spaces/tabs absorbed. A digit run without the period falls
    // through to the single-char Unknown rule.
    if first.is_ascii_digit() {
        let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
        if rest[digits..].starts_with('.') {
            let mut end = digits + 1;
            end += rest[end..]
                .chars()
                .take_while(|&c| c == ' ' || c == '\t')
                .count();
            return Segment {
                kind: SegmentKind::VerseMarker,
                text: rest[..end].to_string(),
                level: None,
            };
        }
    }

    // Newline: one line-terminator character per segment, so hint mode
    // can scan for line boundaries.
    if first == '\n' || first == '\r' {
        return Segment {
            kind: SegmentKind::Newline,
            text: first.to_string(),
            level: None,
        };
    }

    // Word: letter run, allowing a single apostrophe or hyphen between
    // letter runs ("don't", "well-known"), absorbing trailing spaces/tabs
    // so a word and its boundary stay one segment.
    if first.is_alphabetic() {
        let mut end = word_end(rest);
        end += rest[end..]
            .chars()
            .take_while(|&c| c == ' ' || c == '\t')
            .map(|c| c.len_utf8())
            .sum::<usize>();
        return Segment {
            kind: SegmentKind::Word,
            text: rest[..end].to_string(),
            level: None,
        };
    }

    // Whitespace: space/tab run not already absorbed by a word.
    if first == ' ' || first == '\t' {
        let end = rest
            .chars()
            .take_while(|&c| c == ' ' || c == '\t')
            .count();
        return Segment {
            kind: SegmentKind::Whitespace,
            text: rest[..end].to_string(),
            level: None,
        };
    }

    // Punctuation: run of characters that are neither alphanumeric nor
    // whitespace.
    if !first.is_alphanumeric() && !first.is_whitespace() {
        let end = rest
            .chars()
            .take_while(|c| !c.is_alphanumeric() && !c.is_whitespace())
            .map(|c| c.len_utf8())
            .sum::<usize>();
        return Segment {
            kind: SegmentKind::Punctuation,
            text: rest[..end].to_string(),
            level: None,
        };
    }

    // Fallback: exactly one character, guarantees forward progress.
    Segment {
        kind: SegmentKind::Unknown,
        text: first.to_string(),
        level: None,
    }
}

/// Byte offset just past the word starting at the beginning of `rest`.
fn word_end(rest: &str) -> usize {
    let mut end = 0;
    let mut chars = rest.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if c.is_alphabetic() {
            end = i + c.len_utf8();
        } else if (c == '\'' || c == '-') && end == i {
            // A joiner is only part of the word when sandwiched between
            // letter runs.
            match chars.peek() {
                Some((_, next)) if next.is_alphabetic() => continue,
                _ => break,
            }
        } else {
            break;
        }
    }

    end
}

/// Reassemble the original passage from its segments. Inverse of
/// [`tokenize`] by the losslessness invariant.
pub fn reassemble(segments: &[Segment]) -> String {
    segments.iter().map(|s| s.text.as_str()).join("")
}
