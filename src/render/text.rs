//! Text line renderer.
//!
//! Decoded characters are fed one at a time through a small automaton with
//! one character of look-back:
//!
//! - CR LF collapses to a single line break.
//! - A bare CR still breaks the line (old Mac line endings, CR-terminated
//!   device output).
//! - LF breaks the line.
//!
//! A line is *finalized* when its break is detected, at which point its text
//! is classified by the [`SeverityPolicy`]. The break characters themselves
//! are still rendered into the line they end, as control segments. The next
//! line is only started when its first character arrives.
//!
//! A line that reaches the length limit without a break is finalized as is
//! and the stream continues on a new line.

use super::severity::{Severity, SeverityPolicy};
use super::{
    Direction, LineId, Scrollback, Touched, DEFAULT_MAX_LINE_CHARS, DEFAULT_SCROLLBACK_LINES,
};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

const CR: char = '\r';
const LF: char = '\n';
const REPLACEMENT: char = '\u{FFFD}';

const MNEMONICS: [&str; 32] = [
    "nul", "soh", "stx", "etx", "eot", "enq", "ack", "bel", "bs", "ht", "lf", "vt", "ff", "cr",
    "so", "si", "dle", "dc1", "dc2", "dc3", "dc4", "nak", "syn", "etb", "can", "em", "sub", "esc",
    "fs", "gs", "rs", "us",
];

/// Short name of a control code (`nul` ... `us`, `sp`, `del`).
pub fn control_mnemonic(code: u8) -> &'static str {
    match code {
        0x00..=0x1F => MNEMONICS[code as usize],
        0x20 => "sp",
        0x7F => "del",
        _ => "",
    }
}

/// Unicode control picture for a control code (U+2400 block).
pub fn control_picture(code: u8) -> char {
    match code {
        0x00..=0x20 => char::from_u32(0x2400 + code as u32).unwrap_or(REPLACEMENT),
        0x7F => '\u{2421}',
        _ => REPLACEMENT,
    }
}

fn is_control(c: char) -> bool {
    matches!(c as u32, 0x00..=0x20 | 0x7F)
}

/// One rendered piece of a line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Segment {
    /// Printable characters. Adjacent text is always merged.
    Text { text: String },
    /// A control character, shown only when non-printables are visible.
    Control { code: u8 },
    /// A character the decoder could not make sense of.
    DecodeError,
}

impl Segment {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn mnemonic(&self) -> Option<&'static str> {
        match self {
            Self::Control { code } => Some(control_mnemonic(*code)),
            _ => None,
        }
    }

    /// Append this segment as displayed text.
    pub fn render_into(&self, out: &mut String, show_non_printable: bool) {
        match self {
            Self::Text { text } => out.push_str(text),
            Self::Control { code } if show_non_printable => out.push(control_picture(*code)),
            Self::Control { code: b' ' } => out.push(' '),
            Self::Control { code: b'\t' } => out.push('\t'),
            Self::Control { .. } => {}
            Self::DecodeError => out.push(REPLACEMENT),
        }
    }
}

/// A rendered text line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextLine {
    pub id: LineId,
    pub direction: Direction,
    pub segments: Vec<Segment>,
    pub severity: Option<Severity>,
    pub finalized: bool,
    pub timestamp: DateTime<Local>,
}

impl TextLine {
    fn new(id: LineId, direction: Direction) -> Self {
        Self {
            id,
            direction,
            segments: Vec::new(),
            severity: None,
            finalized: false,
            timestamp: Local::now(),
        }
    }

    /// The line's text: literal characters, spaces, tabs and U+FFFD for
    /// decode errors. Other control characters are left out.
    pub fn text(&self) -> String {
        self.display(false)
    }

    pub fn display(&self, show_non_printable: bool) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            segment.render_into(&mut out, show_non_printable);
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    fn push_char(&mut self, c: char) {
        if c == REPLACEMENT {
            self.segments.push(Segment::DecodeError);
        } else if is_control(c) {
            self.segments.push(Segment::Control { code: c as u8 });
        } else if let Some(Segment::Text { text }) = self.segments.last_mut() {
            text.push(c);
        } else {
            self.segments.push(Segment::Text {
                text: c.to_string(),
            });
        }
    }
}

/// Stateful CR/LF line breaker with severity tagging.
#[derive(Debug)]
pub struct TextRenderer {
    policy: Arc<SeverityPolicy>,
    scrollback: Scrollback<TextLine>,
    current: TextLine,
    current_chars: usize,
    max_line_chars: usize,
    prev_was_cr: bool,
    next_is_new_line: bool,
    next_id: u64,
    touched: Touched<TextLine>,
}

impl Default for TextRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_SCROLLBACK_LINES, Arc::new(SeverityPolicy::default()))
    }
}

impl TextRenderer {
    pub fn new(scrollback_lines: usize, policy: Arc<SeverityPolicy>) -> Self {
        Self {
            policy,
            scrollback: Scrollback::new(scrollback_lines),
            current: TextLine::new(LineId(0), Direction::Incoming),
            current_chars: 0,
            max_line_chars: DEFAULT_MAX_LINE_CHARS,
            prev_was_cr: false,
            next_is_new_line: false,
            next_id: 1,
            touched: Touched::default(),
        }
    }

    /// Wrap lines after `max_line_chars` characters (at least one).
    pub fn with_max_line_chars(mut self, max_line_chars: usize) -> Self {
        self.max_line_chars = max_line_chars.max(1);
        self
    }

    /// Render received text.
    pub fn push_str(&mut self, text: &str) {
        for c in text.chars() {
            self.push_char(c, Direction::Incoming);
        }
    }

    /// Render text the user sent. It always gets lines of its own: a pending
    /// incoming line is finalized first, and the next received character
    /// starts a fresh line.
    pub fn push_outgoing(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }

        if self.current.is_empty() {
            self.current.direction = Direction::Outgoing;
        } else {
            self.finalize_current();
            self.start_new_line(Direction::Outgoing);
        }
        self.prev_was_cr = false;
        self.next_is_new_line = false;

        for c in text.chars() {
            self.push_char(c, Direction::Outgoing);
        }

        self.finalize_current();
        self.prev_was_cr = false;
        self.next_is_new_line = true;
    }

    /// Finalize the pending line at end of stream.
    pub fn finish(&mut self) {
        if !self.current.is_empty() {
            self.finalize_current();
        }
    }

    /// Drop every line and reset the automaton.
    pub fn clear(&mut self) {
        self.scrollback.clear();
        self.touched.clear();
        self.current = TextLine::new(self.allocate_id(), Direction::Incoming);
        self.current_chars = 0;
        self.prev_was_cr = false;
        self.next_is_new_line = false;
    }

    /// Snapshots of lines changed since the last call, oldest first.
    pub fn take_updates(&mut self) -> Vec<TextLine> {
        let (current, scrollback) = (&self.current, &self.scrollback);
        self.touched.take(|id| {
            if current.id == id {
                return Some(current.clone());
            }
            scrollback.iter().rev().find(|line| line.id == id).cloned()
        })
    }

    /// Every retained line, including the pending one if it has content.
    pub fn lines(&self) -> impl Iterator<Item = &TextLine> {
        let current = (!self.current.is_empty()).then_some(&self.current);
        self.scrollback.iter().chain(current)
    }

    pub fn current(&self) -> &TextLine {
        &self.current
    }

    pub fn scrollback_len(&self) -> usize {
        self.scrollback.len()
    }

    fn push_char(&mut self, c: char, direction: Direction) {
        let this_line_is_new = self.prev_was_cr && c != LF;
        let next_line_will_be_new = c == LF;

        if this_line_is_new || next_line_will_be_new {
            self.finalize_current();
        }
        if this_line_is_new || self.next_is_new_line {
            self.start_new_line(direction);
        } else if self.current_chars >= self.max_line_chars && c != CR && c != LF {
            self.start_new_line(direction);
        }

        self.next_is_new_line = next_line_will_be_new;
        self.prev_was_cr = c == CR;

        self.current.push_char(c);
        self.current_chars += 1;
        self.touched.mark(self.current.id);
    }

    fn finalize_current(&mut self) {
        if self.current.finalized {
            return;
        }
        self.current.finalized = true;
        self.current.severity = self.policy.classify(&self.current.text());
        self.touched.mark(self.current.id);
    }

    fn start_new_line(&mut self, direction: Direction) {
        if self.current.is_empty() {
            warn!(line = %self.current.id, "ignoring new line request on an empty line");
            self.current.direction = direction;
            return;
        }
        self.finalize_current();

        let next = TextLine::new(self.allocate_id(), direction);
        let previous = std::mem::replace(&mut self.current, next);
        self.current_chars = 0;
        if let Some(evicted) = self.scrollback.push(previous) {
            self.touched.evict(evicted.id, evicted);
        }
    }

    fn allocate_id(&mut self) -> LineId {
        let id = LineId(self.next_id);
        self.next_id += 1;
        id
    }
}
