//! Line renderers for the two views of the byte stream.
//!
//! - [`text::TextRenderer`] turns decoded characters into display lines,
//!   collapsing CR/LF pairs and tagging each finished line with a severity.
//! - [`binary::BinaryRenderer`] groups raw bytes into fixed-width hex rows.
//!
//! Both keep a bounded scroll-back and report the lines they touched since the
//! last call to `take_updates`, so a UI can upsert by [`LineId`].

pub mod binary;
pub mod severity;
pub mod text;

pub use binary::{BinaryRenderer, HexRow};
pub use severity::{Severity, SeverityKeywords, SeverityPolicy};
pub use text::{Segment, TextLine, TextRenderer};

use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;

/// Finalized lines kept per renderer unless configured otherwise.
pub const DEFAULT_SCROLLBACK_LINES: usize = 5000;

/// Bytes per hex row unless configured otherwise.
pub const DEFAULT_ROW_WIDTH: usize = 8;

/// Characters a text line may hold before it is wrapped.
pub const DEFAULT_MAX_LINE_CHARS: usize = 4096;

/// Identifies a line within one renderer. Ids only ever grow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct LineId(pub u64);

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which way the data travelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Incoming,
    Outgoing,
}

/// Bounded history of finalized lines. The oldest line is evicted first.
#[derive(Debug, Clone)]
pub struct Scrollback<T> {
    lines: VecDeque<T>,
    capacity: usize,
}

impl<T> Scrollback<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            lines: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Append a line, returning the evicted one when full.
    pub fn push(&mut self, line: T) -> Option<T> {
        let evicted = if self.lines.len() == self.capacity {
            self.lines.pop_front()
        } else {
            None
        };
        self.lines.push_back(line);
        evicted
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> {
        self.lines.iter()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

/// Ids touched since the last report, in first-touch order.
///
/// A touched line that leaves the scroll-back before it is reported is held
/// here until the next report, so its last state is never lost.
#[derive(Debug)]
pub(crate) struct Touched<T> {
    ids: Vec<LineId>,
    evicted: Vec<(LineId, T)>,
}

impl<T> Default for Touched<T> {
    fn default() -> Self {
        Self {
            ids: Vec::new(),
            evicted: Vec::new(),
        }
    }
}

impl<T> Touched<T> {
    pub(crate) fn mark(&mut self, id: LineId) {
        if self.ids.last() != Some(&id) && !self.ids.contains(&id) {
            self.ids.push(id);
        }
    }

    /// Hand over a line the scroll-back just dropped. Kept only if it has
    /// not been reported yet.
    pub(crate) fn evict(&mut self, id: LineId, line: T) {
        if self.ids.contains(&id) {
            self.evicted.push((id, line));
        }
    }

    /// Drain the report. `lookup` resolves ids of lines still held by the
    /// renderer; evicted lines come from the held snapshots.
    pub(crate) fn take(&mut self, mut lookup: impl FnMut(LineId) -> Option<T>) -> Vec<T> {
        let mut evicted = std::mem::take(&mut self.evicted);
        std::mem::take(&mut self.ids)
            .into_iter()
            .filter_map(|id| match evicted.iter().position(|(held, _)| *held == id) {
                Some(at) => Some(evicted.swap_remove(at).1),
                None => lookup(id),
            })
            .collect()
    }

    pub(crate) fn clear(&mut self) {
        self.ids.clear();
        self.evicted.clear();
    }
}
