//! Bounded output view with its own "scrolled to bottom" state.

use crate::render::{HexRow, LineId, TextLine};
use std::collections::VecDeque;

/// Something a pane can hold, keyed by its renderer id.
pub trait PaneItem {
    fn line_id(&self) -> LineId;
}

impl PaneItem for TextLine {
    fn line_id(&self) -> LineId {
        self.id
    }
}

impl PaneItem for HexRow {
    fn line_id(&self) -> LineId {
        self.id
    }
}

/// One output view.
///
/// `scroll_offset` counts lines from the bottom. Zero means the view follows
/// new output; otherwise appended lines push the offset up so the visible
/// window stays put.
#[derive(Debug)]
pub struct OutputPane<T> {
    items: VecDeque<T>,
    capacity: usize,
    scroll_offset: usize,
}

impl<T: PaneItem> OutputPane<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::new(),
            capacity: capacity.max(1),
            scroll_offset: 0,
        }
    }

    /// Replace the item with the same id, or append it.
    pub fn upsert(&mut self, item: T) {
        let id = item.line_id();
        if let Some(pos) = self.items.iter().rposition(|i| i.line_id() == id) {
            self.items[pos] = item;
            return;
        }

        self.items.push_back(item);
        if self.items.len() > self.capacity {
            self.items.pop_front();
        }
        if self.scroll_offset > 0 {
            self.scroll_offset += 1;
        }
        self.clamp();
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.scroll_offset = 0;
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_at_bottom(&self) -> bool {
        self.scroll_offset == 0
    }

    pub fn scroll_offset(&self) -> usize {
        self.scroll_offset
    }

    pub fn scroll_up(&mut self, lines: usize) {
        self.scroll_offset = self.scroll_offset.saturating_add(lines);
        self.clamp();
    }

    pub fn scroll_down(&mut self, lines: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(lines);
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll_offset = 0;
    }

    /// The last `height` items above the scroll offset, oldest first.
    pub fn visible(&self, height: usize) -> impl Iterator<Item = &T> {
        let end = self.items.len().saturating_sub(self.scroll_offset);
        let start = end.saturating_sub(height);
        self.items.range(start..end)
    }

    fn clamp(&mut self) {
        let max = self.items.len().saturating_sub(1);
        if self.scroll_offset > max {
            self.scroll_offset = max;
        }
    }
}
