//! Hex row renderer.
//!
//! Raw bytes are grouped into rows of a fixed width. A full row is finalized
//! straight away; the next row is only opened when another byte arrives.
//! Outgoing bytes never share a row with incoming ones.

use super::{Direction, LineId, Scrollback, Touched, DEFAULT_ROW_WIDTH, DEFAULT_SCROLLBACK_LINES};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt::Write as _;

/// One row of the hex view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HexRow {
    pub id: LineId,
    pub direction: Direction,
    pub bytes: Vec<u8>,
    pub finalized: bool,
    pub timestamp: DateTime<Local>,
}

impl HexRow {
    fn new(id: LineId, direction: Direction, width: usize) -> Self {
        Self {
            id,
            direction,
            bytes: Vec::with_capacity(width),
            finalized: false,
            timestamp: Local::now(),
        }
    }

    /// Lowercase hex pairs separated by single spaces, e.g. `0d 0a ff`.
    pub fn hex(&self) -> String {
        let mut out = String::with_capacity(self.bytes.len() * 3);
        for (i, byte) in self.bytes.iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            let _ = write!(out, "{byte:02x}");
        }
        out
    }

    /// Printable ASCII with `.` for everything else.
    pub fn ascii(&self) -> String {
        self.bytes
            .iter()
            .map(|&b| {
                if b.is_ascii_graphic() || b == b' ' {
                    b as char
                } else {
                    '.'
                }
            })
            .collect()
    }
}

#[derive(Debug)]
pub struct BinaryRenderer {
    width: usize,
    scrollback: Scrollback<HexRow>,
    current: Option<HexRow>,
    next_id: u64,
    touched: Touched<HexRow>,
}

impl Default for BinaryRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_ROW_WIDTH, DEFAULT_SCROLLBACK_LINES)
    }
}

impl BinaryRenderer {
    pub fn new(width: usize, scrollback_lines: usize) -> Self {
        Self {
            width: width.max(1),
            scrollback: Scrollback::new(scrollback_lines),
            current: None,
            next_id: 0,
            touched: Touched::default(),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Render received bytes.
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.push_byte(byte, Direction::Incoming);
        }
    }

    /// Render a group of sent bytes on rows of their own.
    pub fn push_outgoing(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        self.finalize_current();
        for &byte in bytes {
            self.push_byte(byte, Direction::Outgoing);
        }
        self.finalize_current();
    }

    /// Finalize the partial row at end of stream.
    pub fn finish(&mut self) {
        self.finalize_current();
    }

    pub fn clear(&mut self) {
        self.scrollback.clear();
        self.current = None;
        self.touched.clear();
    }

    /// Snapshots of rows changed since the last call, oldest first.
    pub fn take_updates(&mut self) -> Vec<HexRow> {
        let (current, scrollback) = (&self.current, &self.scrollback);
        self.touched.take(|id| {
            current
                .iter()
                .chain(scrollback.iter().rev())
                .find(|row| row.id == id)
                .cloned()
        })
    }

    pub fn rows(&self) -> impl Iterator<Item = &HexRow> {
        self.scrollback.iter().chain(self.current.as_ref())
    }

    fn push_byte(&mut self, byte: u8, direction: Direction) {
        if self
            .current
            .as_ref()
            .is_some_and(|row| row.direction != direction)
        {
            self.finalize_current();
        }

        if self.current.is_none() {
            let id = LineId(self.next_id);
            self.next_id += 1;
            self.current = Some(HexRow::new(id, direction, self.width));
        }
        let Some(row) = self.current.as_mut() else {
            return;
        };
        row.bytes.push(byte);
        let full = row.bytes.len() >= self.width;
        let id = row.id;
        self.touched.mark(id);

        if full {
            self.finalize_current();
        }
    }

    fn finalize_current(&mut self) {
        if let Some(mut row) = self.current.take() {
            row.finalized = true;
            self.touched.mark(row.id);
            if let Some(evicted) = self.scrollback.push(row) {
                self.touched.evict(evicted.id, evicted);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn hex_rows(renderer: &BinaryRenderer) -> Vec<String> {
        renderer.rows().map(HexRow::hex).collect()
    }

    #[test]
    fn test_ten_bytes_make_two_rows() {
        let mut renderer = BinaryRenderer::default();
        renderer.push_bytes(&[0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
        let rows: Vec<_> = renderer.rows().collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].bytes.len(), 8);
        assert!(rows[0].finalized);
        assert_eq!(rows[1].bytes.len(), 2);
        assert!(!rows[1].finalized);
    }

    #[test]
    fn test_exact_width_is_one_row() {
        let mut renderer = BinaryRenderer::default();
        renderer.push_bytes(b"12345678");
        assert_eq!(renderer.rows().count(), 1);
    }

    #[test]
    fn test_hex_formatting() {
        let mut renderer = BinaryRenderer::new(4, 10);
        renderer.push_bytes(&[0x0d, 0x0a, 0xff, 0x41, 0x00]);
        assert_eq!(hex_rows(&renderer), vec!["0d 0a ff 41", "00"]);
        assert_eq!(renderer.rows().next().unwrap().ascii(), "...A");
    }

    #[test]
    fn test_outgoing_never_shares_a_row() {
        let mut renderer = BinaryRenderer::default();
        renderer.push_bytes(&[1, 2]);
        renderer.push_outgoing(&[0xaa, 0xbb]);
        renderer.push_bytes(&[3]);

        let rows: Vec<_> = renderer
            .rows()
            .map(|r| (r.direction, r.hex()))
            .collect();
        assert_eq!(
            rows,
            vec![
                (Direction::Incoming, "01 02".to_string()),
                (Direction::Outgoing, "aa bb".to_string()),
                (Direction::Incoming, "03".to_string()),
            ]
        );
    }

    #[test]
    fn test_long_outgoing_wraps() {
        let mut renderer = BinaryRenderer::new(2, 10);
        renderer.push_outgoing(&[1, 2, 3]);
        assert_eq!(hex_rows(&renderer), vec!["01 02", "03"]);
        assert!(renderer.rows().all(|r| r.finalized));
    }

    #[test]
    fn test_updates_are_upserts() {
        let mut renderer = BinaryRenderer::new(4, 10);
        renderer.push_bytes(&[1, 2]);
        let first = renderer.take_updates();
        assert_eq!(first.len(), 1);

        renderer.push_bytes(&[3, 4, 5]);
        let second = renderer.take_updates();
        assert_eq!(second.len(), 2);
        assert_eq!(second[0].id, first[0].id);
        assert_eq!(second[0].hex(), "01 02 03 04");
        assert!(second[0].finalized);
        assert_eq!(second[1].hex(), "05");
    }

    #[test]
    fn test_updates_survive_eviction_within_one_chunk() {
        let mut renderer = BinaryRenderer::new(2, 2);
        renderer.push_bytes(&[1, 2, 3, 4, 5, 6, 7, 8, 9]);
        assert_eq!(hex_rows(&renderer), vec!["05 06", "07 08", "09"]);

        let updates = renderer.take_updates();
        let reported: Vec<_> = updates.iter().map(HexRow::hex).collect();
        assert_eq!(reported, vec!["01 02", "03 04", "05 06", "07 08", "09"]);
        assert!(updates[..4].iter().all(|row| row.finalized));
        assert!(!updates[4].finalized);
    }

    #[test]
    fn test_clear() {
        let mut renderer = BinaryRenderer::default();
        renderer.push_bytes(b"abc");
        renderer.clear();
        assert_eq!(renderer.rows().count(), 0);
        assert!(renderer.take_updates().is_empty());
    }
}
