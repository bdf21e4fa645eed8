//! Byte offset <-> (row, column) mapping built from scanned breaks

use std::ops::Range;

use unicode_width::UnicodeWidthStr;

use super::edit::Position;
use crate::scan::{self, BreakResult};

/// Line table for one text snapshot.
///
/// Rows follow the scanner's break rules, so a lone `\r` starts a new row
/// and `\r\n` counts once. Columns are byte offsets within the row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIndex {
    line_starts: Vec<usize>,
    /// End of each line's content, excluding its terminator
    line_ends: Vec<usize>,
    len: usize,
}

impl LineIndex {
    pub fn new(text: &[u8]) -> Self {
        Self::from_breaks(text, &scan::scan(text))
    }

    pub fn from_breaks(text: &[u8], breaks: &BreakResult) -> Self {
        let mut line_starts = Vec::with_capacity(breaks.len() + 1);
        let mut line_ends = Vec::with_capacity(breaks.len() + 1);
        let mut start = 0;

        for &brk in breaks {
            let end = if text[brk] == b'\n' && brk > start && text[brk - 1] == b'\r' {
                brk - 1
            } else {
                brk
            };
            line_starts.push(start);
            line_ends.push(end);
            start = brk + 1;
        }
        line_starts.push(start);
        line_ends.push(text.len());

        Self {
            line_starts,
            line_ends,
            len: text.len(),
        }
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    pub fn line_starts(&self) -> &[usize] {
        &self.line_starts
    }

    /// Total byte length of the indexed text
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Byte range of a line's content, without its terminator
    pub fn line_range(&self, row: usize) -> Option<Range<usize>> {
        Some(*self.line_starts.get(row)?..*self.line_ends.get(row)?)
    }

    /// Byte range covering rows `lines.start..lines.end`, terminators included,
    /// clamped to the text
    pub fn byte_range_for_lines(&self, lines: Range<usize>) -> Range<usize> {
        let start = self
            .line_starts
            .get(lines.start)
            .copied()
            .unwrap_or(self.len);
        let end = self.line_starts.get(lines.end).copied().unwrap_or(self.len);
        start..end.max(start)
    }

    /// Row containing `byte` (offsets past the end map to the last row)
    pub fn row_of(&self, byte: usize) -> usize {
        let byte = byte.min(self.len);
        self.line_starts.partition_point(|&s| s <= byte) - 1
    }

    pub fn position_of(&self, byte: usize) -> Position {
        let byte = byte.min(self.len);
        let row = self.row_of(byte);
        Position {
            row,
            column: byte - self.line_starts[row],
        }
    }

    /// Byte offset of a position, if it lies within its row
    pub fn byte_of(&self, position: Position) -> Option<usize> {
        let start = *self.line_starts.get(position.row)?;
        let next = self
            .line_starts
            .get(position.row + 1)
            .copied()
            .unwrap_or(self.len + 1);
        let byte = start + position.column;
        (byte < next).then_some(byte)
    }

    /// Display width of every line (wide CJK / emoji count as two cells)
    pub fn line_widths(&self, text: &str) -> Vec<usize> {
        self.line_starts
            .iter()
            .zip(&self.line_ends)
            .map(|(&start, &end)| text.get(start..end).map_or(0, UnicodeWidthStr::width))
            .collect()
    }
}
