//! Edit descriptors and the mutation -> edit translation
//!
//! An [`Edit`] describes one contiguous replacement in both byte offsets and
//! (row, column) positions, which is what the parse tree needs to reuse
//! unchanged subtrees during an incremental reparse.

use std::ops::Range;

use ropey::Rope;
use serde::{Deserialize, Serialize};
use tree_sitter::{InputEdit, Point};

use super::line_index::LineIndex;
use crate::error::EditError;

/// Row and byte column
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub row: usize,
    pub column: usize,
}

impl Position {
    pub fn new(row: usize, column: usize) -> Self {
        Self { row, column }
    }
}

impl From<Position> for Point {
    fn from(p: Position) -> Self {
        Point {
            row: p.row,
            column: p.column,
        }
    }
}

/// A raw text mutation: replace `range` (bytes) of the old text with `text`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextMutation {
    pub range: Range<usize>,
    pub text: String,
}

impl TextMutation {
    pub fn insert(at: usize, text: impl Into<String>) -> Self {
        Self {
            range: at..at,
            text: text.into(),
        }
    }

    pub fn delete(range: Range<usize>) -> Self {
        Self {
            range,
            text: String::new(),
        }
    }

    pub fn replace(range: Range<usize>, text: impl Into<String>) -> Self {
        Self {
            range,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edit {
    pub start_index: usize,
    pub old_end_index: usize,
    pub new_end_index: usize,
    pub start_position: Position,
    pub old_end_position: Position,
    pub new_end_position: Position,
}

impl Edit {
    /// Build an edit from byte offsets, deriving positions from both texts
    pub fn from_offsets(
        old: &str,
        new: &str,
        start_index: usize,
        old_end_index: usize,
        new_end_index: usize,
    ) -> Self {
        let old_index = LineIndex::new(old.as_bytes());
        let new_index = LineIndex::new(new.as_bytes());
        Self {
            start_index,
            old_end_index,
            new_end_index,
            start_position: old_index.position_of(start_index),
            old_end_position: old_index.position_of(old_end_index),
            new_end_position: new_index.position_of(new_end_index),
        }
    }

    /// Check that this edit turns `old` into `new` exactly.
    ///
    /// Offsets must be ordered, in bounds and on char boundaries; positions
    /// must agree with each text's line map; and everything outside the
    /// edited range must be unchanged.
    pub fn validate(&self, old: &str, new: &str) -> Result<(), EditError> {
        self.check_offsets(old.len(), new.len())?;
        for offset in [self.start_index, self.old_end_index] {
            if !old.is_char_boundary(offset) {
                return Err(EditError::NotCharBoundary { offset });
            }
        }
        if !new.is_char_boundary(self.new_end_index) {
            return Err(EditError::NotCharBoundary {
                offset: self.new_end_index,
            });
        }

        let old_tail = &old.as_bytes()[self.old_end_index..];
        let new_tail = &new.as_bytes()[self.new_end_index..];
        if old.as_bytes()[..self.start_index] != new.as_bytes()[..self.start_index]
            || old_tail != new_tail
        {
            return Err(EditError::ContentMismatch);
        }

        let old_index = LineIndex::new(old.as_bytes());
        let new_index = LineIndex::new(new.as_bytes());
        check_position(
            "start",
            old_index.position_of(self.start_index),
            self.start_position,
        )?;
        check_position(
            "old end",
            old_index.position_of(self.old_end_index),
            self.old_end_position,
        )?;
        check_position(
            "new end",
            new_index.position_of(self.new_end_index),
            self.new_end_position,
        )?;
        Ok(())
    }
}

impl Edit {
    /// Build an edit for a rope whose replacement is already spliced into
    /// `new`. Offsets must be in bounds and on char boundaries.
    ///
    /// Only the replaced span of `old` is read, so the cost does not grow
    /// with the size of the rope.
    pub fn from_rope(
        old: &Rope,
        new: &str,
        start_index: usize,
        old_end_index: usize,
        new_end_index: usize,
    ) -> Self {
        let [start_position, old_end_position, new_end_position] =
            span_positions(old, new, start_index, old_end_index, new_end_index);
        Self {
            start_index,
            old_end_index,
            new_end_index,
            start_position,
            old_end_position,
            new_end_position,
        }
    }

    /// Same checks as [`Edit::validate`], with the old text held in a rope.
    /// The rope is compared slice by slice instead of being flattened.
    pub fn validate_rope(&self, old: &Rope, new: &str) -> Result<(), EditError> {
        self.check_offsets(old.len_bytes(), new.len())?;
        for offset in [self.start_index, self.old_end_index] {
            if !is_rope_char_boundary(old, offset) {
                return Err(EditError::NotCharBoundary { offset });
            }
        }
        if !new.is_char_boundary(self.new_end_index) {
            return Err(EditError::NotCharBoundary {
                offset: self.new_end_index,
            });
        }

        if !new.is_char_boundary(self.start_index)
            || old.byte_slice(..self.start_index) != &new[..self.start_index]
            || old.byte_slice(self.old_end_index..) != &new[self.new_end_index..]
        {
            return Err(EditError::ContentMismatch);
        }

        let [start, old_end, new_end] = span_positions(
            old,
            new,
            self.start_index,
            self.old_end_index,
            self.new_end_index,
        );
        check_position("start", start, self.start_position)?;
        check_position("old end", old_end, self.old_end_position)?;
        check_position("new end", new_end, self.new_end_position)?;
        Ok(())
    }

    fn check_offsets(&self, old_len: usize, new_len: usize) -> Result<(), EditError> {
        if self.start_index > self.old_end_index {
            return Err(EditError::Inverted {
                start: self.start_index,
                end: self.old_end_index,
            });
        }
        if self.start_index > self.new_end_index {
            return Err(EditError::Inverted {
                start: self.start_index,
                end: self.new_end_index,
            });
        }
        if self.old_end_index > old_len {
            return Err(EditError::OutOfBounds {
                offset: self.old_end_index,
                len: old_len,
            });
        }
        if self.new_end_index > new_len {
            return Err(EditError::OutOfBounds {
                offset: self.new_end_index,
                len: new_len,
            });
        }
        Ok(())
    }
}

fn is_rope_char_boundary(rope: &Rope, byte: usize) -> bool {
    rope.char_to_byte(rope.byte_to_char(byte)) == byte
}

/// Start, old end and new end positions of an edit.
///
/// `old` and `new` share every byte before `start`, so both sides are
/// measured from the byte just before it (position taken from `new`'s
/// prefix). Each window runs one byte past its end offset so a CR there
/// still pairs with a following LF.
fn span_positions(
    old: &Rope,
    new: &str,
    start: usize,
    old_end: usize,
    new_end: usize,
) -> [Position; 3] {
    let anchor = start.saturating_sub(1);
    let anchor_position = LineIndex::new(&new.as_bytes()[..start]).position_of(anchor);

    let old_window: Vec<u8> = old
        .bytes_at(anchor)
        .take((old_end + 1).min(old.len_bytes()) - anchor)
        .collect();
    let new_window = &new.as_bytes()[anchor..(new_end + 1).min(new.len())];

    let old_index = LineIndex::new(&old_window);
    let new_index = LineIndex::new(new_window);
    let place = |index: &LineIndex, byte: usize| {
        let local = index.position_of(byte - anchor);
        if local.row == 0 {
            Position::new(anchor_position.row, anchor_position.column + local.column)
        } else {
            Position::new(anchor_position.row + local.row, local.column)
        }
    };

    [
        place(&old_index, start),
        place(&old_index, old_end),
        place(&new_index, new_end),
    ]
}

fn check_position(
    which: &'static str,
    expected: Position,
    actual: Position,
) -> Result<(), EditError> {
    if expected == actual {
        Ok(())
    } else {
        Err(EditError::PositionMismatch {
            which,
            expected: (expected.row, expected.column),
            actual: (actual.row, actual.column),
        })
    }
}

/// Rows carry over unchanged. They count a lone CR as a line break while
/// the parse tree counts only LF, so on CR-only text the points differ from
/// the tree's own. Reuse is keyed on the byte offsets, which always agree,
/// so an incremental reparse still yields the same tree as a fresh one.
impl From<&Edit> for InputEdit {
    fn from(edit: &Edit) -> Self {
        InputEdit {
            start_byte: edit.start_index,
            old_end_byte: edit.old_end_index,
            new_end_byte: edit.new_end_index,
            start_position: edit.start_position.into(),
            old_end_position: edit.old_end_position.into(),
            new_end_position: edit.new_end_position.into(),
        }
    }
}

/// Apply `mutation` to `old`, returning the edit and the new text
pub fn translate(old: &str, mutation: &TextMutation) -> Result<(Edit, String), EditError> {
    let Range { start, end } = mutation.range.clone();
    if start > end {
        return Err(EditError::Inverted { start, end });
    }
    if end > old.len() {
        return Err(EditError::OutOfBounds {
            offset: end,
            len: old.len(),
        });
    }
    for offset in [start, end] {
        if !old.is_char_boundary(offset) {
            return Err(EditError::NotCharBoundary { offset });
        }
    }

    let mut new = String::with_capacity(old.len() - (end - start) + mutation.text.len());
    new.push_str(&old[..start]);
    new.push_str(&mutation.text);
    new.push_str(&old[end..]);

    let edit = Edit::from_offsets(old, &new, start, end, start + mutation.text.len());
    Ok((edit, new))
}

/// [`translate`] for text held in a rope
pub fn translate_rope(old: &Rope, mutation: &TextMutation) -> Result<(Edit, String), EditError> {
    let Range { start, end } = mutation.range.clone();
    if start > end {
        return Err(EditError::Inverted { start, end });
    }
    if end > old.len_bytes() {
        return Err(EditError::OutOfBounds {
            offset: end,
            len: old.len_bytes(),
        });
    }
    for offset in [start, end] {
        if !is_rope_char_boundary(old, offset) {
            return Err(EditError::NotCharBoundary { offset });
        }
    }

    let mut new = String::with_capacity(old.len_bytes() - (end - start) + mutation.text.len());
    old.byte_slice(..start).chunks().for_each(|chunk| new.push_str(chunk));
    new.push_str(&mutation.text);
    old.byte_slice(end..).chunks().for_each(|chunk| new.push_str(chunk));

    let edit = Edit::from_rope(old, &new, start, end, start + mutation.text.len());
    Ok((edit, new))
}

/// Compute an edit by diffing old and new text.
/// Returns None if the texts are identical.
pub fn diff(old: &str, new: &str) -> Option<Edit> {
    if old == new {
        return None;
    }

    let old_bytes = old.as_bytes();
    let new_bytes = new.as_bytes();

    // Common prefix, backed off to a char boundary in both texts
    let max_start = old_bytes.len().min(new_bytes.len());
    let mut start = old_bytes
        .iter()
        .zip(new_bytes)
        .take(max_start)
        .take_while(|(a, b)| a == b)
        .count();
    while !old.is_char_boundary(start) || !new.is_char_boundary(start) {
        start -= 1;
    }

    // Common suffix, not overlapping the prefix
    let mut old_end = old_bytes.len();
    let mut new_end = new_bytes.len();
    while old_end > start && new_end > start && old_bytes[old_end - 1] == new_bytes[new_end - 1] {
        old_end -= 1;
        new_end -= 1;
    }
    while !old.is_char_boundary(old_end) || !new.is_char_boundary(new_end) {
        old_end += 1;
        new_end += 1;
    }

    Some(Edit::from_offsets(old, new, start, old_end, new_end))
}
