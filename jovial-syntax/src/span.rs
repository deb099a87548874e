//! Source positions and ranges.
//!
//! Every token, tree node, symbol and diagnostic carries a [`Span`]: a
//! half-open byte range plus the line/column pair of each endpoint. Columns
//! count bytes from the start of the line, matching what LSP clients send
//! back for positional queries.

use std::ops::Range;

use serde::Serialize;

/// A line/column pair. Both are zero-based; `column` counts bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// A half-open source range with resolved endpoint positions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Span {
    /// Byte offsets into the source text, `start..end`.
    pub offsets: Range<usize>,
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn new(offsets: Range<usize>, start: Position, end: Position) -> Self {
        Self {
            offsets,
            start,
            end,
        }
    }

    pub fn empty() -> Self {
        Self::new(0..0, Position::new(0, 0), Position::new(0, 0))
    }

    /// True if `position` falls within the span (start inclusive, end
    /// exclusive).
    pub fn contains(&self, position: Position) -> bool {
        self.start <= position && position < self.end
    }

    pub fn contains_offset(&self, offset: usize) -> bool {
        self.offsets.start <= offset && offset < self.offsets.end
    }

    /// The smallest span covering both `self` and `other`.
    pub fn merge(&self, other: &Span) -> Span {
        let (start, start_pos) = if self.offsets.start <= other.offsets.start {
            (self.offsets.start, self.start)
        } else {
            (other.offsets.start, other.start)
        };
        let (end, end_pos) = if self.offsets.end >= other.offsets.end {
            (self.offsets.end, self.end)
        } else {
            (other.offsets.end, other.end)
        };
        Span::new(start..end, start_pos, end_pos)
    }
}

/// Maps byte offsets to line/column positions and back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIndex {
    /// Byte offset of the first character of each line.
    line_starts: Vec<usize>,
    len: usize,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        for (idx, ch) in text.char_indices() {
            if ch == '\n' {
                line_starts.push(idx + ch.len_utf8());
            }
        }
        Self {
            line_starts,
            len: text.len(),
        }
    }

    pub fn position(&self, offset: usize) -> Position {
        let offset = offset.min(self.len);
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        Position::new(line, offset - self.line_starts[line])
    }

    /// Byte offset for `position`, clamped to the end of the text. Positions
    /// past the last line map to the end of the text.
    pub fn offset(&self, position: Position) -> usize {
        match self.line_starts.get(position.line) {
            Some(start) => {
                let line_end = self
                    .line_starts
                    .get(position.line + 1)
                    .copied()
                    .unwrap_or(self.len);
                (start + position.column).min(line_end)
            }
            None => self.len,
        }
    }
}
