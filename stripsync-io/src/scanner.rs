//! Line scanner for JSON-lines files.
//!
//! Identifies the byte range of every non-blank line so that records can be
//! parsed individually and in any order.

use std::ops::Range;

/// A non-blank line of a JSON-lines file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineSpan {
    /// Start offset in bytes (inclusive).
    pub start_offset: usize,
    /// End offset in bytes (exclusive), without the line terminator.
    pub end_offset: usize,
    /// 1-based line number.
    pub line: usize,
}

impl LineSpan {
    /// Byte range of the line contents.
    #[must_use]
    pub fn range(&self) -> Range<usize> {
        self.start_offset..self.end_offset
    }
}

/// Scanner for discovering records in JSON-lines data.
pub struct LineScanner;

impl LineScanner {
    /// Scans the provided data for non-blank lines.
    ///
    /// Both `\n` and `\r\n` terminators are accepted; a final line without a
    /// terminator is included.
    #[must_use]
    pub fn scan_lines(data: &[u8]) -> Vec<LineSpan> {
        let mut lines = Vec::new();
        let mut start = 0;

        for (line_index, chunk) in data.split(|&byte| byte == b'\n').enumerate() {
            let mut end = start + chunk.len();
            let next_start = end + 1;
            if chunk.last() == Some(&b'\r') {
                end -= 1;
            }
            if !data[start..end].iter().all(u8::is_ascii_whitespace) {
                lines.push(LineSpan {
                    start_offset: start,
                    end_offset: end,
                    line: line_index + 1,
                });
            }
            start = next_start;
        }

        lines
    }
}
