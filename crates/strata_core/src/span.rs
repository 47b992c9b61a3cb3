//! Source spans and line/column mapping.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A span in source text, represented as byte offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Span {
    /// Start byte offset (inclusive).
    pub start: u32,
    /// End byte offset (exclusive).
    pub end: u32,
}

impl Span {
    /// Creates a new span.
    #[must_use]
    #[inline]
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Creates an empty span at a position.
    #[must_use]
    #[inline]
    pub const fn empty(pos: u32) -> Self {
        Self {
            start: pos,
            end: pos,
        }
    }

    #[must_use]
    #[inline]
    pub const fn len(&self) -> u32 {
        self.end - self.start
    }

    #[must_use]
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Returns a span that covers both spans.
    #[must_use]
    #[inline]
    pub fn merge(self, other: Self) -> Self {
        Self {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl From<Span> for std::ops::Range<usize> {
    fn from(span: Span) -> Self {
        span.start as usize..span.end as usize
    }
}

impl From<Span> for miette::SourceSpan {
    fn from(span: Span) -> Self {
        miette::SourceSpan::new(
            miette::SourceOffset::from(span.start as usize),
            (span.end - span.start) as usize,
        )
    }
}

/// A 1-based line/column pair, as reported in GraphQL error `locations`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

/// Maps byte offsets of one source text to [`Location`]s.
///
/// Line starts are computed once; lookups are a binary search.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<u32>,
    len: u32,
}

impl LineIndex {
    /// Indexes the line starts of `source`.
    #[must_use]
    pub fn new(source: &str) -> Self {
        let bytes = source.as_bytes();
        let mut line_starts = vec![0];
        let mut offset = 0;
        while let Some(pos) = memchr::memchr(b'\n', &bytes[offset..]) {
            offset += pos + 1;
            line_starts.push(offset as u32);
        }
        Self {
            line_starts,
            len: bytes.len() as u32,
        }
    }

    /// Returns the location of a byte offset. Offsets past the end clamp to
    /// the end of the source.
    #[must_use]
    pub fn location(&self, offset: u32) -> Location {
        let offset = offset.min(self.len);
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        Location {
            line: line as u32 + 1,
            column: offset - self.line_starts[line] + 1,
        }
    }

    /// Returns the location where `span` starts.
    #[must_use]
    pub fn span_location(&self, span: Span) -> Location {
        self.location(span.start)
    }

    #[must_use]
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_merge() {
        let merged = Span::new(10, 20).merge(Span::new(15, 30));
        assert_eq!(merged, Span::new(10, 30));
        assert_eq!(merged.len(), 20);
    }

    #[test]
    fn test_line_index_locations() {
        let index = LineIndex::new("query {\n  users {\n    id\n  }\n}");
        assert_eq!(index.line_count(), 5);
        assert_eq!(index.location(0), Location { line: 1, column: 1 });
        // `users` starts after two spaces on line 2
        assert_eq!(index.location(10), Location { line: 2, column: 3 });
        assert_eq!(index.location(8), Location { line: 2, column: 1 });
    }

    #[test]
    fn test_line_index_clamps_past_end() {
        let index = LineIndex::new("ab");
        assert_eq!(index.location(99), Location { line: 1, column: 3 });
    }
}
