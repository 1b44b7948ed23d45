use std::ops::Range;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)] // Default for convenience
pub struct Span {
    pub start: usize, // Byte offset
    pub end: usize,   // Byte offset (exclusive)
}

impl Span {
    pub fn new(start: usize, end: usize) -> Span {
        Span { start, end }
    }

    /// A range ariadne can always label: never empty and never past the end of `source_len`.
    pub fn label_range(self, source_len: usize) -> Range<usize> {
        let end = self.end.min(source_len);
        let start = self.start.min(end);
        if start == end {
            start.saturating_sub(1)..end.max(1).min(source_len.max(1))
        } else {
            start..end
        }
    }
}
