//! Half-open byte ranges.

use serde::{Deserialize, Serialize};

/// A byte range `[start, end)` within a media object.
///
/// `end` of `None` means "through the end of the object".
///
/// # Examples
///
/// ```
/// use mediastore_core::ByteRange;
///
/// let range = ByteRange::new(2, Some(6));
/// assert_eq!(range.len_within(10), 4);
/// assert_eq!(ByteRange::from_start(8).len_within(10), 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ByteRange {
    /// First byte included
    pub start: u64,
    /// First byte excluded, if bounded
    pub end: Option<u64>,
}

impl ByteRange {
    /// Create a range.
    pub fn new(start: u64, end: Option<u64>) -> Self {
        Self { start, end }
    }

    /// A range from `start` to the end of the object.
    pub fn from_start(start: u64) -> Self {
        Self { start, end: None }
    }

    /// True if the range is well formed (`start <= end`).
    pub fn is_valid(&self) -> bool {
        self.end.is_none_or(|end| self.start <= end)
    }

    /// End offset clamped to an object of `size` bytes.
    pub fn end_within(&self, size: u64) -> u64 {
        self.end.map_or(size, |end| end.min(size))
    }

    /// Number of bytes this range selects from an object of `size` bytes.
    pub fn len_within(&self, size: u64) -> u64 {
        self.end_within(size).saturating_sub(self.start)
    }

    /// Number of bytes the range selects, if bounded.
    pub fn len(&self) -> Option<u64> {
        self.end.map(|end| end.saturating_sub(self.start))
    }

    /// True if the range is bounded and selects nothing.
    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }
}

impl std::fmt::Display for ByteRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.end {
            Some(end) => write!(f, "{}-{}", self.start, end),
            None => write!(f, "{}-", self.start),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_to_object_size() {
        let range = ByteRange::new(4, Some(100));
        assert_eq!(range.end_within(10), 10);
        assert_eq!(range.len_within(10), 6);
    }

    #[test]
    fn start_past_end_selects_nothing() {
        assert_eq!(ByteRange::from_start(20).len_within(10), 0);
    }

    #[test]
    fn inverted_range_is_invalid() {
        assert!(!ByteRange::new(5, Some(2)).is_valid());
        assert!(ByteRange::new(5, Some(5)).is_valid());
        assert!(ByteRange::new(5, Some(5)).is_empty());
    }

    #[test]
    fn display_matches_header_form() {
        assert_eq!(ByteRange::new(0, Some(10)).to_string(), "0-10");
        assert_eq!(ByteRange::from_start(7).to_string(), "7-");
    }
}
