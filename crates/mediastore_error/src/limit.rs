//! Marker carried inside `std::io::Error` by size-limited streams.

/// A byte stream produced more bytes than its limit allows.
///
/// Stream adapters yield `std::io::Error::other(StreamLimitExceeded { .. })`
/// so that the condition survives any layer that only speaks `io::Error`;
/// converting the I/O error into a [`crate::MediaStoreError`] restores
/// [`crate::MediaErrorKind::TooLarge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("stream exceeded limit of {} bytes", limit)]
pub struct StreamLimitExceeded {
    /// Configured maximum
    pub limit: u64,
}

impl StreamLimitExceeded {
    /// Build the `io::Error` a limiter yields.
    pub fn into_io(self) -> std::io::Error {
        std::io::Error::other(self)
    }

    /// Recover the marker from an `io::Error`, if present.
    pub fn from_io(err: &std::io::Error) -> Option<Self> {
        err.get_ref()
            .and_then(|inner| inner.downcast_ref::<StreamLimitExceeded>())
            .copied()
    }
}
