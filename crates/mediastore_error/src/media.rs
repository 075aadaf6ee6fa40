//! Pipeline error types.

/// Failure conditions surfaced by the media pipelines.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum MediaErrorKind {
    /// No record exists, and remote fetching was disallowed or failed
    #[display("Media not found")]
    NotFound,
    /// Content exceeds the configured size policy
    #[display("Media too large")]
    TooLarge,
    /// Uploader is over one of their quotas
    #[display("Quota exceeded")]
    QuotaExceeded,
    /// Content or media ID is blocked by an administrator
    #[display("Media quarantined")]
    Quarantined,
    /// A two-phase upload targeted an ID that already has content
    #[display("Media already uploaded")]
    AlreadyUploaded,
    /// A two-phase upload was claimed by a user other than the reserver
    #[display("Reservation belongs to another user")]
    WrongUser,
    /// A two-phase upload reservation is missing or has expired
    #[display("Reservation expired")]
    Expired,
    /// Bounded wait for a pending two-phase upload ran out
    #[display("Media not yet uploaded")]
    NotYetUploaded,
    /// No decoder is able to handle the content type
    #[display("Unsupported media: {}", _0)]
    Unsupported(String),
    /// Source media is smaller than the requested thumbnail
    #[display("Media dimensions too small")]
    DimensionsTooSmall,
    /// The upload lock could not be acquired in time
    #[display("Timed out acquiring upload lock for {}", _0)]
    LockTimeout(String),
    /// Request parameters were rejected
    #[display("Bad request: {}", _0)]
    BadRequest(String),
    /// Anything not covered by the other kinds
    #[display("Internal error: {}", _0)]
    Internal(String),
}

/// Pipeline error with location tracking.
///
/// # Examples
///
/// ```
/// use mediastore_error::{MediaError, MediaErrorKind};
///
/// let err = MediaError::new(MediaErrorKind::QuotaExceeded);
/// assert!(format!("{}", err).contains("Quota exceeded"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Media Error: {} at line {} in {}", kind, line, file)]
pub struct MediaError {
    /// The kind of error that occurred
    pub kind: MediaErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl MediaError {
    /// Create a new pipeline error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: MediaErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Shorthand for an [`MediaErrorKind::Internal`] error.
    #[track_caller]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(MediaErrorKind::Internal(message.into()))
    }
}
