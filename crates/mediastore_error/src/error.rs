//! Top-level error wrapper types.

use crate::{
    CacheError, ConfigError, DatabaseError, MediaError, MediaErrorKind, StorageError,
    StorageErrorKind, StreamLimitExceeded,
};

/// Caller-facing error taxonomy.
///
/// Transport layers map these onto status codes; the pipelines never
/// expose storage or database internals directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ErrorCategory {
    /// Requested media does not exist
    NotFound,
    /// Content exceeds size policy
    TooLarge,
    /// Uploader is over quota
    QuotaExceeded,
    /// Content or media ID is blocked
    Quarantined,
    /// Two-phase upload target already has content
    AlreadyUploaded,
    /// Two-phase upload claimed by the wrong user
    WrongUser,
    /// Two-phase upload reservation expired or missing
    Expired,
    /// Pending two-phase upload did not finish in time
    NotYetUploaded,
    /// Content type cannot be processed
    Unsupported,
    /// Source smaller than the requested thumbnail
    DimensionsTooSmall,
    /// Upload lock acquisition timed out
    LockTimeout,
    /// Request parameters rejected
    BadRequest,
    /// Everything else
    Internal,
}

impl From<&MediaErrorKind> for ErrorCategory {
    fn from(kind: &MediaErrorKind) -> Self {
        match kind {
            MediaErrorKind::NotFound => Self::NotFound,
            MediaErrorKind::TooLarge => Self::TooLarge,
            MediaErrorKind::QuotaExceeded => Self::QuotaExceeded,
            MediaErrorKind::Quarantined => Self::Quarantined,
            MediaErrorKind::AlreadyUploaded => Self::AlreadyUploaded,
            MediaErrorKind::WrongUser => Self::WrongUser,
            MediaErrorKind::Expired => Self::Expired,
            MediaErrorKind::NotYetUploaded => Self::NotYetUploaded,
            MediaErrorKind::Unsupported(_) => Self::Unsupported,
            MediaErrorKind::DimensionsTooSmall => Self::DimensionsTooSmall,
            MediaErrorKind::LockTimeout(_) => Self::LockTimeout,
            MediaErrorKind::BadRequest(_) => Self::BadRequest,
            MediaErrorKind::Internal(_) => Self::Internal,
        }
    }
}

/// Error kinds aggregated from every layer of the workspace.
///
/// # Examples
///
/// ```
/// use mediastore_error::{MediaStoreError, StorageError, StorageErrorKind};
///
/// let storage_err = StorageError::new(StorageErrorKind::Io("disk gone".into()));
/// let err: MediaStoreError = storage_err.into();
/// assert!(format!("{}", err).contains("Storage Error"));
/// ```
#[derive(Debug, Clone, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum MediaStoreErrorKind {
    /// Pipeline error
    #[from(MediaError)]
    Media(MediaError),
    /// Datastore error
    #[from(StorageError)]
    Storage(StorageError),
    /// Metadata database error
    #[from(DatabaseError)]
    Database(DatabaseError),
    /// Content cache error
    #[from(CacheError)]
    Cache(CacheError),
    /// Configuration error
    #[from(ConfigError)]
    Config(ConfigError),
}

impl From<std::io::Error> for MediaStoreErrorKind {
    #[track_caller]
    fn from(err: std::io::Error) -> Self {
        match StreamLimitExceeded::from_io(&err) {
            Some(_) => MediaError::new(MediaErrorKind::TooLarge).into(),
            None => StorageError::new(StorageErrorKind::Io(err.to_string())).into(),
        }
    }
}

/// Mediastore error with kind discrimination.
///
/// # Examples
///
/// ```
/// use mediastore_error::{ConfigError, MediaStoreResult};
///
/// fn might_fail() -> MediaStoreResult<()> {
///     Err(ConfigError::new("Missing field"))?
/// }
///
/// match might_fail() {
///     Ok(_) => println!("Success"),
///     Err(e) => println!("Error: {}", e),
/// }
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Mediastore Error: {}", _0)]
pub struct MediaStoreError(Box<MediaStoreErrorKind>);

impl MediaStoreError {
    /// Create a new error from a kind.
    pub fn new(kind: MediaStoreErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &MediaStoreErrorKind {
        &self.0
    }

    /// Shorthand for a pipeline error of the given kind.
    #[track_caller]
    pub fn media(kind: MediaErrorKind) -> Self {
        MediaError::new(kind).into()
    }

    /// The caller-facing category of this error.
    ///
    /// Only pipeline errors carry a specific category; storage, database,
    /// cache and configuration failures are all internal.
    pub fn category(&self) -> ErrorCategory {
        match self.kind() {
            MediaStoreErrorKind::Media(err) => ErrorCategory::from(&err.kind),
            _ => ErrorCategory::Internal,
        }
    }

    /// True if this error belongs to the given category.
    pub fn is(&self, category: ErrorCategory) -> bool {
        self.category() == category
    }
}

// Generic From implementation for any type that converts to MediaStoreErrorKind
impl<T> From<T> for MediaStoreError
where
    T: Into<MediaStoreErrorKind>,
{
    #[track_caller]
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for mediastore operations.
pub type MediaStoreResult<T> = std::result::Result<T, MediaStoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_limit_marker_maps_to_too_large() {
        let io = StreamLimitExceeded { limit: 10 }.into_io();
        let err = MediaStoreError::from(io);
        assert_eq!(err.category(), ErrorCategory::TooLarge);
    }

    #[test]
    fn plain_io_error_is_internal() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone");
        let err = MediaStoreError::from(io);
        assert_eq!(err.category(), ErrorCategory::Internal);
        assert!(matches!(err.kind(), MediaStoreErrorKind::Storage(_)));
    }

    #[test]
    fn storage_errors_are_internal() {
        let err: MediaStoreError =
            StorageError::new(StorageErrorKind::NotFound("x".into())).into();
        assert!(err.is(ErrorCategory::Internal));
    }

    #[test]
    fn media_kinds_keep_their_category() {
        let err = MediaStoreError::media(MediaErrorKind::Unsupported("image/x-foo".into()));
        assert_eq!(err.category(), ErrorCategory::Unsupported);
        let err = MediaStoreError::media(MediaErrorKind::LockTimeout("abc".into()));
        assert_eq!(err.category(), ErrorCategory::LockTimeout);
    }
}
