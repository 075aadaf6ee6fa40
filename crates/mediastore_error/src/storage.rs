//! Storage error types.

/// Kinds of storage errors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum StorageErrorKind {
    /// Failed to create storage directory
    #[display("Failed to create storage directory: {}", _0)]
    DirectoryCreation(String),
    /// Failed to write object
    #[display("Failed to write object: {}", _0)]
    FileWrite(String),
    /// Failed to read object
    #[display("Failed to read object: {}", _0)]
    FileRead(String),
    /// Object not found at the specified location
    #[display("Object not found: {}", _0)]
    NotFound(String),
    /// Written bytes did not hash to the declared content hash
    #[display("Hash mismatch: expected {}, got {}", expected, actual)]
    HashMismatch {
        /// Declared hash
        expected: String,
        /// Hash of the bytes actually written
        actual: String,
    },
    /// Written byte count did not match the declared size
    #[display("Size mismatch: expected {} bytes, got {}", expected, actual)]
    SizeMismatch {
        /// Declared size
        expected: u64,
        /// Bytes actually written
        actual: u64,
    },
    /// No configured datastore has the given ID
    #[display("Unknown datastore: {}", _0)]
    UnknownDatastore(String),
    /// No configured datastore accepts the given media kind
    #[display("No usable datastore for {} media", _0)]
    NoDatastore(String),
    /// Unique object name generation gave up
    #[display("Failed to allocate object name: {}", _0)]
    NameAllocation(String),
    /// Invalid storage configuration
    #[display("Invalid configuration: {}", _0)]
    InvalidConfig(String),
    /// Stream-level I/O failure
    #[display("I/O error: {}", _0)]
    Io(String),
}

/// Storage error with location tracking.
///
/// # Examples
///
/// ```
/// use mediastore_error::{StorageError, StorageErrorKind};
///
/// let err = StorageError::new(StorageErrorKind::NotFound("ab/cd/ef".to_string()));
/// assert!(format!("{}", err).contains("not found"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Storage Error: {} at line {} in {}", kind, line, file)]
pub struct StorageError {
    /// The kind of error that occurred
    pub kind: StorageErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl StorageError {
    /// Create a new storage error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: StorageErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
