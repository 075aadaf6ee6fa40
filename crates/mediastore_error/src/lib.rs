//! Error types for the mediastore workspace.
//!
//! # Error Hierarchy
//!
//! All errors follow the `ErrorKind` + wrapper struct pattern:
//! - `*ErrorKind` enum defines specific error conditions
//! - `*Error` struct wraps the kind with source location tracking
//! - All errors use `#[track_caller]` for automatic location capture
//!
//! Every error can be reduced to an [`ErrorCategory`], the taxonomy callers
//! map onto transport responses.
//!
//! # Examples
//!
//! ```
//! use mediastore_error::{ErrorCategory, MediaError, MediaErrorKind, MediaStoreResult};
//!
//! fn lookup() -> MediaStoreResult<()> {
//!     Err(MediaError::new(MediaErrorKind::NotFound))?
//! }
//!
//! let err = lookup().unwrap_err();
//! assert_eq!(err.category(), ErrorCategory::NotFound);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod config;
mod database;
mod error;
mod limit;
mod media;
mod storage;

pub use cache::CacheError;
pub use config::ConfigError;
pub use database::{DatabaseError, DatabaseErrorKind};
pub use error::{ErrorCategory, MediaStoreError, MediaStoreErrorKind, MediaStoreResult};
pub use limit::StreamLimitExceeded;
pub use media::{MediaError, MediaErrorKind};
pub use storage::{StorageError, StorageErrorKind};
