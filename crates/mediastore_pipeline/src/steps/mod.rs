//! Steps shared by the pipelines.

pub(crate) mod access;
pub(crate) mod dedup;
pub mod media_id;
pub(crate) mod open;
pub(crate) mod persist;
pub mod quota;
pub(crate) mod scope;

use mediastore_error::{MediaError, MediaStoreError, MediaStoreErrorKind};

/// Keep a collaborator's classified pipeline error, fold anything else into
/// an internal error.
pub(crate) fn collaborator_error(collaborator: &str, err: MediaStoreError) -> MediaStoreError {
    match err.kind() {
        MediaStoreErrorKind::Media(_) => err,
        _ => MediaError::internal(format!("{} failed: {}", collaborator, err)).into(),
    }
}
