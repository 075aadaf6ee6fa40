//! Media records and the pointers they hold to stored bytes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pointer from a logical record to physical bytes in a datastore.
///
/// Several records may share one locatable when their content is identical.
///
/// # Examples
///
/// ```
/// use mediastore_core::Locatable;
///
/// let loc = Locatable::new("local", "ab/cd/efgh", "e3b0c442");
/// assert_eq!(loc.datastore_id(), "local");
/// assert_eq!(loc.to_string(), "local:ab/cd/efgh");
/// ```
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_getters::Getters,
)]
#[display("{datastore_id}:{location}")]
pub struct Locatable {
    /// Datastore holding the object
    datastore_id: String,
    /// Backend-specific object location
    location: String,
    /// SHA-256 of the object bytes
    content_hash: String,
}

impl Locatable {
    /// Create a locatable.
    pub fn new(
        datastore_id: impl Into<String>,
        location: impl Into<String>,
        content_hash: impl Into<String>,
    ) -> Self {
        Self {
            datastore_id: datastore_id.into(),
            location: location.into(),
            content_hash: content_hash.into(),
        }
    }

    /// True if both point at the same object, ignoring the hash.
    pub fn same_object(&self, other: &Locatable) -> bool {
        self.datastore_id == other.datastore_id && self.location == other.location
    }
}

/// A stored media item, identified by `(origin, media_id)`.
///
/// # Examples
///
/// ```
/// use mediastore_core::{Locatable, MediaRecord};
///
/// let record = MediaRecord::builder()
///     .origin("example.org")
///     .media_id("abc123")
///     .size_bytes(5u64)
///     .content_type("text/plain")
///     .locatable(Locatable::new("local", "ab/c1/23", "deadbeef"))
///     .build()
///     .unwrap();
///
/// assert_eq!(record.content_hash(), "deadbeef");
/// assert!(!record.quarantined());
/// assert_eq!(record.mxc(), "mxc://example.org/abc123");
/// ```
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    derive_getters::Getters,
    derive_setters::Setters,
    derive_builder::Builder,
)]
#[setters(prefix = "with_")]
#[builder(setter(into))]
pub struct MediaRecord {
    /// Server namespace the ID belongs to
    origin: String,
    /// Identifier within the origin
    media_id: String,
    /// Byte count
    size_bytes: u64,
    /// MIME type
    content_type: String,
    /// Original filename, possibly empty
    #[builder(default)]
    upload_name: String,
    /// Uploading user, empty for remote media
    #[builder(default)]
    user_id: String,
    /// Creation time
    #[builder(default = "Utc::now()")]
    created_at: DateTime<Utc>,
    /// Blocked by an administrator
    #[builder(default)]
    #[getter(skip)]
    quarantined: bool,
    /// Where the bytes live
    locatable: Locatable,
}

impl MediaRecord {
    /// Creates a new record builder.
    pub fn builder() -> MediaRecordBuilder {
        MediaRecordBuilder::default()
    }

    /// Content hash, taken from the locatable.
    pub fn content_hash(&self) -> &str {
        self.locatable.content_hash()
    }

    /// Whether the record is quarantined.
    pub fn quarantined(&self) -> bool {
        self.quarantined
    }

    /// `mxc://origin/media_id` form used in logs and notification keys.
    pub fn mxc(&self) -> String {
        format!("mxc://{}/{}", self.origin, self.media_id)
    }
}

/// Per-user quota override stored in the database.
///
/// Positive values replace the configured limit; zero means "use the
/// configured default".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserQuota {
    /// Maximum bytes the user may have uploaded
    pub max_bytes: i64,
    /// Maximum concurrent two-phase reservations
    pub max_pending: i64,
    /// Maximum number of uploaded files
    pub max_files: i64,
}
