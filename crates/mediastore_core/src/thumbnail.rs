//! Thumbnail records.

use crate::Locatable;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Resize method for thumbnails.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ThumbnailMethod {
    /// Fill the box exactly, cropping the overflow
    Crop,
    /// Fit within the box, keeping the aspect ratio
    Scale,
}

/// Identity of a thumbnail record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThumbnailKey {
    /// Origin of the source media
    pub origin: String,
    /// ID of the source media
    pub media_id: String,
    /// Normalized width
    pub width: u32,
    /// Normalized height
    pub height: u32,
    /// Resize method
    pub method: ThumbnailMethod,
    /// Animated variant
    pub animated: bool,
}

impl ThumbnailKey {
    /// The same key with a different animated flag.
    pub fn with_animated(&self, animated: bool) -> Self {
        Self {
            animated,
            ..self.clone()
        }
    }
}

/// A generated thumbnail, identified by
/// `(origin, media_id, width, height, method, animated)`.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    derive_getters::Getters,
    derive_builder::Builder,
)]
#[builder(setter(into))]
pub struct ThumbnailRecord {
    /// Origin of the source media
    origin: String,
    /// ID of the source media
    media_id: String,
    /// Requested width after normalization
    width: u32,
    /// Requested height after normalization
    height: u32,
    /// Resize method
    method: ThumbnailMethod,
    /// Whether the thumbnail is animated
    animated: bool,
    /// MIME type of the generated bytes
    content_type: String,
    /// Byte count
    size_bytes: u64,
    /// Creation time
    #[builder(default = "Utc::now()")]
    created_at: DateTime<Utc>,
    /// Where the bytes live
    locatable: Locatable,
}

impl ThumbnailRecord {
    /// Creates a new thumbnail record builder.
    pub fn builder() -> ThumbnailRecordBuilder {
        ThumbnailRecordBuilder::default()
    }

    /// Content hash, taken from the locatable.
    pub fn content_hash(&self) -> &str {
        self.locatable.content_hash()
    }

    /// Identity of this record.
    pub fn key(&self) -> ThumbnailKey {
        ThumbnailKey {
            origin: self.origin.clone(),
            media_id: self.media_id.clone(),
            width: self.width,
            height: self.height,
            method: self.method,
            animated: self.animated,
        }
    }

    /// A copy of this record under a different animated flag, pointing at the
    /// same bytes.
    pub fn alias_animated(&self, animated: bool) -> Self {
        Self {
            animated,
            ..self.clone()
        }
    }
}
