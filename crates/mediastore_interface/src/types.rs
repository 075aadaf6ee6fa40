//! Values exchanged with external collaborators.

use mediastore_core::{ByteStream, ThumbnailMethod};
use serde::{Deserialize, Serialize};

/// Media fetched from a remote origin.
pub struct RemoteMedia {
    /// Body bytes
    pub stream: ByteStream,
    /// Advertised MIME type
    pub content_type: Option<String>,
    /// Advertised filename
    pub file_name: Option<String>,
    /// Advertised length, if known
    pub size_hint: Option<u64>,
}

impl std::fmt::Debug for RemoteMedia {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteMedia")
            .field("content_type", &self.content_type)
            .field("file_name", &self.file_name)
            .field("size_hint", &self.size_hint)
            .finish_non_exhaustive()
    }
}

/// What the spam checker knows about an upload besides its bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, derive_getters::Getters)]
pub struct SpamMetadata {
    /// Origin the media is being stored under
    origin: String,
    /// Media ID being stored
    media_id: String,
    /// Uploading user, empty for remote media
    user_id: String,
    /// Declared MIME type
    content_type: String,
    /// Declared filename
    file_name: String,
}

impl SpamMetadata {
    /// Describe an upload for the spam checker.
    pub fn new(
        origin: impl Into<String>,
        media_id: impl Into<String>,
        user_id: impl Into<String>,
        content_type: impl Into<String>,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            origin: origin.into(),
            media_id: media_id.into(),
            user_id: user_id.into(),
            content_type: content_type.into(),
            file_name: file_name.into(),
        }
    }
}

/// Parameters passed to a thumbnail generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThumbnailSpec {
    /// Target width
    pub width: u32,
    /// Target height
    pub height: u32,
    /// Resize method
    pub method: ThumbnailMethod,
    /// Whether animation should be preserved
    pub animated: bool,
}

/// Output of a thumbnail generator.
pub struct GeneratedThumbnail {
    /// Encoded thumbnail bytes
    pub stream: ByteStream,
    /// MIME type of the output
    pub content_type: String,
    /// Whether the output is animated
    pub animated: bool,
}

impl std::fmt::Debug for GeneratedThumbnail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratedThumbnail")
            .field("content_type", &self.content_type)
            .field("animated", &self.animated)
            .finish_non_exhaustive()
    }
}

/// Proof of holding a distributed lock, required to release it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LockToken(pub String);
