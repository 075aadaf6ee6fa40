//! Media kinds used for datastore selection.

use serde::{Deserialize, Serialize};

/// Category of bytes being stored, used to pick a datastore.
///
/// # Examples
///
/// ```
/// use mediastore_core::MediaKind;
/// use std::str::FromStr;
///
/// assert_eq!(MediaKind::from_str("thumbnails").unwrap(), MediaKind::Thumbnails);
/// assert_eq!(MediaKind::LocalMedia.to_string(), "local_media");
/// ```
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
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MediaKind {
    /// Media uploaded by local users
    LocalMedia,
    /// Media fetched from other servers
    RemoteMedia,
    /// Generated thumbnails
    Thumbnails,
    /// Export archives
    Archives,
}

impl MediaKind {
    /// True for media uploaded by local users, which is subject to upload
    /// size limits.
    pub fn is_local(&self) -> bool {
        matches!(self, MediaKind::LocalMedia)
    }
}
