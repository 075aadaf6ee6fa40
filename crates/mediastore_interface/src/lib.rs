//! Trait definitions for the mediastore media pipelines.
//!
//! The pipelines consume their collaborators through these traits: the
//! metadata database, the federation client used for remote fetches, the
//! spam checker, the thumbnail generator and the distributed upload lock.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod database;
mod traits;
mod types;

pub use database::MediaDatabase;
pub use traits::{DistributedLock, FederationClient, SpamChecker, ThumbnailGenerator};
pub use types::{GeneratedThumbnail, LockToken, RemoteMedia, SpamMetadata, ThumbnailSpec};
