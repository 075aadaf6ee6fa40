//! Configuration for the mediastore media pipelines.
//!
//! Configuration is layered with the `config` crate:
//! - Bundled defaults (`include_str!` of `mediastore.toml`)
//! - User overrides (`~/.config/mediastore/mediastore.toml`, `./mediastore.toml`)
//! - Environment variables prefixed `MEDIASTORE__`

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod glob;
mod sections;

pub use config::MediaStoreConfig;
pub use glob::glob_matches;
pub use sections::{
    CacheConfig, DatastoreConfig, DatastorePolicy, DatastoreType, DownloadsConfig, HeldIdsConfig,
    LockConfig, LoggingConfig, QuarantineConfig, QuotaConfig, ThumbnailSize, ThumbnailsConfig,
    UploadsConfig, UserQuotaConfig,
};
