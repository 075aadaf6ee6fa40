//! Media pipelines for mediastore.
//!
//! This crate wires the datastores, cache, database and external
//! collaborators into the operations a media server exposes:
//!
//! - [`UploadPipeline`]: hash, spam check, deduplicate and persist uploads
//! - [`CreatePipeline`]: reserve media IDs for two-phase uploads
//! - [`DownloadPipeline`]: serve stored media, fetching remote media on a miss
//! - [`ThumbnailPipeline`]: serve thumbnails, generating them on first request
//!
//! The primitives they share are public as well: the [`CoalescingGroup`] that
//! collapses duplicate in-flight requests, the [`UploadLocker`] serializing
//! uploads of identical content, the [`UploadNotifier`] waking readers of
//! pending uploads, bounded [`WorkerPool`]s and the stream splitter [`tee`].
//!
//! # Example
//!
//! ```rust
//! use mediastore_config::{DatastoreConfig, DatastoreType, MediaStoreConfig};
//! use mediastore_core::{MediaKind, bytes_stream};
//! use mediastore_database::InMemoryMediaDatabase;
//! use mediastore_pipeline::{
//!     DownloadOptions, DownloadPipeline, MediaContext, UploadPipeline, UploadRequest,
//! };
//! use mediastore_storage::Datastores;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut config = MediaStoreConfig::default();
//! config.datastores.push(DatastoreConfig {
//!     id: "mem".into(),
//!     kind: DatastoreType::Memory,
//!     media_kinds: vec![MediaKind::LocalMedia],
//!     path: None,
//!     temp_path: None,
//!     capacity_bytes: None,
//! });
//! let datastores = Datastores::from_config(&config.datastores, config.datastore_policy)?;
//! let ctx = MediaContext::new(config, Arc::new(InMemoryMediaDatabase::new()), datastores);
//!
//! let request = UploadRequest::builder()
//!     .origin("example.org")
//!     .content_type("text/plain")
//!     .user_id("@alice:example.org")
//!     .build()?;
//! let record = UploadPipeline::new(ctx.clone())
//!     .execute(request, bytes_stream("hello".into()))
//!     .await?;
//!
//! let outcome = DownloadPipeline::new(ctx)
//!     .execute("example.org", record.media_id(), DownloadOptions::default())
//!     .await?;
//! assert_eq!(outcome.record, record);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod coalesce;
mod context;
mod create;
mod defaults;
mod download;
mod failure_cache;
mod lock;
mod notifier;
mod pool;
pub mod steps;
mod tasks;
mod tee;
mod thumbnail;
mod upload;

pub use coalesce::CoalescingGroup;
pub use context::{MediaContext, MediaIdGenerator};
pub use create::CreatePipeline;
pub use defaults::{AllowAllSpamChecker, NoFederation, NoThumbnailer};
pub use download::{DownloadOptions, DownloadOutcome, DownloadPipeline};
pub use failure_cache::FailureCache;
pub use lock::{LocalLockBackend, UploadLock, UploadLocker};
pub use notifier::{UploadNotifier, UploadWaiter};
pub use pool::WorkerPool;
pub use steps::media_id::generate_media_id;
pub use steps::quota::QuotaType;
pub use tasks::{spawn_maintenance, sweep_held_media_ids};
pub use tee::{TEE_CAPACITY, tee};
pub use thumbnail::{ThumbnailOptions, ThumbnailOutcome, ThumbnailPipeline, pick_new_dimensions};
pub use upload::{UploadPipeline, UploadRequest, UploadRequestBuilder};
