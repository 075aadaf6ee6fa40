//! Datastore abstraction for mediastore.
//!
//! This crate provides pluggable storage backends for media bytes and the
//! registry the pipelines use to choose between them. Metadata lives in the
//! database; a [`Locatable`](mediastore_core::Locatable) is the only link from
//! a record to the bytes stored here.
//!
//! # Features
//!
//! - **Pluggable backends**: [`DatastoreBackend`] implemented by
//!   [`FileSystemStorage`] and [`MemoryStorage`]
//! - **Verified writes**: uploads are hashed while written and removed on mismatch
//! - **Replayable buffering**: [`Datastore::buffer_temp`] consumes a stream
//!   once and yields [`BufferedContent`] that can be reopened any number of times
//! - **Selection policies**: round robin or primary with overflow, per media kind
//!
//! # Example
//!
//! ```rust
//! use bytes::Bytes;
//! use mediastore_core::{MediaKind, bytes_stream};
//! use mediastore_storage::{Datastores, MemoryStorage};
//! use mediastore_config::{DatastoreConfig, DatastorePolicy, DatastoreType};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DatastoreConfig {
//!     id: "mem".into(),
//!     kind: DatastoreType::Memory,
//!     media_kinds: vec![MediaKind::LocalMedia],
//!     path: None,
//!     temp_path: None,
//!     capacity_bytes: None,
//! };
//! let datastores = Datastores::new(DatastorePolicy::RoundRobin)
//!     .with_datastore(config, Arc::new(MemoryStorage::new()));
//!
//! let ds = datastores.pick(MediaKind::LocalMedia)?;
//! let buffered = ds.buffer_temp(bytes_stream(Bytes::from_static(b"hello"))).await?;
//! let locatable = ds
//!     .upload(buffered.open().await?, buffered.size(), "text/plain", buffered.hash())
//!     .await?;
//! assert_eq!(locatable.content_hash(), buffered.hash());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod buffer;
mod filesystem;
mod hash;
mod memory;
mod registry;

pub use backend::DatastoreBackend;
pub use buffer::{BufferedContent, buffer_in_memory, buffer_to_file};
pub use filesystem::FileSystemStorage;
pub use hash::{ContentHasher, compute_hash};
pub use mediastore_error::{StorageError, StorageErrorKind};
pub use memory::MemoryStorage;
pub use registry::{Datastore, Datastores};
