//! Metadata database implementations for mediastore.
//!
//! Provides [`InMemoryMediaDatabase`], a `HashMap`-backed implementation of
//! [`MediaDatabase`](mediastore_interface::MediaDatabase) used by tests and
//! single-process deployments.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod in_memory;

pub use in_memory::InMemoryMediaDatabase;
