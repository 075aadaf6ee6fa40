//! Core data types for the mediastore media pipelines.
//!
//! This crate provides the records shared by every layer (media, thumbnails,
//! reservations), the byte stream types the pipelines pass around, and
//! logging initialization.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod kind;
mod range;
mod record;
mod reservation;
mod stream;
mod telemetry;
mod thumbnail;

pub use kind::MediaKind;
pub use range::ByteRange;
pub use record::{Locatable, MediaRecord, MediaRecordBuilder, UserQuota};
pub use reservation::{ExpiringMediaRecord, HeldMediaId, HeldReason, ReservationState};
pub use stream::{
    ByteStream, MediaStream, bytes_stream, collect_bytes, empty_stream, limit_stream, slice_stream,
};
pub use telemetry::{init_logging, init_telemetry};
pub use thumbnail::{ThumbnailKey, ThumbnailMethod, ThumbnailRecord, ThumbnailRecordBuilder};
