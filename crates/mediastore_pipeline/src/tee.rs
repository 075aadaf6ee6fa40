//! Splitting one byte stream between two concurrent consumers.

use bytes::Bytes;
use futures::StreamExt;
use mediastore_core::ByteStream;
use mediastore_error::StreamLimitExceeded;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

/// Chunks the follower may lag behind the primary.
pub const TEE_CAPACITY: usize = 16;

fn copy_error(err: &io::Error) -> io::Error {
    match StreamLimitExceeded::from_io(err) {
        Some(marker) => marker.into_io(),
        None => io::Error::new(err.kind(), err.to_string()),
    }
}

/// Split `source` into a primary stream and a follower.
///
/// Polling the primary drives the source; every chunk and error it sees is
/// also handed to the follower over a channel holding at most `capacity`
/// chunks, so both sides must be consumed concurrently. Nothing is buffered
/// beyond that.
///
/// The primary ignores a follower that has gone away. The follower ends
/// with an [`io::ErrorKind::UnexpectedEof`] error if the primary is dropped
/// before the source is exhausted, so it never mistakes a truncated stream
/// for a complete one.
pub fn tee(mut source: ByteStream, capacity: usize) -> (ByteStream, ByteStream) {
    let (tx, mut rx) = mpsc::channel::<io::Result<Bytes>>(capacity.max(1));
    let finished = Arc::new(AtomicBool::new(false));
    let finished_reader = Arc::clone(&finished);

    let primary = async_stream::stream! {
        let mut tx = Some(tx);
        let mut clean = true;
        while let Some(item) = source.next().await {
            if let Some(sender) = &tx {
                let copy = match &item {
                    Ok(chunk) => Ok(chunk.clone()),
                    Err(e) => Err(copy_error(e)),
                };
                if sender.send(copy).await.is_err() {
                    tx = None;
                }
            }
            let failed = item.is_err();
            yield item;
            if failed {
                clean = false;
                break;
            }
        }
        if clean {
            finished.store(true, Ordering::SeqCst);
        }
    };

    let follower = async_stream::stream! {
        let mut failed = false;
        while let Some(item) = rx.recv().await {
            failed = item.is_err();
            yield item;
            if failed {
                break;
            }
        }
        if !failed && !finished_reader.load(Ordering::SeqCst) {
            yield Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "stream ended before the source was exhausted",
            ));
        }
    };

    (primary.boxed(), follower.boxed())
}
