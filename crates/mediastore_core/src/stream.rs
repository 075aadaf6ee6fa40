//! Byte streams passed between pipelines, datastores and collaborators.

use crate::ByteRange;
use bytes::{Bytes, BytesMut};
use futures::stream::{BoxStream, Stream, StreamExt};
use mediastore_error::StreamLimitExceeded;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio_util::sync::{CancellationToken, DropGuard, WaitForCancellationFutureOwned};

/// Owned, sendable stream of byte chunks.
pub type ByteStream = BoxStream<'static, io::Result<Bytes>>;

/// Stream yielding `bytes` as a single chunk (nothing if empty).
pub fn bytes_stream(bytes: Bytes) -> ByteStream {
    if bytes.is_empty() {
        return empty_stream();
    }
    futures::stream::once(async move { Ok(bytes) }).boxed()
}

/// Stream that ends immediately.
pub fn empty_stream() -> ByteStream {
    futures::stream::empty().boxed()
}

/// Read a stream to completion.
pub async fn collect_bytes<S>(mut stream: S) -> io::Result<Bytes>
where
    S: Stream<Item = io::Result<Bytes>> + Unpin,
{
    let mut buf = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        buf.extend_from_slice(&chunk?);
    }
    Ok(buf.freeze())
}

/// Fail with [`StreamLimitExceeded`] once more than `limit` bytes pass.
///
/// Bytes past the limit are never yielded, so downstream buffers stay
/// bounded.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use mediastore_core::{bytes_stream, collect_bytes, limit_stream};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let limited = limit_stream(bytes_stream(Bytes::from_static(b"hello")), 3);
/// assert!(collect_bytes(limited).await.is_err());
/// # }
/// ```
pub fn limit_stream(mut stream: ByteStream, limit: u64) -> ByteStream {
    Box::pin(async_stream::try_stream! {
        let mut seen = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            seen += chunk.len() as u64;
            if seen > limit {
                Err::<(), io::Error>(StreamLimitExceeded { limit }.into_io())?;
            }
            yield chunk;
        }
    })
}

/// Restrict a stream to the bytes selected by `range`.
pub fn slice_stream(mut stream: ByteStream, range: ByteRange) -> ByteStream {
    Box::pin(async_stream::try_stream! {
        let mut offset = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            let chunk_start = offset;
            offset += chunk.len() as u64;

            let begin = chunk_start.max(range.start);
            let stop = range.end.map_or(offset, |end| end.min(offset));
            if stop > begin {
                yield chunk.slice((begin - chunk_start) as usize..(stop - chunk_start) as usize);
            }
            if range.end.is_some_and(|end| offset >= end) {
                break;
            }
        }
    })
}

/// Byte stream handed to pipeline callers.
///
/// A media stream may own the cancellation scope of the request that produced
/// it: dropping or [closing](MediaStream::close) the stream cancels that scope,
/// releasing anything still waiting on it. If the scope is cancelled while the
/// stream is alive, the next read fails with [`io::ErrorKind::TimedOut`].
pub struct MediaStream {
    inner: ByteStream,
    scope: Option<DropGuard>,
    cancelled: Option<Pin<Box<WaitForCancellationFutureOwned>>>,
    ended: bool,
}

impl MediaStream {
    /// Wrap a byte stream with no attached scope.
    pub fn new(inner: ByteStream) -> Self {
        Self {
            inner,
            scope: None,
            cancelled: None,
            ended: false,
        }
    }

    /// Wrap a byte stream, cancelling `scope` when the stream goes away.
    pub fn with_scope(inner: ByteStream, scope: CancellationToken) -> Self {
        Self {
            inner,
            cancelled: Some(Box::pin(scope.clone().cancelled_owned())),
            scope: Some(scope.drop_guard()),
            ended: false,
        }
    }

    /// Close the stream early, cancelling its scope.
    pub fn close(self) {
        drop(self);
    }

    /// Read the remaining bytes.
    pub async fn collect(self) -> io::Result<Bytes> {
        collect_bytes(self).await
    }

    /// Erase into a plain [`ByteStream`], keeping the scope attached.
    pub fn into_byte_stream(self) -> ByteStream {
        Box::pin(self)
    }
}

impl std::fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaStream")
            .field("scoped", &self.scope.is_some())
            .finish()
    }
}

impl Stream for MediaStream {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.ended {
            return Poll::Ready(None);
        }
        if let Some(cancelled) = this.cancelled.as_mut()
            && cancelled.as_mut().poll(cx).is_ready()
        {
            this.ended = true;
            return Poll::Ready(Some(Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "media stream scope was cancelled",
            ))));
        }
        this.inner.as_mut().poll_next(cx)
    }
}

impl From<ByteStream> for MediaStream {
    fn from(inner: ByteStream) -> Self {
        Self::new(inner)
    }
}
