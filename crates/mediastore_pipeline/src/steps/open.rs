//! Opening stored bytes, cache first.

use crate::MediaContext;
use mediastore_core::{ByteRange, ByteStream, Locatable, bytes_stream};
use mediastore_error::MediaStoreResult;
use tracing::{debug, warn};

/// Open the bytes behind `locatable`, restricted to `range`.
///
/// Served from the cache when it has the content; cache failures fall
/// through to the datastore.
pub(crate) async fn open_locatable(
    ctx: &MediaContext,
    locatable: &Locatable,
    range: Option<ByteRange>,
) -> MediaStoreResult<ByteStream> {
    let hash = locatable.content_hash();
    match ctx.cache().get(hash, range).await {
        Ok(Some(bytes)) => {
            debug!(hash, "Serving content from cache");
            return Ok(bytes_stream(bytes));
        }
        Ok(None) => {}
        Err(e) => warn!(hash, error = %e, "Cache lookup failed, reading from datastore"),
    }
    ctx.datastores().download(locatable, range).await
}
