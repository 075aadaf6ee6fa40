//! Writing buffered content to a datastore and the cache.

use crate::tee::{TEE_CAPACITY, tee};
use crate::MediaContext;
use mediastore_core::Locatable;
use mediastore_error::MediaStoreResult;
use mediastore_storage::{BufferedContent, Datastore};
use tracing::{debug, warn};

/// Stream `buffered` into `datastore`, populating the cache from the same
/// pass.
///
/// A datastore failure fails the whole step; a cache failure is logged.
pub(crate) async fn store_buffered(
    ctx: &MediaContext,
    datastore: &Datastore,
    buffered: &BufferedContent,
    content_type: &str,
) -> MediaStoreResult<Locatable> {
    let (to_datastore, to_cache) = tee(buffered.open().await?, TEE_CAPACITY);
    let (stored, cached) = tokio::join!(
        datastore.upload(to_datastore, buffered.size(), content_type, buffered.hash()),
        ctx.cache().store(buffered.hash(), to_cache, buffered.size()),
    );
    match cached {
        Ok(true) => debug!(hash = buffered.hash(), "Cached uploaded content"),
        Ok(false) => {}
        Err(e) => warn!(hash = buffered.hash(), error = %e, "Failed to populate cache"),
    }
    stored
}
