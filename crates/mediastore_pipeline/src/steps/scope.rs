//! Request deadlines shared by a pipeline call and the stream it returns.

use mediastore_error::{MediaError, MediaStoreResult};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Start a scope that cancels itself once `timeout` passes.
///
/// The deadline task exits as soon as the scope is cancelled by anyone
/// else, so cancelling a finished request releases it immediately.
pub(crate) fn request_scope(timeout: Duration) -> CancellationToken {
    let scope = CancellationToken::new();
    let deadline = scope.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = deadline.cancelled() => {}
            _ = tokio::time::sleep(timeout) => {
                debug!(?timeout, "Request deadline passed");
                deadline.cancel();
            }
        }
    });
    scope
}

/// Run `work` until it finishes or `scope` is cancelled.
pub(crate) async fn within<T, F>(scope: &CancellationToken, what: &str, work: F) -> MediaStoreResult<T>
where
    F: Future<Output = MediaStoreResult<T>>,
{
    tokio::select! {
        outcome = work => outcome,
        _ = scope.cancelled() => Err(MediaError::internal(format!("{} timed out", what)).into()),
    }
}
