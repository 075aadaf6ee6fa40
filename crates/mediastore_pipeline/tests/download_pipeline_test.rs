//! Tests for the download pipeline.

mod common;

use common::{ALICE, FakeFederation, Harness, LOCAL, REMOTE, body, read_all, test_config};
use mediastore_core::{ByteRange, MediaRecord};
use mediastore_error::ErrorCategory;
use mediastore_interface::MediaDatabase;
use mediastore_pipeline::{
    CreatePipeline, DownloadOptions, DownloadPipeline, UploadPipeline, UploadRequest,
};
use std::sync::Arc;
use std::time::Duration;

async fn upload(h: &Harness, data: &'static [u8]) -> MediaRecord {
    let request = UploadRequest::builder()
        .origin(LOCAL)
        .content_type("text/plain")
        .file_name("file.txt")
        .user_id(ALICE)
        .build()
        .unwrap();
    UploadPipeline::new(h.ctx.clone())
        .execute(request, body(data))
        .await
        .unwrap()
}

fn remote_opts() -> DownloadOptions {
    DownloadOptions {
        fetch_remote_if_needed: true,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_download_local_media() {
    let h = Harness::new();
    let record = upload(&h, b"local bytes").await;

    let outcome = DownloadPipeline::new(h.ctx.clone())
        .execute(LOCAL, record.media_id(), DownloadOptions::default())
        .await
        .unwrap();

    assert_eq!(outcome.record, record);
    assert_eq!(read_all(outcome.stream.unwrap()).await, "local bytes");
}

#[tokio::test]
async fn test_download_range() {
    let h = Harness::new();
    let record = upload(&h, b"0123456789").await;
    let downloads = DownloadPipeline::new(h.ctx.clone());

    let opts = DownloadOptions {
        range: Some(ByteRange::new(2, Some(5))),
        ..Default::default()
    };
    let outcome = downloads.execute(LOCAL, record.media_id(), opts).await.unwrap();
    assert_eq!(read_all(outcome.stream.unwrap()).await, "234");

    let opts = DownloadOptions {
        range: Some(ByteRange::from_start(7)),
        ..Default::default()
    };
    let outcome = downloads.execute(LOCAL, record.media_id(), opts).await.unwrap();
    assert_eq!(read_all(outcome.stream.unwrap()).await, "789");
}

#[tokio::test]
async fn test_inverted_range_is_bad_request() {
    let h = Harness::new();
    let record = upload(&h, b"0123456789").await;

    let opts = DownloadOptions {
        range: Some(ByteRange::new(5, Some(2))),
        ..Default::default()
    };
    let err = DownloadPipeline::new(h.ctx.clone())
        .execute(LOCAL, record.media_id(), opts)
        .await
        .unwrap_err();
    assert!(err.is(ErrorCategory::BadRequest), "got {}", err);
}

#[tokio::test]
async fn test_record_only_has_no_stream() {
    let h = Harness::new();
    let record = upload(&h, b"metadata only").await;

    let opts = DownloadOptions {
        record_only: true,
        ..Default::default()
    };
    let outcome = DownloadPipeline::new(h.ctx.clone())
        .execute(LOCAL, record.media_id(), opts)
        .await
        .unwrap();
    assert!(outcome.stream.is_none());
    assert!(outcome.scope().is_cancelled());
    assert_eq!(outcome.record, record);
}

#[tokio::test]
async fn test_closing_stream_cancels_scope() {
    let h = Harness::new();
    let record = upload(&h, b"scoped").await;

    let outcome = DownloadPipeline::new(h.ctx.clone())
        .execute(LOCAL, record.media_id(), DownloadOptions::default())
        .await
        .unwrap();
    let scope = outcome.scope().clone();
    assert!(!scope.is_cancelled());
    outcome.stream.unwrap().close();
    assert!(scope.is_cancelled());
}

#[tokio::test]
async fn test_unknown_local_media_is_not_fetched() {
    let federation = Arc::new(FakeFederation::new().serve(LOCAL, "missing", b"x", "text/plain"));
    let h = Harness::new().map(|ctx| ctx.with_federation(federation.clone()));

    let err = DownloadPipeline::new(h.ctx.clone())
        .execute(LOCAL, "missing", remote_opts())
        .await
        .unwrap_err();
    assert!(err.is(ErrorCategory::NotFound), "got {}", err);
    assert_eq!(federation.fetches(), 0);
}

#[tokio::test]
async fn test_remote_fetch_disallowed_is_not_found() {
    let federation = Arc::new(FakeFederation::new().serve(REMOTE, "abc", b"remote", "text/plain"));
    let h = Harness::new().map(|ctx| ctx.with_federation(federation.clone()));

    let err = DownloadPipeline::new(h.ctx.clone())
        .execute(REMOTE, "abc", DownloadOptions::default())
        .await
        .unwrap_err();
    assert!(err.is(ErrorCategory::NotFound), "got {}", err);
    assert_eq!(federation.fetches(), 0);
}

#[tokio::test]
async fn test_remote_fetch_stores_media() {
    let federation = Arc::new(FakeFederation::new().serve(REMOTE, "abc", b"remote bytes", "image/png"));
    let h = Harness::new().map(|ctx| ctx.with_federation(federation.clone()));
    let downloads = DownloadPipeline::new(h.ctx.clone());

    let outcome = downloads.execute(REMOTE, "abc", remote_opts()).await.unwrap();
    assert_eq!(outcome.record.content_type(), "image/png");
    assert_eq!(outcome.record.user_id(), "");
    assert_eq!(read_all(outcome.stream.unwrap()).await, "remote bytes");

    // Stored now, so the next download is local.
    let outcome = downloads.execute(REMOTE, "abc", remote_opts()).await.unwrap();
    assert_eq!(read_all(outcome.stream.unwrap()).await, "remote bytes");
    assert_eq!(federation.fetches(), 1);
    assert!(h.db.get_media(REMOTE, "abc").await.unwrap().is_some());
}

#[tokio::test]
async fn test_concurrent_remote_downloads_fetch_once() {
    let federation = Arc::new(
        FakeFederation::new()
            .serve(REMOTE, "popular", b"0123456789", "text/plain")
            .with_delay(Duration::from_millis(100)),
    );
    let h = Harness::new().map(|ctx| ctx.with_federation(federation.clone()));
    let downloads = DownloadPipeline::new(h.ctx.clone());

    let mut handles = Vec::new();
    for i in 0..10u64 {
        let downloads = downloads.clone();
        handles.push(tokio::spawn(async move {
            let opts = DownloadOptions {
                range: Some(ByteRange::new(i % 5, Some(i % 5 + 3))),
                ..remote_opts()
            };
            let outcome = downloads.execute(REMOTE, "popular", opts).await.unwrap();
            (i, read_all(outcome.stream.unwrap()).await)
        }));
    }
    for handle in handles {
        let (i, data) = handle.await.unwrap();
        let start = (i % 5) as usize;
        assert_eq!(data, &b"0123456789"[start..start + 3]);
    }

    assert_eq!(federation.fetches(), 1);
    assert_eq!(h.storage.write_count(), 1);
    assert_eq!(downloads.in_flight(), 0);
}

#[tokio::test]
async fn test_failed_remote_fetch_is_remembered() {
    let federation = Arc::new(FakeFederation::new());
    let h = Harness::new().map(|ctx| ctx.with_federation(federation.clone()));
    let downloads = DownloadPipeline::new(h.ctx.clone());

    for _ in 0..3 {
        let err = downloads
            .execute(REMOTE, "gone", remote_opts())
            .await
            .unwrap_err();
        assert!(err.is(ErrorCategory::NotFound), "got {}", err);
    }
    assert_eq!(federation.fetches(), 1);
}

#[tokio::test]
async fn test_remote_size_hint_over_limit_is_too_large() {
    let federation = Arc::new(
        FakeFederation::new()
            .serve(REMOTE, "huge", b"small really", "text/plain")
            .with_size_hint(10_000),
    );
    let mut config = test_config();
    config.downloads.max_size_bytes = 100;
    let h = Harness::with_config(config).map(|ctx| ctx.with_federation(federation.clone()));

    let err = DownloadPipeline::new(h.ctx.clone())
        .execute(REMOTE, "huge", remote_opts())
        .await
        .unwrap_err();
    assert!(err.is(ErrorCategory::TooLarge), "got {}", err);
    assert_eq!(h.storage.write_count(), 0);
}

#[tokio::test]
async fn test_remote_body_over_limit_is_too_large() {
    let federation = Arc::new(
        FakeFederation::new()
            .serve(REMOTE, "liar", b"much longer than advertised", "text/plain")
            .with_size_hint(4),
    );
    let mut config = test_config();
    config.downloads.max_size_bytes = 8;
    let h = Harness::with_config(config).map(|ctx| ctx.with_federation(federation.clone()));

    let err = DownloadPipeline::new(h.ctx.clone())
        .execute(REMOTE, "liar", remote_opts())
        .await
        .unwrap_err();
    assert!(err.is(ErrorCategory::TooLarge), "got {}", err);
}

#[tokio::test]
async fn test_quarantined_media_is_refused() {
    let h = Harness::new();
    let record = upload(&h, b"taken down").await;
    h.db.set_quarantined_by_hash(record.content_hash(), true)
        .await
        .unwrap();

    let err = DownloadPipeline::new(h.ctx.clone())
        .execute(LOCAL, record.media_id(), DownloadOptions::default())
        .await
        .unwrap_err();
    assert!(err.is(ErrorCategory::Quarantined), "got {}", err);
}

#[tokio::test]
async fn test_download_waits_for_pending_upload() {
    let h = Harness::new();
    let reservation = CreatePipeline::new(h.ctx.clone())
        .execute(LOCAL, ALICE, None)
        .await
        .unwrap();

    let downloads = DownloadPipeline::new(h.ctx.clone());
    let media_id = reservation.media_id.clone();
    let waiting = tokio::spawn(async move {
        let opts = DownloadOptions {
            block_for_read_until: Duration::from_secs(10),
            ..Default::default()
        };
        downloads.execute(LOCAL, &media_id, opts).await
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    UploadPipeline::new(h.ctx.clone())
        .execute_put(LOCAL, &reservation.media_id, body(b"arrived"), "text/plain", "a.txt", ALICE)
        .await
        .unwrap();

    let outcome = waiting.await.unwrap().unwrap();
    assert_eq!(outcome.record.media_id(), &reservation.media_id);
    assert_eq!(read_all(outcome.stream.unwrap()).await, "arrived");
}

#[tokio::test]
async fn test_pending_upload_wait_times_out() {
    let h = Harness::new();
    let reservation = CreatePipeline::new(h.ctx.clone())
        .execute(LOCAL, ALICE, None)
        .await
        .unwrap();

    let opts = DownloadOptions {
        block_for_read_until: Duration::from_millis(20),
        ..Default::default()
    };
    let err = DownloadPipeline::new(h.ctx.clone())
        .execute(LOCAL, &reservation.media_id, opts)
        .await
        .unwrap_err();
    assert!(err.is(ErrorCategory::NotYetUploaded), "got {}", err);
}

#[tokio::test]
async fn test_abandoned_download_stops_waiting() {
    let federation = Arc::new(
        FakeFederation::new()
            .serve(REMOTE, "slow", b"eventually", "text/plain")
            .with_delay(Duration::from_millis(200)),
    );
    let h = Harness::new().map(|ctx| ctx.with_federation(federation.clone()));
    let downloads = DownloadPipeline::new(h.ctx.clone());

    let caller = {
        let downloads = downloads.clone();
        tokio::spawn(async move { downloads.execute(REMOTE, "slow", remote_opts()).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(downloads.waiter_count(), 1);

    caller.abort();
    let _ = caller.await;
    assert_eq!(downloads.waiter_count(), 0);

    // The fetch itself carries on for later callers.
    let outcome = downloads.execute(REMOTE, "slow", remote_opts()).await.unwrap();
    assert_eq!(read_all(outcome.stream.unwrap()).await, "eventually");
    assert_eq!(federation.fetches(), 1);
}

#[tokio::test]
async fn test_request_deadline_ends_open_stream() {
    let mut config = test_config();
    config.downloads.request_timeout_seconds = 1;
    let h = Harness::with_config(config);
    let record = upload(&h, b"read too late").await;

    let outcome = DownloadPipeline::new(h.ctx.clone())
        .execute(LOCAL, record.media_id(), DownloadOptions::default())
        .await
        .unwrap();
    assert!(!outcome.scope().is_cancelled());

    tokio::time::sleep(Duration::from_millis(1200)).await;
    assert!(outcome.scope().is_cancelled());
    let err = outcome.stream.unwrap().collect().await.unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::TimedOut);
}

#[tokio::test]
async fn test_slow_remote_fetch_hits_request_deadline() {
    let federation = Arc::new(
        FakeFederation::new()
            .serve(REMOTE, "sluggish", b"too slow", "text/plain")
            .with_delay(Duration::from_secs(3)),
    );
    let mut config = test_config();
    config.downloads.request_timeout_seconds = 1;
    let h = Harness::with_config(config).map(|ctx| ctx.with_federation(federation.clone()));

    let started = std::time::Instant::now();
    let err = DownloadPipeline::new(h.ctx.clone())
        .execute(REMOTE, "sluggish", remote_opts())
        .await
        .unwrap_err();
    assert!(err.is(ErrorCategory::Internal), "got {}", err);
    assert!(started.elapsed() < Duration::from_secs(3));
}
