//! Tests for reserving media IDs and claiming them with uploads.

mod common;

use chrono::{Duration as ChronoDuration, Utc};
use common::{ALICE, BOB, Harness, LOCAL, body, test_config};
use mediastore_core::ExpiringMediaRecord;
use mediastore_error::ErrorCategory;
use mediastore_interface::MediaDatabase;
use mediastore_pipeline::{CreatePipeline, UploadPipeline, UploadRequest};
use std::time::Duration;

#[tokio::test]
async fn test_create_then_put() {
    let h = Harness::new();
    let reservation = CreatePipeline::new(h.ctx.clone())
        .execute(LOCAL, ALICE, None)
        .await
        .unwrap();
    assert_eq!(reservation.user_id, ALICE);
    assert!(reservation.expires_at > Utc::now());

    let record = UploadPipeline::new(h.ctx.clone())
        .execute_put(LOCAL, &reservation.media_id, body(b"later"), "text/plain", "later.txt", ALICE)
        .await
        .unwrap();

    assert_eq!(record.media_id(), &reservation.media_id);
    assert!(h.db.get_expiring(LOCAL, &reservation.media_id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_put_without_reservation_is_expired() {
    let h = Harness::new();
    let err = UploadPipeline::new(h.ctx.clone())
        .execute_put(LOCAL, "unknown", body(b"data"), "text/plain", "x.txt", ALICE)
        .await
        .unwrap_err();
    assert!(err.is(ErrorCategory::Expired), "got {}", err);
}

#[tokio::test]
async fn test_put_after_expiry_is_expired() {
    let h = Harness::new();
    h.db.insert_expiring(&ExpiringMediaRecord {
        origin: LOCAL.to_string(),
        media_id: "lapsed".to_string(),
        user_id: ALICE.to_string(),
        expires_at: Utc::now() - ChronoDuration::seconds(5),
    })
    .await
    .unwrap();

    let err = UploadPipeline::new(h.ctx.clone())
        .execute_put(LOCAL, "lapsed", body(b"data"), "text/plain", "x.txt", ALICE)
        .await
        .unwrap_err();
    assert!(err.is(ErrorCategory::Expired), "got {}", err);
    assert_eq!(h.storage.write_count(), 0);
}

#[tokio::test]
async fn test_put_by_other_user_is_rejected() {
    let h = Harness::new();
    let reservation = CreatePipeline::new(h.ctx.clone())
        .execute(LOCAL, ALICE, None)
        .await
        .unwrap();

    let err = UploadPipeline::new(h.ctx.clone())
        .execute_put(LOCAL, &reservation.media_id, body(b"data"), "text/plain", "x.txt", BOB)
        .await
        .unwrap_err();
    assert!(err.is(ErrorCategory::WrongUser), "got {}", err);
}

#[tokio::test]
async fn test_second_put_is_already_uploaded() {
    let h = Harness::new();
    let reservation = CreatePipeline::new(h.ctx.clone())
        .execute(LOCAL, ALICE, Some(Duration::from_secs(60)))
        .await
        .unwrap();
    let uploads = UploadPipeline::new(h.ctx.clone());

    uploads
        .execute_put(LOCAL, &reservation.media_id, body(b"one"), "text/plain", "x.txt", ALICE)
        .await
        .unwrap();
    let err = uploads
        .execute_put(LOCAL, &reservation.media_id, body(b"two"), "text/plain", "x.txt", ALICE)
        .await
        .unwrap_err();
    assert!(err.is(ErrorCategory::AlreadyUploaded), "got {}", err);
}

fn request_for(media_id: &str, user_id: &str) -> UploadRequest {
    UploadRequest::builder()
        .origin(LOCAL)
        .media_id(media_id)
        .content_type("text/plain")
        .file_name("x.txt")
        .user_id(user_id)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_explicit_id_without_reservation_is_expired() {
    let h = Harness::new();
    let err = UploadPipeline::new(h.ctx.clone())
        .execute(request_for("never-reserved", ALICE), body(b"data"))
        .await
        .unwrap_err();
    assert!(err.is(ErrorCategory::Expired), "got {}", err);
    assert!(h.db.get_media(LOCAL, "never-reserved").await.unwrap().is_none());
    assert_eq!(h.storage.write_count(), 0);
}

#[tokio::test]
async fn test_explicit_id_held_by_other_user_is_rejected() {
    let h = Harness::new();
    let reservation = CreatePipeline::new(h.ctx.clone())
        .execute(LOCAL, ALICE, None)
        .await
        .unwrap();

    let err = UploadPipeline::new(h.ctx.clone())
        .execute(request_for(&reservation.media_id, BOB), body(b"data"))
        .await
        .unwrap_err();
    assert!(err.is(ErrorCategory::WrongUser), "got {}", err);
    assert!(h.db.get_expiring(LOCAL, &reservation.media_id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_explicit_id_claims_own_reservation() {
    let h = Harness::new();
    let reservation = CreatePipeline::new(h.ctx.clone())
        .execute(LOCAL, ALICE, None)
        .await
        .unwrap();
    let uploads = UploadPipeline::new(h.ctx.clone());

    let record = uploads
        .execute(request_for(&reservation.media_id, ALICE), body(b"mine"))
        .await
        .unwrap();
    assert_eq!(record.media_id(), &reservation.media_id);
    assert!(h.db.get_expiring(LOCAL, &reservation.media_id).await.unwrap().is_none());

    let err = uploads
        .execute(request_for(&reservation.media_id, ALICE), body(b"again"))
        .await
        .unwrap_err();
    assert!(err.is(ErrorCategory::AlreadyUploaded), "got {}", err);
}

#[tokio::test]
async fn test_pending_reservations_are_limited() {
    let mut config = test_config();
    config.uploads.max_pending = 2;
    let h = Harness::with_config(config);
    let creates = CreatePipeline::new(h.ctx.clone());

    creates.execute(LOCAL, ALICE, None).await.unwrap();
    creates.execute(LOCAL, ALICE, None).await.unwrap();
    let err = creates.execute(LOCAL, ALICE, None).await.unwrap_err();
    assert!(err.is(ErrorCategory::QuotaExceeded), "got {}", err);

    // Other users have their own allowance.
    creates.execute(LOCAL, BOB, None).await.unwrap();
}

#[tokio::test]
async fn test_reservation_lifetime_defaults_to_config() {
    let mut config = test_config();
    config.uploads.max_age_seconds = 120;
    let h = Harness::with_config(config);

    let before = Utc::now();
    let reservation = CreatePipeline::new(h.ctx.clone())
        .execute(LOCAL, ALICE, None)
        .await
        .unwrap();
    let lifetime = reservation.expires_at - before;
    assert!(lifetime >= ChronoDuration::seconds(119) && lifetime <= ChronoDuration::seconds(121));
}
