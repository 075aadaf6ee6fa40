//! Tests for the assembled media store.

use bytes::Bytes;
use mediastore::{
    DownloadOptions, ErrorCategory, MediaStore, MediaStoreConfig, ThumbnailMethod,
    ThumbnailOptions, UploadRequest, bytes_stream, collect_bytes,
};
use std::io::Write;
use tokio_util::sync::CancellationToken;

const CONFIG: &str = r#"
server_names = ["local.test"]

[[datastores]]
id = "memory"
type = "memory"
media_kinds = ["local_media", "remote_media", "thumbnails"]
"#;

fn config(cache_enabled: bool) -> MediaStoreConfig {
    let mut config = MediaStoreConfig::from_toml_str(CONFIG).unwrap();
    config.cache.enabled = cache_enabled;
    config
}

fn request(content_type: &str) -> UploadRequest {
    UploadRequest::builder()
        .origin("local.test")
        .content_type(content_type)
        .file_name("file")
        .user_id("@alice:local.test")
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_upload_then_download() {
    let store = MediaStore::in_memory(config(false)).unwrap();
    let record = store
        .upload(request("text/plain"), bytes_stream(Bytes::from_static(b"stored once")))
        .await
        .unwrap();
    assert_eq!(record.origin(), "local.test");

    let outcome = store
        .download("local.test", record.media_id(), DownloadOptions::default())
        .await
        .unwrap();
    let data = collect_bytes(outcome.stream.unwrap().into_byte_stream())
        .await
        .unwrap();
    assert_eq!(data, "stored once");
}

#[tokio::test]
async fn test_duplicate_content_shares_hash() {
    let store = MediaStore::in_memory(config(false)).unwrap();
    let first = store
        .upload(request("text/plain"), bytes_stream(Bytes::from_static(b"same")))
        .await
        .unwrap();
    let second = store
        .upload(request("text/markdown"), bytes_stream(Bytes::from_static(b"same")))
        .await
        .unwrap();

    assert_ne!(first.media_id(), second.media_id());
    assert_eq!(first.content_hash(), second.content_hash());
    assert_eq!(first.locatable(), second.locatable());
}

#[tokio::test]
async fn test_enabled_cache_serves_downloads() {
    let store = MediaStore::in_memory(config(true)).unwrap();
    let record = store
        .upload(request("text/plain"), bytes_stream(Bytes::from_static(b"hot bytes")))
        .await
        .unwrap();

    store
        .download("local.test", record.media_id(), DownloadOptions::default())
        .await
        .unwrap();
    let stats = store.context().cache().stats();
    assert_eq!(stats.stores, 1);
    assert_eq!(stats.hits, 1);
}

#[tokio::test]
async fn test_disabled_cache_is_not_consulted() {
    let store = MediaStore::in_memory(config(false)).unwrap();
    let record = store
        .upload(request("text/plain"), bytes_stream(Bytes::from_static(b"cold bytes")))
        .await
        .unwrap();

    store
        .download("local.test", record.media_id(), DownloadOptions::default())
        .await
        .unwrap();
    let stats = store.context().cache().stats();
    assert_eq!(stats.stores, 0);
    assert_eq!(stats.hits, 0);
}

#[tokio::test]
async fn test_reserved_upload_round_trip() {
    let store = MediaStore::in_memory(config(false)).unwrap();
    let reservation = store
        .create("local.test", "@alice:local.test", None)
        .await
        .unwrap();

    let record = store
        .upload_reserved(
            "local.test",
            &reservation.media_id,
            bytes_stream(Bytes::from_static(b"later")),
            "text/plain",
            "later.txt",
            "@alice:local.test",
        )
        .await
        .unwrap();
    assert_eq!(record.media_id(), &reservation.media_id);

    let err = store
        .upload_reserved(
            "local.test",
            &reservation.media_id,
            bytes_stream(Bytes::from_static(b"again")),
            "text/plain",
            "again.txt",
            "@alice:local.test",
        )
        .await
        .unwrap_err();
    assert!(err.is(ErrorCategory::AlreadyUploaded), "got {}", err);
}

#[tokio::test]
async fn test_thumbnail_without_decoder_is_unsupported() {
    let store = MediaStore::in_memory(config(false)).unwrap();
    let record = store
        .upload(request("image/png"), bytes_stream(Bytes::from_static(b"pixels")))
        .await
        .unwrap();

    let err = store
        .thumbnail(
            "local.test",
            record.media_id(),
            ThumbnailOptions::new(32, 32, ThumbnailMethod::Scale),
        )
        .await
        .unwrap_err();
    assert!(err.is(ErrorCategory::Unsupported), "got {}", err);
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let mut config = config(false);
    config.datastores.clear();
    let err = MediaStore::in_memory(config).unwrap_err();
    assert!(err.is(ErrorCategory::Internal), "got {}", err);
}

#[tokio::test]
async fn test_config_from_file() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(CONFIG.as_bytes()).unwrap();
    let config = MediaStoreConfig::from_file(file.path()).unwrap();
    assert_eq!(config.server_names, vec!["local.test".to_string()]);
    assert!(MediaStore::in_memory(config).is_ok());
}

#[tokio::test]
async fn test_maintenance_stops_on_shutdown() {
    let store = MediaStore::in_memory(config(false)).unwrap();
    let shutdown = CancellationToken::new();
    let handle = store.spawn_maintenance(shutdown.clone());
    shutdown.cancel();
    handle.await.unwrap();
}
