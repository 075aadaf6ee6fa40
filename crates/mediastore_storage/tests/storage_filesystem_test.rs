//! Tests for filesystem storage backend.

use bytes::Bytes;
use mediastore_core::{ByteRange, bytes_stream, collect_bytes};
use mediastore_error::{MediaStoreErrorKind, StorageErrorKind};
use mediastore_storage::{DatastoreBackend, FileSystemStorage, compute_hash};
use tempfile::TempDir;

#[tokio::test]
async fn test_upload_and_download() {
    let temp_dir = TempDir::new().unwrap();
    let storage = FileSystemStorage::new(temp_dir.path()).unwrap();

    let data = Bytes::from_static(b"Hello, world!");
    let hash = compute_hash(&data);

    let location = storage
        .upload(bytes_stream(data.clone()), data.len() as u64, "text/plain", &hash)
        .await
        .unwrap();

    // Object lands in the two-level fan-out
    let path = temp_dir
        .path()
        .join(&location[0..2])
        .join(&location[2..4])
        .join(&location[4..]);
    assert!(path.exists());

    let retrieved = collect_bytes(storage.download(&location).await.unwrap())
        .await
        .unwrap();
    assert_eq!(retrieved, data);
}

#[tokio::test]
async fn test_each_upload_gets_its_own_object() {
    let temp_dir = TempDir::new().unwrap();
    let storage = FileSystemStorage::new(temp_dir.path()).unwrap();

    let data = Bytes::from_static(b"Duplicate content");
    let hash = compute_hash(&data);

    let first = storage
        .upload(bytes_stream(data.clone()), data.len() as u64, "text/plain", &hash)
        .await
        .unwrap();
    let second = storage
        .upload(bytes_stream(data.clone()), data.len() as u64, "text/plain", &hash)
        .await
        .unwrap();
    assert_ne!(first, second);
}

#[tokio::test]
async fn test_hash_verification() {
    let temp_dir = TempDir::new().unwrap();
    let storage = FileSystemStorage::new(temp_dir.path()).unwrap();

    let data = Bytes::from_static(b"Original data");
    let wrong_hash = compute_hash(b"Different data");

    let err = storage
        .upload(bytes_stream(data.clone()), data.len() as u64, "video/mp4", &wrong_hash)
        .await
        .unwrap_err();
    match err.kind() {
        MediaStoreErrorKind::Storage(e) => {
            assert!(matches!(e.kind, StorageErrorKind::HashMismatch { .. }))
        }
        other => panic!("unexpected error: {}", other),
    }

    // Rejected upload leaves nothing behind
    let mut files = Vec::new();
    let mut dirs = vec![temp_dir.path().to_path_buf()];
    while let Some(dir) = dirs.pop() {
        for entry in std::fs::read_dir(dir).unwrap() {
            let entry = entry.unwrap();
            if entry.file_type().unwrap().is_dir() {
                dirs.push(entry.path());
            } else {
                files.push(entry.path());
            }
        }
    }
    assert!(files.is_empty(), "leftover files: {:?}", files);
}

#[tokio::test]
async fn test_size_verification() {
    let temp_dir = TempDir::new().unwrap();
    let storage = FileSystemStorage::new(temp_dir.path()).unwrap();

    let data = Bytes::from_static(b"twelve bytes");
    let hash = compute_hash(&data);

    let err = storage
        .upload(bytes_stream(data), 99, "text/plain", &hash)
        .await
        .unwrap_err();
    assert!(format!("{}", err).contains("Size mismatch"));
}

#[tokio::test]
async fn test_range_download_seeks() {
    let temp_dir = TempDir::new().unwrap();
    let storage = FileSystemStorage::new(temp_dir.path()).unwrap();

    let data = Bytes::from_static(b"0123456789");
    let hash = compute_hash(&data);
    let location = storage
        .upload(bytes_stream(data.clone()), 10, "text/plain", &hash)
        .await
        .unwrap();

    let slice = collect_bytes(
        storage
            .download_range(&location, ByteRange::new(3, Some(7)))
            .await
            .unwrap(),
    )
    .await
    .unwrap();
    assert_eq!(&slice[..], b"3456");

    let tail = collect_bytes(
        storage
            .download_range(&location, ByteRange::from_start(8))
            .await
            .unwrap(),
    )
    .await
    .unwrap();
    assert_eq!(&tail[..], b"89");
}

#[tokio::test]
async fn test_remove_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let storage = FileSystemStorage::new(temp_dir.path()).unwrap();

    let data = Bytes::from_static(b"short lived");
    let hash = compute_hash(&data);
    let location = storage
        .upload(bytes_stream(data.clone()), data.len() as u64, "text/plain", &hash)
        .await
        .unwrap();

    storage.remove(&location).await.unwrap();
    assert!(storage.download(&location).await.is_err());

    // Removing again is not an error
    storage.remove(&location).await.unwrap();
}

#[tokio::test]
async fn test_download_missing_object() {
    let temp_dir = TempDir::new().unwrap();
    let storage = FileSystemStorage::new(temp_dir.path()).unwrap();

    let err = match storage.download("00000000000000000000000000000000").await {
        Ok(_) => panic!("expected a missing object"),
        Err(err) => err,
    };
    assert!(format!("{}", err).contains("not found"));
}
