//! Shared fixtures for pipeline tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use mediastore_cache::drain;
use mediastore_config::{DatastoreConfig, DatastorePolicy, DatastoreType, MediaStoreConfig};
use mediastore_core::{ByteStream, MediaKind, bytes_stream, collect_bytes};
use mediastore_database::InMemoryMediaDatabase;
use mediastore_error::{MediaErrorKind, MediaStoreError, MediaStoreResult};
use mediastore_interface::{
    FederationClient, GeneratedThumbnail, RemoteMedia, SpamChecker, SpamMetadata,
    ThumbnailGenerator, ThumbnailSpec,
};
use mediastore_pipeline::MediaContext;
use mediastore_storage::{Datastores, MemoryStorage};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const LOCAL: &str = "local.test";
pub const REMOTE: &str = "remote.test";
pub const ALICE: &str = "@alice:local.test";
pub const BOB: &str = "@bob:local.test";

pub fn test_config() -> MediaStoreConfig {
    let mut config = MediaStoreConfig::default();
    config.server_names = vec![LOCAL.to_string()];
    config.datastores = vec![DatastoreConfig {
        id: "mem".into(),
        kind: DatastoreType::Memory,
        media_kinds: vec![
            MediaKind::LocalMedia,
            MediaKind::RemoteMedia,
            MediaKind::Thumbnails,
        ],
        path: None,
        temp_path: None,
        capacity_bytes: None,
    }];
    config
}

/// A context over in-memory storage and database, with handles to both.
pub struct Harness {
    pub ctx: MediaContext,
    pub db: Arc<InMemoryMediaDatabase>,
    pub storage: Arc<MemoryStorage>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: MediaStoreConfig) -> Self {
        let db = Arc::new(InMemoryMediaDatabase::new());
        let storage = Arc::new(MemoryStorage::new());
        let datastores = Datastores::new(DatastorePolicy::RoundRobin)
            .with_datastore(config.datastores[0].clone(), storage.clone());
        let ctx = MediaContext::new(config, db.clone(), datastores);
        Self { ctx, db, storage }
    }

    /// Replace the context, e.g. after installing collaborators.
    pub fn map(mut self, f: impl FnOnce(MediaContext) -> MediaContext) -> Self {
        self.ctx = f(self.ctx);
        self
    }
}

pub fn body(data: &'static [u8]) -> ByteStream {
    bytes_stream(Bytes::from_static(data))
}

pub async fn read_all(stream: impl futures::Stream<Item = std::io::Result<Bytes>> + Unpin) -> Bytes {
    collect_bytes(stream).await.unwrap()
}

/// Remote origin serving a fixed set of media, counting fetches.
#[derive(Default)]
pub struct FakeFederation {
    media: Mutex<HashMap<(String, String), (Bytes, Option<String>)>>,
    fetches: AtomicUsize,
    delay: Mutex<Duration>,
    size_hint: Mutex<Option<u64>>,
}

impl FakeFederation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(self, origin: &str, media_id: &str, data: &'static [u8], content_type: &str) -> Self {
        self.media.lock().unwrap().insert(
            (origin.to_string(), media_id.to_string()),
            (Bytes::from_static(data), Some(content_type.to_string())),
        );
        self
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        *self.delay.lock().unwrap() = delay;
        self
    }

    pub fn with_size_hint(self, size: u64) -> Self {
        *self.size_hint.lock().unwrap() = Some(size);
        self
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FederationClient for FakeFederation {
    async fn fetch_remote_media(&self, origin: &str, media_id: &str) -> MediaStoreResult<RemoteMedia> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let found = self
            .media
            .lock()
            .unwrap()
            .get(&(origin.to_string(), media_id.to_string()))
            .cloned();
        let (data, content_type) =
            found.ok_or_else(|| MediaStoreError::media(MediaErrorKind::NotFound))?;
        let size_hint = self.size_hint.lock().unwrap().or(Some(data.len() as u64));
        Ok(RemoteMedia {
            stream: bytes_stream(data),
            content_type,
            file_name: Some("remote.bin".to_string()),
            size_hint,
        })
    }
}

/// Flags any upload whose bytes contain `SPAM`.
#[derive(Debug, Default)]
pub struct KeywordSpamChecker;

#[async_trait]
impl SpamChecker for KeywordSpamChecker {
    async fn check_for_spam(&self, stream: ByteStream, _metadata: &SpamMetadata) -> MediaStoreResult<bool> {
        let data = collect_bytes(stream).await?;
        Ok(data.windows(4).any(|w| w == b"SPAM"))
    }
}

/// Spam checker that never reads its stream.
#[derive(Debug, Default)]
pub struct LazySpamChecker;

#[async_trait]
impl SpamChecker for LazySpamChecker {
    async fn check_for_spam(&self, stream: ByteStream, _metadata: &SpamMetadata) -> MediaStoreResult<bool> {
        drop(stream);
        Ok(false)
    }
}

/// Thumbnailer producing `thumb:{w}x{h}` for images.
#[derive(Debug, Default)]
pub struct FakeThumbnailer {
    generated: AtomicUsize,
    static_only: AtomicBool,
    too_small: AtomicBool,
}

impl FakeThumbnailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Never produce animated output, whatever was asked.
    pub fn static_only(self) -> Self {
        self.static_only.store(true, Ordering::SeqCst);
        self
    }

    /// Report every source as smaller than requested.
    pub fn too_small(self) -> Self {
        self.too_small.store(true, Ordering::SeqCst);
        self
    }

    pub fn generated(&self) -> usize {
        self.generated.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ThumbnailGenerator for FakeThumbnailer {
    fn supports(&self, content_type: &str) -> bool {
        content_type.starts_with("image/")
    }

    async fn generate(
        &self,
        source: ByteStream,
        _content_type: &str,
        spec: ThumbnailSpec,
    ) -> MediaStoreResult<GeneratedThumbnail> {
        drain(source).await?;
        if self.too_small.load(Ordering::SeqCst) {
            return Err(MediaStoreError::media(MediaErrorKind::DimensionsTooSmall));
        }
        self.generated.fetch_add(1, Ordering::SeqCst);
        let output = format!("thumb:{}x{}", spec.width, spec.height);
        Ok(GeneratedThumbnail {
            stream: bytes_stream(Bytes::from(output)),
            content_type: "image/png".to_string(),
            animated: spec.animated && !self.static_only.load(Ordering::SeqCst),
        })
    }
}
