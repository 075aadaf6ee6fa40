//! Configuration sections.

use mediastore_core::MediaKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Storage backend type for a datastore.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DatastoreType {
    /// Objects stored under a directory
    File,
    /// Objects held in process memory
    Memory,
}

/// One configured datastore.
///
/// ```toml
/// [[datastores]]
/// id = "local"
/// type = "file"
/// media_kinds = ["local_media", "remote_media", "thumbnails"]
/// path = "/var/lib/mediastore/media"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatastoreConfig {
    /// Stable identifier stored in every locatable
    pub id: String,
    /// Backend type
    #[serde(rename = "type")]
    pub kind: DatastoreType,
    /// Media kinds this datastore accepts
    #[serde(default)]
    pub media_kinds: Vec<MediaKind>,
    /// Root directory for `file` datastores
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Directory for upload buffers
    #[serde(default)]
    pub temp_path: Option<PathBuf>,
    /// Soft capacity used by `primary_with_overflow`
    #[serde(default)]
    pub capacity_bytes: Option<u64>,
}

impl DatastoreConfig {
    /// True if the datastore accepts `kind`.
    pub fn accepts(&self, kind: MediaKind) -> bool {
        self.media_kinds.contains(&kind)
    }
}

/// How a datastore is chosen among those accepting a media kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DatastorePolicy {
    /// Rotate through usable datastores
    #[default]
    RoundRobin,
    /// First datastore with room, overflowing to the next
    PrimaryWithOverflow,
}

/// Glob-matched quota rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserQuotaConfig {
    /// User ID glob, e.g. `@*:example.org`
    pub glob: String,
    /// Maximum uploaded bytes, negative for unlimited
    #[serde(default = "default_unlimited")]
    pub max_bytes: i64,
    /// Maximum live reservations, zero for unlimited
    #[serde(default)]
    pub max_pending: i64,
    /// Maximum uploaded files, zero for unlimited
    #[serde(default)]
    pub max_files: i64,
}

fn default_unlimited() -> i64 {
    -1
}

/// Upload quota settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuotaConfig {
    /// Whether per-user quota rules apply
    #[serde(default)]
    pub enabled: bool,
    /// Rules checked in order; the first match wins
    #[serde(default)]
    pub user_quotas: Vec<UserQuotaConfig>,
}

/// Upload policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadsConfig {
    /// Largest accepted local upload
    #[serde(default = "default_max_size_bytes")]
    pub max_size_bytes: u64,
    /// Smallest accepted local upload, enforced by callers
    #[serde(default)]
    pub min_size_bytes: u64,
    /// Default limit on live two-phase reservations per user
    #[serde(default = "default_max_pending")]
    pub max_pending: i64,
    /// Lifetime of a two-phase reservation
    #[serde(default = "default_max_age_seconds")]
    pub max_age_seconds: u64,
    /// Per-user quotas
    #[serde(default)]
    pub quota: QuotaConfig,
}

fn default_max_size_bytes() -> u64 {
    104_857_600
}

fn default_max_pending() -> i64 {
    5
}

fn default_max_age_seconds() -> u64 {
    1800
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: default_max_size_bytes(),
            min_size_bytes: 0,
            max_pending: default_max_pending(),
            max_age_seconds: default_max_age_seconds(),
            quota: QuotaConfig::default(),
        }
    }
}

/// Remote download policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadsConfig {
    /// Largest accepted remote media
    #[serde(default = "default_max_size_bytes")]
    pub max_size_bytes: u64,
    /// Concurrent remote fetches
    #[serde(default = "default_num_workers")]
    pub num_workers: usize,
    /// How long a failed remote fetch is remembered
    #[serde(default = "default_failure_cache_seconds")]
    pub failure_cache_seconds: u64,
    /// Upper bound on a whole download or thumbnail request
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

fn default_num_workers() -> usize {
    10
}

fn default_failure_cache_seconds() -> u64 {
    300
}

fn default_request_timeout_seconds() -> u64 {
    1200
}

impl Default for DownloadsConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: default_max_size_bytes(),
            num_workers: default_num_workers(),
            failure_cache_seconds: default_failure_cache_seconds(),
            request_timeout_seconds: default_request_timeout_seconds(),
        }
    }
}

/// An allowed thumbnail size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThumbnailSize {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl ThumbnailSize {
    /// Create a size.
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Thumbnail policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThumbnailsConfig {
    /// Allowed output sizes
    #[serde(default = "default_thumbnail_sizes")]
    pub sizes: Vec<ThumbnailSize>,
    /// Serve exactly the requested size when it is below the largest
    #[serde(default)]
    pub dynamic_sizing: bool,
    /// Concurrent thumbnail generations
    #[serde(default = "default_num_workers")]
    pub num_workers: usize,
    /// Largest source media that will be thumbnailed
    #[serde(default = "default_max_source_bytes")]
    pub max_source_bytes: u64,
}

fn default_thumbnail_sizes() -> Vec<ThumbnailSize> {
    vec![
        ThumbnailSize::new(32, 32),
        ThumbnailSize::new(96, 96),
        ThumbnailSize::new(320, 240),
        ThumbnailSize::new(640, 480),
        ThumbnailSize::new(800, 600),
    ]
}

fn default_max_source_bytes() -> u64 {
    10_485_760
}

impl Default for ThumbnailsConfig {
    fn default() -> Self {
        Self {
            sizes: default_thumbnail_sizes(),
            dynamic_sizing: false,
            num_workers: default_num_workers(),
            max_source_bytes: default_max_source_bytes(),
        }
    }
}

/// Content cache policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Whether the in-memory cache is used
    #[serde(default)]
    pub enabled: bool,
    /// Total cached bytes before eviction
    #[serde(default = "default_cache_max_size")]
    pub max_size_bytes: u64,
    /// Items above this size are not cached
    #[serde(default = "default_cache_max_item")]
    pub max_item_bytes: u64,
    /// Time-to-live for cached items
    #[serde(default = "default_cache_ttl")]
    pub ttl_seconds: u64,
}

fn default_cache_max_size() -> u64 {
    1_073_741_824
}

fn default_cache_max_item() -> u64 {
    104_857_600
}

fn default_cache_ttl() -> u64 {
    3600
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_size_bytes: default_cache_max_size(),
            max_item_bytes: default_cache_max_item(),
            ttl_seconds: default_cache_ttl(),
        }
    }
}

/// Upload lock policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockConfig {
    /// Whether uploads are serialized by content hash
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// How long a held lock survives a crashed holder
    #[serde(default = "default_lock_ttl")]
    pub ttl_seconds: u64,
    /// Give up acquiring after this long
    #[serde(default = "default_lock_attempt")]
    pub max_attempt_seconds: u64,
}

fn default_true() -> bool {
    true
}

fn default_lock_ttl() -> u64 {
    300
}

fn default_lock_attempt() -> u64 {
    30
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_seconds: default_lock_ttl(),
            max_attempt_seconds: default_lock_attempt(),
        }
    }
}

/// Quarantine presentation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuarantineConfig {
    /// Image served in place of quarantined thumbnails
    #[serde(default)]
    pub thumbnail_path: Option<PathBuf>,
}

/// Held media ID sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeldIdsConfig {
    /// Time between sweeps
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
    /// Held IDs older than this are released
    #[serde(default = "default_held_max_age")]
    pub max_age_seconds: u64,
}

fn default_sweep_interval() -> u64 {
    600
}

fn default_held_max_age() -> u64 {
    3600
}

impl Default for HeldIdsConfig {
    fn default() -> Self {
        Self {
            sweep_interval_seconds: default_sweep_interval(),
            max_age_seconds: default_held_max_age(),
        }
    }
}

/// Log output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable logs
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
