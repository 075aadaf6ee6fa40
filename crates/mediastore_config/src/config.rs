//! Top-level configuration and loading.

use crate::{
    CacheConfig, DatastoreConfig, DatastorePolicy, DatastoreType, DownloadsConfig, HeldIdsConfig,
    LockConfig, LoggingConfig, QuarantineConfig, ThumbnailsConfig, UploadsConfig,
};
use config::{Config, Environment, File, FileFormat};
use mediastore_core::MediaKind;
use mediastore_error::{ConfigError, MediaStoreError, MediaStoreResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Media kinds every deployment must be able to store.
const REQUIRED_KINDS: [MediaKind; 3] = [
    MediaKind::LocalMedia,
    MediaKind::RemoteMedia,
    MediaKind::Thumbnails,
];

/// Complete mediastore configuration.
///
/// # Example
///
/// ```toml
/// server_names = ["example.org"]
///
/// [[datastores]]
/// id = "local"
/// type = "file"
/// media_kinds = ["local_media", "remote_media", "thumbnails"]
/// path = "/var/lib/mediastore"
///
/// [uploads]
/// max_size_bytes = 104857600
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MediaStoreConfig {
    /// Origins served by this deployment, never fetched remotely
    #[serde(default)]
    pub server_names: Vec<String>,
    /// Storage backends
    #[serde(default)]
    pub datastores: Vec<DatastoreConfig>,
    /// Datastore selection policy
    #[serde(default)]
    pub datastore_policy: DatastorePolicy,
    /// Upload policy
    #[serde(default)]
    pub uploads: UploadsConfig,
    /// Remote download policy
    #[serde(default)]
    pub downloads: DownloadsConfig,
    /// Thumbnail policy
    #[serde(default)]
    pub thumbnails: ThumbnailsConfig,
    /// Content cache
    #[serde(default)]
    pub cache: CacheConfig,
    /// Upload lock
    #[serde(default)]
    pub lock: LockConfig,
    /// Quarantine presentation
    #[serde(default)]
    pub quarantine: QuarantineConfig,
    /// Held media ID sweep
    #[serde(default)]
    pub held_ids: HeldIdsConfig,
    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl MediaStoreConfig {
    /// Load configuration from a single file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation.
    #[instrument(skip_all)]
    pub fn from_file(path: impl AsRef<std::path::Path>) -> MediaStoreResult<Self> {
        debug!(path = %path.as_ref().display(), "Loading configuration from file");

        let config: Self = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .map_err(|e| {
                MediaStoreError::from(ConfigError::new(format!(
                    "Failed to read configuration from {}: {}",
                    path.as_ref().display(),
                    e
                )))
            })?
            .try_deserialize()
            .map_err(|e| {
                MediaStoreError::from(ConfigError::new(format!(
                    "Failed to parse configuration: {}",
                    e
                )))
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or fails validation.
    pub fn from_toml_str(toml: &str) -> MediaStoreResult<Self> {
        let config: Self = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| ConfigError::new(format!("Failed to parse configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with precedence: environment > user files > bundled default.
    ///
    /// Configuration sources in order of precedence (later sources override earlier):
    /// 1. Bundled defaults (mediastore.toml shipped with the library)
    /// 2. User config in home directory (~/.config/mediastore/mediastore.toml)
    /// 3. User config in current directory (./mediastore.toml)
    /// 4. `MEDIASTORE__SECTION__KEY` environment variables
    ///
    /// User config files are optional and silently skipped if not found.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use mediastore_config::MediaStoreConfig;
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let config = MediaStoreConfig::load()?;
    /// # Ok(())
    /// # }
    /// ```
    #[instrument]
    pub fn load() -> MediaStoreResult<Self> {
        debug!("Loading configuration with precedence: env > current dir > home dir > bundled defaults");

        // Bundled default configuration
        const DEFAULT_CONFIG: &str = include_str!("../../../mediastore.toml");

        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".config/mediastore/mediastore.toml");
            builder = builder.add_source(File::from(home_config).required(false));
        }

        builder = builder
            .add_source(File::with_name("mediastore").required(false))
            .add_source(
                Environment::with_prefix("MEDIASTORE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        let config: Self = builder
            .build()
            .map_err(|e| {
                MediaStoreError::from(ConfigError::new(format!(
                    "Failed to build configuration: {}",
                    e
                )))
            })?
            .try_deserialize()
            .map_err(|e| {
                MediaStoreError::from(ConfigError::new(format!(
                    "Failed to parse configuration: {}",
                    e
                )))
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] describing the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = std::collections::HashSet::new();
        for ds in &self.datastores {
            if !seen.insert(ds.id.as_str()) {
                return Err(ConfigError::new(format!("Duplicate datastore id {}", ds.id)));
            }
            if ds.kind == DatastoreType::File && ds.path.is_none() {
                return Err(ConfigError::new(format!(
                    "File datastore {} requires a path",
                    ds.id
                )));
            }
        }
        for kind in REQUIRED_KINDS {
            if !self.datastores.iter().any(|ds| ds.accepts(kind)) {
                return Err(ConfigError::new(format!(
                    "No datastore accepts {} media",
                    kind
                )));
            }
        }
        if self.thumbnails.sizes.is_empty() {
            return Err(ConfigError::new("Thumbnail sizes must not be empty"));
        }
        if self
            .thumbnails
            .sizes
            .iter()
            .any(|s| s.width == 0 || s.height == 0)
        {
            return Err(ConfigError::new("Thumbnail sizes must be positive"));
        }
        if self.thumbnails.num_workers == 0 || self.downloads.num_workers == 0 {
            return Err(ConfigError::new("Worker counts must be positive"));
        }
        Ok(())
    }

    /// True if `origin` is served by this deployment.
    pub fn is_local_origin(&self, origin: &str) -> bool {
        self.server_names.iter().any(|name| name == origin)
    }
}
