//! Tests for the configuration system.

use mediastore_config::{DatastorePolicy, DatastoreType, MediaStoreConfig, ThumbnailSize};
use mediastore_core::MediaKind;
use std::io::Write;

const MINIMAL: &str = r#"
server_names = ["example.org"]

[[datastores]]
id = "mem"
type = "memory"
media_kinds = ["local_media", "remote_media", "thumbnails"]
"#;

#[test]
fn test_load_bundled_defaults() {
    let config = MediaStoreConfig::load().unwrap();

    assert!(!config.datastores.is_empty());
    assert_eq!(config.datastore_policy, DatastorePolicy::RoundRobin);
    assert!(config.thumbnails.sizes.contains(&ThumbnailSize::new(96, 96)));
    assert_eq!(config.lock.max_attempt_seconds, 30);
}

#[test]
fn test_minimal_config_fills_defaults() {
    let config = MediaStoreConfig::from_toml_str(MINIMAL).unwrap();

    assert!(config.is_local_origin("example.org"));
    assert!(!config.is_local_origin("remote.example"));
    assert_eq!(config.datastores[0].kind, DatastoreType::Memory);
    assert!(config.datastores[0].accepts(MediaKind::Thumbnails));
    assert!(!config.datastores[0].accepts(MediaKind::Archives));
    assert_eq!(config.uploads.max_pending, 5);
    assert_eq!(config.uploads.max_age_seconds, 1800);
    assert_eq!(config.downloads.failure_cache_seconds, 300);
    assert!(!config.thumbnails.dynamic_sizing);
    assert!(!config.uploads.quota.enabled);
}

#[test]
fn test_missing_kind_rejected() {
    let toml = r#"
[[datastores]]
id = "mem"
type = "memory"
media_kinds = ["local_media"]
"#;
    let err = MediaStoreConfig::from_toml_str(toml).unwrap_err();
    assert!(format!("{}", err).contains("remote_media"));
}

#[test]
fn test_file_datastore_requires_path() {
    let toml = r#"
[[datastores]]
id = "disk"
type = "file"
media_kinds = ["local_media", "remote_media", "thumbnails"]
"#;
    let err = MediaStoreConfig::from_toml_str(toml).unwrap_err();
    assert!(format!("{}", err).contains("requires a path"));
}

#[test]
fn test_empty_thumbnail_sizes_rejected() {
    let toml = format!("{}\n[thumbnails]\nsizes = []\n", MINIMAL);
    assert!(MediaStoreConfig::from_toml_str(&toml).is_err());
}

#[test]
fn test_user_quota_rules_parse() {
    let toml = format!(
        r#"{}
[uploads.quota]
enabled = true

[[uploads.quota.user_quotas]]
glob = "@*:example.org"
max_bytes = 1000
max_files = 3
"#,
        MINIMAL
    );
    let config = MediaStoreConfig::from_toml_str(&toml).unwrap();
    let rule = &config.uploads.quota.user_quotas[0];
    assert_eq!(rule.max_bytes, 1000);
    assert_eq!(rule.max_files, 3);
    assert_eq!(rule.max_pending, 0);
}

#[test]
fn test_from_file() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(MINIMAL.as_bytes()).unwrap();
    file.flush().unwrap();

    let config = MediaStoreConfig::from_file(file.path()).unwrap();
    assert_eq!(config.server_names, vec!["example.org".to_string()]);
}
