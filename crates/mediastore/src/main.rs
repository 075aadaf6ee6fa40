//! Mediastore CLI binary.
//!
//! This binary provides command-line access to the media pipelines:
//! - Validate a configuration and show where media would be stored
//! - Ingest files through the upload pipeline and report deduplication

use clap::{Parser, Subcommand};
use mediastore::{
    MediaKind, MediaStore, MediaStoreConfig, UploadRequest, bytes_stream, init_logging,
    init_telemetry,
};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "mediastore")]
#[command(about = "Content-addressed media store", long_about = None)]
struct Cli {
    /// Configuration file; the layered defaults are used when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level regardless of configuration
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Also export spans to stdout through OpenTelemetry
    #[arg(long, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration and list datastores
    Check,

    /// Upload files into a throwaway in-memory store
    Ingest {
        /// Files to upload
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Origin to store under; the first server name by default
        #[arg(long)]
        origin: Option<String>,

        /// Uploading user
        #[arg(long, default_value = "@cli:localhost")]
        user: String,

        /// MIME type declared for every file
        #[arg(long, default_value = "application/octet-stream")]
        content_type: String,
    },
}

fn load_config(path: Option<&Path>) -> Result<MediaStoreConfig, Box<dyn std::error::Error>> {
    Ok(match path {
        Some(path) => MediaStoreConfig::from_file(path)?,
        None => MediaStoreConfig::load()?,
    })
}

fn check(config: &MediaStoreConfig) {
    println!("Configuration is valid");
    println!("Server names: {}", config.server_names.join(", "));
    println!("Datastore policy: {}", config.datastore_policy);
    for ds in &config.datastores {
        let kinds: Vec<String> = ds.media_kinds.iter().map(MediaKind::to_string).collect();
        println!("  {} ({:?}): {}", ds.id, ds.kind, kinds.join(", "));
    }
}

async fn ingest(
    config: MediaStoreConfig,
    files: &[PathBuf],
    origin: Option<String>,
    user: &str,
    content_type: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let origin = origin
        .or_else(|| config.server_names.first().cloned())
        .ok_or("no origin given and no server names configured")?;
    let store = MediaStore::in_memory(config)?;

    let mut hashes = HashSet::new();
    for path in files {
        let data = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let request = UploadRequest::builder()
            .origin(origin.as_str())
            .content_type(content_type)
            .file_name(file_name)
            .user_id(user)
            .build()?;
        let record = store.upload(request, bytes_stream(data.into())).await?;
        println!("{}  {}  {}", record.mxc(), record.content_hash(), path.display());
        hashes.insert(record.content_hash().to_string());
    }
    println!("{} files, {} distinct objects", files.len(), hashes.len());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command-line arguments
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    // Initialize tracing
    let level = if cli.verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    let _provider = if cli.trace {
        Some(init_telemetry("mediastore", level, config.logging.json)?)
    } else {
        init_logging(level, config.logging.json)?;
        None
    };

    match cli.command {
        Commands::Check => check(&config),
        Commands::Ingest {
            files,
            origin,
            user,
            content_type,
        } => ingest(config, &files, origin, &user, &content_type).await?,
    }

    Ok(())
}
