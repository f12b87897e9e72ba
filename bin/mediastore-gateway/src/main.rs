//! mediastore Gateway
//!
//! Serves media upload and retrieval over HTTP, storing files under a
//! local directory tree and their metadata in a redb database.

use anyhow::Result;
use clap::Parser;
use mediastore_common::Config;
use mediastore_gateway::{AppState, router};
use mediastore_meta_store::MetaStore;
use mediastore_storage::MediaService;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "mediastore-gateway")]
#[command(about = "mediastore HTTP gateway")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        env = "MEDIASTORE_CONFIG",
        default_value = "/etc/mediastore/gateway.toml"
    )]
    config: PathBuf,

    /// Listen address (overrides server.listen)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Media root directory (overrides storage.root)
    #[arg(long)]
    storage_root: Option<PathBuf>,

    /// Metadata database path (overrides metadata.path)
    #[arg(long)]
    metadata_path: Option<PathBuf>,

    /// Log level (overrides logging.level)
    #[arg(long)]
    log_level: Option<String>,

    /// Emit JSON logs
    #[arg(long, default_value_t = false)]
    log_json: bool,
}

impl Args {
    fn apply(self, config: &mut Config) {
        if let Some(listen) = self.listen {
            config.server.listen = listen;
        }
        if let Some(root) = self.storage_root {
            config.storage.root = root;
        }
        if let Some(path) = self.metadata_path {
            config.metadata.path = path;
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
        if self.log_json {
            config.logging.json = true;
        }
    }
}

fn init_logging(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| config.logging.level.clone().into());
    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load(&args.config)?;
    let config_path = args.config.clone();
    args.apply(&mut config);

    init_logging(&config);

    info!("Starting mediastore gateway");
    info!("Config file: {}", config_path.display());
    info!("Metadata database: {}", config.metadata.path.display());

    let source = Arc::new(MetaStore::open(&config.metadata.path)?);
    let media = MediaService::open(&config.storage, source).await?;
    info!(
        "Max upload size: {} bytes (in-memory up to {} bytes)",
        config.storage.max_upload_size, config.storage.memory_threshold
    );

    let app = router(Arc::new(AppState { media }));

    let addr = config.server.listen;
    info!("Starting HTTP server on {}", addr);
    let listener = TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutting down...");
        })
        .await?;

    info!("Gateway shut down gracefully");

    Ok(())
}
