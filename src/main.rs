use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use filehost::config::ConfigStore;
use filehost::{routes, watcher, AppState};

#[derive(Parser, Debug)]
#[command(name = "filehost")]
#[command(about = "Multi-mount file host with hot-reloadable configuration")]
#[command(version)]
struct Cli {
    /// Config file path
    #[arg(short, long, env = "FILEHOST_CONFIG", default_value = "config.json")]
    config: PathBuf,

    /// Override the configured bind address
    #[arg(long, env = "FILEHOST_HOST")]
    host: Option<String>,

    /// Override the configured port
    #[arg(short, long, env = "FILEHOST_PORT")]
    port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long, env = "FILEHOST_VERBOSE")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "filehost=debug,tower_http=debug"
    } else {
        "filehost=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let store = Arc::new(ConfigStore::open(&cli.config)?);
    let snapshot = store.current();

    if snapshot.mounts().is_empty() {
        warn!("no mounts configured; every request will be a 404");
    }
    for mount in snapshot.mounts().iter() {
        info!(key = %mount.key, base = %mount.base.display(), "mount configured");
    }
    info!(protect = ?snapshot.protect().names(), "operation protection");

    if snapshot.watchdog() {
        if let Err(err) = watcher::spawn(store.clone()) {
            warn!(error = %err, "config watching unavailable");
        }
    }

    let host = cli.host.unwrap_or_else(|| snapshot.host());
    let port = cli.port.unwrap_or_else(|| snapshot.port());

    let app = routes::router(AppState { store });

    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    info!("starting filehost on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
