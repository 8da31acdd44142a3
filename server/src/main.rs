use anyhow::Result;
use clap::Parser;
use docseek_core::SnapshotFormat;
use docseek_crawler::LockScope;
use docseek_server::{build_app, open_index, spawn_crawler, ServeConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "docseek-server")]
#[command(about = "Index a folder in the background and serve ranked search over HTTP")]
struct Args {
    /// Folder to index and serve
    folder: PathBuf,
    /// Address to bind
    #[arg(long, default_value = "127.0.0.1:6969")]
    address: SocketAddr,
    /// Snapshot encoding stored next to the indexed documents
    #[arg(long, default_value_t = SnapshotFormat::Json)]
    format: SnapshotFormat,
    /// Hold the index lock per file or for the whole walk while crawling
    #[arg(long, default_value_t = LockScope::PerFile)]
    lock_scope: LockScope,
    /// Re-crawl the folder every N seconds (crawl once when omitted)
    #[arg(long)]
    rescan_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();
    let args = Args::parse();

    let mut config = ServeConfig::new(args.folder);
    config.format = args.format;
    config.lock_scope = args.lock_scope;
    config.rescan = args.rescan_secs.filter(|&s| s > 0).map(Duration::from_secs);

    anyhow::ensure!(config.folder.is_dir(), "{} is not a directory", config.folder.display());
    let index = open_index(&config)?;
    let app = build_app(index.clone(), &config);
    spawn_crawler(index, config);

    let listener = TcpListener::bind(args.address).await?;
    tracing::info!(addr = %args.address, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
