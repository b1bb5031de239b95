//! Valdore node daemon.
//!
//! Serves the document store and account service over HTTP/WebSocket. State
//! is restored from a JSON snapshot on startup and written back on shutdown
//! unless `--no-persist` is given.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;
use valdore_node::{persist, server, Node};

#[derive(Parser)]
#[command(name = "valdore-node", about = "Valdore storefront data node")]
struct Cli {
    /// Address to bind.
    #[arg(long, default_value = "0.0.0.0")]
    bind: String,

    /// HTTP port to listen on.
    #[arg(long, default_value_t = 3020)]
    port: u16,

    /// Snapshot file (default: <data dir>/valdore/node-snapshot.json).
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Keep everything in memory only.
    #[arg(long)]
    no_persist: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let snapshot_path = (!cli.no_persist)
        .then(|| cli.snapshot.clone().unwrap_or_else(persist::default_snapshot_path));

    let node = match &snapshot_path {
        Some(path) => match persist::load(path)
            .with_context(|| format!("failed to load snapshot {}", path.display()))?
        {
            Some(snapshot) => Node::from_snapshot(snapshot),
            None => {
                info!(path = %path.display(), "no snapshot yet, starting empty");
                Node::new()
            }
        },
        None => Node::new(),
    };

    let addr = format!("{}:{}", cli.bind, cli.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, persist = snapshot_path.is_some(), "valdore node listening");

    let app = server::router(node.clone());
    let shutdown_node = node.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
            shutdown_node.close();
        })
        .await
        .context("server failed")?;

    if let Some(path) = snapshot_path {
        persist::save(&path, &node.snapshot().await)
            .with_context(|| format!("failed to save snapshot {}", path.display()))?;
    }
    Ok(())
}
