//! PingHub server binary.
//!
//! # Usage
//!
//! ```bash
//! # Start with self-signed certificate and in-memory storage (development)
//! pinghub-server --bind 0.0.0.0:4433
//!
//! # Start with TLS certificate and durable storage (production)
//! pinghub-server --bind 0.0.0.0:4433 --cert cert.pem --key key.pem --db pinghub.redb
//! ```

use std::path::PathBuf;

use clap::Parser;
use pinghub_server::{
    MemoryStore, NewcomerPolicy, RedbStore, RouterConfig, Server, ServerRuntimeConfig,
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// PingHub chat server
#[derive(Parser, Debug)]
#[command(name = "pinghub-server")]
#[command(about = "PingHub real-time chat server")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "0.0.0.0:4433")]
    bind: String,

    /// Path to TLS certificate (PEM format)
    #[arg(short, long)]
    cert: Option<String>,

    /// Path to TLS private key (PEM format)
    #[arg(short, long)]
    key: Option<String>,

    /// Path to the redb database file. Omit for in-memory storage.
    #[arg(long)]
    db: Option<PathBuf>,

    /// Maximum concurrent connections
    #[arg(long, default_value = "10000")]
    max_connections: usize,

    /// Seconds after first login during which an identity still gets the
    /// newcomer digest instead of full global history
    #[arg(long, default_value = "60")]
    newcomer_window_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("PingHub server starting");
    tracing::info!("Binding to {}", args.bind);

    if args.cert.is_none() || args.key.is_none() {
        tracing::warn!("No TLS certificate provided - using self-signed certificate");
        tracing::warn!("This is NOT suitable for production use!");
    }

    let config = ServerRuntimeConfig {
        bind_address: args.bind,
        cert_path: args.cert,
        key_path: args.key,
        router: RouterConfig {
            max_connections: args.max_connections,
            newcomer: NewcomerPolicy {
                window_millis: args.newcomer_window_secs * 1_000,
                ..Default::default()
            },
            ..Default::default()
        },
    };

    match args.db {
        Some(path) => {
            tracing::info!("Using redb storage at {}", path.display());
            let store = RedbStore::open(&path)?;
            let server = Server::bind(config, store)?;
            tracing::info!("Server listening on {}", server.local_addr()?);
            server.run().await?;
        },
        None => {
            tracing::warn!("No --db path provided - messages will not survive a restart");
            let store = MemoryStore::new();
            let server = Server::bind(config, store)?;
            tracing::info!("Server listening on {}", server.local_addr()?);
            server.run().await?;
        },
    }

    Ok(())
}
