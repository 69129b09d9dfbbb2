//! zkshare broker binary.
//!
//! # Usage
//!
//! ```bash
//! # In-memory tokens (lost on restart)
//! zkshare-server --bind 0.0.0.0:3001
//!
//! # Durable tokens
//! zkshare-server --bind 0.0.0.0:3001 --db /var/lib/zkshare/tokens.redb
//! ```

use std::{path::PathBuf, time::Duration};

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use zkshare_server::{
    BrokerConfig, HttpConfig, MemoryStore, RateLimitConfig, RedbStore, Server, ServerError,
    ServerRuntimeConfig, TokenStore,
};

/// zkshare token broker
#[derive(Parser, Debug)]
#[command(name = "zkshare-server")]
#[command(about = "One-time secret share token broker")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, env = "SERVER_ADDR", default_value = "0.0.0.0:3001")]
    bind: String,

    /// Redb database path (tokens are kept in memory when absent)
    #[arg(long, env = "ZKSHARE_DB")]
    db: Option<PathBuf>,

    /// TTL for tokens issued without one, in hours
    #[arg(long, default_value_t = 24)]
    default_ttl_hours: u64,

    /// Largest TTL a client may request, in hours
    #[arg(long, default_value_t = 720)]
    max_ttl_hours: u64,

    /// Seconds between expiry sweeps
    #[arg(long, default_value_t = 60)]
    sweep_interval_secs: u64,

    /// Requests per client per rate limit window (0 disables)
    #[arg(long, env = "RATE_LIMIT_MAX", default_value_t = 10)]
    rate_limit_max: u32,

    /// Rate limit window in seconds (0 disables)
    #[arg(long, env = "RATE_LIMIT_WINDOW", default_value_t = 3600)]
    rate_limit_window_secs: u64,

    /// Largest accepted request body in bytes
    #[arg(long, default_value_t = 16 * 1024)]
    max_body_bytes: usize,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 30)]
    request_timeout_secs: u64,

    /// Ignore X-Forwarded-For and rate limit by peer address only
    #[arg(long)]
    ignore_forwarded_for: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn runtime_config(&self) -> ServerRuntimeConfig {
        ServerRuntimeConfig {
            bind_address: self.bind.clone(),
            db_path: self.db.clone(),
            broker: BrokerConfig {
                default_ttl: hours(self.default_ttl_hours),
                max_ttl: hours(self.max_ttl_hours),
            },
            rate_limit: RateLimitConfig {
                max_requests: self.rate_limit_max,
                window: Duration::from_secs(self.rate_limit_window_secs),
            },
            http: HttpConfig {
                max_body_bytes: self.max_body_bytes,
                request_timeout: Duration::from_secs(self.request_timeout_secs),
                trust_forwarded_for: !self.ignore_forwarded_for,
            },
            sweep_interval: Duration::from_secs(self.sweep_interval_secs),
        }
    }
}

fn hours(hours: u64) -> Duration {
    Duration::from_secs(hours.saturating_mul(3600))
}

async fn serve<S: TokenStore>(
    config: ServerRuntimeConfig,
    store: S,
) -> Result<(), Box<dyn std::error::Error>> {
    let server = Server::bind(config, store).await?;

    tracing::info!("Server listening on {}", server.local_addr()?);

    server.run().await?;

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("zkshare broker starting");
    tracing::info!("Binding to {}", args.bind);

    let config = args.runtime_config();

    match config.db_path.clone() {
        Some(path) => {
            tracing::info!("Using durable token store at {}", path.display());
            let store = RedbStore::open(&path).map_err(ServerError::Storage)?;
            serve(config, store).await
        },
        None => {
            tracing::warn!("No --db given - tokens are kept in memory and lost on restart");
            serve(config, MemoryStore::new()).await
        },
    }
}
