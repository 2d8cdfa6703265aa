use anyhow::Result;
use clap::Parser;
use coordinator::config::CoordinatorConfig;
use coordinator::fetch::HttpFetcher;
use coordinator::shards::http_shards;
use coordinator::Coordinator;
use search_core::shutdown::wait_for_signal;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "coordinator")]
#[command(about = "Ingest documents and fan queries out to index shards")]
struct Args {
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, env = "API_PORT", default_value_t = 8080)]
    port: u16,
    /// Shard base URLs, comma separated (e.g. http://127.0.0.1:9090,http://127.0.0.1:9091)
    #[arg(long = "shard", env = "SHARD_URLS", value_delimiter = ',', required = true)]
    shards: Vec<String>,
    /// Concurrent ingestion workers
    #[arg(long, env = "INGEST_WORKERS", default_value_t = 4)]
    workers: usize,
    /// Feed requests queued before submitters wait
    #[arg(long, default_value_t = 64)]
    queue_capacity: usize,
    /// Mailbox size of the document and line stores
    #[arg(long, default_value_t = 128)]
    mailbox_capacity: usize,
    /// Per-shard deadline during query fan-out, in milliseconds
    #[arg(long, env = "SHARD_TIMEOUT_MS", default_value_t = 2_000)]
    shard_timeout_ms: u64,
    /// Document fetch timeout, in milliseconds
    #[arg(long, env = "FETCH_TIMEOUT_MS", default_value_t = 10_000)]
    fetch_timeout_ms: u64,
}

impl Args {
    fn config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            shard_urls: self
                .shards
                .iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            workers: self.workers,
            queue_capacity: self.queue_capacity,
            mailbox_capacity: self.mailbox_capacity,
            fetch_timeout: Duration::from_millis(self.fetch_timeout_ms),
            shard_timeout: Duration::from_millis(self.shard_timeout_ms),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();
    let config = args.config();
    config.validate()?;

    let fetcher = HttpFetcher::new(config.fetch_timeout)?;
    // Index calls are bounded by the same deadline as queries.
    let shards = http_shards(&config.shard_urls, config.shard_timeout)?;
    tracing::info!(shards = ?config.shard_urls, workers = config.workers, "starting coordinator");

    let coordinator = Coordinator::start(&config, Arc::new(fetcher), shards);
    let app = coordinator.router();

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "coordinator listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_signal())
        .await?;

    coordinator.shutdown().await;
    tracing::info!("coordinator stopped");
    Ok(())
}
