use anyhow::{ensure, Result};
use clap::Parser;
use search_core::shutdown::{wait_for_signal, Shutdown};
use shard::actor::IndexActor;
use shard::build_app;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "shard")]
#[command(about = "Serve one partition of the inverted index")]
struct Args {
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, env = "API_PORT", default_value_t = 9090)]
    port: u16,
    /// Pending index messages before writers are made to wait
    #[arg(long, default_value_t = 128)]
    mailbox_capacity: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();
    ensure!(args.mailbox_capacity > 0, "mailbox capacity must be positive");

    let shutdown = Shutdown::new();
    let (index, actor_task) = IndexActor::spawn(args.mailbox_capacity, shutdown.subscribe());
    let app = build_app(index);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "shard listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_signal())
        .await?;

    shutdown.trigger();
    actor_task.await?;
    tracing::info!("shard stopped");
    Ok(())
}
