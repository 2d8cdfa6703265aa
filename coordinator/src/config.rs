use anyhow::{ensure, Result};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Base URLs of the index shards, e.g. `http://127.0.0.1:9090`.
    pub shard_urls: Vec<String>,
    /// Ingestion workers draining the feed queue.
    pub workers: usize,
    /// Feed requests that may wait before `POST /api/feeder` blocks.
    pub queue_capacity: usize,
    /// Mailbox size of the document and line stores.
    pub mailbox_capacity: usize,
    pub fetch_timeout: Duration,
    /// Upper bound on a single shard's answer during query fan-out.
    pub shard_timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            shard_urls: Vec::new(),
            workers: 4,
            queue_capacity: 64,
            mailbox_capacity: 128,
            fetch_timeout: Duration::from_secs(10),
            shard_timeout: Duration::from_secs(2),
        }
    }
}

impl CoordinatorConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.shard_urls.is_empty(), "at least one shard url is required");
        for url in &self.shard_urls {
            ensure!(
                url.starts_with("http://") || url.starts_with("https://"),
                "shard url {url:?} must start with http:// or https://"
            );
        }
        ensure!(self.workers > 0, "worker count must be positive");
        ensure!(self.queue_capacity > 0, "queue capacity must be positive");
        ensure!(self.mailbox_capacity > 0, "mailbox capacity must be positive");
        ensure!(!self.shard_timeout.is_zero(), "shard timeout must be positive");
        Ok(())
    }
}
