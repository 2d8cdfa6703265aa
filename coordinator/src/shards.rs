//! Outbound calls to index shards.

use async_trait::async_trait;
use search_core::error::{Error, Result};
use search_core::{ShardQueryResponse, TokenOccurrence};
use std::sync::Arc;
use std::time::Duration;

/// One index shard as seen from the coordinator.
#[async_trait]
pub trait ShardClient: Send + Sync {
    /// Human readable identity used in logs.
    fn endpoint(&self) -> &str;

    async fn index(&self, occurrence: &TokenOccurrence) -> Result<()>;

    async fn query(&self, terms: &[String]) -> Result<ShardQueryResponse>;
}

pub type Shards = Arc<[Arc<dyn ShardClient>]>;

pub struct HttpShardClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpShardClient {
    pub fn new(base_url: &str, client: reqwest::Client) -> Self {
        Self { base_url: base_url.trim_end_matches('/').to_string(), client }
    }

    fn unavailable(&self, err: reqwest::Error) -> Error {
        Error::ShardUnavailable { endpoint: self.base_url.clone(), reason: err.to_string() }
    }

    fn check(&self, resp: reqwest::Response) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            Ok(resp)
        } else {
            let status = resp.status().as_u16();
            Err(Error::ShardStatus { endpoint: self.base_url.clone(), status })
        }
    }
}

#[async_trait]
impl ShardClient for HttpShardClient {
    fn endpoint(&self) -> &str {
        &self.base_url
    }

    async fn index(&self, occurrence: &TokenOccurrence) -> Result<()> {
        let resp = self
            .client
            .post(format!("{}/api/index", self.base_url))
            .json(occurrence)
            .send()
            .await
            .map_err(|e| self.unavailable(e))?;
        self.check(resp)?;
        Ok(())
    }

    // Each call serializes its own body; nothing is shared between concurrent requests.
    async fn query(&self, terms: &[String]) -> Result<ShardQueryResponse> {
        let resp = self
            .client
            .post(format!("{}/api/query", self.base_url))
            .json(terms)
            .send()
            .await
            .map_err(|e| self.unavailable(e))?;
        let resp = self.check(resp)?;
        resp.json::<ShardQueryResponse>().await.map_err(|e| self.unavailable(e))
    }
}

/// Build HTTP clients for the configured shard base URLs, sharing one connection pool.
pub fn http_shards(base_urls: &[String], request_timeout: Duration) -> Result<Shards> {
    let client = reqwest::Client::builder()
        .timeout(request_timeout)
        .build()
        .map_err(|e| Error::ShardUnavailable { endpoint: String::new(), reason: e.to_string() })?;
    Ok(base_urls
        .iter()
        .map(|url| Arc::new(HttpShardClient::new(url, client.clone())) as Arc<dyn ShardClient>)
        .collect())
}
