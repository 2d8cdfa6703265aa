//! Document ingestion: fetch, assign an id, store, tokenize, dispatch to shards.
//!
//! Feed requests wait in a bounded queue drained by a fixed pool of workers.
//! Workers only touch shared state through the store actors and shard clients.

use crate::document_store::DocumentStore;
use crate::fetch::Fetcher;
use crate::line_store::LineStore;
use crate::shards::Shards;
use search_core::error::{Error, Result};
use search_core::ids::document_id;
use search_core::routing::shard_for_token;
use search_core::shutdown::ShutdownSignal;
use search_core::tokenizer::tokenize;
use search_core::{DocId, Document, Line, TokenOccurrence};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

/// Body of `POST /api/feeder`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedRequest {
    pub url: String,
    pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub doc_id: DocId,
    pub lines: usize,
    pub tokens: usize,
    pub failed_dispatches: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Indexed(IngestReport),
    /// A document with the same content was already fully indexed.
    Duplicate(DocId),
}

/// Everything one ingestion needs. Cloned into every worker.
#[derive(Clone)]
pub struct Ingestor {
    fetcher: Arc<dyn Fetcher>,
    documents: DocumentStore,
    lines: LineStore,
    shards: Shards,
}

impl Ingestor {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        documents: DocumentStore,
        lines: LineStore,
        shards: Shards,
    ) -> Self {
        Self { fetcher, documents, lines, shards }
    }

    /// Run one feed request to completion.
    ///
    /// A token that cannot be delivered is counted and the rest still go out.
    /// The document is only marked indexed when nothing failed, so the same
    /// content fed again is retried.
    pub async fn ingest(&self, request: &FeedRequest) -> Result<IngestOutcome> {
        let body = self.fetcher.fetch(&request.url).await?;
        let text = String::from_utf8_lossy(&body).into_owned();
        let doc_id = document_id(&text);

        let document = Document {
            title: request.title.clone(),
            doc_id: doc_id.clone(),
            raw_text: text.clone(),
        };
        if !self.documents.admit(document).await? {
            tracing::info!(%doc_id, title = %request.title, "document already indexed, skipping");
            return Ok(IngestOutcome::Duplicate(doc_id));
        }

        let mut report = IngestReport { doc_id: doc_id.clone(), ..Default::default() };
        for line in tokenize(&text) {
            // The line is stored before any of its tokens leave for a shard.
            let stored = Line {
                doc_id: doc_id.clone(),
                line_index: line.line_index,
                text: line.text.to_string(),
            };
            self.lines.put(stored).await?;
            report.lines += 1;

            for (token, token_index) in line.tokens {
                let occurrence = TokenOccurrence {
                    token,
                    title: request.title.clone(),
                    doc_id: doc_id.clone(),
                    line_index: line.line_index,
                    token_index,
                };
                match self.dispatch(&occurrence).await {
                    Ok(()) => report.tokens += 1,
                    Err(e) => {
                        let token = &occurrence.token;
                        tracing::warn!(%token, %doc_id, "token dispatch failed: {}", e);
                        report.failed_dispatches += 1;
                    }
                }
            }
        }

        if report.failed_dispatches > 0 {
            tracing::warn!(
                %doc_id,
                title = %request.title,
                tokens = report.tokens,
                failed = report.failed_dispatches,
                "document partially indexed, a re-feed will retry it"
            );
        } else {
            self.documents.mark_indexed(&doc_id).await?;
            tracing::info!(
                %doc_id,
                title = %request.title,
                lines = report.lines,
                tokens = report.tokens,
                "document indexed"
            );
        }
        Ok(IngestOutcome::Indexed(report))
    }

    async fn dispatch(&self, occurrence: &TokenOccurrence) -> Result<()> {
        let shard = shard_for_token(&occurrence.token, self.shards.len()).ok_or_else(|| {
            Error::ShardUnavailable { endpoint: "-".into(), reason: "no shards configured".into() }
        })?;
        let endpoint = self.shards[shard].endpoint();
        tracing::trace!(token = %occurrence.token, shard = endpoint, "dispatching token");
        self.shards[shard].index(occurrence).await
    }
}

/// Producer side of the ingestion queue.
#[derive(Clone)]
pub struct IngestionPipeline {
    tx: mpsc::Sender<FeedRequest>,
}

impl IngestionPipeline {
    /// Spawn `workers` tasks draining a queue of `queue_capacity` pending requests.
    pub fn start(
        ingestor: Ingestor,
        workers: usize,
        queue_capacity: usize,
        shutdown: ShutdownSignal,
    ) -> (Self, Vec<JoinHandle<()>>) {
        let (tx, rx) = mpsc::channel(queue_capacity);
        let queue = Arc::new(Mutex::new(rx));
        let handles = (0..workers)
            .map(|worker_id| {
                let (ingestor, queue) = (ingestor.clone(), queue.clone());
                tokio::spawn(worker_loop(worker_id, ingestor, queue, shutdown.clone()))
            })
            .collect();
        tracing::info!("Started {} ingestion workers", workers);
        (Self { tx }, handles)
    }

    /// Enqueue a feed request, waiting while the queue is full.
    pub async fn submit(&self, request: FeedRequest) -> Result<()> {
        self.tx.send(request).await.map_err(|_| Error::ActorClosed("ingestion pipeline"))
    }
}

async fn worker_loop(
    worker_id: usize,
    ingestor: Ingestor,
    queue: Arc<Mutex<mpsc::Receiver<FeedRequest>>>,
    mut shutdown: ShutdownSignal,
) {
    loop {
        let next = tokio::select! {
            biased;
            _ = shutdown.triggered() => None,
            request = async { queue.lock().await.recv().await } => request,
        };
        let Some(request) = next else { break };

        tracing::debug!(worker_id, url = %request.url, "processing feed request");
        if let Err(e) = ingestor.ingest(&request).await {
            let (url, title) = (&request.url, &request.title);
            tracing::warn!(worker_id, %url, %title, "payload dropped: {}", e);
        }
    }
    tracing::info!(worker_id, "Exiting ingestion worker");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shards::ShardClient;
    use async_trait::async_trait;
    use search_core::shutdown::Shutdown;
    use search_core::ShardQueryResponse;
    use shard::actor::{IndexActor, IndexHandle};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    struct FixedFetcher {
        files: HashMap<String, String>,
    }

    #[async_trait]
    impl Fetcher for FixedFetcher {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
            self.files
                .get(url)
                .map(|body| body.clone().into_bytes())
                .ok_or_else(|| Error::Fetch { url: url.into(), reason: "status code 404".into() })
        }
    }

    struct LocalShard {
        name: String,
        index: IndexHandle,
    }

    #[async_trait]
    impl ShardClient for LocalShard {
        fn endpoint(&self) -> &str {
            &self.name
        }

        async fn index(&self, occurrence: &TokenOccurrence) -> Result<()> {
            self.index.add_token(occurrence.clone()).await
        }

        async fn query(&self, terms: &[String]) -> Result<ShardQueryResponse> {
            shard::query::search(&self.index, terms).await
        }
    }

    struct Fixture {
        _shutdown: Shutdown,
        ingestor: Ingestor,
        documents: DocumentStore,
        lines: LineStore,
        indexes: Vec<IndexHandle>,
    }

    fn fixture(files: &[(&str, &str)], shard_count: usize) -> Fixture {
        let shutdown = Shutdown::new();
        let (documents, _) = DocumentStore::spawn(8, shutdown.subscribe());
        let (lines, _) = LineStore::spawn(8, shutdown.subscribe());
        let indexes: Vec<IndexHandle> =
            (0..shard_count).map(|_| IndexActor::spawn(8, shutdown.subscribe()).0).collect();
        let shards: Shards = indexes
            .iter()
            .enumerate()
            .map(|(i, index)| {
                let shard = LocalShard { name: format!("shard-{i}"), index: index.clone() };
                Arc::new(shard) as Arc<dyn ShardClient>
            })
            .collect();
        let fetcher = FixedFetcher {
            files: files.iter().map(|(url, body)| (url.to_string(), body.to_string())).collect(),
        };
        let ingestor = Ingestor::new(Arc::new(fetcher), documents.clone(), lines.clone(), shards);
        Fixture { _shutdown: shutdown, ingestor, documents, lines, indexes }
    }

    fn feed(url: &str, title: &str) -> FeedRequest {
        FeedRequest { url: url.into(), title: title.into() }
    }

    async fn token_count(indexes: &[IndexHandle], token: &str) -> u32 {
        let mut total = 0;
        for index in indexes {
            total += index.get_catalog(token).await.unwrap().values().map(|p| p.count).sum::<u32>();
        }
        total
    }

    #[tokio::test]
    async fn stores_document_lines_and_tokens() {
        let fx = fixture(&[("mem://fruit", "Apple pie.\n\n-- apple, APPLE --\n")], 3);

        let outcome = fx.ingestor.ingest(&feed("mem://fruit", "Fruit")).await.unwrap();
        let IngestOutcome::Indexed(report) = outcome else { panic!("expected indexed") };
        assert_eq!(report.lines, 2);
        assert_eq!(report.tokens, 4);
        assert_eq!(report.failed_dispatches, 0);

        let doc = fx.documents.get(&report.doc_id).await.unwrap().unwrap();
        assert_eq!(doc.title, "Fruit");
        let second = fx.lines.get(&report.doc_id, 1).await.unwrap().unwrap();
        assert_eq!(second.text, "-- apple, APPLE --");
        assert_eq!(fx.lines.get(&report.doc_id, 2).await.unwrap(), None);

        assert_eq!(token_count(&fx.indexes, "apple").await, 3);
        let owner = shard_for_token("apple", 3).unwrap();
        let catalog = fx.indexes[owner].get_catalog("apple").await.unwrap();
        assert_eq!(catalog[&report.doc_id].positions[&1], vec![0, 1]);
    }

    #[tokio::test]
    async fn same_content_is_indexed_once() {
        let fx = fixture(&[("mem://a", "zebra zebra"), ("mem://b", "zebra zebra")], 2);

        let first = fx.ingestor.ingest(&feed("mem://a", "A")).await.unwrap();
        let second = fx.ingestor.ingest(&feed("mem://b", "B")).await.unwrap();
        assert!(matches!(first, IngestOutcome::Indexed(_)));
        assert!(matches!(second, IngestOutcome::Duplicate(_)));
        assert_eq!(token_count(&fx.indexes, "zebra").await, 2);
        assert_eq!(fx.documents.get_all().await.unwrap().len(), 1);
    }

    /// Rejects every token while `down` is set.
    struct FlakyShard {
        index: IndexHandle,
        down: AtomicBool,
    }

    #[async_trait]
    impl ShardClient for FlakyShard {
        fn endpoint(&self) -> &str {
            "flaky"
        }

        async fn index(&self, occurrence: &TokenOccurrence) -> Result<()> {
            if self.down.load(Ordering::SeqCst) {
                let reason = "connection refused".into();
                return Err(Error::ShardUnavailable { endpoint: "flaky".into(), reason });
            }
            self.index.add_token(occurrence.clone()).await
        }

        async fn query(&self, terms: &[String]) -> Result<ShardQueryResponse> {
            shard::query::search(&self.index, terms).await
        }
    }

    #[tokio::test]
    async fn refeed_retries_partially_indexed_document() {
        let shutdown = Shutdown::new();
        let (documents, _) = DocumentStore::spawn(8, shutdown.subscribe());
        let (lines, _) = LineStore::spawn(8, shutdown.subscribe());
        let (index, _) = IndexActor::spawn(8, shutdown.subscribe());
        let flaky = Arc::new(FlakyShard { index: index.clone(), down: AtomicBool::new(true) });
        let shards: Shards = Arc::new([flaky.clone() as Arc<dyn ShardClient>]);
        let files = HashMap::from([("mem://a".to_string(), "apple apple apple".to_string())]);
        let fetcher = FixedFetcher { files };
        let ingestor = Ingestor::new(Arc::new(fetcher), documents.clone(), lines, shards);

        let first = ingestor.ingest(&feed("mem://a", "Apples")).await.unwrap();
        let IngestOutcome::Indexed(report) = first else { panic!("expected indexed") };
        assert_eq!((report.tokens, report.failed_dispatches), (0, 3));

        flaky.down.store(false, Ordering::SeqCst);
        let retry = ingestor.ingest(&feed("mem://a", "Apples")).await.unwrap();
        let IngestOutcome::Indexed(report) = retry else { panic!("expected a retry") };
        assert_eq!((report.tokens, report.failed_dispatches), (3, 0));
        assert_eq!(token_count(&[index.clone()], "apple").await, 3);

        let again = ingestor.ingest(&feed("mem://a", "Apples")).await.unwrap();
        assert!(matches!(again, IngestOutcome::Duplicate(_)));
        assert_eq!(token_count(&[index], "apple").await, 3);
        assert_eq!(documents.get_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn fetch_failure_drops_payload() {
        let fx = fixture(&[], 1);
        let err = fx.ingestor.ingest(&feed("mem://missing", "Gone")).await.unwrap_err();
        assert!(matches!(err, Error::Fetch { .. }));
        assert!(fx.documents.get_all().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_ingestion_loses_no_updates() {
        let bodies: Vec<(String, String)> = (0..20)
            .map(|i| (format!("mem://doc{i}"), format!("doc{i} apple\n{}", "zebra ".repeat(i + 1))))
            .collect();
        let files: Vec<(&str, &str)> =
            bodies.iter().map(|(u, b)| (u.as_str(), b.as_str())).collect();
        let fx = fixture(&files, 3);

        let shutdown = Shutdown::new();
        let (pipeline, workers) =
            IngestionPipeline::start(fx.ingestor.clone(), 4, 2, shutdown.subscribe());
        for (url, _) in &bodies {
            pipeline.submit(feed(url, url)).await.unwrap();
        }

        let expected_zebra: u32 = (1..=20).sum();
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        while token_count(&fx.indexes, "zebra").await != expected_zebra
            || token_count(&fx.indexes, "apple").await != 20
        {
            assert!(tokio::time::Instant::now() < deadline, "ingestion did not finish");
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(fx.documents.get_all().await.unwrap().len(), 20);

        shutdown.trigger();
        for worker in workers {
            worker.await.unwrap();
        }
        assert!(pipeline.submit(feed("mem://late", "late")).await.is_err());
    }
}
