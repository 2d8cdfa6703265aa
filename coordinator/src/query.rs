//! Cross-shard query: fan out, merge partial scores, rank, hydrate.

use crate::document_store::DocumentStore;
use crate::shards::Shards;
use futures::future::join_all;
use search_core::error::{Error, Result};
use search_core::rank::{merge_shard_results, rank_scores};
use search_core::tokenizer::normalize_query_terms;
use search_core::{Document, Score, ShardQueryResponse};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedDocument {
    pub document: Document,
    pub score: Score,
}

pub struct QueryCoordinator {
    shards: Shards,
    documents: DocumentStore,
    shard_timeout: Duration,
}

impl QueryCoordinator {
    pub fn new(shards: Shards, documents: DocumentStore, shard_timeout: Duration) -> Self {
        Self { shards, documents, shard_timeout }
    }

    /// Ranked documents for `terms`, best first.
    pub async fn query<S: AsRef<str>>(&self, terms: &[S]) -> Result<Vec<Document>> {
        Ok(self.query_scored(terms).await?.into_iter().map(|ranked| ranked.document).collect())
    }

    /// A shard that fails or exceeds the shard timeout contributes nothing.
    pub async fn query_scored<S: AsRef<str>>(&self, terms: &[S]) -> Result<Vec<RankedDocument>> {
        let terms = normalize_query_terms(terms);
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let responses = join_all(self.shards.iter().map(|shard| {
            let terms = terms.clone();
            async move {
                let answer = tokio::time::timeout(self.shard_timeout, shard.query(&terms)).await;
                let outcome = match answer {
                    Ok(result) => result,
                    Err(_) => Err(Error::ShardTimeout {
                        endpoint: shard.endpoint().to_string(),
                        timeout_ms: self.shard_timeout.as_millis() as u64,
                    }),
                };
                outcome.unwrap_or_else(|e| {
                    tracing::warn!("{}", e);
                    ShardQueryResponse::default()
                })
            }
        }))
        .await;

        let ranked = rank_scores(merge_shard_results(responses));
        tracing::debug!(terms = ?terms, hits = ranked.len(), "query merged");

        let mut results = Vec::with_capacity(ranked.len());
        for (doc_id, score) in ranked {
            let document = match self.documents.get(&doc_id).await? {
                Some(document) => document,
                None => {
                    tracing::warn!(%doc_id, "ranked document missing from store");
                    Document::missing(doc_id)
                }
            };
            results.push(RankedDocument { document, score });
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shards::ShardClient;
    use async_trait::async_trait;
    use search_core::shutdown::Shutdown;
    use search_core::{DocResult, TokenOccurrence};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    enum Behaviour {
        Answer(Vec<(&'static str, Score)>),
        Fail,
        Hang,
    }

    struct FakeShard {
        name: &'static str,
        behaviour: Behaviour,
        calls: AtomicUsize,
    }

    impl FakeShard {
        fn new(name: &'static str, behaviour: Behaviour) -> Arc<Self> {
            Arc::new(Self { name, behaviour, calls: AtomicUsize::new(0) })
        }
    }

    #[async_trait]
    impl ShardClient for FakeShard {
        fn endpoint(&self) -> &str {
            self.name
        }

        async fn index(&self, _occurrence: &TokenOccurrence) -> Result<()> {
            Ok(())
        }

        async fn query(&self, _terms: &[String]) -> Result<ShardQueryResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.behaviour {
                Behaviour::Answer(hits) => Ok(ShardQueryResponse::new(
                    hits.iter()
                        .map(|&(doc_id, score)| DocResult {
                            doc_id: doc_id.into(),
                            score,
                            positions: vec![],
                        })
                        .collect(),
                )),
                Behaviour::Fail => Err(Error::ShardUnavailable {
                    endpoint: self.name.into(),
                    reason: "connection refused".into(),
                }),
                Behaviour::Hang => {
                    std::future::pending::<()>().await;
                    unreachable!()
                }
            }
        }
    }

    async fn coordinator(shards: Vec<Arc<FakeShard>>, shutdown: &Shutdown) -> QueryCoordinator {
        let (documents, _) = DocumentStore::spawn(8, shutdown.subscribe());
        for (doc_id, title) in [("d1", "Zebra Facts"), ("d2", "Stripes"), ("d3", "Savanna")] {
            let document =
                Document { title: title.into(), doc_id: doc_id.into(), raw_text: String::new() };
            documents.put(document).await.unwrap();
        }
        let shards: Shards = shards.into_iter().map(|s| s as Arc<dyn ShardClient>).collect();
        QueryCoordinator::new(shards, documents, Duration::from_millis(200))
    }

    fn scores(results: &[RankedDocument]) -> Vec<(&str, Score)> {
        results.iter().map(|r| (r.document.doc_id.as_str(), r.score)).collect()
    }

    #[tokio::test]
    async fn merges_scores_across_shards() {
        let shutdown = Shutdown::new();
        let a = FakeShard::new("a", Behaviour::Answer(vec![("d1", 1), ("d3", 2)]));
        let b = FakeShard::new("b", Behaviour::Answer(vec![("d1", 2), ("d2", 3)]));
        let qc = coordinator(vec![a.clone(), b.clone()], &shutdown).await;

        let results = qc.query_scored(&["zebra"]).await.unwrap();
        assert_eq!(scores(&results), vec![("d1", 3), ("d2", 3), ("d3", 2)]);
        assert_eq!(results[0].document.title, "Zebra Facts");
        assert_eq!(a.calls.load(Ordering::SeqCst), 1);
        assert_eq!(b.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_and_hung_shards_contribute_nothing() {
        let shutdown = Shutdown::new();
        let healthy = FakeShard::new("ok", Behaviour::Answer(vec![("d2", 1), ("d1", 4)]));
        let also_healthy = FakeShard::new("ok2", Behaviour::Answer(vec![("d2", 1)]));
        let down = FakeShard::new("down", Behaviour::Fail);
        let hung = FakeShard::new("hung", Behaviour::Hang);
        let qc = coordinator(vec![healthy, down, also_healthy, hung], &shutdown).await;

        let results = tokio::time::timeout(Duration::from_secs(5), qc.query_scored(&["zebra"]))
            .await
            .expect("hung shard must not stall the query")
            .unwrap();
        assert_eq!(scores(&results), vec![("d1", 4), ("d2", 2)]);
    }

    #[tokio::test]
    async fn unknown_ids_hydrate_to_placeholder() {
        let shutdown = Shutdown::new();
        let shard = FakeShard::new("a", Behaviour::Answer(vec![("ghost", 5), ("d3", 1)]));
        let qc = coordinator(vec![shard], &shutdown).await;

        let docs = qc.query(&["zebra"]).await.unwrap();
        assert_eq!(docs[0], Document::missing("ghost".into()));
        assert_eq!(docs[1].title, "Savanna");
    }

    #[tokio::test]
    async fn empty_terms_skip_fan_out() {
        let shutdown = Shutdown::new();
        let shard = FakeShard::new("a", Behaviour::Answer(vec![("d1", 1)]));
        let qc = coordinator(vec![shard.clone()], &shutdown).await;

        assert!(qc.query(&["...", "!"]).await.unwrap().is_empty());
        assert_eq!(shard.calls.load(Ordering::SeqCst), 0);
    }
}
