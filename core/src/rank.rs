//! Term-frequency scoring and deterministic ranking.
//!
//! Ordering is always score descending, then doc id ascending, so equal
//! scores never depend on map iteration order.

use crate::{DocId, DocResult, DocumentCatalog, Position, Score, ShardQueryResponse};
use std::cmp::Ordering;
use std::collections::HashMap;

fn by_rank(a: (&DocId, Score), b: (&DocId, Score)) -> Ordering {
    b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0))
}

/// Rank a `doc id -> score` map.
pub fn rank_scores(scores: HashMap<DocId, Score>) -> Vec<(DocId, Score)> {
    let mut ranked: Vec<(DocId, Score)> = scores.into_iter().collect();
    ranked.sort_by(|a, b| by_rank((&a.0, a.1), (&b.0, b.1)));
    ranked
}

/// Score one shard's catalogs: a document's score is the sum of its posting
/// counts across every queried term. Positions from all terms are merged.
pub fn score_catalogs(catalogs: &[DocumentCatalog]) -> Vec<DocResult> {
    let mut acc: HashMap<&DocId, (Score, Vec<Position>)> = HashMap::new();
    for catalog in catalogs {
        for (doc_id, posting) in catalog {
            let (score, positions) = acc.entry(doc_id).or_default();
            *score = score.saturating_add(posting.count);
            positions.extend(posting.flat_positions());
        }
    }

    let mut results: Vec<DocResult> = acc
        .into_iter()
        .map(|(doc_id, (score, mut positions))| {
            positions.sort_unstable();
            DocResult { doc_id: doc_id.clone(), score, positions }
        })
        .collect();
    results.sort_by(|a, b| by_rank((&a.doc_id, a.score), (&b.doc_id, b.score)));
    results
}

/// Sum partial scores per document across shard responses.
pub fn merge_shard_results<I>(responses: I) -> HashMap<DocId, Score>
where
    I: IntoIterator<Item = ShardQueryResponse>,
{
    let mut merged: HashMap<DocId, Score> = HashMap::new();
    for response in responses {
        for result in response.data {
            let score = merged.entry(result.doc_id).or_insert(0);
            *score = score.saturating_add(result.score);
        }
    }
    merged
}
