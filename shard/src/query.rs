use crate::actor::IndexHandle;
use futures::future::try_join_all;
use search_core::error::Result;
use search_core::rank::score_catalogs;
use search_core::tokenizer::normalize_query_terms;
use search_core::ShardQueryResponse;

/// Answer a term query from this shard's index.
///
/// One catalog request per distinct term is issued concurrently and all of
/// them must answer before scoring; a closed actor fails the whole query.
pub async fn search<S: AsRef<str>>(index: &IndexHandle, terms: &[S]) -> Result<ShardQueryResponse> {
    let terms = normalize_query_terms(terms);
    let catalogs = try_join_all(terms.iter().map(|term| index.get_catalog(term))).await?;
    let results = score_catalogs(&catalogs);
    tracing::debug!(terms = ?terms, hits = results.len(), "shard query");
    Ok(ShardQueryResponse::new(results))
}
