use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub mod api;
pub mod error;
pub mod ids;
pub mod rank;
pub mod routing;
pub mod shutdown;
pub mod tokenizer;

pub type DocId = String;
pub type LineIndex = u32;
pub type TokenIndex = u32;
pub type Score = u32;

/// A fetched document as held by the coordinator's document store.
///
/// Only `title` and `doc_id` go over the wire; the body stays server side.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub title: String,
    pub doc_id: DocId,
    #[serde(skip)]
    pub raw_text: String,
}

impl Document {
    /// Placeholder returned when a ranked id has no stored document.
    pub fn missing(doc_id: DocId) -> Self {
        Self { doc_id, ..Self::default() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    pub doc_id: DocId,
    pub line_index: LineIndex,
    pub text: String,
}

/// One valid token emitted by ingestion; also the body of a shard's `/api/index`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenOccurrence {
    pub token: String,
    pub title: String,
    pub doc_id: DocId,
    pub line_index: LineIndex,
    pub token_index: TokenIndex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub line_index: LineIndex,
    pub token_index: TokenIndex,
}

/// Per (token, document) record in a shard's inverted index.
///
/// `count` always equals the number of token indices stored in `positions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentPosting {
    pub doc_id: DocId,
    pub title: String,
    pub count: Score,
    pub positions: BTreeMap<LineIndex, Vec<TokenIndex>>,
}

impl DocumentPosting {
    pub fn new(doc_id: DocId, title: String) -> Self {
        Self { doc_id, title, count: 0, positions: BTreeMap::new() }
    }

    /// Record one occurrence. A position that is already present is ignored,
    /// so re-delivering a document's tokens never inflates `count`.
    pub fn record(&mut self, line_index: LineIndex, token_index: TokenIndex) -> bool {
        let tokens = self.positions.entry(line_index).or_default();
        if tokens.contains(&token_index) {
            return false;
        }
        tokens.push(token_index);
        self.count = self.count.saturating_add(1);
        true
    }

    /// Positions flattened in line order, token indices in arrival order.
    pub fn flat_positions(&self) -> impl Iterator<Item = Position> + '_ {
        self.positions.iter().flat_map(|(&line_index, tokens)| {
            tokens.iter().map(move |&token_index| Position { line_index, token_index })
        })
    }
}

/// All postings for one token on one shard, keyed by document.
pub type DocumentCatalog = HashMap<DocId, DocumentPosting>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocResult {
    pub doc_id: DocId,
    #[serde(rename = "doc_score")]
    pub score: Score,
    #[serde(rename = "token_indices", default)]
    pub positions: Vec<Position>,
}

/// Body of a shard's `/api/query` response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardQueryResponse {
    pub count: usize,
    #[serde(default)]
    pub data: Vec<DocResult>,
}

impl ShardQueryResponse {
    pub fn new(data: Vec<DocResult>) -> Self {
        Self { count: data.len(), data }
    }
}
