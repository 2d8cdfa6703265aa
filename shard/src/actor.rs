//! The shard's inverted index, owned by a single task.
//!
//! Every write and every catalog read goes through one mailbox, so postings
//! are never updated concurrently and `count` cannot drift from `positions`.

use search_core::error::{Error, Result};
use search_core::shutdown::ShutdownSignal;
use search_core::{DocumentCatalog, DocumentPosting, TokenOccurrence};
use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

const ACTOR: &str = "index actor";

enum Command {
    AddToken(TokenOccurrence),
    GetCatalog {
        token: String,
        reply: oneshot::Sender<DocumentCatalog>,
    },
    Stats {
        reply: oneshot::Sender<IndexStats>,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct IndexStats {
    pub tokens: usize,
    pub postings: usize,
}

/// Cheap, cloneable handle to a running [`IndexActor`].
#[derive(Clone, Debug)]
pub struct IndexHandle {
    tx: mpsc::Sender<Command>,
}

impl IndexHandle {
    /// Queue a token for indexing. Waits while the mailbox is full.
    pub async fn add_token(&self, occurrence: TokenOccurrence) -> Result<()> {
        self.tx
            .send(Command::AddToken(occurrence))
            .await
            .map_err(|_| Error::ActorClosed(ACTOR))
    }

    /// Snapshot of every posting for `token`; empty when the token is unknown here.
    pub async fn get_catalog(&self, token: &str) -> Result<DocumentCatalog> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::GetCatalog { token: token.to_string(), reply })
            .await
            .map_err(|_| Error::ActorClosed(ACTOR))?;
        rx.await.map_err(|_| Error::ActorClosed(ACTOR))
    }

    pub async fn stats(&self) -> Result<IndexStats> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Stats { reply })
            .await
            .map_err(|_| Error::ActorClosed(ACTOR))?;
        rx.await.map_err(|_| Error::ActorClosed(ACTOR))
    }
}

#[derive(Default)]
pub struct IndexActor {
    store: HashMap<String, DocumentCatalog>,
}

impl IndexActor {
    /// Start the actor on the current runtime.
    pub fn spawn(
        mailbox_capacity: usize,
        shutdown: ShutdownSignal,
    ) -> (IndexHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(mailbox_capacity);
        let task = tokio::spawn(Self::default().run(rx, shutdown));
        (IndexHandle { tx }, task)
    }

    async fn run(mut self, mut rx: mpsc::Receiver<Command>, mut shutdown: ShutdownSignal) {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.triggered() => break,
                command = rx.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
            }
        }
        tracing::info!(tokens = self.store.len(), "Exiting index actor");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::AddToken(occurrence) => self.add_token(occurrence),
            Command::GetCatalog { token, reply } => {
                let catalog = self.store.get(&token).cloned().unwrap_or_default();
                // The requester may have given up; nothing to do then.
                let _ = reply.send(catalog);
            }
            Command::Stats { reply } => {
                let stats = IndexStats {
                    tokens: self.store.len(),
                    postings: self.store.values().map(|catalog| catalog.len()).sum(),
                };
                let _ = reply.send(stats);
            }
        }
    }

    fn add_token(&mut self, occurrence: TokenOccurrence) {
        tracing::trace!(token = %occurrence.token, doc_id = %occurrence.doc_id, "indexing token");
        let TokenOccurrence { token, title, doc_id, line_index, token_index } = occurrence;
        let posting = self
            .store
            .entry(token)
            .or_default()
            .entry(doc_id.clone())
            .or_insert_with(|| DocumentPosting::new(doc_id, title));
        if !posting.record(line_index, token_index) {
            let doc_id = &posting.doc_id;
            tracing::debug!(%doc_id, line_index, token_index, "occurrence already indexed");
        }
    }
}
