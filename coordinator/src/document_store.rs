//! Actor owning every ingested [`Document`], keyed by doc id.

use search_core::error::{Error, Result};
use search_core::shutdown::ShutdownSignal;
use search_core::{DocId, Document};
use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

const ACTOR: &str = "document store";

enum Command {
    Put(Document),
    Admit {
        document: Document,
        reply: oneshot::Sender<bool>,
    },
    MarkIndexed(DocId),
    Get {
        doc_id: DocId,
        reply: oneshot::Sender<Option<Document>>,
    },
    GetAll {
        reply: oneshot::Sender<Vec<Document>>,
    },
}

struct Entry {
    document: Document,
    indexed: bool,
}

#[derive(Clone, Debug)]
pub struct DocumentStore {
    tx: mpsc::Sender<Command>,
}

impl DocumentStore {
    pub fn spawn(mailbox_capacity: usize, shutdown: ShutdownSignal) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(mailbox_capacity);
        let task = tokio::spawn(run(rx, shutdown));
        (Self { tx }, task)
    }

    /// Upsert; the last writer for a doc id wins.
    pub async fn put(&self, document: Document) -> Result<()> {
        self.send(Command::Put(document)).await
    }

    /// Claim a document for ingestion. Returns `false` only when a document with
    /// this id was already fully indexed. A pending entry keeps its first title.
    pub async fn admit(&self, document: Document) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Admit { document, reply }).await?;
        rx.await.map_err(|_| Error::ActorClosed(ACTOR))
    }

    /// Every line and token of the document reached its store or shard.
    pub async fn mark_indexed(&self, doc_id: &str) -> Result<()> {
        self.send(Command::MarkIndexed(doc_id.to_string())).await
    }

    pub async fn get(&self, doc_id: &str) -> Result<Option<Document>> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Get { doc_id: doc_id.to_string(), reply }).await?;
        rx.await.map_err(|_| Error::ActorClosed(ACTOR))
    }

    /// Snapshot of all documents, ordered by title then doc id.
    pub async fn get_all(&self) -> Result<Vec<Document>> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::GetAll { reply }).await?;
        rx.await.map_err(|_| Error::ActorClosed(ACTOR))
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.tx.send(command).await.map_err(|_| Error::ActorClosed(ACTOR))
    }
}

async fn run(mut rx: mpsc::Receiver<Command>, mut shutdown: ShutdownSignal) {
    let mut store: HashMap<DocId, Entry> = HashMap::new();
    loop {
        let command = tokio::select! {
            biased;
            _ = shutdown.triggered() => break,
            command = rx.recv() => match command {
                Some(command) => command,
                None => break,
            },
        };
        match command {
            Command::Put(document) => {
                store.insert(document.doc_id.clone(), Entry { document, indexed: true });
            }
            Command::Admit { document, reply } => {
                let admitted = match store.get(&document.doc_id) {
                    Some(entry) => !entry.indexed,
                    None => {
                        store.insert(document.doc_id.clone(), Entry { document, indexed: false });
                        true
                    }
                };
                let _ = reply.send(admitted);
            }
            Command::MarkIndexed(doc_id) => {
                if let Some(entry) = store.get_mut(&doc_id) {
                    entry.indexed = true;
                }
            }
            Command::Get { doc_id, reply } => {
                let _ = reply.send(store.get(&doc_id).map(|entry| entry.document.clone()));
            }
            Command::GetAll { reply } => {
                let mut documents: Vec<Document> =
                    store.values().map(|entry| entry.document.clone()).collect();
                documents
                    .sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.doc_id.cmp(&b.doc_id)));
                let _ = reply.send(documents);
            }
        }
    }
    tracing::info!(documents = store.len(), "Exiting document store");
}
