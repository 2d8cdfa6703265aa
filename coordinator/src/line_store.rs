//! Actor owning the raw text of every stored line, keyed by `(doc id, line index)`.

use search_core::error::{Error, Result};
use search_core::shutdown::ShutdownSignal;
use search_core::{DocId, Line, LineIndex};
use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

const ACTOR: &str = "line store";

enum Command {
    Put(Line),
    Get {
        doc_id: DocId,
        line_index: LineIndex,
        reply: oneshot::Sender<Option<Line>>,
    },
}

#[derive(Clone, Debug)]
pub struct LineStore {
    tx: mpsc::Sender<Command>,
}

impl LineStore {
    pub fn spawn(mailbox_capacity: usize, shutdown: ShutdownSignal) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(mailbox_capacity);
        let task = tokio::spawn(run(rx, shutdown));
        (Self { tx }, task)
    }

    pub async fn put(&self, line: Line) -> Result<()> {
        self.tx.send(Command::Put(line)).await.map_err(|_| Error::ActorClosed(ACTOR))
    }

    pub async fn get(&self, doc_id: &str, line_index: LineIndex) -> Result<Option<Line>> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Get { doc_id: doc_id.to_string(), line_index, reply })
            .await
            .map_err(|_| Error::ActorClosed(ACTOR))?;
        rx.await.map_err(|_| Error::ActorClosed(ACTOR))
    }
}

async fn run(mut rx: mpsc::Receiver<Command>, mut shutdown: ShutdownSignal) {
    let mut store: HashMap<(DocId, LineIndex), String> = HashMap::new();
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
            Command::Put(Line { doc_id, line_index, text }) => {
                store.insert((doc_id, line_index), text);
            }
            Command::Get { doc_id, line_index, reply } => {
                let line = store
                    .get(&(doc_id.clone(), line_index))
                    .map(|text| Line { doc_id, line_index, text: text.clone() });
                let _ = reply.send(line);
            }
        }
    }
    tracing::info!(lines = store.len(), "Exiting line store");
}
