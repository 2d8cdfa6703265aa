//! Errors shared by the shard and coordinator services.

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Document retrieval failed with a transport error or a non-2xx status.
    #[error("unable to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// A shard could not be reached or its response could not be read.
    #[error("shard {endpoint} unavailable: {reason}")]
    ShardUnavailable { endpoint: String, reason: String },

    #[error("shard {endpoint} answered with status {status}")]
    ShardStatus { endpoint: String, status: u16 },

    #[error("shard {endpoint} did not answer within {timeout_ms} ms")]
    ShardTimeout { endpoint: String, timeout_ms: u64 },

    /// The actor behind a handle has stopped and its mailbox is closed.
    #[error("{0} is no longer running")]
    ActorClosed(&'static str),

    #[error("malformed payload: {0}")]
    Decode(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Decode(err.to_string())
    }
}
