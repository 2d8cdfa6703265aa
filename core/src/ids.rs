use crate::DocId;
use sha1::{Digest, Sha1};

/// Content-derived document id: lowercase hex SHA-1 of the body.
///
/// Two payloads with identical bodies map to the same id whatever their titles.
pub fn document_id(body: &str) -> DocId {
    let mut hasher = Sha1::new();
    hasher.update(body.as_bytes());
    format!("{:x}", hasher.finalize())
}
