use sha1::{Digest, Sha1};

/// Pick the shard that owns `token`. Stable across processes and restarts.
///
/// Returns `None` when there are no shards to route to.
pub fn shard_for_token(token: &str, shard_count: usize) -> Option<usize> {
    if shard_count == 0 {
        return None;
    }
    let digest = Sha1::digest(token.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    Some((u64::from_be_bytes(prefix) % shard_count as u64) as usize)
}
