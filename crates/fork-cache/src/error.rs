//! Aggregated error type for the fork cache.

use std::path::PathBuf;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The error type a [`RemoteChainSource`](crate::RemoteChainSource)
/// implementation may return from a probe.
pub type RemoteSourceError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A remote probe failed while placing a fork target.
    ///
    /// The resolve that issued the probe is aborted without mutating the
    /// forest; callers are expected to fall back to
    /// [`CacheHandle::in_memory`](crate::CacheHandle::in_memory).
    #[error("remote query for block {number} failed: {source}")]
    RemoteQuery {
        number: u64,
        #[source]
        source: RemoteSourceError,
    },
    /// The remote answered the same block number with conflicting hashes
    /// within a single resolve, e.g. because of a reorg between probes.
    #[error("remote returned conflicting answers for block {number}")]
    InconsistentRemote { number: u64 },
    /// Attempted to delete a cache location that is still open in-process.
    #[error("cache location {} is still open in this process", location.display())]
    ConcurrentOpen { location: PathBuf },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
