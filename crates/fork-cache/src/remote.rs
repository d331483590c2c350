//! The remote-query capability a fork session supplies.

use crate::{error::RemoteSourceError, key::ForkBlock};
use async_trait::async_trait;

/// Read-only access to the chain a fork session reads through to.
///
/// Implementations wrap whatever RPC client reaches the forked chain. The
/// cache only ever asks for the block at a given number to test a hash match;
/// it never replays history and never makes network calls itself.
#[async_trait]
pub trait RemoteChainSource: Send + Sync {
    /// Returns the block at `number` on this source's chain, or `None` if the
    /// chain has no block at that number.
    async fn block_by_number(&self, number: u64) -> Result<Option<ForkBlock>, RemoteSourceError>;
}

#[async_trait]
impl<T: RemoteChainSource + ?Sized> RemoteChainSource for &T {
    async fn block_by_number(&self, number: u64) -> Result<Option<ForkBlock>, RemoteSourceError> {
        (**self).block_by_number(number).await
    }
}

#[async_trait]
impl<T: RemoteChainSource + ?Sized> RemoteChainSource for std::sync::Arc<T> {
    async fn block_by_number(&self, number: u64) -> Result<Option<ForkBlock>, RemoteSourceError> {
        (**self).block_by_number(number).await
    }
}
