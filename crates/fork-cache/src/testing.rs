//! In-memory simulated chains for tests.
//!
//! [`MockChain`] stands in for the remote chain a fork session reads through
//! to: a linear sequence of block hashes that can advance, be forked into a
//! diverging chain, fail on demand, and count the probes made against it.

use crate::{error::RemoteSourceError, key::ForkBlock, remote::RemoteChainSource};
use alloy_primitives::{keccak256, B256};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

/// A simulated remote chain.
///
/// Hashes are chained (each block's hash commits to its parent's), so two
/// chains agree at a block number iff they share all history up to it, the
/// same guarantee a real chain gives the resolver.
#[derive(Clone, Debug)]
pub struct MockChain {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Debug)]
struct Inner {
    blocks: Vec<B256>,
    queries: u64,
    failing: bool,
}

impl MockChain {
    /// A fresh chain of `len` blocks derived from `salt`.
    pub fn generate(salt: u64, len: usize) -> Self {
        let chain = Self::from_blocks(Vec::new());
        chain.extend(len, salt);
        chain
    }

    pub fn from_blocks(blocks: Vec<B256>) -> Self {
        Self { inner: Arc::new(Mutex::new(Inner { blocks, queries: 0, failing: false })) }
    }

    /// Advances the chain by `extra` blocks derived from `salt`.
    pub fn extend(&self, extra: usize, salt: u64) {
        let mut inner = self.inner.lock();
        let mut parent = inner.blocks.last().copied().unwrap_or(B256::ZERO);
        for _ in 0..extra {
            let number = inner.blocks.len() as u64;
            let mut preimage = [0u8; 48];
            preimage[..32].copy_from_slice(parent.as_slice());
            preimage[32..40].copy_from_slice(&salt.to_be_bytes());
            preimage[40..].copy_from_slice(&number.to_be_bytes());
            parent = keccak256(preimage);
            inner.blocks.push(parent);
        }
    }

    /// A new chain sharing history with `self` through `number`, then
    /// diverging for `extra` blocks derived from `salt`.
    pub fn fork_at(&self, number: u64, salt: u64, extra: usize) -> Self {
        let shared = self.inner.lock().blocks[..=number as usize].to_vec();
        let fork = Self::from_blocks(shared);
        fork.extend(extra, salt);
        fork
    }

    pub fn head(&self) -> ForkBlock {
        let inner = self.inner.lock();
        let number = inner.blocks.len() as u64 - 1;
        ForkBlock::new(number, inner.blocks[number as usize])
    }

    pub fn block(&self, number: u64) -> Option<ForkBlock> {
        self.inner.lock().blocks.get(number as usize).map(|hash| ForkBlock::new(number, *hash))
    }

    pub fn len(&self) -> usize {
        self.inner.lock().blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().blocks.is_empty()
    }

    /// Makes every subsequent query fail until reset, simulating an rpc
    /// outage.
    pub fn set_failing(&self, failing: bool) {
        self.inner.lock().failing = failing;
    }

    /// Number of queries served (or failed) so far.
    pub fn queries(&self) -> u64 {
        self.inner.lock().queries
    }
}

#[async_trait]
impl RemoteChainSource for MockChain {
    async fn block_by_number(&self, number: u64) -> Result<Option<ForkBlock>, RemoteSourceError> {
        let mut inner = self.inner.lock();
        inner.queries += 1;
        if inner.failing {
            return Err("simulated rpc outage".into());
        }
        Ok(inner.blocks.get(number as usize).map(|hash| ForkBlock::new(number, *hash)))
    }
}
