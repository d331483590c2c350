//! Per-session read/write view over the cache.

use crate::{
    error::Result,
    key::{ForkBlock, NodeKey},
    registry::CacheHandle,
};
use alloy_primitives::Bytes;
use std::collections::BTreeMap;

/// A live fork session bound to one ancestry node.
///
/// Reads are layered: the session's own partition first, then each
/// ancestor's from nearest to farthest — an ancestor's cached data is valid
/// for every descendant. Writes stay scoped to the session's own node so
/// session-specific results never pollute data shared with siblings.
///
/// Keys and values are opaque bytes; the store performs no interpretation.
#[derive(Debug)]
pub struct ForkSession {
    handle: CacheHandle,
    node: NodeKey,
}

impl ForkSession {
    pub(crate) fn new(handle: CacheHandle, node: NodeKey) -> Self {
        trace!(target: "fork::cache", node = %node, "opened fork session");
        Self { handle, node }
    }

    /// The ancestry node this session is bound to.
    pub fn node(&self) -> NodeKey {
        self.node
    }

    /// The fork target this session reads through to.
    pub fn block(&self) -> ForkBlock {
        self.node.block()
    }

    /// The bound node followed by its ancestors, nearest first.
    pub fn lineage(&self) -> Vec<NodeKey> {
        self.handle.store().forest.read().self_and_ancestors(self.node)
    }

    /// Looks `key` up in the bound node's partition, then in each ancestor's;
    /// the nearest hit wins.
    pub fn get(&self, key: &[u8]) -> Option<Bytes> {
        let store = self.handle.store();
        let lineage = store.forest.read().self_and_ancestors(self.node);
        let partitions = store.partitions.read();
        let needle = Bytes::from(key.to_vec());
        for node in lineage {
            if let Some(value) = partitions.get(&node).and_then(|partition| partition.get(&needle))
            {
                return Some(value.clone());
            }
        }
        None
    }

    /// Writes `value` under the bound node's own partition, never an
    /// ancestor's.
    pub fn put(&self, key: impl Into<Bytes>, value: impl Into<Bytes>) {
        let store = self.handle.store();
        store.partitions.write().entry(self.node).or_default().insert(key.into(), value.into());
        store.mark_dirty();
    }

    /// Every entry visible to this session, with the nearest definition
    /// winning for shadowed keys. The scan holds read guards for the scope of
    /// the call only.
    pub fn export(&self) -> BTreeMap<Bytes, Bytes> {
        let store = self.handle.store();
        let lineage = store.forest.read().self_and_ancestors(self.node);
        let partitions = store.partitions.read();
        let mut entries = BTreeMap::new();
        for node in lineage {
            if let Some(partition) = partitions.get(&node) {
                for (key, value) in partition {
                    entries.entry(key.clone()).or_insert_with(|| value.clone());
                }
            }
        }
        entries
    }

    /// Closes the session, releasing its reference to the shared store.
    ///
    /// The last reference to a location flushes and closes the store, so
    /// flush failures surface here; they affect this caller only.
    pub fn close(mut self) -> Result<()> {
        trace!(target: "fork::cache", node = %self.node, "closing fork session");
        self.handle.release_once()
    }
}
