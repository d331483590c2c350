//! Placement of fork targets into the ancestry forest.
//!
//! A resolve runs in two phases. The probe phase walks the forest from its
//! roots, querying the new session's remote source for the block at each
//! candidate node's number; all probes for one decision level are issued
//! concurrently and joined before any decision. The commit phase applies the
//! resulting placement synchronously, so either the whole placement lands or,
//! if the future is dropped or a probe fails, nothing does.

use crate::{
    error::{Error, Result},
    key::{ForkBlock, NodeKey},
    rebalance,
    remote::RemoteChainSource,
    store::CacheStore,
};
use alloy_primitives::B256;
use futures::future;
use std::collections::{BTreeSet, HashMap};

/// Memoized probe results for a single resolve call.
///
/// At most one remote query is made per block number, and conflicting
/// answers for the same number abort the resolve.
struct ProbeCache<'a> {
    source: &'a dyn RemoteChainSource,
    results: HashMap<u64, Option<B256>>,
}

impl<'a> ProbeCache<'a> {
    fn new(source: &'a dyn RemoteChainSource) -> Self {
        Self { source, results: HashMap::new() }
    }

    /// Queries all not-yet-known numbers concurrently and memoizes the
    /// answers. An absent block memoizes as `None`.
    async fn prefetch<I>(&mut self, numbers: I) -> Result<()>
    where
        I: IntoIterator<Item = u64>,
    {
        let missing: BTreeSet<u64> =
            numbers.into_iter().filter(|number| !self.results.contains_key(number)).collect();
        if missing.is_empty() {
            return Ok(());
        }
        let source = self.source;
        let probes = missing.into_iter().map(|number| async move {
            match source.block_by_number(number).await {
                Ok(block) => {
                    trace!(target: "fork::cache", number, hash = ?block.as_ref().map(|b| b.hash), "probed remote");
                    Ok((number, block))
                }
                Err(err) => Err(Error::RemoteQuery { number, source: err }),
            }
        });
        for (number, block) in future::try_join_all(probes).await? {
            self.record(number, block.map(|block| block.hash))?;
        }
        Ok(())
    }

    fn record(&mut self, number: u64, hash: Option<B256>) -> Result<()> {
        if let Some(existing) = self.results.get(&number) {
            if *existing != hash {
                return Err(Error::InconsistentRemote { number });
            }
        }
        self.results.insert(number, hash);
        Ok(())
    }

    /// Whether the session's chain has exactly this node's block.
    fn matches(&self, key: &NodeKey) -> bool {
        self.results.get(&key.number()) == Some(&Some(key.hash()))
    }
}

/// Locates or creates the ancestry node for `block`, wiring it into the
/// forest wherever the probe evidence places it.
pub(crate) async fn resolve(
    store: &CacheStore,
    block: ForkBlock,
    source: &dyn RemoteChainSource,
) -> Result<NodeKey> {
    let target = block.key();
    let _gate = store.resolve_gate.lock().await;

    if store.forest.read().contains(&target) {
        trace!(target: "fork::cache", node = %target, "resolved existing fork target");
        return Ok(target);
    }

    // Probe phase: collect every known node provably on this session's
    // chain. Walks level by level from the roots, descending only into
    // matching nodes; nodes at the target's own number are never related
    // (equal number with a differing hash is a different fork).
    let mut probes = ProbeCache::new(source);
    let mut matched = Vec::new();
    let mut frontier: Vec<NodeKey> = {
        let forest = store.forest.read();
        forest.roots().collect()
    };
    while !frontier.is_empty() {
        frontier.retain(|key| key.number() != block.number);
        probes.prefetch(frontier.iter().map(|key| key.number())).await?;
        let forest = store.forest.read();
        let mut next = Vec::new();
        for key in frontier {
            if probes.matches(&key) {
                matched.push(key);
                next.extend(forest.children(&key));
            }
        }
        drop(forest);
        frontier = next;
    }

    // Commit phase: everything below is synchronous. The matched set plus
    // the target lie on one linear chain, so ordered by number they form the
    // ancestor path the forest must reflect.
    matched.push(target);
    matched.sort_unstable();
    let mut forest = store.forest.write();
    forest.insert_root(target);
    rebalance::consolidate_lineage(&mut forest, &matched);
    let placed_under = forest.parent(&target);
    drop(forest);
    store.mark_dirty();
    trace!(
        target: "fork::cache",
        node = %target,
        parent = ?placed_under,
        lineage = matched.len(),
        "placed fork target"
    );
    Ok(target)
}
