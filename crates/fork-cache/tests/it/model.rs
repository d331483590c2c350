//! Property-based check of the forest against a reference model.
//!
//! Random families of simulated chains (a base chain plus forks of forks)
//! are resolved in random order, with a close/reopen of the cache location
//! part-way through. The resulting persisted forest must equal the forest a
//! reference model computes with full knowledge of each session's chain.

use fork_cache::{testing::MockChain, NetworkCache, NodeKey};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::collections::BTreeMap;

/// Reference model: a plain parent map rebuilt with direct access to the
/// session's whole chain instead of targeted probes.
#[derive(Default)]
struct ModelForest {
    parent: BTreeMap<NodeKey, Option<NodeKey>>,
}

impl ModelForest {
    /// Mirrors a resolve of `number` against `chain`: every known node lying
    /// on the chain, plus the target, forms one ancestor path ordered by
    /// block number.
    fn insert(&mut self, chain: &MockChain, number: u64) {
        let target = chain.block(number).expect("target within chain").key();
        if self.parent.contains_key(&target) {
            return;
        }
        self.parent.insert(target, None);
        let on_chain = |key: &NodeKey| {
            chain.block(key.number()).map(|block| block.hash) == Some(key.hash())
        };
        let lineage: Vec<NodeKey> =
            self.parent.keys().copied().filter(|key| on_chain(key)).collect();
        for pair in lineage.windows(2) {
            self.parent.insert(pair[1], Some(pair[0]));
        }
    }

    /// The model's equivalent of the persisted index.
    fn to_index(&self) -> BTreeMap<NodeKey, Vec<NodeKey>> {
        let mut index: BTreeMap<NodeKey, Vec<NodeKey>> =
            self.parent.keys().map(|key| (*key, Vec::new())).collect();
        for (child, parent) in &self.parent {
            if let Some(parent) = parent {
                if let Some(children) = index.get_mut(parent) {
                    children.push(*child);
                }
            }
        }
        index
    }
}

/// (parent selector, fork-point selector, blocks past the fork point)
type ForkPlan = (usize, u64, usize);

fn build_chains(base_len: usize, plans: &[ForkPlan]) -> Vec<MockChain> {
    let mut chains = vec![MockChain::generate(11, base_len)];
    for (i, (parent, fork_point, extra)) in plans.iter().enumerate() {
        let parent = &chains[parent % chains.len()];
        let fork_number = fork_point % parent.len() as u64;
        chains.push(parent.fork_at(fork_number, 100 + i as u64, *extra));
    }
    chains
}

fn run_case(base_len: usize, plans: Vec<ForkPlan>, sessions: Vec<(usize, u64)>, reopen_at: usize) {
    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let location = dir.path().join("forks.json");
    let cache = NetworkCache::new();
    let chains = build_chains(base_len, &plans);
    let mut model = ModelForest::default();

    let reopen_at = reopen_at % (sessions.len() + 1);
    let mut handle = cache.acquire(&location).unwrap();
    for (i, (chain_selector, number_selector)) in sessions.into_iter().enumerate() {
        if i == reopen_at {
            // exercise persistence mid-sequence
            handle.close().unwrap();
            assert!(!cache.is_open(&location));
            handle = cache.acquire(&location).unwrap();
        }
        let chain = &chains[chain_selector % chains.len()];
        let number = number_selector % chain.len() as u64;

        let session =
            runtime.block_on(handle.resolve(chain.block(number).unwrap(), chain)).unwrap();
        model.insert(chain, number);
        session.close().unwrap();
    }

    let index = handle.index_snapshot();
    assert_eq!(index, model.to_index());
    // structural invariant: every edge strictly increases the block number
    for (parent, children) in &index {
        for child in children {
            assert!(child.number() > parent.number());
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn forest_matches_reference_model(
        base_len in 4usize..48,
        plans in proptest::collection::vec((0usize..8, 0u64..u64::MAX, 1usize..24), 0..5),
        sessions in proptest::collection::vec((0usize..8, 0u64..u64::MAX), 1..24),
        reopen_at in 0usize..24,
    ) {
        run_case(base_len, plans, sessions, reopen_at);
    }
}

#[test]
fn reference_model_regression() {
    // one fixed interleaving that exercises adoption, insertion between
    // nodes and an unrelated fork
    let plans = vec![(0, 15, 30), (0, 25, 30)];
    let sessions = vec![(1, 20), (2, 20), (0, 30), (0, 5), (1, 40), (0, 30)];
    run_case(40, plans, sessions, 3);
}
