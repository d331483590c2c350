//! Layered session reads, write isolation and persistence.

use crate::bytes;
use fork_cache::{testing::MockChain, CacheHandle, NetworkCache};

#[tokio::test]
async fn ancestor_values_flow_to_descendants() {
    let chain = MockChain::generate(1, 300);
    let handle = CacheHandle::in_memory();

    let a = handle.resolve(chain.block(100).unwrap(), &chain).await.unwrap();
    let b = handle.resolve(chain.block(150).unwrap(), &chain).await.unwrap();
    let c = handle.resolve(chain.block(200).unwrap(), &chain).await.unwrap();

    a.put(bytes(b"account:0xaa"), bytes(b"state-a"));
    b.put(bytes(b"account:0xbb"), bytes(b"state-b"));

    // transitively readable through the grandchild
    assert_eq!(c.get(b"account:0xaa"), Some(bytes(b"state-a")));
    assert_eq!(c.get(b"account:0xbb"), Some(bytes(b"state-b")));
    // but never upwards
    assert_eq!(a.get(b"account:0xbb"), None);
}

#[tokio::test]
async fn writes_stay_isolated_from_siblings_and_ancestors() {
    let chain = MockChain::generate(1, 200);
    let fork = chain.fork_at(120, 5, 60);
    let handle = CacheHandle::in_memory();

    let parent = handle.resolve(chain.block(100).unwrap(), &chain).await.unwrap();
    let left = handle.resolve(chain.block(180).unwrap(), &chain).await.unwrap();
    let right = handle.resolve(fork.block(170).unwrap(), &fork).await.unwrap();

    left.put(bytes(b"tx:1"), bytes(b"receipt"));

    assert_eq!(left.get(b"tx:1"), Some(bytes(b"receipt")));
    assert_eq!(right.get(b"tx:1"), None);
    assert_eq!(parent.get(b"tx:1"), None);
}

#[tokio::test]
async fn nearest_partition_wins() {
    let chain = MockChain::generate(1, 300);
    let handle = CacheHandle::in_memory();

    let a = handle.resolve(chain.block(100).unwrap(), &chain).await.unwrap();
    let b = handle.resolve(chain.block(150).unwrap(), &chain).await.unwrap();
    let c = handle.resolve(chain.block(200).unwrap(), &chain).await.unwrap();

    a.put(bytes(b"code:0xcc"), bytes(b"old"));
    b.put(bytes(b"code:0xcc"), bytes(b"new"));

    assert_eq!(c.get(b"code:0xcc"), Some(bytes(b"new")));
    assert_eq!(b.get(b"code:0xcc"), Some(bytes(b"new")));
    assert_eq!(a.get(b"code:0xcc"), Some(bytes(b"old")));
}

#[tokio::test]
async fn export_layers_all_visible_entries() {
    let chain = MockChain::generate(1, 300);
    let handle = CacheHandle::in_memory();

    let a = handle.resolve(chain.block(100).unwrap(), &chain).await.unwrap();
    let b = handle.resolve(chain.block(150).unwrap(), &chain).await.unwrap();

    a.put(bytes(b"shared"), bytes(b"from-a"));
    a.put(bytes(b"only-a"), bytes(b"a"));
    b.put(bytes(b"shared"), bytes(b"from-b"));
    b.put(bytes(b"only-b"), bytes(b"b"));

    let exported = b.export();
    assert_eq!(exported.len(), 3);
    assert_eq!(exported[&bytes(b"shared")], bytes(b"from-b"));
    assert_eq!(exported[&bytes(b"only-a")], bytes(b"a"));
    assert_eq!(exported[&bytes(b"only-b")], bytes(b"b"));

    let exported = a.export();
    assert_eq!(exported.len(), 2);
    assert_eq!(exported[&bytes(b"shared")], bytes(b"from-a"));
}

#[tokio::test]
async fn cache_survives_close_and_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let location = dir.path().join("forks.json");
    let chain = MockChain::generate(1, 151);
    let cache = NetworkCache::new();

    {
        let handle = cache.acquire(&location).unwrap();
        let parent = handle.resolve(chain.block(100).unwrap(), &chain).await.unwrap();
        let child = handle.resolve(chain.head(), &chain).await.unwrap();
        parent.put(bytes(b"block:100"), bytes(b"header"));
        parent.close().unwrap();
        child.close().unwrap();
        handle.close().unwrap();
    }
    assert!(!cache.is_open(&location));

    let handle = cache.acquire(&location).unwrap();
    let probes = chain.queries();
    let session = handle.resolve(chain.head(), &chain).await.unwrap();
    // the placement was persisted, so this is an exact match with no probes
    assert_eq!(chain.queries(), probes);
    assert_eq!(session.lineage().len(), 2);
    assert_eq!(session.get(b"block:100"), Some(bytes(b"header")));
}

#[tokio::test]
async fn corrupt_index_edge_heals_on_the_next_resolve() {
    let dir = tempfile::tempdir().unwrap();
    let location = dir.path().join("forks.json");
    let chain = MockChain::generate(1, 200);
    let cache = NetworkCache::new();

    let (parent_key, child_key) = {
        let handle = cache.acquire(&location).unwrap();
        let parent = handle.resolve(chain.block(100).unwrap(), &chain).await.unwrap();
        let child = handle.resolve(chain.block(150).unwrap(), &chain).await.unwrap();
        let keys = (parent.node(), child.node());
        parent.close().unwrap();
        child.close().unwrap();
        handle.close().unwrap();
        keys
    };

    // sever the persisted edge between the two nodes
    let mut document: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&location).unwrap()).unwrap();
    document["index"][parent_key.to_string().as_str()] = serde_json::json!(["0xnothex"]);
    std::fs::write(&location, serde_json::to_vec(&document).unwrap()).unwrap();

    let handle = cache.acquire(&location).unwrap();
    let index = handle.index_snapshot();
    assert_eq!(index[&parent_key], Vec::<fork_cache::NodeKey>::new());

    // a new resolve on the same chain rediscovers the relationship
    handle.resolve(chain.block(180).unwrap(), &chain).await.unwrap();
    let index = handle.index_snapshot();
    assert_eq!(index[&parent_key], vec![child_key]);
}
