//! The forest of known fork targets and their parent/child relationships.

use crate::key::NodeKey;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// In-memory ancestry index for one cache location.
///
/// Relationships are held as an index from node key to child keys, mirroring
/// the persisted encoding, plus a reverse parent index rebuilt on load. Every
/// edge points from a lower block number to a strictly higher one, which also
/// rules out cycles: no back-pointers are needed.
#[derive(Debug, Default)]
pub(crate) struct Forest {
    children: BTreeMap<NodeKey, BTreeSet<NodeKey>>,
    parents: HashMap<NodeKey, NodeKey>,
    roots: BTreeSet<NodeKey>,
}

impl Forest {
    /// Rebuilds a forest from the persisted index namespace.
    ///
    /// Entries that violate the structural invariants (non-increasing block
    /// numbers, a node claimed by two parents) are dropped rather than
    /// rejected wholesale; the relationship is recreated the next time a
    /// resolve discovers it.
    pub(crate) fn from_index<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (NodeKey, Vec<NodeKey>)>,
    {
        let entries: Vec<_> = entries.into_iter().collect();
        let mut forest = Self::default();
        for (key, children) in &entries {
            forest.children.entry(*key).or_default();
            for child in children {
                forest.children.entry(*child).or_default();
            }
        }
        for (key, children) in entries {
            for child in children {
                if child.number() <= key.number() {
                    warn!(
                        target: "fork::cache",
                        parent = %key,
                        %child,
                        "dropping index edge with non-increasing block number"
                    );
                    continue;
                }
                if forest.parents.contains_key(&child) {
                    warn!(target: "fork::cache", %child, "dropping duplicate parent for node");
                    continue;
                }
                forest.parents.insert(child, key);
                if let Some(children) = forest.children.get_mut(&key) {
                    children.insert(child);
                }
            }
        }
        forest.roots = forest
            .children
            .keys()
            .copied()
            .filter(|key| !forest.parents.contains_key(key))
            .collect();
        forest
    }

    /// The persisted representation: node key to child keys, for every node.
    pub(crate) fn to_index(&self) -> BTreeMap<NodeKey, Vec<NodeKey>> {
        self.children
            .iter()
            .map(|(key, children)| (*key, children.iter().copied().collect()))
            .collect()
    }

    pub(crate) fn contains(&self, key: &NodeKey) -> bool {
        self.children.contains_key(key)
    }

    pub(crate) fn len(&self) -> usize {
        self.children.len()
    }

    /// Inserts a node with no relationships yet.
    pub(crate) fn insert_root(&mut self, key: NodeKey) {
        self.children.entry(key).or_default();
        if !self.parents.contains_key(&key) {
            self.roots.insert(key);
        }
    }

    pub(crate) fn roots(&self) -> impl Iterator<Item = NodeKey> + '_ {
        self.roots.iter().copied()
    }

    pub(crate) fn children(&self, key: &NodeKey) -> impl Iterator<Item = NodeKey> + '_ {
        self.children.get(key).into_iter().flatten().copied()
    }

    pub(crate) fn parent(&self, key: &NodeKey) -> Option<NodeKey> {
        self.parents.get(key).copied()
    }

    /// The node itself followed by its ancestors, nearest first.
    pub(crate) fn self_and_ancestors(&self, key: NodeKey) -> Vec<NodeKey> {
        let mut lineage = vec![key];
        let mut current = key;
        while let Some(parent) = self.parents.get(&current).copied() {
            lineage.push(parent);
            current = parent;
        }
        lineage
    }

    /// Removes `key` from its parent's children or from the root set.
    ///
    /// The node keeps its own subtree; callers reattach it right away.
    pub(crate) fn detach(&mut self, key: NodeKey) {
        if let Some(parent) = self.parents.remove(&key) {
            if let Some(children) = self.children.get_mut(&parent) {
                children.remove(&key);
            }
        } else {
            self.roots.remove(&key);
        }
    }

    /// Makes `child` a child of `parent`. `child` must be detached.
    ///
    /// Refuses edges that would break the number ordering; since every edge
    /// strictly increases the block number, an accepted edge can never form
    /// a cycle.
    pub(crate) fn attach(&mut self, parent: NodeKey, child: NodeKey) -> bool {
        if !self.children.contains_key(&parent) || !self.children.contains_key(&child) {
            warn!(target: "fork::cache", %parent, %child, "refusing edge between unknown nodes");
            return false;
        }
        if child.number() <= parent.number() {
            warn!(
                target: "fork::cache",
                %parent,
                %child,
                "refusing edge with non-increasing block number"
            );
            return false;
        }
        if self.parents.contains_key(&child) {
            warn!(target: "fork::cache", %child, "refusing edge for node that still has a parent");
            return false;
        }
        match self.children.get_mut(&parent) {
            Some(children) => children.insert(child),
            None => return false,
        };
        self.roots.remove(&child);
        self.parents.insert(child, parent);
        true
    }
}
