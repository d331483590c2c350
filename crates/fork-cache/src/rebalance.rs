//! Forest mutations driven by newly discovered ancestry evidence.

use crate::{ancestry::Forest, key::NodeKey};

/// Moves `node`, with its whole subtree, directly under `new_parent`.
///
/// The relationship is inserted strictly between `new_parent` and `node`:
/// `node`'s own children are untouched.
pub(crate) fn reparent(forest: &mut Forest, new_parent: NodeKey, node: NodeKey) {
    trace!(target: "fork::cache", %new_parent, %node, "reparenting node");
    forest.detach(node);
    if !forest.attach(new_parent, node) {
        // attach already logged the refusal; reinstate the node as a root so
        // it is not lost from the forest
        forest.insert_root(node);
    }
}

/// Rewires `lineage` into a single ancestor path.
///
/// `lineage` is the set of nodes proven to lie on one remote chain, ordered
/// by block number. Every consecutive pair becomes a parent/child edge, so a
/// node placed as a sibling of its real ancestor moves below it, and a former
/// root that turns out to be a descendant is adopted. The first entry keeps
/// its existing placement.
pub(crate) fn consolidate_lineage(forest: &mut Forest, lineage: &[NodeKey]) {
    for pair in lineage.windows(2) {
        let (parent, child) = (pair[0], pair[1]);
        if forest.parent(&child) != Some(parent) {
            reparent(forest, parent, child);
        }
    }
}
