//! Parent/child tree helpers shared by the page tree.
//!
//! All functions work on a flat slice of nodes so they can run over whatever
//! a store returned for one tenant. Walks are bounded by [`MAX_TREE_DEPTH`] so
//! corrupt parent links can never loop forever.

use crate::{Page, TreeError};
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use uuid::Uuid;

/// Deepest parent chain any walk will follow.
pub const MAX_TREE_DEPTH: usize = 64;

/// A node with an id and an optional parent id.
pub trait TreeNode {
    fn node_id(&self) -> Uuid;
    fn node_parent(&self) -> Option<Uuid>;
}

impl TreeNode for Page {
    fn node_id(&self) -> Uuid {
        self.page_id.as_uuid()
    }

    fn node_parent(&self) -> Option<Uuid> {
        self.parent_id.map(|id| id.as_uuid())
    }
}

impl TreeNode for (Uuid, Option<Uuid>) {
    fn node_id(&self) -> Uuid {
        self.0
    }

    fn node_parent(&self) -> Option<Uuid> {
        self.1
    }
}

fn parent_map<N: TreeNode>(nodes: &[N]) -> HashMap<Uuid, Option<Uuid>> {
    nodes.iter().map(|n| (n.node_id(), n.node_parent())).collect()
}

/// Ids on the path from the root down to `node`'s parent (root first).
pub fn ancestors<N: TreeNode>(nodes: &[N], node: Uuid) -> Result<Vec<Uuid>, TreeError> {
    let parents = parent_map(nodes);
    let mut chain = Vec::new();
    let mut seen = HashSet::new();
    let mut current = parents.get(&node).copied().flatten();

    while let Some(id) = current {
        if chain.len() >= MAX_TREE_DEPTH || !seen.insert(id) {
            return Err(TreeError::DepthExceeded {
                node,
                max_depth: MAX_TREE_DEPTH,
            });
        }
        chain.push(id);
        current = parents.get(&id).copied().flatten();
    }

    chain.reverse();
    Ok(chain)
}

/// Reject a move of `node` under `new_parent` if it would create a cycle.
pub fn check_reparent<N: TreeNode>(
    nodes: &[N],
    node: Uuid,
    new_parent: Option<Uuid>,
) -> Result<(), TreeError> {
    let Some(target) = new_parent else {
        return Ok(());
    };
    if target == node {
        return Err(TreeError::Cycle {
            node,
            new_parent: target,
        });
    }
    if ancestors(nodes, target)?.contains(&node) {
        return Err(TreeError::Cycle {
            node,
            new_parent: target,
        });
    }
    Ok(())
}

/// Every descendant of `root`, breadth-first, excluding `root` itself.
pub fn descendants<N: TreeNode>(nodes: &[N], root: Uuid) -> Vec<Uuid> {
    let mut children: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for n in nodes {
        if let Some(parent) = n.node_parent() {
            children.entry(parent).or_default().push(n.node_id());
        }
    }

    let mut out = Vec::new();
    let mut seen = HashSet::from([root]);
    let mut queue = VecDeque::from([root]);
    while let Some(id) = queue.pop_front() {
        for child in children.get(&id).into_iter().flatten() {
            if seen.insert(*child) {
                out.push(*child);
                queue.push_back(*child);
            }
        }
    }
    out
}

/// Nested view of a subtree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeView<N> {
    pub node: N,
    pub children: Vec<TreeView<N>>,
}

/// Build nested views for the children of `root` (`None` = top-level nodes).
///
/// Sibling order follows the order of `nodes`, so callers sort first.
pub fn build_tree<N: TreeNode + Clone>(nodes: &[N], root: Option<Uuid>) -> Vec<TreeView<N>> {
    let mut by_parent: HashMap<Option<Uuid>, Vec<&N>> = HashMap::new();
    for n in nodes {
        by_parent.entry(n.node_parent()).or_default().push(n);
    }

    fn grow<N: TreeNode + Clone>(
        by_parent: &HashMap<Option<Uuid>, Vec<&N>>,
        parent: Option<Uuid>,
        depth: usize,
    ) -> Vec<TreeView<N>> {
        if depth > MAX_TREE_DEPTH {
            return Vec::new();
        }
        by_parent
            .get(&parent)
            .map(|kids| {
                kids.iter()
                    .map(|n| TreeView {
                        node: (*n).clone(),
                        children: grow(by_parent, Some(n.node_id()), depth + 1),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    grow(&by_parent, root, 0)
}
