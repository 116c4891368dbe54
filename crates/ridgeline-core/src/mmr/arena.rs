use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{hash_children, Digest, Weight};

/// A leaf or internal node of the accumulator.
///
/// Nodes are owned by the [`NodeArena`] and addressed by `index`; children
/// are found by index arithmetic, never by pointer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Leaf: block hash. Internal: `keccak256(left ‖ right)`.
    pub digest: Digest,
    /// Leaf: block difficulty. Internal: sum of the children.
    pub weight: Weight,
    /// Number of leaves under this node.
    pub leaf_count: u64,
    /// Slot in the arena, fixed at insertion.
    pub index: u64,
}

impl Node {
    pub fn leaf(digest: Digest, weight: Weight, index: u64) -> Self {
        Self {
            digest,
            weight,
            leaf_count: 1,
            index,
        }
    }

    /// Parent of `left` and `right`, to be stored at `index`.
    pub fn merge(left: &Node, right: &Node, index: u64) -> Self {
        Self {
            digest: hash_children(&left.digest, &right.digest),
            weight: &left.weight + &right.weight,
            leaf_count: left.leaf_count + right.leaf_count,
            index,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.leaf_count == 1
    }

    /// Perfect subtree roots have a power-of-two leaf count; bagging nodes,
    /// which join peaks of distinct sizes, never do.
    pub fn is_perfect(&self) -> bool {
        self.leaf_count.is_power_of_two()
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Node(index={}, leaves={}, weight={}, digest={})",
            self.index,
            self.leaf_count,
            self.weight,
            hex::encode(self.digest)
        )
    }
}

/// Append-mostly, index-addressed node storage.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeArena {
    nodes: Vec<Node>,
}

impl NodeArena {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    pub fn len(&self) -> u64 {
        self.nodes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, index: u64) -> Option<&Node> {
        usize::try_from(index).ok().and_then(|i| self.nodes.get(i))
    }

    pub fn last(&self) -> Option<&Node> {
        self.nodes.last()
    }

    pub fn push(&mut self, node: Node) {
        debug_assert_eq!(node.index, self.len(), "node index must match its slot");
        self.nodes.push(node);
    }

    pub fn pop(&mut self) -> Option<Node> {
        self.nodes.pop()
    }

    /// Drop every node at or after `len`.
    pub fn truncate(&mut self, len: u64) {
        self.nodes.truncate(len as usize);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub(crate) fn from_nodes(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }
}

impl std::ops::Index<u64> for NodeArena {
    type Output = Node;

    fn index(&self, index: u64) -> &Node {
        &self.nodes[index as usize]
    }
}
