use parking_lot::Mutex;
use thiserror::Error;
use tracing::trace;

use super::arena::{Node, NodeArena};
use crate::types::{Digest, Weight};

/// Structural problems found when validating an arena, typically one decoded
/// from an untrusted snapshot.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IntegrityError {
    #[error("Arena holds {got} nodes but {leaf_count} leaves require {expected}")]
    LengthMismatch {
        leaf_count: u64,
        expected: u64,
        got: u64,
    },

    #[error("Node in slot {slot} claims index {index}")]
    IndexMismatch { slot: u64, index: u64 },

    #[error("Root covers {got} leaves, expected {expected}")]
    RootLeafCount { expected: u64, got: u64 },

    #[error("Node {index} is missing a child")]
    MissingChild { index: u64 },

    #[error("Node {index} does not equal the merge of its children")]
    MergeMismatch { index: u64 },

    #[error("Only {visited} of {len} nodes are reachable from the root")]
    Unreachable { visited: u64, len: u64 },
}

/// Number of arena slots taken by the perfect subtrees of `leaf_count`
/// leaves, i.e. the post-order MMR size `2n - popcount(n)`.
pub fn mmr_size(leaf_count: u64) -> u64 {
    2 * leaf_count - u64::from(leaf_count.count_ones())
}

/// Arena positions of the peaks for `leaf_count` leaves, largest first.
pub fn peak_positions(leaf_count: u64) -> Vec<u64> {
    let mut peaks = Vec::with_capacity(leaf_count.count_ones() as usize);
    let mut covered = 0u64;
    for bit in (0..u64::BITS).rev() {
        let size = 1u64 << bit;
        if leaf_count & size != 0 {
            covered += size;
            peaks.push(mmr_size(covered) - 1);
        }
    }
    peaks
}

/// Leaves under the left child of a node covering `leaf_count >= 2` leaves:
/// the largest power of two strictly below `leaf_count`.
pub fn left_leaf_count(leaf_count: u64) -> u64 {
    debug_assert!(leaf_count >= 2);
    1u64 << (u64::BITS - 1 - (leaf_count - 1).leading_zeros())
}

/// Arena slots used by an accumulator holding `leaf_count` leaves: the
/// perfect subtrees plus one bagging node per extra peak.
pub fn arena_len(leaf_count: u64) -> u64 {
    if leaf_count == 0 {
        0
    } else {
        mmr_size(leaf_count) + u64::from(leaf_count.count_ones()) - 1
    }
}

/// [`arena_len`] for a leaf count read from untrusted input; `None` when the
/// arena size does not fit in a `u64`.
pub fn checked_arena_len(leaf_count: u64) -> Option<u64> {
    let peaks = u64::from(leaf_count.count_ones());
    leaf_count
        .checked_mul(2)?
        .checked_sub(peaks)?
        .checked_add(peaks.saturating_sub(1))
}

/// Fold `peaks` (largest first) right-to-left into a single root, returning
/// the bagging nodes in the order they are stored, starting at `next_index`.
fn bag_peaks(mut peaks: Vec<Node>, mut next_index: u64) -> Vec<Node> {
    let mut bagged = Vec::with_capacity(peaks.len().saturating_sub(1));
    let Some(mut acc) = peaks.pop() else {
        return bagged;
    };
    while let Some(left) = peaks.pop() {
        acc = Node::merge(&left, &acc, next_index);
        next_index += 1;
        bagged.push(acc.clone());
    }
    bagged
}

/// The unsynchronized accumulator state: leaf count plus node arena.
///
/// After any append or rewind the last arena slot holds the bagged root of
/// every leaf appended so far.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Accumulator {
    leaf_count: u64,
    arena: NodeArena,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn leaf_count(&self) -> u64 {
        self.leaf_count
    }

    pub fn is_empty(&self) -> bool {
        self.leaf_count == 0
    }

    pub fn arena(&self) -> &NodeArena {
        &self.arena
    }

    /// The bagged root, or `None` when no leaf has been appended.
    pub fn root(&self) -> Option<&Node> {
        if self.leaf_count == 0 {
            None
        } else {
            self.arena.last()
        }
    }

    pub fn get_node(&self, index: u64) -> Option<&Node> {
        self.arena.get(index)
    }

    /// The leaf with the given global leaf index.
    pub fn leaf(&self, leaf_index: u64) -> Option<&Node> {
        if leaf_index >= self.leaf_count {
            return None;
        }
        self.arena.get(mmr_size(leaf_index))
    }

    pub fn has_children(&self, node: &Node) -> bool {
        node.leaf_count > 1
    }

    /// Left and right children of `node`, located by index arithmetic.
    pub fn get_children(&self, node: &Node) -> Option<(&Node, &Node)> {
        if node.leaf_count <= 1 {
            return None;
        }
        let (left, right) = if node.is_perfect() {
            (node.index.checked_sub(node.leaf_count)?, node.index.checked_sub(1)?)
        } else {
            let peaks = peak_positions(self.leaf_count);
            let j = node.index.checked_sub(mmr_size(self.leaf_count))?;
            let left_slot = (peaks.len() as u64).checked_sub(2)?.checked_sub(j)?;
            let right = if j == 0 {
                *peaks.last()?
            } else {
                node.index - 1
            };
            (peaks[left_slot as usize], right)
        };
        Some((self.arena.get(left)?, self.arena.get(right)?))
    }

    /// Append one leaf. Never fails; the arena is only touched once every new
    /// node has been computed.
    pub fn append(&mut self, digest: Digest, weight: Weight) {
        let perfect_len = mmr_size(self.leaf_count);
        let mut peaks: Vec<Node> = peak_positions(self.leaf_count)
            .into_iter()
            .map(|pos| self.arena[pos].clone())
            .collect();

        let mut next_index = perfect_len;
        let mut carry = Node::leaf(digest, weight, next_index);
        next_index += 1;
        let mut fresh = vec![carry.clone()];

        // Equal-sized peaks merge into permanent perfect nodes.
        while peaks
            .last()
            .map_or(false, |peak| peak.leaf_count == carry.leaf_count)
        {
            let Some(left) = peaks.pop() else { break };
            carry = Node::merge(&left, &carry, next_index);
            next_index += 1;
            fresh.push(carry.clone());
        }
        peaks.push(carry);
        fresh.extend(bag_peaks(peaks, next_index));

        // Pop the stale bagging nodes, then commit.
        self.arena.truncate(perfect_len);
        for node in fresh {
            self.arena.push(node);
        }
        self.leaf_count += 1;
        trace!(
            leaf_count = self.leaf_count,
            arena_len = self.arena.len(),
            "mmr append"
        );
    }

    /// Remove the most recently appended leaf, restoring the exact state the
    /// accumulator had before that append.
    pub fn rewind(&mut self) -> Option<Node> {
        if self.leaf_count == 0 {
            return None;
        }
        let mut peaks: Vec<Node> = peak_positions(self.leaf_count)
            .into_iter()
            .map(|pos| self.arena[pos].clone())
            .collect();
        let mut node = peaks.pop()?;

        // Walk down the right spine of the last peak, freeing left siblings
        // as standalone peaks until the last leaf is reached.
        while node.leaf_count > 1 {
            let left = self.arena[node.index - node.leaf_count].clone();
            let right = self.arena[node.index - 1].clone();
            peaks.push(left);
            node = right;
        }

        let removed = node;
        let bagged = bag_peaks(peaks, removed.index);
        self.arena.truncate(removed.index);
        for bag in bagged {
            self.arena.push(bag);
        }
        self.leaf_count -= 1;
        trace!(
            leaf_count = self.leaf_count,
            removed = removed.index,
            "mmr rewind"
        );
        Some(removed)
    }

    /// Validate the whole arena: slot indices, expected length, and the
    /// merge invariant for every internal node reachable from the root.
    pub fn check_integrity(&self) -> Result<(), IntegrityError> {
        let expected = checked_arena_len(self.leaf_count);
        if expected != Some(self.arena.len()) {
            return Err(IntegrityError::LengthMismatch {
                leaf_count: self.leaf_count,
                expected: expected.unwrap_or(u64::MAX),
                got: self.arena.len(),
            });
        }
        for (slot, node) in self.arena.iter().enumerate() {
            if node.index != slot as u64 {
                return Err(IntegrityError::IndexMismatch {
                    slot: slot as u64,
                    index: node.index,
                });
            }
        }
        let Some(root) = self.root() else {
            return Ok(());
        };
        if root.leaf_count != self.leaf_count {
            return Err(IntegrityError::RootLeafCount {
                expected: self.leaf_count,
                got: root.leaf_count,
            });
        }

        let len = self.arena.len();
        let mut visited = 0u64;
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            visited += 1;
            if visited > len {
                return Err(IntegrityError::Unreachable { visited, len });
            }
            if node.leaf_count == 0 {
                return Err(IntegrityError::MergeMismatch { index: node.index });
            }
            if node.leaf_count == 1 {
                continue;
            }
            let (left, right) = self
                .get_children(node)
                .ok_or(IntegrityError::MissingChild { index: node.index })?;
            if left.index >= node.index || right.index >= node.index {
                return Err(IntegrityError::MergeMismatch { index: node.index });
            }
            if Node::merge(left, right, node.index) != *node {
                return Err(IntegrityError::MergeMismatch { index: node.index });
            }
            stack.push(right);
            stack.push(left);
        }
        if visited != len {
            return Err(IntegrityError::Unreachable { visited, len });
        }
        Ok(())
    }

    pub(crate) fn from_parts(leaf_count: u64, nodes: Vec<Node>) -> Self {
        Self {
            leaf_count,
            arena: NodeArena::from_nodes(nodes),
        }
    }
}

/// An [`Accumulator`] shared between the header store and concurrent proof
/// requests. Every entry point holds the lock only for its own duration;
/// long proof builds run on a [`Mmr::copy`] snapshot.
#[derive(Debug, Default)]
pub struct Mmr {
    inner: Mutex<Accumulator>,
}

impl Mmr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_accumulator(accumulator: Accumulator) -> Self {
        Self {
            inner: Mutex::new(accumulator),
        }
    }

    pub fn append(&self, digest: Digest, weight: Weight) {
        self.inner.lock().append(digest, weight);
    }

    pub fn rewind(&self) -> Option<Node> {
        self.inner.lock().rewind()
    }

    pub fn root(&self) -> Option<Node> {
        self.inner.lock().root().cloned()
    }

    pub fn leaf_count(&self) -> u64 {
        self.inner.lock().leaf_count()
    }

    pub fn get_node(&self, index: u64) -> Option<Node> {
        self.inner.lock().get_node(index).cloned()
    }

    pub fn get_children(&self, index: u64) -> Option<(Node, Node)> {
        let inner = self.inner.lock();
        let node = inner.get_node(index)?;
        inner
            .get_children(node)
            .map(|(left, right)| (left.clone(), right.clone()))
    }

    /// Point-in-time deep copy for long-running proof generation.
    pub fn copy(&self) -> Accumulator {
        self.inner.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::hash_children;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::sync::Arc;

    fn digest(n: u64) -> Digest {
        let mut bytes = [0u8; 32];
        bytes[24..].copy_from_slice(&n.to_be_bytes());
        Digest::from(bytes)
    }

    fn build(weights: &[u64]) -> Accumulator {
        let mut acc = Accumulator::new();
        for (i, w) in weights.iter().enumerate() {
            acc.append(digest(i as u64), Weight::from(*w));
        }
        acc
    }

    #[test]
    fn test_mmr_size_and_peaks() {
        assert_eq!(mmr_size(0), 0);
        assert_eq!(mmr_size(1), 1);
        assert_eq!(mmr_size(2), 3);
        assert_eq!(mmr_size(3), 4);
        assert_eq!(mmr_size(4), 7);
        assert_eq!(mmr_size(7), 11);
        assert_eq!(peak_positions(7), vec![6, 9, 10]);
        assert_eq!(peak_positions(8), vec![14]);
        assert!(peak_positions(0).is_empty());
        assert_eq!(arena_len(7), 13);
        assert_eq!(arena_len(8), 15);
    }

    #[test]
    fn test_checked_arena_len() {
        for n in 0..300u64 {
            assert_eq!(checked_arena_len(n), Some(arena_len(n)));
        }
        assert_eq!(checked_arena_len(u64::MAX / 2 + 1), None);
        assert_eq!(checked_arena_len(u64::MAX), None);
    }

    #[test]
    fn test_integrity_rejects_oversized_leaf_count() {
        let empty = Accumulator::from_parts(u64::MAX, Vec::new());
        assert_eq!(
            empty.check_integrity(),
            Err(IntegrityError::LengthMismatch {
                leaf_count: u64::MAX,
                expected: u64::MAX,
                got: 0,
            })
        );
    }

    #[test]
    fn test_left_leaf_count() {
        assert_eq!(left_leaf_count(2), 1);
        assert_eq!(left_leaf_count(3), 2);
        assert_eq!(left_leaf_count(5), 4);
        assert_eq!(left_leaf_count(8), 4);
        assert_eq!(left_leaf_count(9), 8);
    }

    #[test]
    fn test_empty_has_no_root() {
        let mut acc = Accumulator::new();
        assert!(acc.root().is_none());
        assert!(acc.rewind().is_none());
        assert!(acc.check_integrity().is_ok());
    }

    #[test]
    fn test_single_leaf_root_is_leaf() {
        let acc = build(&[42]);
        let root = acc.root().unwrap();
        assert_eq!(root.digest, digest(0));
        assert_eq!(root.weight, Weight::from(42u32));
        assert!(!acc.has_children(root));
    }

    #[test]
    fn test_root_shape_three_leaves() {
        let acc = build(&[1, 2, 3]);
        let root = acc.root().unwrap();
        let pair = hash_children(&digest(0), &digest(1));
        assert_eq!(root.digest, hash_children(&pair, &digest(2)));
        assert_eq!(root.weight, Weight::from(6u32));
        assert_eq!(root.leaf_count, 3);

        let (left, right) = acc.get_children(root).unwrap();
        assert_eq!(left.leaf_count, 2);
        assert_eq!(right.digest, digest(2));
    }

    #[test]
    fn test_root_shape_seven_leaves() {
        let acc = build(&[1; 7]);
        let root = acc.root().unwrap();
        let (left, right) = acc.get_children(root).unwrap();
        assert_eq!((left.leaf_count, left.index), (4, 6));
        assert_eq!(right.leaf_count, 3);
        let (rl, rr) = acc.get_children(right).unwrap();
        assert_eq!((rl.leaf_count, rl.index), (2, 9));
        assert_eq!((rr.leaf_count, rr.index), (1, 10));
    }

    #[test]
    fn test_eight_leaves_then_rewind_three() {
        let mut acc = build(&[1; 8]);
        assert_eq!(acc.root().unwrap().weight, Weight::from(8u32));

        for _ in 0..3 {
            assert!(acc.rewind().is_some());
        }
        assert_eq!(acc.leaf_count(), 5);
        let fresh = build(&[1; 5]);
        assert_eq!(acc.root(), fresh.root());
        assert_eq!(acc, fresh);
    }

    #[test]
    fn test_rewind_returns_last_leaf() {
        let mut acc = build(&[5, 6, 7]);
        let removed = acc.rewind().unwrap();
        assert_eq!(removed.digest, digest(2));
        assert_eq!(removed.weight, Weight::from(7u32));
        assert_eq!(acc, build(&[5, 6]));
    }

    #[test]
    fn test_append_rewind_inverse() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut acc = Accumulator::new();
        for i in 0..300u64 {
            let before = acc.clone();
            acc.append(digest(10_000 + i), Weight::from(rng.gen::<u64>()));
            let mut rewound = acc.clone();
            rewound.rewind();
            assert_eq!(rewound, before, "inverse law broken at {}", i);
        }
    }

    #[test]
    fn test_merge_invariant_holds_after_random_appends() {
        let mut rng = StdRng::seed_from_u64(99);
        let mut acc = Accumulator::new();
        for i in 0..257u64 {
            acc.append(digest(i), Weight::from(rng.gen::<u64>()) << 70u32);
            acc.check_integrity().unwrap();
        }
        let total: Weight = (0..257)
            .map(|i| acc.leaf(i).unwrap().weight.clone())
            .sum();
        assert_eq!(acc.root().unwrap().weight, total);
        assert_eq!(acc.root().unwrap().leaf_count, 257);
    }

    #[test]
    fn test_leaf_lookup() {
        let acc = build(&[1, 2, 3, 4, 5]);
        for i in 0..5 {
            let leaf = acc.leaf(i).unwrap();
            assert_eq!(leaf.digest, digest(i));
            assert!(leaf.is_leaf());
        }
        assert!(acc.leaf(5).is_none());
    }

    #[test]
    fn test_integrity_detects_tampering() {
        let acc = build(&[1, 2, 3, 4, 5, 6]);
        let mut nodes: Vec<Node> = acc.arena().iter().cloned().collect();
        nodes[1].weight = Weight::from(100u32);
        let tampered = Accumulator::from_parts(6, nodes);
        assert!(matches!(
            tampered.check_integrity(),
            Err(IntegrityError::MergeMismatch { .. })
        ));

        let short = Accumulator::from_parts(7, acc.arena().iter().cloned().collect());
        assert!(matches!(
            short.check_integrity(),
            Err(IntegrityError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_determinism_with_interleaved_copies() {
        let shared = Arc::new(Mmr::new());
        let mut reference = Accumulator::new();
        let mut snapshots = Vec::new();
        for i in 0..64u64 {
            shared.append(digest(i), Weight::from(i * 3 + 1));
            reference.append(digest(i), Weight::from(i * 3 + 1));
            if i % 5 == 0 {
                snapshots.push(shared.copy());
            }
        }
        assert_eq!(shared.root(), reference.root().cloned());
        assert_eq!(shared.leaf_count(), 64);
        // Snapshots are independent of later appends.
        assert_eq!(snapshots[0].leaf_count(), 1);
    }

    #[test]
    fn test_shared_mmr_concurrent_readers() {
        let shared = Arc::new(Mmr::new());
        let writer = {
            let shared = Arc::clone(&shared);
            std::thread::spawn(move || {
                for i in 0..200u64 {
                    shared.append(digest(i), Weight::from(1u32));
                }
            })
        };
        let reader = {
            let shared = Arc::clone(&shared);
            std::thread::spawn(move || {
                for _ in 0..50 {
                    let snapshot = shared.copy();
                    snapshot.check_integrity().unwrap();
                }
            })
        };
        writer.join().unwrap();
        reader.join().unwrap();
        assert_eq!(shared.root().unwrap().weight, Weight::from(200u32));
    }

    #[test]
    fn test_shared_navigation() {
        let shared = Mmr::from_accumulator(build(&[1, 1, 1, 1]));
        let root = shared.root().unwrap();
        let (left, right) = shared.get_children(root.index).unwrap();
        assert_eq!(left.index, 2);
        assert_eq!(right.index, 5);
        assert!(shared.get_children(0).is_none());
        assert_eq!(shared.get_node(3).map(|n| n.digest), Some(digest(2)));
        assert_eq!(shared.rewind().map(|n| n.digest), Some(digest(3)));
    }
}
