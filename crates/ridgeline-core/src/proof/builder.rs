use std::collections::BTreeSet;

use thiserror::Error;

use crate::mmr::{Accumulator, Node};
use crate::types::{ProofElem, ProofInfo};

/// Errors while assembling a proof on the prover side.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProofError {
    #[error("Cannot build a proof over an empty accumulator")]
    EmptyAccumulator,

    #[error("No target leaves requested")]
    NoTargets,

    #[error("Leaf index {index} is out of range for an accumulator of {leaf_count} leaves")]
    LeafOutOfRange { index: u64, leaf_count: u64 },
}

/// Build the minimal depth-first element sequence proving every leaf in
/// `targets` against the current bagged root.
///
/// Subtrees without targets are summarized as a single `Sibling`; the
/// `Root` element is always appended last. With a single-leaf accumulator
/// the proof is just `[Leaf, Root]`.
pub fn build_proof(
    accumulator: &Accumulator,
    targets: &BTreeSet<u64>,
) -> Result<Vec<ProofElem>, ProofError> {
    let root = accumulator.root().ok_or(ProofError::EmptyAccumulator)?;
    let last = *targets.iter().next_back().ok_or(ProofError::NoTargets)?;
    if last >= accumulator.leaf_count() {
        return Err(ProofError::LeafOutOfRange {
            index: last,
            leaf_count: accumulator.leaf_count(),
        });
    }

    let targets: Vec<u64> = targets.iter().copied().collect();
    let mut elems = Vec::new();
    descend(accumulator, root, 0, &targets, &mut elems);
    elems.push(ProofElem::Root {
        digest: root.digest,
        weight: root.weight.clone(),
        leaf_count: root.leaf_count,
    });
    Ok(elems)
}

/// [`build_proof`] wrapped into a [`ProofInfo`] carrying `checked` as the
/// list of sampled indices.
pub fn build_proof_info(
    accumulator: &Accumulator,
    targets: &BTreeSet<u64>,
    checked: Vec<u64>,
) -> Result<ProofInfo, ProofError> {
    let elems = build_proof(accumulator, targets)?;
    let root = accumulator.root().ok_or(ProofError::EmptyAccumulator)?;
    Ok(ProofInfo {
        root_digest: root.digest,
        root_weight: root.weight.clone(),
        leaf_count: root.leaf_count,
        elems,
        checked,
    })
}

/// `targets` is sorted, non-empty, and lies within `[start, start + node.leaf_count)`.
fn descend(
    accumulator: &Accumulator,
    node: &Node,
    start: u64,
    targets: &[u64],
    out: &mut Vec<ProofElem>,
) {
    let Some((left, right)) = accumulator.get_children(node) else {
        debug_assert_eq!(targets, &[start]);
        out.push(ProofElem::Leaf {
            digest: node.digest,
            weight: node.weight.clone(),
        });
        return;
    };

    let boundary = start + left.leaf_count;
    let split = targets.partition_point(|&t| t < boundary);
    let (left_targets, right_targets) = targets.split_at(split);

    if left_targets.is_empty() {
        out.push(sibling(left, false));
    } else {
        descend(accumulator, left, start, left_targets, out);
    }
    if right_targets.is_empty() {
        out.push(sibling(right, true));
    } else {
        descend(accumulator, right, boundary, right_targets, out);
    }
}

fn sibling(node: &Node, is_right_child: bool) -> ProofElem {
    ProofElem::Sibling {
        digest: node.digest,
        weight: node.weight.clone(),
        is_right_child,
    }
}
