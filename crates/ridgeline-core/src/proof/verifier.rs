use std::collections::BTreeMap;

use thiserror::Error;
use tracing::warn;

use crate::mmr::left_leaf_count;
use crate::types::{hash_children, Digest, ProofBlock, ProofElem, ProofInfo, Weight};

/// Reasons a proof is rejected. Every variant is a plain "no": nothing in
/// here is recoverable by retrying the same proof.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VerifyError {
    #[error("Proof has no trailing root element")]
    MissingRoot,

    #[error("Root element disagrees with the proof header")]
    RootMismatch,

    #[error("Malformed proof: {reason}")]
    Malformed { reason: &'static str },

    #[error("Proof reveals no leaves")]
    NoLeaves,

    #[error("Recomputed root digest {computed} does not match claimed root {expected}")]
    DigestMismatch { computed: String, expected: String },

    #[error("Recomputed root weight {computed} does not match claimed weight {expected}")]
    WeightMismatch { computed: Weight, expected: Weight },

    #[error("Checked leaf {index} is not revealed by the proof")]
    UnknownBlock { index: u64 },

    #[error("Leaf {index} does not cover the weight targeted by its draw")]
    DrawMismatch { index: u64 },
}

/// Verify `proof` and check every block in `blocks` against the leaves it
/// reveals. Returns `false` on any malformed or mismatching input.
pub fn verify_proof(proof: &ProofInfo, blocks: &[ProofBlock]) -> bool {
    match verify_proof_detailed(proof, blocks) {
        Ok(()) => true,
        Err(err) => {
            warn!(%err, leaf_count = proof.leaf_count, "mmr proof rejected");
            false
        }
    }
}

/// Same as [`verify_proof`] but reports why a proof was rejected.
///
/// The shape of the tree is a function of the leaf count alone, so the
/// element sequence is replayed depth-first against that shape. This pins
/// every `Leaf` element to its global index and to the cumulative weight on
/// its left, which is what a sampled block is checked against.
pub fn verify_proof_detailed(
    proof: &ProofInfo,
    blocks: &[ProofBlock],
) -> Result<(), VerifyError> {
    let (last, body) = proof.elems.split_last().ok_or(VerifyError::MissingRoot)?;
    let ProofElem::Root {
        digest,
        weight,
        leaf_count,
    } = last
    else {
        return Err(VerifyError::MissingRoot);
    };
    if *digest != proof.root_digest
        || *weight != proof.root_weight
        || *leaf_count != proof.leaf_count
    {
        return Err(VerifyError::RootMismatch);
    }
    if *leaf_count == 0 {
        return Err(VerifyError::Malformed {
            reason: "root covers no leaves",
        });
    }
    if body.iter().any(|e| matches!(e, ProofElem::Root { .. })) {
        return Err(VerifyError::Malformed {
            reason: "root element is not last",
        });
    }

    let mut replay = Replay::new(body);
    let computed = replay.subtree(0, *leaf_count)?;
    if replay.pos != body.len() {
        return Err(VerifyError::Malformed {
            reason: "unconsumed elements after the root subtree",
        });
    }
    if replay.leaves.is_empty() {
        return Err(VerifyError::NoLeaves);
    }
    if computed.digest != proof.root_digest {
        return Err(VerifyError::DigestMismatch {
            computed: hex::encode(computed.digest),
            expected: hex::encode(proof.root_digest),
        });
    }
    if computed.weight != proof.root_weight {
        return Err(VerifyError::WeightMismatch {
            computed: computed.weight,
            expected: proof.root_weight.clone(),
        });
    }

    let last_index = *leaf_count - 1;
    for block in blocks {
        let leaf = replay
            .leaves
            .get(&block.leaf_index)
            .ok_or(VerifyError::UnknownBlock {
                index: block.leaf_index,
            })?;
        if let Some(target) = block.target_weight(&proof.root_weight) {
            // Weighted descent picks the leaf whose interval holds the target;
            // targets at or past the total fall through to the last leaf.
            let end = &leaf.before + &leaf.weight;
            let covers = target >= leaf.before && (target < end || block.leaf_index == last_index);
            if !covers {
                return Err(VerifyError::DrawMismatch {
                    index: block.leaf_index,
                });
            }
        }
    }
    Ok(())
}

struct Summary {
    digest: Digest,
    weight: Weight,
}

struct RevealedLeaf {
    before: Weight,
    weight: Weight,
}

struct Replay<'a> {
    elems: &'a [ProofElem],
    pos: usize,
    /// Weight of everything to the left of the next element.
    before: Weight,
    leaves: BTreeMap<u64, RevealedLeaf>,
}

impl<'a> Replay<'a> {
    fn new(elems: &'a [ProofElem]) -> Self {
        Self {
            elems,
            pos: 0,
            before: Weight::default(),
            leaves: BTreeMap::new(),
        }
    }

    /// Consume the next element if it is a sibling on the given side.
    fn take_sibling(&mut self, right: bool) -> Option<Summary> {
        match self.elems.get(self.pos) {
            Some(ProofElem::Sibling {
                digest,
                weight,
                is_right_child,
            }) if *is_right_child == right => {
                self.pos += 1;
                self.before += weight;
                Some(Summary {
                    digest: *digest,
                    weight: weight.clone(),
                })
            }
            _ => None,
        }
    }

    /// Replay the subtree covering leaves `[start, start + count)`.
    fn subtree(&mut self, start: u64, count: u64) -> Result<Summary, VerifyError> {
        if count == 1 {
            let Some(ProofElem::Leaf { digest, weight }) = self.elems.get(self.pos) else {
                return Err(VerifyError::Malformed {
                    reason: "expected a leaf element",
                });
            };
            self.pos += 1;
            self.leaves.insert(
                start,
                RevealedLeaf {
                    before: self.before.clone(),
                    weight: weight.clone(),
                },
            );
            self.before += weight;
            return Ok(Summary {
                digest: *digest,
                weight: weight.clone(),
            });
        }

        let split = left_leaf_count(count);
        let (left, left_opaque) = match self.take_sibling(false) {
            Some(summary) => (summary, true),
            None => (self.subtree(start, split)?, false),
        };
        let (right, right_opaque) = match self.take_sibling(true) {
            Some(summary) => (summary, true),
            None => (self.subtree(start + split, count - split)?, false),
        };
        if left_opaque && right_opaque {
            return Err(VerifyError::Malformed {
                reason: "both children of a node are opaque siblings",
            });
        }
        Ok(Summary {
            digest: hash_children(&left.digest, &right.digest),
            weight: left.weight + right.weight,
        })
    }
}
