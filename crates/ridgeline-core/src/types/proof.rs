use serde::{Deserialize, Serialize};

use super::{scale_weight, Digest, Weight};

/// One element of a multi-leaf MMR proof, in depth-first emission order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProofElem {
    /// A fully revealed leaf. The verifier checks it against externally known
    /// header data.
    Leaf { digest: Digest, weight: Weight },
    /// Summary of a subtree that holds no requested leaf. Only used to
    /// recompute ancestor digests and weights.
    Sibling {
        digest: Digest,
        weight: Weight,
        is_right_child: bool,
    },
    /// The claim being proven. Exactly one per proof, always last.
    Root {
        digest: Digest,
        weight: Weight,
        leaf_count: u64,
    },
}

impl ProofElem {
    pub fn digest(&self) -> &Digest {
        match self {
            ProofElem::Leaf { digest, .. }
            | ProofElem::Sibling { digest, .. }
            | ProofElem::Root { digest, .. } => digest,
        }
    }

    pub fn weight(&self) -> &Weight {
        match self {
            ProofElem::Leaf { weight, .. }
            | ProofElem::Sibling { weight, .. }
            | ProofElem::Root { weight, .. } => weight,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, ProofElem::Leaf { .. })
    }
}

/// A proof that a set of leaves is committed to by an accumulator root of a
/// given weight. Immutable once built; travels to the light client as-is.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofInfo {
    /// Digest of the bagged root being proven.
    pub root_digest: Digest,
    /// Total weight of all leaves under the root.
    pub root_weight: Weight,
    /// Number of leaves in the accumulator when the proof was built.
    pub leaf_count: u64,
    /// Depth-first, left-before-right; the `Root` element is last.
    pub elems: Vec<ProofElem>,
    /// Sampled leaf indices, in the order the sampler drew them.
    /// Checkpoint leaves are revealed in `elems` but not listed here.
    pub checked: Vec<u64>,
}

impl ProofInfo {
    /// Number of `Leaf` elements in the proof.
    pub fn revealed_leaves(&self) -> usize {
        self.elems.iter().filter(|e| e.is_leaf()).count()
    }

    /// Serialize to JSON for diagnostics and RPC responses.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// A leaf the verifier expects to find in a proof, together with the
/// pseudo-random draw that selected it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProofBlock {
    /// Global index of the leaf in the accumulator.
    pub leaf_index: u64,
    /// Fraction of the root weight the draw targeted. `None` for a plain
    /// inclusion target that was not drawn by the sampler.
    pub aggregate_weight_fraction: Option<f64>,
}

impl ProofBlock {
    /// A sampled leaf whose position must agree with `fraction`.
    pub fn sampled(leaf_index: u64, fraction: f64) -> Self {
        Self {
            leaf_index,
            aggregate_weight_fraction: Some(fraction),
        }
    }

    /// A leaf that only has to be present in the proof.
    pub fn inclusion(leaf_index: u64) -> Self {
        Self {
            leaf_index,
            aggregate_weight_fraction: None,
        }
    }

    /// Absolute cumulative weight the draw targeted, if this block was drawn.
    pub fn target_weight(&self, root_weight: &Weight) -> Option<Weight> {
        self.aggregate_weight_fraction
            .map(|fraction| scale_weight(root_weight, fraction))
    }
}
