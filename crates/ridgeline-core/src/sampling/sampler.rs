use std::collections::BTreeSet;

use thiserror::Error;
use tracing::debug;

use super::config::{ConfigError, SamplingConfig};
use super::policy::{FlyClientPolicy, SamplingPolicy};
use crate::mmr::Accumulator;
use crate::proof::{build_proof_info, verify_proof_detailed, ProofError, VerifyError};
use crate::types::{keccak256, scale_weight, Digest, ProofBlock, ProofInfo, Weight};

/// Errors of the proof-of-weight protocol. A count mismatch is kept apart
/// from digest failures: it means protocol-version skew or a prover that
/// chose its own sample set.
#[derive(Debug, Error)]
pub enum SamplingError {
    #[error("Accumulator is empty; there is no weight to prove")]
    EmptyAccumulator,

    #[error("Proof lists {got} sampled leaves but {expected} are required")]
    SampleCountMismatch { expected: u64, got: usize },

    #[error("Sampling requires {required} leaves, above the budget of {max}")]
    SampleBudgetExceeded { required: f64, max: u64 },

    #[error("Checkpoint leaf {index} is not revealed by the proof")]
    MissingCheckpoint { index: u64 },

    #[error(transparent)]
    Proof(#[from] ProofError),

    #[error(transparent)]
    Verify(#[from] VerifyError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Output of [`WeightSampler::create_proof`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SampledProof {
    pub proof: ProofInfo,
    /// Drawn leaf indices, one per sample, in draw order (duplicates kept).
    pub sampled: Vec<u64>,
    /// Checkpoint leaves revealed alongside the samples, newest first.
    pub checkpoints: Vec<u64>,
}

/// Seed of the `index`-th draw: `keccak256(root_digest ‖ index_be)`.
pub fn sample_seed(root_digest: &Digest, index: u64) -> Digest {
    let mut preimage = [0u8; 40];
    preimage[..32].copy_from_slice(root_digest.as_slice());
    preimage[32..].copy_from_slice(&index.to_be_bytes());
    Digest::from(keccak256(&preimage))
}

/// Weighted binary search: the leaf whose cumulative-weight interval holds
/// `target`. Targets at or beyond the total land on the last leaf.
pub fn locate_leaf(accumulator: &Accumulator, target: &Weight) -> Option<u64> {
    let mut node = accumulator.root()?;
    let mut start = 0u64;
    let mut remaining = target.clone();
    while let Some((left, right)) = accumulator.get_children(node) {
        if remaining < left.weight {
            node = left;
        } else {
            remaining -= &left.weight;
            start += left.leaf_count;
            node = right;
        }
    }
    Some(start)
}

/// Drives proof-of-weight creation and checking on top of the proof builder
/// and verifier.
#[derive(Clone, Debug)]
pub struct WeightSampler<P = FlyClientPolicy> {
    config: SamplingConfig,
    policy: P,
}

impl WeightSampler<FlyClientPolicy> {
    pub fn new(config: SamplingConfig) -> Result<Self, ConfigError> {
        let policy = FlyClientPolicy::from_config(&config);
        Self::with_policy(config, policy)
    }
}

impl Default for WeightSampler<FlyClientPolicy> {
    fn default() -> Self {
        let config = SamplingConfig::default();
        Self {
            policy: FlyClientPolicy::from_config(&config),
            config,
        }
    }
}

impl<P: SamplingPolicy> WeightSampler<P> {
    pub fn with_policy(config: SamplingConfig, policy: P) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config, policy })
    }

    pub fn config(&self) -> &SamplingConfig {
        &self.config
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// `ceil(bound) + 1` samples, capped by the configured budget.
    pub fn required_samples(
        &self,
        delta: &Weight,
        root_weight: &Weight,
        leaf_count: u64,
    ) -> Result<u64, SamplingError> {
        let bound = self.policy.soundness_bound(delta, root_weight, leaf_count);
        let max = self.config.max_samples;
        if !bound.is_finite() || bound < 0.0 || bound.ceil() >= max as f64 {
            return Err(SamplingError::SampleBudgetExceeded { required: bound, max });
        }
        let required = bound.ceil() as u64 + 1;
        debug!(bound, required, leaf_count, "required samples");
        Ok(required)
    }

    /// The deterministic weight fractions of the first `count` draws,
    /// sorted ascending.
    pub fn sample_fractions(
        &self,
        root_digest: &Digest,
        delta: &Weight,
        root_weight: &Weight,
        count: u64,
    ) -> Vec<f64> {
        let mut fractions: Vec<f64> = (0..count)
            .map(|i| {
                let unit = self.policy.unit_fraction(&sample_seed(root_digest, i));
                self.policy.weight_fraction(unit, delta, root_weight)
            })
            .collect();
        fractions.sort_by(f64::total_cmp);
        fractions
    }

    /// Multiples of the checkpoint interval counting back from the tip,
    /// newest first, at most `max_checkpoints` of them.
    pub fn checkpoint_indices(&self, leaf_count: u64) -> Vec<u64> {
        if leaf_count == 0 {
            return Vec::new();
        }
        let interval = self.config.checkpoint_interval;
        let newest = (leaf_count - 1) / interval * interval;
        std::iter::successors(Some(newest), |&index| index.checked_sub(interval))
            .take(self.config.max_checkpoints)
            .collect()
    }

    /// Build a proof that `accumulator` carries its root weight, given a
    /// claimed extension of weight `delta` on top of it.
    pub fn create_proof(
        &self,
        accumulator: &Accumulator,
        delta: &Weight,
    ) -> Result<SampledProof, SamplingError> {
        let root = accumulator.root().ok_or(SamplingError::EmptyAccumulator)?;
        let required = self.required_samples(delta, &root.weight, root.leaf_count)?;
        let fractions = self.sample_fractions(&root.digest, delta, &root.weight, required);

        let mut sampled = Vec::with_capacity(fractions.len());
        for fraction in &fractions {
            let target = scale_weight(&root.weight, *fraction);
            let index = locate_leaf(accumulator, &target).ok_or(SamplingError::EmptyAccumulator)?;
            sampled.push(index);
        }
        let checkpoints = self.checkpoint_indices(root.leaf_count);

        let targets: BTreeSet<u64> = sampled.iter().chain(checkpoints.iter()).copied().collect();
        let proof = build_proof_info(accumulator, &targets, sampled.clone())?;
        debug!(
            leaf_count = root.leaf_count,
            samples = sampled.len(),
            revealed = targets.len(),
            elems = proof.elems.len(),
            "created weight proof"
        );
        Ok(SampledProof {
            proof,
            sampled,
            checkpoints,
        })
    }

    /// Recompute the draws the prover was obliged to make and pair them with
    /// the indices it declared.
    pub fn verify_required_blocks(
        &self,
        proof: &ProofInfo,
        delta: &Weight,
    ) -> Result<Vec<ProofBlock>, SamplingError> {
        if proof.leaf_count == 0 {
            return Err(SamplingError::EmptyAccumulator);
        }
        let required = self.required_samples(delta, &proof.root_weight, proof.leaf_count)?;
        if proof.checked.len() as u64 != required {
            return Err(SamplingError::SampleCountMismatch {
                expected: required,
                got: proof.checked.len(),
            });
        }
        let fractions =
            self.sample_fractions(&proof.root_digest, delta, &proof.root_weight, required);
        Ok(proof
            .checked
            .iter()
            .zip(fractions)
            .map(|(&index, fraction)| ProofBlock::sampled(index, fraction))
            .collect())
    }

    /// Full light-client acceptance check: sample count, proof replay, draw
    /// consistency of every sampled leaf, and presence of the checkpoints.
    pub fn verify(&self, proof: &ProofInfo, delta: &Weight) -> Result<(), SamplingError> {
        let mut blocks = self.verify_required_blocks(proof, delta)?;
        let checkpoints = self.checkpoint_indices(proof.leaf_count);
        blocks.extend(checkpoints.iter().map(|&index| ProofBlock::inclusion(index)));

        match verify_proof_detailed(proof, &blocks) {
            Ok(()) => Ok(()),
            Err(VerifyError::UnknownBlock { index })
                if checkpoints.contains(&index) && !proof.checked.contains(&index) =>
            {
                Err(SamplingError::MissingCheckpoint { index })
            }
            Err(err) => Err(err.into()),
        }
    }
}
