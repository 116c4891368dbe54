use crate::types::{weight_ratio, Digest, Weight, FRACTION_BITS};

use super::config::SamplingConfig;

/// The statistical half of the proof-of-weight protocol: how many leaves to
/// sample, and where in the cumulative weight each draw lands.
///
/// Kept separate from the sampler so it can be validated against reference
/// values on its own, and swapped without touching proof construction.
pub trait SamplingPolicy: Send + Sync {
    /// Minimum number of samples, before rounding, so that a prover claiming
    /// `root_weight` with a tail of weight `delta` is caught with the
    /// configured soundness.
    fn soundness_bound(&self, delta: &Weight, root_weight: &Weight, leaf_count: u64) -> f64;

    /// Map a sample seed to a uniform fraction in `[0, 1)`.
    fn unit_fraction(&self, seed: &Digest) -> f64;

    /// Map a uniform fraction to the share of `root_weight` the draw targets,
    /// also in `[0, 1)`.
    fn weight_fraction(&self, unit: f64, delta: &Weight, root_weight: &Weight) -> f64;
}

/// FlyClient-style policy.
///
/// With `δ = delta / (root_weight + delta)`, each sample lands at weight share
/// `(1 - δ^y) / (1 - δ)` for uniform `y`, concentrating draws towards the
/// tip, and `λ / -log2(1 - ln c / ln δ)` samples are required. `δ` is floored
/// at `2^-λ` so a zero delta still yields a finite sample count.
#[derive(Clone, Debug, PartialEq)]
pub struct FlyClientPolicy {
    security_bits: f64,
    adversary_fraction: f64,
}

impl FlyClientPolicy {
    pub fn new(security_bits: f64, adversary_fraction: f64) -> Self {
        Self {
            security_bits,
            adversary_fraction,
        }
    }

    pub fn from_config(config: &SamplingConfig) -> Self {
        Self::new(config.security_bits, config.adversary_fraction)
    }

    /// δ: share of the extended weight `root_weight + delta` sitting in the
    /// unsampled tail.
    pub fn tail_fraction(&self, delta: &Weight, root_weight: &Weight) -> f64 {
        let extended = root_weight + delta;
        let floor = (-self.security_bits).exp2();
        weight_ratio(delta, &extended).max(floor).min(1.0)
    }
}

impl SamplingPolicy for FlyClientPolicy {
    fn soundness_bound(&self, delta: &Weight, root_weight: &Weight, leaf_count: u64) -> f64 {
        if leaf_count == 0 {
            return 0.0;
        }
        let tail = self.tail_fraction(delta, root_weight);
        if tail >= self.adversary_fraction {
            return 0.0;
        }
        let miss = 1.0 - self.adversary_fraction.ln() / tail.ln();
        self.security_bits / -miss.log2()
    }

    fn unit_fraction(&self, seed: &Digest) -> f64 {
        let mut head = [0u8; 8];
        head.copy_from_slice(&seed[..8]);
        let bits = u64::from_be_bytes(head) >> (u64::BITS - FRACTION_BITS);
        bits as f64 / (1u64 << FRACTION_BITS) as f64
    }

    fn weight_fraction(&self, unit: f64, delta: &Weight, root_weight: &Weight) -> f64 {
        let tail = self.tail_fraction(delta, root_weight);
        let span = 1.0 - tail;
        if span <= f64::EPSILON {
            return unit;
        }
        ((1.0 - tail.powf(unit)) / span).clamp(0.0, 1.0)
    }
}
