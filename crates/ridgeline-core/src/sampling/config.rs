use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Target soundness: a cheating prover is accepted with probability about `2^-λ`.
pub const DEFAULT_SECURITY_BITS: f64 = 50.0;

/// Fraction of the total weight an adversary is assumed to control.
pub const DEFAULT_ADVERSARY_FRACTION: f64 = 0.5;

/// Spacing of the checkpoint leaves included in every weight proof.
pub const CHECKPOINT_INTERVAL: u64 = 30_000;

/// Maximum number of checkpoint leaves, counted back from the tip.
pub const MAX_CHECKPOINTS: usize = 10;

/// Upper bound on sampled leaves; anything above is treated as a
/// misconfiguration or a hostile request rather than computed.
pub const DEFAULT_MAX_SAMPLES: u64 = 100_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Security parameter must be a positive finite number of bits, got {0}")]
    InvalidSecurityBits(f64),

    #[error("Adversary fraction must lie strictly between 0 and 1, got {0}")]
    InvalidAdversaryFraction(f64),

    #[error("Checkpoint interval must be non-zero")]
    ZeroCheckpointInterval,

    #[error("Sample budget must be non-zero")]
    ZeroSampleBudget,

    #[error("Invalid sampling config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Parameters of the proof-of-weight sampling protocol. Prover and verifier
/// must agree on every field, otherwise sample counts diverge.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// λ: security level in bits.
    pub security_bits: f64,
    /// c: shape constant of the sampling distribution.
    pub adversary_fraction: f64,
    pub checkpoint_interval: u64,
    pub max_checkpoints: usize,
    pub max_samples: u64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            security_bits: DEFAULT_SECURITY_BITS,
            adversary_fraction: DEFAULT_ADVERSARY_FRACTION,
            checkpoint_interval: CHECKPOINT_INTERVAL,
            max_checkpoints: MAX_CHECKPOINTS,
            max_samples: DEFAULT_MAX_SAMPLES,
        }
    }
}

impl SamplingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.security_bits.is_finite() || self.security_bits <= 0.0 {
            return Err(ConfigError::InvalidSecurityBits(self.security_bits));
        }
        if !(self.adversary_fraction > 0.0 && self.adversary_fraction < 1.0) {
            return Err(ConfigError::InvalidAdversaryFraction(self.adversary_fraction));
        }
        if self.checkpoint_interval == 0 {
            return Err(ConfigError::ZeroCheckpointInterval);
        }
        if self.max_samples == 0 {
            return Err(ConfigError::ZeroSampleBudget);
        }
        Ok(())
    }

    /// Parse a JSON config; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}
