//! # Ridgeline Core
//!
//! Weighted Merkle Mountain Range accumulator over block headers, with
//! multi-leaf inclusion proofs and a FlyClient-style proof of cumulative
//! chain weight.
//!
//! This crate contains **no networking code** and **no storage backend**.
//! A header relay appends one leaf per block and hands proofs to light
//! clients, which check them against nothing but the claimed root.
//!
//! ## Trust Model
//!
//! - **Inclusion proofs** (`proof` module): a proof commits to a set of
//!   leaves under a root digest. The verifier recomputes every digest from
//!   the revealed leaves and sibling summaries.
//!
//! - **Proof of weight** (`sampling` module): the light client recomputes
//!   the sample draws from the root digest alone and checks each sampled
//!   leaf against the cumulative weights the proof *claims*. Digests commit
//!   to header hashes but not to weights, so the draw check binds a sample
//!   to the prover's claimed weight distribution; only the total is pinned
//!   by the root weight. Soundness is `2^-λ` for an adversary below the
//!   configured weight fraction, given honest per-leaf weights.
//!
//! ## Usage
//!
//! ```ignore
//! use ridgeline_core::{Mmr, WeightSampler};
//!
//! let mmr = Mmr::new();
//! mmr.append(header_hash, difficulty);
//! let sampler = WeightSampler::default();
//! let proof = sampler.create_proof(&mmr.copy(), &pending_weight)?.proof;
//! sampler.verify(&proof, &pending_weight)?;
//! ```

pub mod codec;
pub mod mmr;
pub mod proof;
pub mod sampling;
pub mod store;
pub mod types;

// Re-export commonly used types for convenience
pub use codec::{decode_proof, decode_snapshot, encode_proof, encode_snapshot, CodecError};
pub use mmr::{Accumulator, IntegrityError, Mmr, Node};
pub use proof::{
    build_proof, build_proof_info, verify_proof, verify_proof_detailed, ProofError, VerifyError,
};
pub use sampling::{
    FlyClientPolicy, SampledProof, SamplingConfig, SamplingError, SamplingPolicy, WeightSampler,
};
pub use store::{LruSnapshotCache, NoopSnapshotCache, SnapshotCache, SnapshotStore, StoreError};
pub use types::{Digest, ProofBlock, ProofElem, ProofInfo, Weight};
