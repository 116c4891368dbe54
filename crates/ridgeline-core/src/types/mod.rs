pub mod proof;

pub use proof::*;

use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};
use tiny_keccak::{Hasher, Keccak};

/// A 32-byte keccak digest. Leaf digests are block hashes supplied by the
/// header store; internal digests are `keccak256(left ‖ right)`.
pub type Digest = alloy_primitives::B256;

/// Cumulative chain difficulty. Arbitrary precision because real chain
/// difficulties overflow machine integers once summed.
pub type Weight = BigUint;

/// Number of bits of precision used when a unit-interval fraction is turned
/// into a share of a weight. Matches the mantissa width of an `f64`.
pub const FRACTION_BITS: u32 = 53;

/// Compute keccak256 hash of data.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; 32];
    hasher.update(data);
    hasher.finalize(&mut output);
    output
}

/// Digest of an internal node: `keccak256(left ‖ right)`.
pub fn hash_children(left: &Digest, right: &Digest) -> Digest {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; 32];
    hasher.update(left.as_slice());
    hasher.update(right.as_slice());
    hasher.finalize(&mut output);
    Digest::from(output)
}

/// `num / den` as an `f64`.
///
/// Both operands are shifted down to their top 64 bits first so the division
/// stays finite for weights far beyond `f64::MAX`.
pub fn weight_ratio(num: &Weight, den: &Weight) -> f64 {
    if den.is_zero() {
        return 0.0;
    }
    let shift = num.bits().max(den.bits()).saturating_sub(64);
    let n = (num >> shift).to_u64().unwrap_or(u64::MAX);
    let d = (den >> shift).to_u64().unwrap_or(u64::MAX);
    if d == 0 {
        return f64::INFINITY;
    }
    n as f64 / d as f64
}

/// `floor(total × fraction)` with `fraction` clamped into `[0, 1)`.
///
/// The fraction is quantized to [`FRACTION_BITS`] bits so prover and verifier
/// land on the same integer target for the same draw.
pub fn scale_weight(total: &Weight, fraction: f64) -> Weight {
    let max = (1u64 << FRACTION_BITS) - 1;
    let scaled = (fraction.clamp(0.0, 1.0) * (1u64 << FRACTION_BITS) as f64) as u64;
    (total * scaled.min(max)) >> FRACTION_BITS
}

/// Minimal big-endian encoding of a weight; zero is the empty string.
pub fn weight_to_be_bytes(weight: &Weight) -> Vec<u8> {
    if weight.is_zero() {
        Vec::new()
    } else {
        weight.to_bytes_be()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_keccak256_empty() {
        assert_eq!(
            keccak256(&[]),
            hex!("c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470")
        );
    }

    #[test]
    fn test_hash_children_is_keccak_of_concatenation() {
        let left = Digest::from([0x11; 32]);
        let right = Digest::from([0x22; 32]);
        let mut joined = [0u8; 64];
        joined[..32].copy_from_slice(left.as_slice());
        joined[32..].copy_from_slice(right.as_slice());
        assert_eq!(hash_children(&left, &right), Digest::from(keccak256(&joined)));
        assert_ne!(hash_children(&left, &right), hash_children(&right, &left));
    }

    #[test]
    fn test_weight_ratio_small_values() {
        let ratio = weight_ratio(&Weight::from(1u32), &Weight::from(4u32));
        assert!((ratio - 0.25).abs() < 1e-12);
        assert_eq!(weight_ratio(&Weight::from(7u32), &Weight::from(0u32)), 0.0);
    }

    #[test]
    fn test_weight_ratio_huge_values() {
        let den = Weight::from(1u32) << 4000u32;
        let num = &den >> 1u32;
        let ratio = weight_ratio(&num, &den);
        assert!((ratio - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_scale_weight() {
        let total = Weight::from(1000u32);
        assert_eq!(scale_weight(&total, 0.0), Weight::from(0u32));
        assert_eq!(scale_weight(&total, 0.5), Weight::from(500u32));
        // 1.0 is clamped just below the total
        assert_eq!(scale_weight(&total, 1.0), Weight::from(999u32));
        assert_eq!(scale_weight(&total, f64::NAN), Weight::from(0u32));
    }

    #[test]
    fn test_weight_to_be_bytes() {
        assert!(weight_to_be_bytes(&Weight::from(0u32)).is_empty());
        assert_eq!(weight_to_be_bytes(&Weight::from(0x0102u32)), vec![0x01, 0x02]);
    }
}
