use alloy_rlp::{BufMut, Decodable, Encodable};

use super::{
    decode_digest, decode_list_payload, decode_weight, encode_digest, encode_list_payload,
    encode_weight, expect_version, CodecError,
};
use crate::types::{ProofElem, ProofInfo};

pub const PROOF_CODEC_VERSION: u8 = 1;

const TAG_LEAF: u8 = 0;
const TAG_SIBLING: u8 = 1;
const TAG_ROOT: u8 = 2;

impl Encodable for ProofElem {
    fn encode(&self, out: &mut dyn BufMut) {
        let mut payload = Vec::with_capacity(72);
        match self {
            ProofElem::Leaf { digest, weight } => {
                TAG_LEAF.encode(&mut payload);
                encode_digest(digest, &mut payload);
                encode_weight(weight, &mut payload);
            }
            ProofElem::Sibling {
                digest,
                weight,
                is_right_child,
            } => {
                TAG_SIBLING.encode(&mut payload);
                encode_digest(digest, &mut payload);
                encode_weight(weight, &mut payload);
                is_right_child.encode(&mut payload);
            }
            ProofElem::Root {
                digest,
                weight,
                leaf_count,
            } => {
                TAG_ROOT.encode(&mut payload);
                encode_digest(digest, &mut payload);
                encode_weight(weight, &mut payload);
                leaf_count.encode(&mut payload);
            }
        }
        encode_list_payload(&payload, out);
    }
}

impl ProofElem {
    fn decode_rlp(buf: &mut &[u8]) -> Result<Self, CodecError> {
        let mut payload = decode_list_payload(buf)?;
        let tag = u8::decode(&mut payload)?;
        let digest = decode_digest(&mut payload)?;
        let weight = decode_weight(&mut payload)?;
        let elem = match tag {
            TAG_LEAF => ProofElem::Leaf { digest, weight },
            TAG_SIBLING => ProofElem::Sibling {
                digest,
                weight,
                is_right_child: bool::decode(&mut payload)?,
            },
            TAG_ROOT => ProofElem::Root {
                digest,
                weight,
                leaf_count: u64::decode(&mut payload)?,
            },
            other => return Err(CodecError::InvalidTag(other)),
        };
        if !payload.is_empty() {
            return Err(CodecError::TrailingBytes(payload.len()));
        }
        Ok(elem)
    }
}

impl Encodable for ProofInfo {
    fn encode(&self, out: &mut dyn BufMut) {
        let mut payload = Vec::new();
        PROOF_CODEC_VERSION.encode(&mut payload);
        encode_digest(&self.root_digest, &mut payload);
        encode_weight(&self.root_weight, &mut payload);
        self.leaf_count.encode(&mut payload);
        self.elems.encode(&mut payload);
        self.checked.encode(&mut payload);
        encode_list_payload(&payload, out);
    }
}

/// Canonical bytes of a proof, as sent to light clients.
pub fn encode_proof(proof: &ProofInfo) -> Vec<u8> {
    let mut out = Vec::new();
    proof.encode(&mut out);
    out
}

/// Parse a proof produced by [`encode_proof`]. The whole input must be
/// consumed.
pub fn decode_proof(bytes: &[u8]) -> Result<ProofInfo, CodecError> {
    let mut buf = bytes;
    let mut payload = decode_list_payload(&mut buf)?;
    if !buf.is_empty() {
        return Err(CodecError::TrailingBytes(buf.len()));
    }

    expect_version(&mut payload, PROOF_CODEC_VERSION)?;
    let root_digest = decode_digest(&mut payload)?;
    let root_weight = decode_weight(&mut payload)?;
    let leaf_count = u64::decode(&mut payload)?;

    let mut elems_payload = decode_list_payload(&mut payload)?;
    let mut elems = Vec::new();
    while !elems_payload.is_empty() {
        elems.push(ProofElem::decode_rlp(&mut elems_payload)?);
    }
    let checked = Vec::<u64>::decode(&mut payload)?;
    if !payload.is_empty() {
        return Err(CodecError::TrailingBytes(payload.len()));
    }

    Ok(ProofInfo {
        root_digest,
        root_weight,
        leaf_count,
        elems,
        checked,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mmr::Accumulator;
    use crate::proof::{build_proof_info, verify_proof};
    use crate::types::{Digest, ProofBlock, Weight};
    use hex_literal::hex;
    use std::collections::BTreeSet;

    fn sample_proof() -> ProofInfo {
        let mut acc = Accumulator::new();
        for i in 0..11u64 {
            let mut digest = [0u8; 32];
            digest[24..].copy_from_slice(&i.to_be_bytes());
            acc.append(Digest::from(digest), Weight::from(i * 1_000 + 1));
        }
        let targets: BTreeSet<u64> = [2, 7, 10].into_iter().collect();
        build_proof_info(&acc, &targets, vec![7, 2, 7]).unwrap()
    }

    #[test]
    fn test_leaf_layout() {
        let elem = ProofElem::Leaf {
            digest: Digest::from(hex!(
                "0101010101010101010101010101010101010101010101010101010101010101"
            )),
            weight: Weight::from(0x0102u32),
        };
        let mut out = Vec::new();
        elem.encode(&mut out);
        // list(tag 0, 32-byte string, 2-byte string)
        assert_eq!(out[0], 0xc0 + 1 + 33 + 3);
        assert_eq!(out[1], 0x80);
        assert_eq!(out[2], 0xa0);
        assert_eq!(&out[out.len() - 3..], &[0x82, 0x01, 0x02]);
        assert_eq!(out.len(), elem.length());
    }

    #[test]
    fn test_proof_survives_encoding() {
        let proof = sample_proof();
        let bytes = encode_proof(&proof);
        assert_eq!(bytes.len(), proof.length());
        let decoded = decode_proof(&bytes).unwrap();
        assert_eq!(decoded, proof);

        let blocks: Vec<ProofBlock> = [2, 7, 10].into_iter().map(ProofBlock::inclusion).collect();
        assert!(verify_proof(&decoded, &blocks));
    }

    #[test]
    fn test_encoding_is_canonical() {
        let proof = sample_proof();
        assert_eq!(encode_proof(&proof), encode_proof(&proof.clone()));
        let reencoded = encode_proof(&decode_proof(&encode_proof(&proof)).unwrap());
        assert_eq!(reencoded, encode_proof(&proof));
    }

    #[test]
    fn test_rejects_trailing_bytes() {
        let mut bytes = encode_proof(&sample_proof());
        bytes.push(0x00);
        assert!(matches!(decode_proof(&bytes), Err(CodecError::TrailingBytes(1))));
    }

    #[test]
    fn test_rejects_truncated_input() {
        let bytes = encode_proof(&sample_proof());
        assert!(matches!(
            decode_proof(&bytes[..bytes.len() - 5]),
            Err(CodecError::Rlp(_))
        ));
        assert!(decode_proof(&[]).is_err());
    }

    #[test]
    fn test_rejects_unknown_version() {
        let bytes = encode_proof(&sample_proof());
        // The version byte directly follows the outer list header.
        let header_len = if bytes[0] <= 0xf7 { 1 } else { 1 + (bytes[0] - 0xf7) as usize };
        let mut patched = bytes.clone();
        assert_eq!(patched[header_len], PROOF_CODEC_VERSION);
        patched[header_len] = 0x07;
        assert!(matches!(
            decode_proof(&patched),
            Err(CodecError::UnsupportedVersion { found: 7, expected: PROOF_CODEC_VERSION })
        ));
    }

    #[test]
    fn test_rejects_unknown_tag() {
        let mut payload = Vec::new();
        9u8.encode(&mut payload);
        [0u8; 32].encode(&mut payload);
        [0u8; 0].as_slice().encode(&mut payload);
        let mut encoded = Vec::new();
        encode_list_payload(&payload, &mut encoded);
        assert!(matches!(
            ProofElem::decode_rlp(&mut encoded.as_slice()),
            Err(CodecError::InvalidTag(9))
        ));
    }

    #[test]
    fn test_sibling_and_root_fields() {
        let sibling = ProofElem::Sibling {
            digest: Digest::from([0x22; 32]),
            weight: Weight::from(0u32),
            is_right_child: true,
        };
        let root = ProofElem::Root {
            digest: Digest::from([0x33; 32]),
            weight: Weight::from(u64::MAX) * 3u32,
            leaf_count: 300,
        };
        for elem in [sibling, root] {
            let mut out = Vec::new();
            elem.encode(&mut out);
            assert_eq!(ProofElem::decode_rlp(&mut out.as_slice()).unwrap(), elem);
        }
    }
}
