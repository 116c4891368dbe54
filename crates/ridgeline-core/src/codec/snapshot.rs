use alloy_rlp::{Decodable, Encodable};

use super::{
    decode_digest, decode_list_payload, decode_weight, encode_digest, encode_list_payload,
    encode_weight, expect_version, CodecError,
};
use crate::mmr::{Accumulator, Node};

pub const SNAPSHOT_CODEC_VERSION: u8 = 1;

/// Serialize the whole arena as `[version, leaf_count, [[digest, weight, leaf_count], ...]]`.
/// Node indices are implied by position.
pub fn encode_snapshot(accumulator: &Accumulator) -> Vec<u8> {
    let mut nodes = Vec::new();
    for node in accumulator.arena().iter() {
        let mut record = Vec::with_capacity(48);
        encode_digest(&node.digest, &mut record);
        encode_weight(&node.weight, &mut record);
        node.leaf_count.encode(&mut record);
        encode_list_payload(&record, &mut nodes);
    }

    let mut payload = Vec::with_capacity(nodes.len() + 16);
    SNAPSHOT_CODEC_VERSION.encode(&mut payload);
    accumulator.leaf_count().encode(&mut payload);
    encode_list_payload(&nodes, &mut payload);

    let mut out = Vec::with_capacity(payload.len() + 9);
    encode_list_payload(&payload, &mut out);
    out
}

/// Parse a snapshot and rebuild the accumulator. The arena is fully
/// re-validated, so a snapshot from an untrusted source cannot yield an
/// accumulator with inconsistent digests or weights.
pub fn decode_snapshot(bytes: &[u8]) -> Result<Accumulator, CodecError> {
    let mut buf = bytes;
    let mut payload = decode_list_payload(&mut buf)?;
    if !buf.is_empty() {
        return Err(CodecError::TrailingBytes(buf.len()));
    }

    expect_version(&mut payload, SNAPSHOT_CODEC_VERSION)?;
    let leaf_count = u64::decode(&mut payload)?;
    let mut records = decode_list_payload(&mut payload)?;
    if !payload.is_empty() {
        return Err(CodecError::TrailingBytes(payload.len()));
    }

    let mut nodes = Vec::new();
    while !records.is_empty() {
        let mut record = decode_list_payload(&mut records)?;
        let digest = decode_digest(&mut record)?;
        let weight = decode_weight(&mut record)?;
        let count = u64::decode(&mut record)?;
        if !record.is_empty() {
            return Err(CodecError::TrailingBytes(record.len()));
        }
        let index = nodes.len() as u64;
        nodes.push(Node {
            digest,
            weight,
            leaf_count: count,
            index,
        });
    }

    let accumulator = Accumulator::from_parts(leaf_count, nodes);
    accumulator.check_integrity()?;
    Ok(accumulator)
}
