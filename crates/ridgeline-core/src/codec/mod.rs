//! Canonical wire encoding for proofs and accumulator snapshots.
//!
//! Everything is RLP. Top-level records start with a version byte that is
//! checked on decode; weights are minimal big-endian byte strings.

pub mod proof;
pub mod snapshot;

pub use proof::*;
pub use snapshot::*;

use alloy_rlp::{BufMut, Bytes, Decodable, Encodable, Header};
use thiserror::Error;

use crate::mmr::IntegrityError;
use crate::types::{weight_to_be_bytes, Digest, Weight};

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("RLP decoding failed: {0}")]
    Rlp(#[from] alloy_rlp::Error),

    #[error("Unsupported codec version {found}, expected {expected}")]
    UnsupportedVersion { found: u8, expected: u8 },

    #[error("{0} unexpected trailing bytes")]
    TrailingBytes(usize),

    #[error("Unknown proof element tag {0}")]
    InvalidTag(u8),

    #[error("Decoded snapshot is inconsistent: {0}")]
    Integrity(#[from] IntegrityError),
}

/// Write `payload` as the body of an RLP list.
pub(crate) fn encode_list_payload(payload: &[u8], out: &mut dyn BufMut) {
    Header {
        list: true,
        payload_length: payload.len(),
    }
    .encode(out);
    out.put_slice(payload);
}

/// Split the next RLP list off `buf` and return its payload.
pub(crate) fn decode_list_payload<'a>(buf: &mut &'a [u8]) -> alloy_rlp::Result<&'a [u8]> {
    let header = Header::decode(buf)?;
    if !header.list {
        return Err(alloy_rlp::Error::UnexpectedString);
    }
    if buf.len() < header.payload_length {
        return Err(alloy_rlp::Error::InputTooShort);
    }
    let (payload, rest) = buf.split_at(header.payload_length);
    *buf = rest;
    Ok(payload)
}

pub(crate) fn encode_digest(digest: &Digest, out: &mut dyn BufMut) {
    digest.0.encode(out);
}

pub(crate) fn decode_digest(buf: &mut &[u8]) -> alloy_rlp::Result<Digest> {
    Ok(Digest::from(<[u8; 32]>::decode(buf)?))
}

pub(crate) fn encode_weight(weight: &Weight, out: &mut dyn BufMut) {
    weight_to_be_bytes(weight).as_slice().encode(out);
}

pub(crate) fn decode_weight(buf: &mut &[u8]) -> alloy_rlp::Result<Weight> {
    let bytes = Bytes::decode(buf)?;
    if bytes.first() == Some(&0) {
        return Err(alloy_rlp::Error::LeadingZero);
    }
    Ok(Weight::from_bytes_be(&bytes))
}

/// Check the version byte at the head of a record payload.
pub(crate) fn expect_version(payload: &mut &[u8], expected: u8) -> Result<(), CodecError> {
    let found = u8::decode(payload)?;
    if found != expected {
        return Err(CodecError::UnsupportedVersion { found, expected });
    }
    Ok(())
}
