//! Canonical bincode encoding for proof structures
//!
//! Fixed-width little-endian integers, a hard size limit, and no trailing
//! bytes: every accepted byte string has exactly one decoding.

use bincode::Options;
use serde::{de::DeserializeOwned, Serialize};

use crate::MalformedInput;

/// Upper bound on any single decoded proof
pub const MAX_PROOF_BYTES: u64 = 16 * 1024 * 1024;

fn canonical_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .with_limit(MAX_PROOF_BYTES)
        .reject_trailing_bytes()
}

pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, bincode::Error> {
    canonical_options().serialize(value)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, MalformedInput> {
    canonical_options()
        .deserialize(bytes)
        .map_err(|e| MalformedInput::ProofEncoding(e.to_string()))
}
