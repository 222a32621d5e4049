//! Groth16 over BN254
//!
//! Verifying keys are registered up front (arkworks compressed encoding) and
//! addressed by `SHA-256("zkattest/groth16/vk/v1" || compressed vk)`. The
//! program artifact of a submission is that 32-byte identifier.
//!
//! Wire formats:
//! - proof: compressed `Proof<Bn254>`, exactly 128 bytes
//! - public input: compressed canonical `Fr`, exactly 32 bytes each

#[cfg(feature = "prover")]
pub mod prover;

use std::collections::BTreeMap;

use ark_bn254::{Bn254, Fr};
use ark_groth16::{Groth16, PreparedVerifyingKey, Proof, VerifyingKey};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize, SerializationError};
use ark_snark::SNARK;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

use crate::{MalformedInput, Outcome, ProofVerifier, RejectReason};

pub const PROOF_BYTES: usize = 128;
pub const SCALAR_BYTES: usize = 32;

const VK_DOMAIN: &[u8] = b"zkattest/groth16/vk/v1";

pub type VkId = [u8; 32];

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("verifying key is not valid hex: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("verifying key does not decode: {0}")]
    Decode(String),
    #[error("verifying key has no input commitments")]
    NoInputs,
    #[error("verifying key {0} registered twice")]
    Duplicate(String),
}

pub fn vk_id(compressed_vk: &[u8]) -> VkId {
    let mut hasher = Sha256::new();
    hasher.update(VK_DOMAIN);
    hasher.update(compressed_vk);
    hasher.finalize().into()
}

pub fn encode_verifying_key(vk: &VerifyingKey<Bn254>) -> Result<Vec<u8>, SerializationError> {
    let mut bytes = Vec::new();
    vk.serialize_compressed(&mut bytes)?;
    Ok(bytes)
}

/// Decode a complete compressed object, rejecting trailing bytes
fn decode_exact<T: CanonicalDeserialize>(bytes: &[u8]) -> Result<T, SerializationError> {
    let mut reader = bytes;
    let value = T::deserialize_compressed(&mut reader)?;
    if !reader.is_empty() {
        return Err(SerializationError::InvalidData);
    }
    Ok(value)
}

#[derive(Clone, Debug)]
struct PreparedKey {
    pvk: PreparedVerifyingKey<Bn254>,
    num_inputs: usize,
}

#[derive(Clone, Debug, Default)]
pub struct Groth16Verifier {
    keys: BTreeMap<VkId, PreparedKey>,
}

impl Groth16Verifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_hex_keys<I, S>(keys: I) -> Result<Self, KeyError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut verifier = Self::new();
        for key in keys {
            let bytes = hex::decode(key.as_ref().trim())?;
            verifier.add_key(&bytes)?;
        }
        Ok(verifier)
    }

    /// Validate, prepare and register one compressed verifying key
    pub fn add_key(&mut self, compressed_vk: &[u8]) -> Result<VkId, KeyError> {
        let vk: VerifyingKey<Bn254> =
            decode_exact(compressed_vk).map_err(|e| KeyError::Decode(e.to_string()))?;
        if vk.gamma_abc_g1.is_empty() {
            return Err(KeyError::NoInputs);
        }

        let id = vk_id(compressed_vk);
        if self.keys.contains_key(&id) {
            return Err(KeyError::Duplicate(hex::encode(id)));
        }

        let num_inputs = vk.gamma_abc_g1.len() - 1;
        let pvk = <Groth16<Bn254> as SNARK<Fr>>::process_vk(&vk)
            .map_err(|e| KeyError::Decode(e.to_string()))?;
        self.keys.insert(id, PreparedKey { pvk, num_inputs });
        Ok(id)
    }

    pub fn key_ids(&self) -> impl Iterator<Item = &VkId> {
        self.keys.keys()
    }

    pub fn num_keys(&self) -> usize {
        self.keys.len()
    }
}

impl ProofVerifier for Groth16Verifier {
    fn verify(
        &self,
        proof: &[u8],
        program_artifact: &[u8],
        public_inputs: &[Vec<u8>],
    ) -> Result<Outcome, MalformedInput> {
        let id: VkId = program_artifact.try_into().map_err(|_| {
            MalformedInput::Artifact(format!(
                "verifying key id is {} bytes, expected 32",
                program_artifact.len()
            ))
        })?;
        let key = self
            .keys
            .get(&id)
            .ok_or_else(|| MalformedInput::UnknownKey(hex::encode(id)))?;

        if public_inputs.len() != key.num_inputs {
            return Err(MalformedInput::PublicInputs(format!(
                "key expects {} inputs, got {}",
                key.num_inputs,
                public_inputs.len()
            )));
        }
        let inputs = public_inputs
            .iter()
            .enumerate()
            .map(|(i, bytes)| {
                if bytes.len() != SCALAR_BYTES {
                    return Err(MalformedInput::PublicInputs(format!(
                        "input {} is {} bytes, expected {}",
                        i,
                        bytes.len(),
                        SCALAR_BYTES
                    )));
                }
                decode_exact::<Fr>(bytes).map_err(|_| {
                    MalformedInput::PublicInputs(format!("input {} is not a canonical scalar", i))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if proof.len() != PROOF_BYTES {
            return Err(MalformedInput::ProofEncoding(format!(
                "proof is {} bytes, expected {}",
                proof.len(),
                PROOF_BYTES
            )));
        }
        let proof: Proof<Bn254> =
            decode_exact(proof).map_err(|e| MalformedInput::ProofEncoding(e.to_string()))?;

        let valid = <Groth16<Bn254> as SNARK<Fr>>::verify_with_processed_vk(&key.pvk, &inputs, &proof)
            .map_err(|e| MalformedInput::ProofShape(e.to_string()))?;

        if valid {
            Ok(Outcome::Verified)
        } else {
            debug!(vk = %hex::encode(id), "groth16 pairing check failed");
            Ok(Outcome::Rejected(RejectReason::PairingCheck))
        }
    }
}
