//! Groth16 fixture circuit: knowledge of a square root (x * x = y)

use ark_bn254::{Bn254, Fr};
use ark_groth16::{Groth16, ProvingKey};
use ark_relations::lc;
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};
use ark_serialize::{CanonicalSerialize, SerializationError};
use ark_snark::{CircuitSpecificSetupSNARK, SNARK};
use ark_std::rand::{rngs::StdRng, SeedableRng};
use thiserror::Error;

use super::{encode_verifying_key, vk_id, VkId};

#[derive(Debug, Error)]
pub enum ProveError {
    #[error("constraint synthesis: {0}")]
    Synthesis(#[from] SynthesisError),
    #[error("serialization: {0}")]
    Serialization(#[from] SerializationError),
}

/// Public input `y`, witness `x`
#[derive(Clone, Copy)]
pub struct SquareCircuit {
    pub x: Option<Fr>,
    pub y: Option<Fr>,
}

impl ConstraintSynthesizer<Fr> for SquareCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        let y = cs.new_input_variable(|| self.y.ok_or(SynthesisError::AssignmentMissing))?;
        let x = cs.new_witness_variable(|| self.x.ok_or(SynthesisError::AssignmentMissing))?;
        cs.enforce_constraint(lc!() + x, lc!() + x, lc!() + y)?;
        Ok(())
    }
}

pub fn encode_scalar(value: Fr) -> Result<Vec<u8>, SerializationError> {
    let mut bytes = Vec::new();
    value.serialize_compressed(&mut bytes)?;
    Ok(bytes)
}

/// Proving key plus the registered form of its verifying key
pub struct SquareFixture {
    pub proving_key: ProvingKey<Bn254>,
    pub vk_bytes: Vec<u8>,
    pub vk_id: VkId,
}

impl SquareFixture {
    pub fn setup(seed: u64) -> Result<Self, ProveError> {
        let mut rng = StdRng::seed_from_u64(seed);
        let blank = SquareCircuit { x: None, y: None };
        let (proving_key, vk) = Groth16::<Bn254>::setup(blank, &mut rng)?;
        let vk_bytes = encode_verifying_key(&vk)?;
        let vk_id = vk_id(&vk_bytes);
        Ok(Self { proving_key, vk_bytes, vk_id })
    }

    pub fn vk_hex(&self) -> String {
        hex::encode(&self.vk_bytes)
    }

    /// Proof that `x^2` has a known square root, with its public input
    pub fn prove(&self, x: u64, seed: u64) -> Result<(Vec<u8>, Vec<Vec<u8>>), ProveError> {
        let mut rng = StdRng::seed_from_u64(seed);
        let x = Fr::from(x);
        let y = x * x;
        let proof = Groth16::<Bn254>::prove(&self.proving_key, SquareCircuit { x: Some(x), y: Some(y) }, &mut rng)?;

        let mut proof_bytes = Vec::new();
        proof.serialize_compressed(&mut proof_bytes)?;
        Ok((proof_bytes, vec![encode_scalar(y)?]))
    }
}
