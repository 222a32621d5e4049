//! Typed transaction messages, one per proof system

use serde::{Deserialize, Serialize};

use crate::types::{AccountId, Hash, ProofSubmission, ProofSystemId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Msg {
    /// zkVM execution proof against a program image
    VerifySp1 {
        submitter: AccountId,
        proof: Vec<u8>,
        elf: Vec<u8>,
        public_values: Vec<Vec<u8>>,
    },
    /// STARK proof against a program hash
    VerifyCairo {
        submitter: AccountId,
        proof: Vec<u8>,
        program_hash: Hash,
        public_inputs: Vec<Vec<u8>>,
    },
    /// Groth16 proof against a registered verifying key
    VerifyGroth16 {
        submitter: AccountId,
        proof: Vec<u8>,
        vk_id: Hash,
        public_inputs: Vec<Vec<u8>>,
    },
}

impl Msg {
    pub fn proof_system(&self) -> ProofSystemId {
        match self {
            Msg::VerifySp1 { .. } => ProofSystemId::Sp1,
            Msg::VerifyCairo { .. } => ProofSystemId::Cairo,
            Msg::VerifyGroth16 { .. } => ProofSystemId::Groth16,
        }
    }

    pub fn submitter(&self) -> &AccountId {
        match self {
            Msg::VerifySp1 { submitter, .. }
            | Msg::VerifyCairo { submitter, .. }
            | Msg::VerifyGroth16 { submitter, .. } => submitter,
        }
    }

    pub fn into_submission(self) -> ProofSubmission {
        let proof_system = self.proof_system();
        let (submitter, proof_bytes, program_artifact, public_inputs) = match self {
            Msg::VerifySp1 { submitter, proof, elf, public_values } => (submitter, proof, elf, public_values),
            Msg::VerifyCairo { submitter, proof, program_hash, public_inputs } => {
                (submitter, proof, program_hash.to_vec(), public_inputs)
            }
            Msg::VerifyGroth16 { submitter, proof, vk_id, public_inputs } => {
                (submitter, proof, vk_id.to_vec(), public_inputs)
            }
        };
        ProofSubmission { proof_system, proof_bytes, program_artifact, public_inputs, submitter }
    }
}

impl From<Msg> for ProofSubmission {
    fn from(msg: Msg) -> Self {
        msg.into_submission()
    }
}
