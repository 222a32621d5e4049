// src/lib.rs
//! Proof verification backends
//!
//! Every backend implements [`ProofVerifier`]: a pure function from
//! `(proof, program_artifact, public_inputs)` to a verdict. Backends hold
//! only immutable configuration, perform no I/O and use integer arithmetic
//! exclusively, so any two nodes reach the same verdict on the same bytes.
//!
//! Verdicts are split in two:
//! - [`Outcome::Verified`] / [`Outcome::Rejected`]: the input was well
//!   formed and the cryptographic check ran to completion
//! - [`MalformedInput`]: the input could not be interpreted at all

use serde::{Deserialize, Serialize};

pub mod codec;
pub mod groth16;
pub mod stark;
pub mod transcript;
pub mod zkvm;

pub use groth16::Groth16Verifier;
pub use stark::StarkVerifier;
pub use transcript::Transcript;
pub use zkvm::ZkvmVerifier;

/// Result of a verification that ran to completion
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Verified,
    Rejected(RejectReason),
}

impl Outcome {
    pub fn is_verified(&self) -> bool {
        matches!(self, Outcome::Verified)
    }
}

/// Which check a well-formed proof failed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RejectReason {
    /// proof is bound to a different program than the artifact names
    ProgramMismatch,
    /// an opened value is not under the committed root
    MerklePath,
    /// an execution step does not follow from the previous one
    Transition,
    /// first or last row disagrees with the public statement
    Boundary,
    /// opened trace values do not produce the committed composition value
    Composition,
    /// FRI folding is inconsistent between layers
    FriFold,
    /// the last FRI layer is not the claimed constant
    FinalLayer,
    /// the Groth16 pairing equation does not hold
    PairingCheck,
    /// committed public values differ from the declared ones
    PublicInputMismatch,
}

impl core::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            RejectReason::ProgramMismatch => "program mismatch",
            RejectReason::MerklePath => "merkle path",
            RejectReason::Transition => "transition",
            RejectReason::Boundary => "boundary",
            RejectReason::Composition => "composition",
            RejectReason::FriFold => "fri fold",
            RejectReason::FinalLayer => "final layer",
            RejectReason::PairingCheck => "pairing check",
            RejectReason::PublicInputMismatch => "public input mismatch",
        };
        f.write_str(s)
    }
}

/// Input that a backend cannot interpret. Never recorded on chain.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum MalformedInput {
    #[error("proof encoding: {0}")]
    ProofEncoding(String),

    #[error("unsupported proof version {0}")]
    UnsupportedVersion(u8),

    #[error("proof shape: {0}")]
    ProofShape(String),

    #[error("program artifact: {0}")]
    Artifact(String),

    #[error("public inputs: {0}")]
    PublicInputs(String),

    #[error("unknown verifying key {0}")]
    UnknownKey(String),

    #[error("backend panicked during verification")]
    Panicked,
}

/// Uniform contract of every proof system backend
pub trait ProofVerifier: Send + Sync {
    fn verify(
        &self,
        proof: &[u8],
        program_artifact: &[u8],
        public_inputs: &[Vec<u8>],
    ) -> Result<Outcome, MalformedInput>;
}
