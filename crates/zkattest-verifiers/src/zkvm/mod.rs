//! SP1-style zkVM backend
//!
//! `program_artifact` is a program image, public inputs are the words the
//! program committed (4 bytes each, little endian). The proof commits the
//! padded execution trace in a Merkle tree and opens its boundary rows plus
//! Fiat-Shamir sampled transitions, which reject most bad proofs cheaply.
//!
//! Private input travels in the clear, so acceptance finally rests on
//! re-running the program over it: the trace must halt within exactly the
//! declared power of two, commit the declared values, and hash to the
//! declared root.

pub mod image;
pub mod isa;
pub mod machine;
pub mod proof;
#[cfg(feature = "prover")]
pub mod prover;

pub use image::{verifying_key_for, ImageError, ProgramImage, VerifyingKey};
pub use isa::{Instruction, Opcode};
pub use machine::{public_values_digest, run, Execution, MachineState, RunError};
pub use proof::{RowOpening, TransitionOpening, ZkvmProof};

use tracing::debug;
use zkattest_merkle::{build_merkle_tree, verify_path, Hash};

use crate::codec;
use crate::transcript::Transcript;
use crate::{MalformedInput, Outcome, ProofVerifier, RejectReason};
use proof::{MAX_LOG_TRACE_LEN, PROOF_VERSION, SPOT_CHECKS};

const TRANSCRIPT_DOMAIN: &[u8] = b"zkattest/zkvm/v1";

/// Fiat-Shamir selection of the steps `i` whose transition `i -> i + 1` is
/// checked
pub(crate) fn sample_steps(
    vk: &VerifyingKey,
    stdin: &[u32],
    public_values: &[u32],
    log_trace_len: u8,
    trace_root: &Hash,
) -> Vec<usize> {
    let mut transcript = Transcript::new(TRANSCRIPT_DOMAIN);
    transcript.absorb(b"vk", vk);

    let stdin_bytes: Vec<u8> = stdin.iter().flat_map(|w| w.to_le_bytes()).collect();
    transcript.absorb(b"stdin", &stdin_bytes);
    let public_bytes: Vec<u8> = public_values.iter().flat_map(|w| w.to_le_bytes()).collect();
    transcript.absorb(b"public_values", &public_bytes);

    transcript.absorb_u64(b"log_trace_len", log_trace_len as u64);
    transcript.absorb_root(trace_root);

    let steps = (1usize << log_trace_len) - 1;
    transcript.challenge_distinct_indices(steps, SPOT_CHECKS)
}

/// Each public input must be exactly one little-endian word
pub fn parse_public_values(public_inputs: &[Vec<u8>]) -> Result<Vec<u32>, MalformedInput> {
    public_inputs
        .iter()
        .enumerate()
        .map(|(i, input)| {
            let word: [u8; 4] = input.as_slice().try_into().map_err(|_| {
                MalformedInput::PublicInputs(format!(
                    "input {} is {} bytes, expected 4",
                    i,
                    input.len()
                ))
            })?;
            Ok(u32::from_le_bytes(word))
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ZkvmVerifier;

impl ZkvmVerifier {
    pub fn new() -> Self {
        Self
    }

    fn check(
        &self,
        program: &ProgramImage,
        proof: &ZkvmProof,
        public_values: &[u32],
    ) -> Outcome {
        let depth = proof.log_trace_len as usize;
        let last_index = (1usize << depth) - 1;
        let root = &proof.trace_root;

        let opened = |opening: &RowOpening, index: usize| {
            verify_path(root, &opening.row.to_bytes(), index, &opening.path, depth)
        };

        if !opened(&proof.first, 0) || !opened(&proof.last, last_index) {
            return Outcome::Rejected(RejectReason::MerklePath);
        }

        if proof.first.row != MachineState::initial() {
            return Outcome::Rejected(RejectReason::Boundary);
        }
        if !proof.last.row.halted {
            return Outcome::Rejected(RejectReason::Boundary);
        }
        if proof.last.row.out_count as usize != public_values.len()
            || proof.last.row.out_acc != public_values_digest(public_values)
        {
            return Outcome::Rejected(RejectReason::PublicInputMismatch);
        }

        let steps = sample_steps(
            &proof.vk,
            &proof.stdin,
            public_values,
            proof.log_trace_len,
            root,
        );

        for (index, t) in steps.into_iter().zip(&proof.transitions) {
            if !opened(&t.current, index) || !opened(&t.next, index + 1) {
                return Outcome::Rejected(RejectReason::MerklePath);
            }

            match t.current.row.step(program, &proof.stdin) {
                Ok(expected) if expected == t.next.row => {}
                Ok(_) | Err(_) => {
                    debug!(step = index, "zkvm transition mismatch");
                    return Outcome::Rejected(RejectReason::Transition);
                }
            }
        }

        let execution = match run(program, &proof.stdin, last_index + 1) {
            Ok(execution) => execution,
            Err(e) => {
                debug!(error = %e, "zkvm re-execution failed");
                return Outcome::Rejected(RejectReason::Transition);
            }
        };
        // a halted tail longer than padding requires is not accepted
        if execution.trace.len() != last_index + 1 {
            debug!(
                executed = execution.trace.len(),
                declared = last_index + 1,
                "zkvm trace length is not minimal"
            );
            return Outcome::Rejected(RejectReason::Boundary);
        }
        if execution.public_values != public_values {
            return Outcome::Rejected(RejectReason::PublicInputMismatch);
        }

        let rows: Vec<_> = execution.trace.iter().map(MachineState::to_bytes).collect();
        if build_merkle_tree(&rows).get_root().as_ref() != Some(root) {
            debug!("zkvm committed trace differs from execution");
            return Outcome::Rejected(RejectReason::Transition);
        }

        Outcome::Verified
    }
}

impl ProofVerifier for ZkvmVerifier {
    fn verify(
        &self,
        proof: &[u8],
        program_artifact: &[u8],
        public_inputs: &[Vec<u8>],
    ) -> Result<Outcome, MalformedInput> {
        let program = ProgramImage::parse(program_artifact)
            .map_err(|e| MalformedInput::Artifact(e.to_string()))?;
        let public_values = parse_public_values(public_inputs)?;
        let proof: ZkvmProof = codec::decode(proof)?;

        if proof.version != PROOF_VERSION {
            return Err(MalformedInput::UnsupportedVersion(proof.version));
        }
        if proof.log_trace_len == 0 || proof.log_trace_len > MAX_LOG_TRACE_LEN {
            return Err(MalformedInput::ProofShape(format!(
                "trace length 2^{} out of range",
                proof.log_trace_len
            )));
        }
        let expected_checks = SPOT_CHECKS.min((1usize << proof.log_trace_len) - 1);
        if proof.transitions.len() != expected_checks {
            return Err(MalformedInput::ProofShape(format!(
                "{} transition openings, expected {}",
                proof.transitions.len(),
                expected_checks
            )));
        }

        if proof.vk != verifying_key_for(program_artifact) {
            debug!("zkvm proof bound to a different program");
            return Ok(Outcome::Rejected(RejectReason::ProgramMismatch));
        }

        Ok(self.check(&program, &proof, &public_values))
    }
}
