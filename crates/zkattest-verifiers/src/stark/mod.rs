//! Cairo-style STARK backend over the Goldilocks field
//!
//! `program_artifact` is the 32-byte program hash, public inputs are
//! `[input, output, steps]`. The proof carries the program itself, a Merkle
//! commitment to the trace low-degree extension, and a FRI argument that
//! the constraint composition has low degree.
//!
//! Transcript order (prover and verifier):
//! 1. program hash, statement, trace length
//! 2. trace root, then three composition coefficients
//! 3. per FRI round: layer root, then the folding challenge
//! 4. final constant, then the query positions

pub mod air;
pub mod proof;
#[cfg(feature = "prover")]
pub mod prover;

pub use air::{ProgramHash, Statement, TransitionProgram};
pub use proof::{LayerOpening, QueryOpening, StarkProof, ValueOpening};

use tracing::debug;
use zkattest_field::Goldilocks;
use zkattest_merkle::{verify_path, Hash};

use crate::codec;
use crate::transcript::Transcript;
use crate::{MalformedInput, Outcome, ProofVerifier, RejectReason};
use air::{composition_at, fold, Domain, COSET_OFFSET, NUM_QUERIES};
use proof::PROOF_VERSION;

const TRANSCRIPT_DOMAIN: &[u8] = b"zkattest/stark/v1";

pub(crate) fn seed_transcript(program_hash: &ProgramHash, statement: &Statement, log_n: u32) -> Transcript {
    let mut transcript = Transcript::new(TRANSCRIPT_DOMAIN);
    transcript.absorb(b"program", program_hash);
    transcript.absorb(b"statement", &statement.to_bytes());
    transcript.absorb_u64(b"log_trace_len", log_n as u64);
    transcript
}

pub(crate) fn composition_challenges(transcript: &mut Transcript, trace_root: &Hash) -> [Goldilocks; 3] {
    transcript.absorb_root(trace_root);
    [
        transcript.challenge_field(),
        transcript.challenge_field(),
        transcript.challenge_field(),
    ]
}

fn field(value: u64) -> Result<Goldilocks, MalformedInput> {
    Goldilocks::from_canonical(value)
        .ok_or_else(|| MalformedInput::ProofShape(format!("non-canonical field element {}", value)))
}

fn opened(root: &Hash, opening: &ValueOpening, index: usize, depth: usize) -> bool {
    verify_path(root, &opening.value.to_le_bytes(), index, &opening.path, depth)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StarkVerifier;

impl StarkVerifier {
    pub fn new() -> Self {
        Self
    }

    fn check(
        &self,
        program: &TransitionProgram,
        statement: &Statement,
        domain: &Domain,
        proof: &StarkProof,
    ) -> Result<Outcome, MalformedInput> {
        let rounds = domain.fri_rounds(program.degree());
        let log_lde = domain.log_lde_size() as usize;
        let lde_size = domain.lde_size();
        let final_value = field(proof.final_value)?;

        let mut transcript = seed_transcript(&program.hash(), statement, domain.log_n);
        let alphas = composition_challenges(&mut transcript, &proof.trace_root);
        let betas: Vec<Goldilocks> = proof
            .layer_roots
            .iter()
            .map(|root| {
                transcript.absorb_root(root);
                transcript.challenge_field()
            })
            .collect();
        transcript.absorb_field(b"final_value", final_value);
        let positions = transcript.challenge_distinct_indices(lde_size, NUM_QUERIES);

        for (q, query) in positions.into_iter().zip(&proof.queries) {
            let next = domain.next_row_index(q);
            if !opened(&proof.trace_root, &query.trace, q, log_lde)
                || !opened(&proof.trace_root, &query.trace_next, next, log_lde)
            {
                return Ok(Outcome::Rejected(RejectReason::MerklePath));
            }

            let x = domain.lde_point(q);
            let t = field(query.trace.value)?;
            let t_next = field(query.trace_next.value)?;
            let mut expected = composition_at(program, statement, domain, &alphas, x, t, t_next);

            let mut index = q;
            let mut offset = COSET_OFFSET;
            let mut generator = domain.psi;
            for round in 0..rounds {
                let size = lde_size >> round;
                let half = size / 2;
                let sibling = (index + half) % size;
                let layer = &query.layers[round];
                let root = &proof.layer_roots[round];

                if !opened(root, &layer.value, index, log_lde - round)
                    || !opened(root, &layer.sibling, sibling, log_lde - round)
                {
                    return Ok(Outcome::Rejected(RejectReason::MerklePath));
                }

                let a = field(layer.value.value)?;
                let b = field(layer.sibling.value)?;
                if a != expected {
                    let reason = if round == 0 {
                        RejectReason::Composition
                    } else {
                        RejectReason::FriFold
                    };
                    debug!(position = q, round, "stark query mismatch");
                    return Ok(Outcome::Rejected(reason));
                }

                let x = offset * generator.pow(index as u64);
                expected = fold(a, b, x, betas[round]);

                index %= half;
                offset = offset.square();
                generator = generator.square();
            }

            if expected != final_value {
                debug!(position = q, "stark final layer mismatch");
                return Ok(Outcome::Rejected(RejectReason::FinalLayer));
            }
        }

        Ok(Outcome::Verified)
    }
}

impl ProofVerifier for StarkVerifier {
    fn verify(
        &self,
        proof: &[u8],
        program_artifact: &[u8],
        public_inputs: &[Vec<u8>],
    ) -> Result<Outcome, MalformedInput> {
        let artifact: ProgramHash = program_artifact.try_into().map_err(|_| {
            MalformedInput::Artifact(format!(
                "program hash is {} bytes, expected 32",
                program_artifact.len()
            ))
        })?;
        let statement = Statement::parse(public_inputs)?;
        let proof: StarkProof = codec::decode(proof)?;

        if proof.version != PROOF_VERSION {
            return Err(MalformedInput::UnsupportedVersion(proof.version));
        }
        let program = TransitionProgram::new(&proof.program)
            .map_err(|e| MalformedInput::ProofShape(e.to_string()))?;

        let log_n = statement.log_trace_len();
        if proof.log_trace_len as u32 != log_n {
            return Err(MalformedInput::ProofShape(format!(
                "trace length 2^{}, statement requires 2^{}",
                proof.log_trace_len, log_n
            )));
        }
        let domain = Domain::new(log_n)
            .ok_or_else(|| MalformedInput::ProofShape("trace domain too large".into()))?;

        let rounds = domain.fri_rounds(program.degree());
        if proof.layer_roots.len() != rounds {
            return Err(MalformedInput::ProofShape(format!(
                "{} FRI layers, expected {}",
                proof.layer_roots.len(),
                rounds
            )));
        }
        if proof.queries.len() != NUM_QUERIES
            || proof.queries.iter().any(|q| q.layers.len() != rounds)
        {
            return Err(MalformedInput::ProofShape("query openings have the wrong shape".into()));
        }

        if program.hash() != artifact {
            debug!("stark proof carries a different program");
            return Ok(Outcome::Rejected(RejectReason::ProgramMismatch));
        }

        self.check(&program, &statement, &domain, &proof)
    }
}
