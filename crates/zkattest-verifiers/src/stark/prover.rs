//! STARK prover for iterated polynomial maps (fixtures and benchmarks only)

use thiserror::Error;
use zkattest_field::{batch_inverse, evaluate_on_coset, interpolate, Goldilocks};
use zkattest_merkle::{build_merkle_tree, CompleteMerkleTree};

use super::air::{
    composition_at, Domain, ProgramError, Statement, TransitionProgram, COSET_OFFSET, MAX_STEPS,
    NUM_QUERIES,
};
use super::proof::{LayerOpening, QueryOpening, StarkProof, ValueOpening, PROOF_VERSION};
use super::{composition_challenges, seed_transcript};
use crate::codec;

#[derive(Debug, Error)]
pub enum ProveError {
    #[error("invalid program: {0}")]
    Program(#[from] ProgramError),
    #[error("step count {0} outside 1..={MAX_STEPS}")]
    Steps(u64),
    #[error("proof encoding: {0}")]
    Encoding(#[from] bincode::Error),
}

/// A proof together with the program hash and statement it proves
#[derive(Debug, Clone)]
pub struct ProvenStatement {
    pub proof: StarkProof,
    pub program_hash: [u8; 32],
    pub statement: Statement,
}

impl ProvenStatement {
    pub fn proof_bytes(&self) -> Result<Vec<u8>, ProveError> {
        Ok(codec::encode(&self.proof)?)
    }

    pub fn public_inputs(&self) -> Vec<Vec<u8>> {
        self.statement.to_public_inputs()
    }
}

struct Committed {
    values: Vec<Goldilocks>,
    tree: CompleteMerkleTree,
}

impl Committed {
    fn new(values: Vec<Goldilocks>) -> Self {
        let leaves: Vec<[u8; 8]> = values.iter().map(Goldilocks::to_le_bytes).collect();
        let tree = build_merkle_tree(&leaves);
        Self { values, tree }
    }

    fn root(&self) -> [u8; 32] {
        self.tree.get_root().unwrap_or_default()
    }

    fn open(&self, index: usize) -> ValueOpening {
        ValueOpening {
            value: self.values[index].value(),
            path: self.tree.open(index),
        }
    }
}

/// Successive powers `offset * generator^k` for `k < count`
fn coset_points(offset: Goldilocks, generator: Goldilocks, count: usize) -> Vec<Goldilocks> {
    let mut points = Vec::with_capacity(count);
    let mut x = offset;
    for _ in 0..count {
        points.push(x);
        x *= generator;
    }
    points
}

fn fold_layer(
    values: &[Goldilocks],
    offset: Goldilocks,
    generator: Goldilocks,
    beta: Goldilocks,
) -> Vec<Goldilocks> {
    let half = values.len() / 2;
    let two_x: Vec<Goldilocks> = coset_points(offset, generator, half)
        .into_iter()
        .map(|x| x * Goldilocks::TWO)
        .collect();
    let inv_two_x = batch_inverse(&two_x);
    let inv_two = Goldilocks::TWO.inverse().unwrap_or(Goldilocks::ZERO);

    (0..half)
        .map(|k| {
            let (a, b) = (values[k], values[k + half]);
            (a + b) * inv_two + beta * (a - b) * inv_two_x[k]
        })
        .collect()
}

/// Run `program` from `input` for `steps` iterations and prove the result
pub fn prove(program: &TransitionProgram, input: Goldilocks, steps: u64) -> Result<ProvenStatement, ProveError> {
    if steps == 0 || steps > MAX_STEPS {
        return Err(ProveError::Steps(steps));
    }

    let shape = Statement { input, output: Goldilocks::ZERO, steps };
    let n = shape.trace_len();
    let mut trace = Vec::with_capacity(n);
    trace.push(input);
    for k in 1..n {
        trace.push(program.eval(trace[k - 1]));
    }
    let statement = Statement { output: trace[steps as usize], ..shape };

    let log_n = statement.log_trace_len();
    let domain = Domain::new(log_n).ok_or(ProveError::Steps(steps))?;
    let lde_size = domain.lde_size();

    let coeffs = interpolate(&trace);
    let lde = Committed::new(evaluate_on_coset(&coeffs, COSET_OFFSET, domain.log_lde_size()));

    let program_hash = program.hash();
    let mut transcript = seed_transcript(&program_hash, &statement, log_n);
    let alphas = composition_challenges(&mut transcript, &lde.root());

    let points = coset_points(COSET_OFFSET, domain.psi, lde_size);
    let composition: Vec<Goldilocks> = (0..lde_size)
        .map(|j| {
            let next = domain.next_row_index(j);
            composition_at(program, &statement, &domain, &alphas, points[j], lde.values[j], lde.values[next])
        })
        .collect();

    let rounds = domain.fri_rounds(program.degree());
    let mut layers = Vec::with_capacity(rounds);
    let mut current = composition;
    let mut offset = COSET_OFFSET;
    let mut generator = domain.psi;
    for _ in 0..rounds {
        let layer = Committed::new(current);
        transcript.absorb_root(&layer.root());
        let beta = transcript.challenge_field();

        current = fold_layer(&layer.values, offset, generator, beta);
        layers.push(layer);
        offset = offset.square();
        generator = generator.square();
    }

    let final_value = current[0];
    debug_assert!(current.iter().all(|v| *v == final_value), "final FRI layer is not constant");
    transcript.absorb_field(b"final_value", final_value);
    let positions = transcript.challenge_distinct_indices(lde_size, NUM_QUERIES);

    let queries = positions
        .into_iter()
        .map(|q| {
            let mut index = q;
            let layer_openings = layers
                .iter()
                .map(|layer| {
                    let size = layer.values.len();
                    let half = size / 2;
                    let opening = LayerOpening {
                        value: layer.open(index),
                        sibling: layer.open((index + half) % size),
                    };
                    index %= half;
                    opening
                })
                .collect();

            QueryOpening {
                trace: lde.open(q),
                trace_next: lde.open(domain.next_row_index(q)),
                layers: layer_openings,
            }
        })
        .collect();

    let proof = StarkProof {
        version: PROOF_VERSION,
        program: program.to_words(),
        log_trace_len: log_n as u8,
        trace_root: lde.root(),
        layer_roots: layers.iter().map(Committed::root).collect(),
        final_value: final_value.value(),
        queries,
    };

    Ok(ProvenStatement { proof, program_hash, statement })
}
