//! Trace generation and proving for the zkVM (fixtures and benchmarks only)

use thiserror::Error;
use zkattest_merkle::build_merkle_tree;

use super::image::ProgramImage;
use super::isa::{Instruction, Opcode};
use super::machine::{run, Execution, MachineState, RunError};
use super::proof::{RowOpening, TransitionOpening, ZkvmProof, MAX_LOG_TRACE_LEN, PROOF_VERSION};
use super::sample_steps;
use crate::codec;

#[derive(Debug, Error)]
pub enum ProveError {
    #[error(transparent)]
    Run(#[from] RunError),
    #[error("proof encoding: {0}")]
    Encoding(#[from] bincode::Error),
}

pub fn execute(program: &ProgramImage, stdin: &[u32]) -> Result<Execution, ProveError> {
    Ok(run(program, stdin, 1usize << MAX_LOG_TRACE_LEN)?)
}

/// A proof plus the public statement it was made for
#[derive(Debug, Clone)]
pub struct ProvenExecution {
    pub proof: ZkvmProof,
    pub public_values: Vec<u32>,
}

impl ProvenExecution {
    pub fn proof_bytes(&self) -> Result<Vec<u8>, ProveError> {
        Ok(codec::encode(&self.proof)?)
    }

    pub fn public_inputs(&self) -> Vec<Vec<u8>> {
        self.public_values
            .iter()
            .map(|v| v.to_le_bytes().to_vec())
            .collect()
    }
}

pub fn prove(program: &ProgramImage, stdin: &[u32]) -> Result<ProvenExecution, ProveError> {
    let Execution { trace, public_values } = execute(program, stdin)?;
    let log_trace_len = trace.len().trailing_zeros() as u8;

    let rows: Vec<_> = trace.iter().map(MachineState::to_bytes).collect();
    let tree = build_merkle_tree(&rows);
    let trace_root = tree.get_root().unwrap_or_default();
    let vk = program.verifying_key();

    let open = |index: usize| RowOpening {
        row: trace[index].clone(),
        path: tree.open(index),
    };

    let transitions = sample_steps(&vk, stdin, &public_values, log_trace_len, &trace_root)
        .into_iter()
        .map(|i| TransitionOpening {
            current: open(i),
            next: open(i + 1),
        })
        .collect();

    let proof = ZkvmProof {
        version: PROOF_VERSION,
        vk,
        stdin: stdin.to_vec(),
        log_trace_len,
        trace_root,
        first: open(0),
        last: open(trace.len() - 1),
        transitions,
    };

    Ok(ProvenExecution { proof, public_values })
}

/// Reads `n` and commits `n`, `fib(n)`, `fib(n + 1)`
pub fn fibonacci_program() -> ProgramImage {
    let instructions = vec![
        Instruction::read(1),
        Instruction::li(2, 0),
        Instruction::li(3, 1),
        Instruction::li(4, 0),
        // loop
        Instruction::beq(4, 1, 10),
        Instruction::new_rrr(Opcode::ADD, 5, 2, 3),
        Instruction::addi(2, 3, 0),
        Instruction::addi(3, 5, 0),
        Instruction::addi(4, 4, 1),
        Instruction::jmp(4),
        // end
        Instruction::commit(1),
        Instruction::commit(2),
        Instruction::commit(3),
        Instruction::halt(),
    ];
    ProgramImage::new(instructions).expect("fibonacci program is well formed")
}
