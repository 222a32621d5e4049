//! Machine state and the single-step transition function
//!
//! The same `step` runs in the prover (to build the trace) and in the
//! verifier (to check sampled transitions and to re-run the program), so it
//! must stay a pure function of the current row, the program, and the
//! private input.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::image::ProgramImage;
use super::isa::{Opcode, NUM_REGS};

/// Canonical encoding size of one trace row
pub const ROW_BYTES: usize = 4 + 4 * NUM_REGS + 4 + 4 + 32 + 1;

const COMMIT_DOMAIN: &[u8] = b"commit";

/// One row of the execution trace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineState {
    pub pc: u32,
    pub regs: [u32; NUM_REGS],
    /// next unread word of private input
    pub cursor: u32,
    /// number of public values committed so far
    pub out_count: u32,
    /// hash chain over committed public values
    pub out_acc: [u8; 32],
    pub halted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Fault {
    #[error("pc {0} is outside the program")]
    PcOutOfRange(u32),
    #[error("read past the end of private input")]
    InputExhausted,
    #[error("public value counter overflow")]
    OutputOverflow,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunError {
    #[error("execution fault at step {step}: {fault}")]
    Fault { step: usize, fault: Fault },
    #[error("program did not halt within {0} steps")]
    DidNotHalt(usize),
}

/// Padded execution trace and the values the program committed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    pub trace: Vec<MachineState>,
    pub public_values: Vec<u32>,
}

/// Fold one committed word into the public value hash chain
pub fn chain_public_value(acc: &[u8; 32], value: u32) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(COMMIT_DOMAIN);
    hasher.update(acc);
    hasher.update(value.to_le_bytes());
    hasher.finalize().into()
}

/// Hash chain a halted machine must end with after committing `values`
pub fn public_values_digest(values: &[u32]) -> [u8; 32] {
    values.iter().fold([0u8; 32], |acc, v| chain_public_value(&acc, *v))
}

impl MachineState {
    pub fn initial() -> Self {
        Self {
            pc: 0,
            regs: [0; NUM_REGS],
            cursor: 0,
            out_count: 0,
            out_acc: [0; 32],
            halted: false,
        }
    }

    /// Little-endian row encoding committed in the trace tree
    pub fn to_bytes(&self) -> [u8; ROW_BYTES] {
        let mut out = [0u8; ROW_BYTES];
        let mut at = 0;
        let mut put = |bytes: &[u8]| {
            out[at..at + bytes.len()].copy_from_slice(bytes);
            at += bytes.len();
        };
        put(&self.pc.to_le_bytes());
        for r in &self.regs {
            put(&r.to_le_bytes());
        }
        put(&self.cursor.to_le_bytes());
        put(&self.out_count.to_le_bytes());
        put(&self.out_acc);
        put(&[self.halted as u8]);
        out
    }

    /// Execute one instruction. A halted machine stays where it is.
    pub fn step(&self, program: &ProgramImage, stdin: &[u32]) -> Result<Self, Fault> {
        if self.halted {
            return Ok(self.clone());
        }

        let instr = program.fetch(self.pc).ok_or(Fault::PcOutOfRange(self.pc))?;
        let mut next = self.clone();
        next.pc = self.pc.wrapping_add(1);

        let rs1 = self.regs[instr.rs1 as usize];
        let rs2 = self.regs[instr.rs2 as usize];
        let rd = instr.rd as usize;

        match instr.opcode {
            Opcode::ADD => next.regs[rd] = rs1.wrapping_add(rs2),
            Opcode::SUB => next.regs[rd] = rs1.wrapping_sub(rs2),
            Opcode::MUL => next.regs[rd] = rs1.wrapping_mul(rs2),
            Opcode::AND => next.regs[rd] = rs1 & rs2,
            Opcode::OR => next.regs[rd] = rs1 | rs2,
            Opcode::XOR => next.regs[rd] = rs1 ^ rs2,
            Opcode::LI => next.regs[rd] = instr.imm,
            Opcode::ADDI => next.regs[rd] = rs1.wrapping_add(instr.imm),
            Opcode::BEQ => {
                if rs1 == rs2 {
                    next.pc = instr.imm;
                }
            }
            Opcode::BNE => {
                if rs1 != rs2 {
                    next.pc = instr.imm;
                }
            }
            Opcode::JMP => next.pc = instr.imm,
            Opcode::READ => {
                let word = stdin
                    .get(self.cursor as usize)
                    .copied()
                    .ok_or(Fault::InputExhausted)?;
                next.regs[rd] = word;
                next.cursor = self.cursor + 1;
            }
            Opcode::COMMIT => {
                next.out_count = self.out_count.checked_add(1).ok_or(Fault::OutputOverflow)?;
                next.out_acc = chain_public_value(&self.out_acc, rs1);
            }
            Opcode::HALT => {
                next.pc = self.pc;
                next.halted = true;
            }
        }

        Ok(next)
    }
}

/// Run `program` from the initial state until it halts, then pad the trace
/// with the halted row to the next power of two (at least 2 rows).
///
/// `max_rows` must be a power of two; the padded trace never exceeds it.
pub fn run(program: &ProgramImage, stdin: &[u32], max_rows: usize) -> Result<Execution, RunError> {
    let mut trace = vec![MachineState::initial()];
    let mut public_values = Vec::new();

    loop {
        let current = &trace[trace.len() - 1];
        if current.halted {
            break;
        }
        if trace.len() >= max_rows {
            return Err(RunError::DidNotHalt(max_rows - 1));
        }

        if let Some(instr) = program.fetch(current.pc) {
            if instr.opcode == Opcode::COMMIT {
                public_values.push(current.regs[instr.rs1 as usize]);
            }
        }
        let next = current
            .step(program, stdin)
            .map_err(|fault| RunError::Fault { step: trace.len() - 1, fault })?;
        trace.push(next);
    }

    let padded = trace.len().next_power_of_two().max(2);
    let halted = trace[trace.len() - 1].clone();
    trace.resize(padded, halted);

    Ok(Execution { trace, public_values })
}
