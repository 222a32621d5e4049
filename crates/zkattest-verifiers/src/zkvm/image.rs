//! Program images and the verifying keys derived from them
//!
//! Layout:
//!
//! ```text
//! magic    4 bytes   0x7f 'Z' 'K' 'V'
//! version  u8        = 1
//! reserved 3 bytes   zero
//! count    u32 LE    number of instructions
//! code     count * 8 bytes
//! ```

use sha2::{Digest, Sha256};
use thiserror::Error;

use super::isa::{Instruction, Opcode, INSTRUCTION_BYTES, NUM_REGS};

pub const IMAGE_MAGIC: [u8; 4] = [0x7f, b'Z', b'K', b'V'];
pub const IMAGE_VERSION: u8 = 1;
pub const MAX_INSTRUCTIONS: usize = 1 << 16;

const HEADER_BYTES: usize = 12;
const VK_DOMAIN: &[u8] = b"zkattest/zkvm/vk/v1";

pub type VerifyingKey = [u8; 32];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageError {
    #[error("image shorter than its header")]
    Truncated,
    #[error("bad image magic")]
    BadMagic,
    #[error("unsupported image version {0}")]
    UnsupportedVersion(u8),
    #[error("reserved header bytes must be zero")]
    ReservedNotZero,
    #[error("image has no instructions")]
    Empty,
    #[error("image has {0} instructions, limit is {MAX_INSTRUCTIONS}")]
    TooLarge(usize),
    #[error("code section is {actual} bytes, header declares {expected}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("unknown opcode {opcode:#04x} at {index}")]
    UnknownOpcode { index: usize, opcode: u8 },
    #[error("register {register} out of range at {index}")]
    InvalidRegister { index: usize, register: u8 },
    #[error("unused operand is not zero at {index}")]
    UnusedOperand { index: usize },
    #[error("jump target {target} out of range at {index}")]
    JumpOutOfRange { index: usize, target: u32 },
}

/// A parsed, fully validated program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramImage {
    instructions: Vec<Instruction>,
}

fn decode_instruction(index: usize, raw: &[u8], len: usize) -> Result<Instruction, ImageError> {
    let opcode = Opcode::from_u8(raw[0]).ok_or(ImageError::UnknownOpcode {
        index,
        opcode: raw[0],
    })?;
    let (rd, rs1, rs2, imm) = (
        raw[1],
        raw[2],
        raw[3],
        u32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]),
    );
    let (uses_rd, uses_rs1, uses_rs2, uses_imm) = opcode.operands();

    for (used, value) in [(uses_rd, rd), (uses_rs1, rs1), (uses_rs2, rs2)] {
        if !used && value != 0 {
            return Err(ImageError::UnusedOperand { index });
        }
        if value as usize >= NUM_REGS {
            return Err(ImageError::InvalidRegister { index, register: value });
        }
    }
    if !uses_imm && imm != 0 {
        return Err(ImageError::UnusedOperand { index });
    }
    if opcode.is_jump() && imm as usize >= len {
        return Err(ImageError::JumpOutOfRange { index, target: imm });
    }

    Ok(Instruction { opcode, rd, rs1, rs2, imm })
}

impl ProgramImage {
    pub fn new(instructions: Vec<Instruction>) -> Result<Self, ImageError> {
        let mut bytes = Vec::new();
        encode_into(&instructions, &mut bytes);
        Self::parse(&bytes)
    }

    pub fn parse(bytes: &[u8]) -> Result<Self, ImageError> {
        if bytes.len() < HEADER_BYTES {
            return Err(ImageError::Truncated);
        }
        if bytes[..4] != IMAGE_MAGIC {
            return Err(ImageError::BadMagic);
        }
        if bytes[4] != IMAGE_VERSION {
            return Err(ImageError::UnsupportedVersion(bytes[4]));
        }
        if bytes[5..8] != [0, 0, 0] {
            return Err(ImageError::ReservedNotZero);
        }

        let count = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
        if count == 0 {
            return Err(ImageError::Empty);
        }
        if count > MAX_INSTRUCTIONS {
            return Err(ImageError::TooLarge(count));
        }

        let code = &bytes[HEADER_BYTES..];
        if code.len() != count * INSTRUCTION_BYTES {
            return Err(ImageError::LengthMismatch {
                expected: count * INSTRUCTION_BYTES,
                actual: code.len(),
            });
        }

        let instructions = code
            .chunks_exact(INSTRUCTION_BYTES)
            .enumerate()
            .map(|(i, raw)| decode_instruction(i, raw, count))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { instructions })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_BYTES + self.instructions.len() * INSTRUCTION_BYTES);
        encode_into(&self.instructions, &mut bytes);
        bytes
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn fetch(&self, pc: u32) -> Option<&Instruction> {
        self.instructions.get(pc as usize)
    }

    /// Key every proof for this program must carry
    pub fn verifying_key(&self) -> VerifyingKey {
        verifying_key_for(&self.to_bytes())
    }
}

fn encode_into(instructions: &[Instruction], out: &mut Vec<u8>) {
    out.extend_from_slice(&IMAGE_MAGIC);
    out.push(IMAGE_VERSION);
    out.extend_from_slice(&[0, 0, 0]);
    out.extend_from_slice(&(instructions.len() as u32).to_le_bytes());
    for instr in instructions {
        out.extend_from_slice(&instr.to_bytes());
    }
}

/// SHA-256 over a domain tag and the raw image bytes
pub fn verifying_key_for(image_bytes: &[u8]) -> VerifyingKey {
    let mut hasher = Sha256::new();
    hasher.update(VK_DOMAIN);
    hasher.update(image_bytes);
    hasher.finalize().into()
}
