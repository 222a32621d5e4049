//! Instruction set of the zkVM
//!
//! Eight 32-bit registers, wrapping arithmetic, and a fixed 8-byte
//! instruction encoding `[opcode, rd, rs1, rs2, imm (u32 LE)]`.

pub const NUM_REGS: usize = 8;
pub const INSTRUCTION_BYTES: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    /// rd = rs1 + rs2 (wrapping addition)
    ADD = 0x00,
    /// rd = rs1 - rs2 (wrapping subtraction)
    SUB = 0x01,
    /// rd = rs1 * rs2 (lower 32 bits)
    MUL = 0x02,
    /// rd = rs1 & rs2
    AND = 0x03,
    /// rd = rs1 | rs2
    OR = 0x04,
    /// rd = rs1 ^ rs2
    XOR = 0x05,
    /// rd = imm
    LI = 0x08,
    /// rd = rs1 + imm (wrapping)
    ADDI = 0x0A,
    /// if rs1 == rs2 { pc = imm }
    BEQ = 0x10,
    /// if rs1 != rs2 { pc = imm }
    BNE = 0x11,
    /// pc = imm
    JMP = 0x12,
    /// rd = next word of private input
    READ = 0x20,
    /// append rs1 to the public values
    COMMIT = 0x21,
    /// stop; every later step repeats this state
    HALT = 0xFF,
}

impl Opcode {
    pub fn from_u8(val: u8) -> Option<Self> {
        match val {
            0x00 => Some(Opcode::ADD),
            0x01 => Some(Opcode::SUB),
            0x02 => Some(Opcode::MUL),
            0x03 => Some(Opcode::AND),
            0x04 => Some(Opcode::OR),
            0x05 => Some(Opcode::XOR),
            0x08 => Some(Opcode::LI),
            0x0A => Some(Opcode::ADDI),
            0x10 => Some(Opcode::BEQ),
            0x11 => Some(Opcode::BNE),
            0x12 => Some(Opcode::JMP),
            0x20 => Some(Opcode::READ),
            0x21 => Some(Opcode::COMMIT),
            0xFF => Some(Opcode::HALT),
            _ => None,
        }
    }

    /// Which of (rd, rs1, rs2, imm) the opcode reads; unused fields must be zero
    pub(crate) fn operands(self) -> (bool, bool, bool, bool) {
        match self {
            Opcode::ADD | Opcode::SUB | Opcode::MUL | Opcode::AND | Opcode::OR | Opcode::XOR => {
                (true, true, true, false)
            }
            Opcode::LI => (true, false, false, true),
            Opcode::ADDI => (true, true, false, true),
            Opcode::BEQ | Opcode::BNE => (false, true, true, true),
            Opcode::JMP => (false, false, false, true),
            Opcode::READ => (true, false, false, false),
            Opcode::COMMIT => (false, true, false, false),
            Opcode::HALT => (false, false, false, false),
        }
    }

    pub fn is_jump(self) -> bool {
        matches!(self, Opcode::BEQ | Opcode::BNE | Opcode::JMP)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub rd: u8,
    pub rs1: u8,
    pub rs2: u8,
    pub imm: u32,
}

impl Instruction {
    /// Register-register ALU instruction
    pub fn new_rrr(opcode: Opcode, rd: u8, rs1: u8, rs2: u8) -> Self {
        Self { opcode, rd, rs1, rs2, imm: 0 }
    }

    pub fn li(rd: u8, imm: u32) -> Self {
        Self { opcode: Opcode::LI, rd, rs1: 0, rs2: 0, imm }
    }

    pub fn addi(rd: u8, rs1: u8, imm: u32) -> Self {
        Self { opcode: Opcode::ADDI, rd, rs1, rs2: 0, imm }
    }

    pub fn beq(rs1: u8, rs2: u8, target: u32) -> Self {
        Self { opcode: Opcode::BEQ, rd: 0, rs1, rs2, imm: target }
    }

    pub fn bne(rs1: u8, rs2: u8, target: u32) -> Self {
        Self { opcode: Opcode::BNE, rd: 0, rs1, rs2, imm: target }
    }

    pub fn jmp(target: u32) -> Self {
        Self { opcode: Opcode::JMP, rd: 0, rs1: 0, rs2: 0, imm: target }
    }

    pub fn read(rd: u8) -> Self {
        Self { opcode: Opcode::READ, rd, rs1: 0, rs2: 0, imm: 0 }
    }

    pub fn commit(rs1: u8) -> Self {
        Self { opcode: Opcode::COMMIT, rd: 0, rs1, rs2: 0, imm: 0 }
    }

    pub fn halt() -> Self {
        Self { opcode: Opcode::HALT, rd: 0, rs1: 0, rs2: 0, imm: 0 }
    }

    pub fn to_bytes(&self) -> [u8; INSTRUCTION_BYTES] {
        let imm = self.imm.to_le_bytes();
        [self.opcode as u8, self.rd, self.rs1, self.rs2, imm[0], imm[1], imm[2], imm[3]]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_roundtrip() {
        for byte in 0..=255u8 {
            if let Some(op) = Opcode::from_u8(byte) {
                assert_eq!(op as u8, byte);
            }
        }
        assert!(Opcode::from_u8(0x06).is_none());
        assert!(Opcode::from_u8(0x09).is_none());
    }

    #[test]
    fn test_instruction_layout() {
        let bytes = Instruction::beq(4, 1, 0x0102_0304).to_bytes();
        assert_eq!(bytes, [0x10, 0, 4, 1, 4, 3, 2, 1]);
    }
}
