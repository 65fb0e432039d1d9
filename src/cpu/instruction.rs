//! Resolved instructions.
//!
//! The core never decodes text or machine encodings. An [`Instruction`]
//! already carries resolved registers and immediates.

use crate::cpu::Register;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A supported instruction with its operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    // ==================== Data Transfer ====================

    /// Load word: rd := mem[rs1 + offset]
    Lw { rd: Register, rs1: Register, offset: i32 },

    /// Store word: mem[rs1 + offset] := rs2
    Sw { rs1: Register, rs2: Register, offset: i32 },

    // ==================== Arithmetic ====================

    /// rd := rs1 + rs2 (wrapping)
    Add { rd: Register, rs1: Register, rs2: Register },

    /// rd := rs1 + imm (wrapping)
    Addi { rd: Register, rs1: Register, imm: i32 },

    /// rd := rs1 - rs2 (wrapping)
    Sub { rd: Register, rs1: Register, rs2: Register },

    /// addi zero, zero, 0
    Nop,

    // ==================== Control Flow ====================

    /// pc := pc + offset if rs1 == rs2
    Beq { rs1: Register, rs2: Register, offset: i32 },

    /// pc := pc + offset if rs1 != rs2
    Bne { rs1: Register, rs2: Register, offset: i32 },
}

impl Instruction {
    /// Lower-case assembly mnemonic.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Instruction::Lw { .. } => "lw",
            Instruction::Sw { .. } => "sw",
            Instruction::Add { .. } => "add",
            Instruction::Addi { .. } => "addi",
            Instruction::Sub { .. } => "sub",
            Instruction::Nop => "nop",
            Instruction::Beq { .. } => "beq",
            Instruction::Bne { .. } => "bne",
        }
    }

    /// The pc-relative offset of a conditional branch.
    pub fn branch_offset(&self) -> Option<i32> {
        match *self {
            Instruction::Beq { offset, .. } | Instruction::Bne { offset, .. } => Some(offset),
            _ => None,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.mnemonic();
        match *self {
            Instruction::Lw { rd, rs1, offset } => write!(f, "{} {}, {}({})", m, rd, offset, rs1),
            Instruction::Sw { rs1, rs2, offset } => write!(f, "{} {}, {}({})", m, rs2, offset, rs1),
            Instruction::Add { rd, rs1, rs2 } | Instruction::Sub { rd, rs1, rs2 } => {
                write!(f, "{} {}, {}, {}", m, rd, rs1, rs2)
            }
            Instruction::Addi { rd, rs1, imm } => write!(f, "{} {}, {}, {}", m, rd, rs1, imm),
            Instruction::Nop => f.write_str(m),
            Instruction::Beq { rs1, rs2, offset } | Instruction::Bne { rs1, rs2, offset } => {
                write!(f, "{} {}, {}, {}", m, rs1, rs2, offset)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let lw = Instruction::Lw { rd: Register::T1, rs1: Register::Zero, offset: 0 };
        assert_eq!(lw.to_string(), "lw t1, 0(zero)");

        let sw = Instruction::Sw { rs1: Register::Sp, rs2: Register::A0, offset: -8 };
        assert_eq!(sw.to_string(), "sw a0, -8(sp)");

        let add = Instruction::Add { rd: Register::T1, rs1: Register::T1, rs2: Register::T2 };
        assert_eq!(add.to_string(), "add t1, t1, t2");

        let bne = Instruction::Bne { rs1: Register::T0, rs2: Register::Zero, offset: -12 };
        assert_eq!(bne.to_string(), "bne t0, zero, -12");

        assert_eq!(Instruction::Nop.to_string(), "nop");
    }

    #[test]
    fn test_branch_offset() {
        let beq = Instruction::Beq { rs1: Register::T0, rs2: Register::T0, offset: -8 };
        assert_eq!(beq.branch_offset(), Some(-8));
        assert_eq!(Instruction::Sw { rs1: Register::Sp, rs2: Register::A0, offset: 4 }.branch_offset(), None);
        assert_eq!(Instruction::Nop.branch_offset(), None);
    }
}
