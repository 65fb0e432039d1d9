//! The CPU and its instruction semantics.
//!
//! Instructions are invoked directly by a driver; nothing here fetches or
//! decodes. The program counter only moves on a taken branch, advancing
//! past a sequential instruction is the driver's job.

use crate::cpu::memory::MemoryError;
use crate::cpu::{AddressSpace, Instruction, Register, RegisterFile};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What the program counter did after an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Flow {
    /// The pc was left alone.
    Next,
    /// A branch was taken and the pc moved by its offset.
    Branched,
}

/// The CPU.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cpu {
    regs: RegisterFile,
    mem: AddressSpace,
    /// Byte offset of the next instruction in the driver's stream.
    pc: i32,
    /// Instructions dispatched so far.
    cycles: u64,
}

impl Cpu {
    /// Create a new CPU with zeroed registers and default-size memory.
    pub fn new() -> Self {
        Self::with_memory(AddressSpace::new())
    }

    /// Create a new CPU with `capacity` bytes of memory.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_memory(AddressSpace::with_capacity(capacity))
    }

    fn with_memory(mem: AddressSpace) -> Self {
        Self {
            regs: RegisterFile::new(),
            mem,
            pc: 0,
            cycles: 0,
        }
    }

    /// Reset registers, memory and counters to zero.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.mem.clear();
        self.pc = 0;
        self.cycles = 0;
    }

    // ==================== State access ====================

    pub fn regs(&self) -> &RegisterFile {
        &self.regs
    }

    pub fn mem(&self) -> &AddressSpace {
        &self.mem
    }

    pub fn pc(&self) -> i32 {
        self.pc
    }

    /// Move the program counter, e.g. to step past a sequential instruction.
    pub fn set_pc(&mut self, pc: i32) {
        self.pc = pc;
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn read_reg(&self, reg: Register) -> u32 {
        self.regs.read(reg)
    }

    pub fn write_reg(&mut self, reg: Register, value: u32) {
        self.regs.write(reg, value);
    }

    /// Read a memory word.
    ///
    /// # Panics
    /// Panics if the word does not fit inside memory.
    pub fn read_word(&self, addr: usize) -> u32 {
        self.mem.read_word(addr)
    }

    /// Write a memory word.
    ///
    /// # Panics
    /// Panics if the word does not fit inside memory.
    pub fn write_word(&mut self, addr: usize, value: u32) {
        self.mem.write_word(addr, value);
    }

    /// Preload consecutive words, for drivers setting up data.
    pub fn load_words(&mut self, addr: usize, values: &[u32]) -> Result<(), MemoryError> {
        self.mem.load_words(addr, values)
    }

    // ==================== Instructions ====================

    /// `rd := mem[rs1 + offset]`
    pub fn lw(&mut self, rd: Register, rs1: Register, offset: i32) {
        self.dispatch(Instruction::Lw { rd, rs1, offset });
    }

    /// `mem[rs1 + offset] := rs2`
    pub fn sw(&mut self, rs1: Register, rs2: Register, offset: i32) {
        self.dispatch(Instruction::Sw { rs1, rs2, offset });
    }

    /// `rd := rs1 + rs2`
    pub fn add(&mut self, rd: Register, rs1: Register, rs2: Register) {
        self.dispatch(Instruction::Add { rd, rs1, rs2 });
    }

    /// `rd := rs1 + imm`
    pub fn addi(&mut self, rd: Register, rs1: Register, imm: i32) {
        self.dispatch(Instruction::Addi { rd, rs1, imm });
    }

    /// `rd := rs1 - rs2`
    pub fn sub(&mut self, rd: Register, rs1: Register, rs2: Register) {
        self.dispatch(Instruction::Sub { rd, rs1, rs2 });
    }

    pub fn nop(&mut self) {
        self.dispatch(Instruction::Nop);
    }

    /// Branch by `offset` if `rs1 == rs2`. Returns whether it was taken.
    pub fn beq(&mut self, rs1: Register, rs2: Register, offset: i32) -> bool {
        self.dispatch(Instruction::Beq { rs1, rs2, offset }) == Flow::Branched
    }

    /// Branch by `offset` if `rs1 != rs2`. Returns whether it was taken.
    pub fn bne(&mut self, rs1: Register, rs2: Register, offset: i32) -> bool {
        self.dispatch(Instruction::Bne { rs1, rs2, offset }) == Flow::Branched
    }

    /// Execute an instruction, treating a memory fault as fatal.
    fn dispatch(&mut self, instr: Instruction) -> Flow {
        match self.execute(&instr) {
            Ok(flow) => flow,
            Err(e) => panic!("{}: {}", instr, e),
        }
    }

    /// Execute one instruction.
    ///
    /// On error no state changes and no cycle is counted.
    pub fn execute(&mut self, instr: &Instruction) -> Result<Flow, CpuError> {
        let flow = match *instr {
            // ==================== Data Transfer ====================

            Instruction::Lw { rd, rs1, offset } => {
                let addr = self.effective_address(rs1, offset);
                let value = self.mem.try_read_word(addr)?;
                self.regs.write(rd, value);
                Flow::Next
            }

            Instruction::Sw { rs1, rs2, offset } => {
                let addr = self.effective_address(rs1, offset);
                let value = self.regs.read(rs2);
                self.mem.try_write_word(addr, value)?;
                Flow::Next
            }

            // ==================== Arithmetic ====================

            Instruction::Add { rd, rs1, rs2 } => {
                let result = self.regs.read(rs1).wrapping_add(self.regs.read(rs2));
                self.regs.write(rd, result);
                Flow::Next
            }

            Instruction::Addi { rd, rs1, imm } => {
                let result = self.regs.read(rs1).wrapping_add_signed(imm);
                self.regs.write(rd, result);
                Flow::Next
            }

            Instruction::Sub { rd, rs1, rs2 } => {
                let result = self.regs.read(rs1).wrapping_sub(self.regs.read(rs2));
                self.regs.write(rd, result);
                Flow::Next
            }

            Instruction::Nop => {
                // addi zero, zero, 0 never writes anything.
                Flow::Next
            }

            // ==================== Control Flow ====================

            Instruction::Beq { rs1, rs2, offset } => {
                let taken = self.regs.read(rs1) == self.regs.read(rs2);
                self.branch(taken, offset)
            }

            Instruction::Bne { rs1, rs2, offset } => {
                let taken = self.regs.read(rs1) != self.regs.read(rs2);
                self.branch(taken, offset)
            }
        };

        self.cycles += 1;
        Ok(flow)
    }

    /// Base register plus signed byte offset, wrapping like the hardware.
    fn effective_address(&self, base: Register, offset: i32) -> usize {
        self.regs.read(base).wrapping_add_signed(offset) as usize
    }

    fn branch(&mut self, taken: bool, offset: i32) -> Flow {
        if taken {
            self.pc = self.pc.wrapping_add(offset);
            Flow::Branched
        } else {
            Flow::Next
        }
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("pc", &self.pc)
            .field("cycles", &self.cycles)
            .field("regs", &self.regs)
            .field("mem", &self.mem)
            .finish()
    }
}

/// Errors that can occur during instruction execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CpuError {
    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),
}
