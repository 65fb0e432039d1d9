//! The execution engine.
//!
//! - 32-register file with a hardwired `zero` register
//! - byte-addressed, word-backed memory with unaligned access
//! - LW, SW, ADD, ADDI, SUB, NOP, BEQ and BNE semantics

pub mod memory;
pub mod registers;
pub mod instruction;
pub mod execute;

pub use memory::{AddressSpace, MemoryError};
pub use registers::{Register, RegisterFile, RegisterParseError};
pub use instruction::Instruction;
pub use execute::{Cpu, CpuError, Flow};
