//! # HardwareLab Emulator
//!
//! An instructional emulator for a reduced, RISC-V inspired instruction set.
//!
//! The core ([`cpu`]) is a 32-register file with a hardwired `zero`
//! register, a byte-addressed memory that supports unaligned word access,
//! and the semantics of LW, SW, ADD, ADDI, SUB, NOP, BEQ and BNE. Everything
//! else (tokenizing, assembling, the fetch loop, dumps, the debugger) sits
//! outside it and only uses its public surface.

pub mod cpu;
pub mod asm;
pub mod config;
pub mod diag;
pub mod driver;

#[cfg(feature = "tui")]
pub mod tui;

#[cfg(feature = "wasm")]
pub mod wasm;

// Re-export commonly used types
pub use cpu::{AddressSpace, Cpu, CpuError, Flow, Instruction, MemoryError, Register, RegisterFile};
pub use asm::{assemble, disassemble, tokenize, AssemblerError, Program};
pub use config::Config;
pub use driver::{DriverError, Machine, MachineState};

#[cfg(feature = "tui")]
pub use tui::run_debugger;
