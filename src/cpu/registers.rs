//! The integer register file.
//!
//! 32 word-wide registers addressed through the closed [`Register`] enum.
//! Register 0 (`zero`) is hardwired: it always reads as 0 and writes to it
//! are discarded.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

/// Number of integer registers.
pub const NUM_REGISTERS: usize = 32;

/// A register identifier, named by its ABI mnemonic.
///
/// `S0` doubles as the frame pointer (`fp`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum Register {
    Zero = 0,
    Ra = 1,
    Sp = 2,
    Gp = 3,
    Tp = 4,
    T0 = 5,
    T1 = 6,
    T2 = 7,
    S0 = 8,
    S1 = 9,
    A0 = 10,
    A1 = 11,
    A2 = 12,
    A3 = 13,
    A4 = 14,
    A5 = 15,
    A6 = 16,
    A7 = 17,
    S2 = 18,
    S3 = 19,
    S4 = 20,
    S5 = 21,
    S6 = 22,
    S7 = 23,
    S8 = 24,
    S9 = 25,
    S10 = 26,
    S11 = 27,
    T3 = 28,
    T4 = 29,
    T5 = 30,
    T6 = 31,
}

/// Canonical ABI names, indexed by register number.
#[rustfmt::skip]
const ABI_NAMES: [&str; NUM_REGISTERS] = [
    "zero", "ra", "sp", "gp", "tp", "t0", "t1", "t2",
    "s0", "s1", "a0", "a1", "a2", "a3", "a4", "a5",
    "a6", "a7", "s2", "s3", "s4", "s5", "s6", "s7",
    "s8", "s9", "s10", "s11", "t3", "t4", "t5", "t6",
];

impl Register {
    /// Frame pointer alias.
    pub const FP: Register = Register::S0;

    /// All registers in index order.
    #[rustfmt::skip]
    pub const ALL: [Register; NUM_REGISTERS] = [
        Register::Zero, Register::Ra, Register::Sp, Register::Gp,
        Register::Tp, Register::T0, Register::T1, Register::T2,
        Register::S0, Register::S1, Register::A0, Register::A1,
        Register::A2, Register::A3, Register::A4, Register::A5,
        Register::A6, Register::A7, Register::S2, Register::S3,
        Register::S4, Register::S5, Register::S6, Register::S7,
        Register::S8, Register::S9, Register::S10, Register::S11,
        Register::T3, Register::T4, Register::T5, Register::T6,
    ];

    /// Register number (0-31).
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Look a register up by number.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Canonical ABI mnemonic.
    pub const fn abi_name(self) -> &'static str {
        ABI_NAMES[self as usize]
    }

    /// Resolve an ABI or architectural (`x0`-`x31`) name.
    pub fn from_name(name: &str) -> Option<Self> {
        name_table().get(name.to_ascii_lowercase().as_str()).copied()
    }
}

/// Name -> register table, built on first use and immutable afterwards.
fn name_table() -> &'static HashMap<String, Register> {
    static TABLE: OnceLock<HashMap<String, Register>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = HashMap::with_capacity(NUM_REGISTERS * 2 + 1);
        for reg in Register::ALL {
            table.insert(reg.abi_name().to_string(), reg);
            table.insert(format!("x{}", reg.index()), reg);
        }
        table.insert("fp".to_string(), Register::FP);
        table
    })
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.abi_name())
    }
}

impl FromStr for Register {
    type Err = RegisterParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| RegisterParseError(s.to_string()))
    }
}

/// An unrecognised register name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown register: {0}")]
pub struct RegisterParseError(pub String);

/// The register file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterFile {
    values: [u32; NUM_REGISTERS],
}

impl RegisterFile {
    /// Create a register file with every register zeroed.
    pub fn new() -> Self {
        Self {
            values: [0; NUM_REGISTERS],
        }
    }

    /// Read a register. `zero` always reads as 0.
    #[inline]
    pub fn read(&self, reg: Register) -> u32 {
        match reg {
            Register::Zero => 0,
            _ => self.values[reg.index()],
        }
    }

    /// Write a register. Writes to `zero` are discarded.
    #[inline]
    pub fn write(&mut self, reg: Register, value: u32) {
        if reg != Register::Zero {
            self.values[reg.index()] = value;
        }
    }

    /// Zero every register.
    pub fn reset(&mut self) {
        self.values = [0; NUM_REGISTERS];
    }

    /// Iterate `(register, value)` pairs in index order.
    pub fn iter(&self) -> impl Iterator<Item = (Register, u32)> + '_ {
        Register::ALL.iter().map(move |&reg| (reg, self.read(reg)))
    }
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}
