//! WebAssembly bindings for the emulator.
//!
//! This module provides JavaScript-friendly wrappers around the driver.

use wasm_bindgen::prelude::*;
use crate::asm::assembler::{assemble, Program};
use crate::asm::disasm::disassemble_instruction;
use crate::config::DEFAULT_MAX_CYCLES;
use crate::cpu::memory::DEFAULT_CAPACITY;
use crate::cpu::Register;
use crate::diag;
use crate::driver::Machine;

/// Initialize panic hook for better error messages in console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// WebAssembly-friendly machine wrapper.
#[wasm_bindgen]
pub struct WasmMachine {
    machine: Machine,
}

#[wasm_bindgen]
impl WasmMachine {
    /// Create an empty machine.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Result<WasmMachine, JsError> {
        let machine = Machine::new(Program::default(), DEFAULT_CAPACITY)
            .map_err(|e| JsError::new(&e.to_string()))?;
        Ok(Self { machine })
    }

    /// Load a program from assembly source. Returns the instruction count.
    #[wasm_bindgen]
    pub fn load_asm(&mut self, source: &str) -> Result<usize, JsError> {
        let program = assemble(source).map_err(|e| JsError::new(&e.to_string()))?;
        let len = program.len();
        self.machine = Machine::new(program, DEFAULT_CAPACITY)
            .map_err(|e| JsError::new(&e.to_string()))?;
        Ok(len)
    }

    /// Step one instruction. Returns its disassembly, or an empty string on halt.
    #[wasm_bindgen]
    pub fn step(&mut self) -> Result<String, JsError> {
        let pc = self.machine.cpu().pc();
        let instr = self.machine.step().map_err(|e| JsError::new(&e.to_string()))?;
        Ok(instr.map(|i| disassemble_instruction(pc, &i)).unwrap_or_default())
    }

    /// Run until halt. Returns the total cycle count.
    #[wasm_bindgen]
    pub fn run(&mut self, max_cycles: Option<u32>) -> Result<u64, JsError> {
        let budget = max_cycles.map_or(DEFAULT_MAX_CYCLES, u64::from);
        self.machine.run(budget).map_err(|e| JsError::new(&e.to_string()))?;
        Ok(self.machine.cpu().cycles())
    }

    /// Reload the current program.
    #[wasm_bindgen]
    pub fn reset(&mut self) -> Result<(), JsError> {
        self.machine.reset().map_err(|e| JsError::new(&e.to_string()))
    }

    #[wasm_bindgen]
    pub fn is_running(&self) -> bool {
        self.machine.is_running()
    }

    #[wasm_bindgen]
    pub fn is_halted(&self) -> bool {
        self.machine.is_halted()
    }

    #[wasm_bindgen]
    pub fn cycles(&self) -> u64 {
        self.machine.cpu().cycles()
    }

    #[wasm_bindgen]
    pub fn pc(&self) -> i32 {
        self.machine.cpu().pc()
    }

    #[wasm_bindgen]
    pub fn state(&self) -> String {
        format!("{:?}", self.machine.state)
    }

    /// Register value by number (0-31); out-of-range numbers read as 0.
    #[wasm_bindgen]
    pub fn register(&self, index: usize) -> u32 {
        Register::from_index(index)
            .map(|reg| self.machine.cpu().read_reg(reg))
            .unwrap_or(0)
    }

    /// Register value by ABI or `xN` name.
    #[wasm_bindgen]
    pub fn register_named(&self, name: &str) -> Result<u32, JsError> {
        let reg: Register = name.parse().map_err(|e: crate::cpu::RegisterParseError| JsError::new(&e.to_string()))?;
        Ok(self.machine.cpu().read_reg(reg))
    }

    /// All 32 registers in index order.
    #[wasm_bindgen]
    pub fn registers(&self) -> Vec<u32> {
        self.machine.cpu().regs().iter().map(|(_, v)| v).collect()
    }

    /// Raw memory words.
    #[wasm_bindgen]
    pub fn memory_words(&self) -> Vec<u32> {
        self.machine.cpu().mem().words().to_vec()
    }

    /// Formatted register dump.
    #[wasm_bindgen]
    pub fn reg_dump(&self) -> String {
        diag::reg_dump(self.machine.cpu().regs())
    }

    /// Formatted hex dump of the first `len` bytes.
    #[wasm_bindgen]
    pub fn hex_dump(&self, len: usize) -> String {
        diag::hex_dump(self.machine.cpu().mem(), len)
    }

    /// Whole CPU state as JSON.
    #[wasm_bindgen]
    pub fn snapshot_json(&self) -> Result<String, JsError> {
        serde_json::to_string(self.machine.cpu()).map_err(|e| JsError::new(&e.to_string()))
    }
}

/// Assemble source code and return instruction count.
#[wasm_bindgen]
pub fn wasm_assemble(source: &str) -> Result<usize, JsError> {
    let program = assemble(source).map_err(|e| JsError::new(&e.to_string()))?;
    Ok(program.len())
}
