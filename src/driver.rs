//! Fetch loop around the CPU.
//!
//! The CPU only executes what it is handed. A [`Machine`] pairs it with an
//! assembled [`Program`], fetches the instruction at `pc / 4`, and advances
//! the pc past every instruction that did not branch.

use crate::asm::Program;
use crate::cpu::{Cpu, CpuError, Flow, Instruction, MemoryError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bytes per instruction in the program stream.
pub const INSTRUCTION_SIZE: i32 = 4;

/// Machine execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MachineState {
    /// More instructions to run.
    Running,
    /// The pc reached the end of the program.
    Halted,
    /// An instruction or fetch failed.
    Error,
}

/// A CPU running an assembled program.
#[derive(Debug, Clone)]
pub struct Machine {
    cpu: Cpu,
    program: Program,
    memory_bytes: usize,
    pub state: MachineState,
}

impl Machine {
    /// Load `program` into a fresh CPU with `memory_bytes` of memory.
    pub fn new(program: Program, memory_bytes: usize) -> Result<Self, DriverError> {
        let mut machine = Self {
            cpu: Cpu::with_capacity(memory_bytes),
            program,
            memory_bytes,
            state: MachineState::Running,
        };
        machine.reset()?;
        Ok(machine)
    }

    /// Reload the program: zeroed CPU, preloaded data, pc = 0.
    pub fn reset(&mut self) -> Result<(), DriverError> {
        self.cpu = Cpu::with_capacity(self.memory_bytes);
        for &(addr, value) in &self.program.data {
            self.cpu.load_words(addr as usize, &[value])?;
        }
        self.state = if self.program.is_empty() {
            MachineState::Halted
        } else {
            MachineState::Running
        };
        log::debug!(
            "loaded {} instructions, {} data words",
            self.program.len(),
            self.program.data.len()
        );
        Ok(())
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn is_running(&self) -> bool {
        self.state == MachineState::Running
    }

    pub fn is_halted(&self) -> bool {
        self.state == MachineState::Halted
    }

    /// The instruction at `pc`, if `pc` is a valid instruction address.
    pub fn instruction_at(&self, pc: i32) -> Option<&Instruction> {
        if pc < 0 || pc % INSTRUCTION_SIZE != 0 {
            return None;
        }
        self.program.instructions.get((pc / INSTRUCTION_SIZE) as usize)
    }

    /// Source line of the instruction at `pc`, when the program records one.
    pub fn source_line(&self, pc: i32) -> Option<usize> {
        self.instruction_at(pc)?;
        self.program.source_lines.get((pc / INSTRUCTION_SIZE) as usize).copied()
    }

    /// Whether the pc sits just past the last instruction.
    fn at_end(&self) -> bool {
        self.cpu.pc() == self.program.len() as i32 * INSTRUCTION_SIZE
    }

    /// Execute a single instruction.
    ///
    /// Returns the instruction that was executed, or `None` if the pc has
    /// just run off the end of the program.
    pub fn step(&mut self) -> Result<Option<Instruction>, DriverError> {
        if self.state != MachineState::Running {
            return Err(DriverError::NotRunning(self.state));
        }

        let pc = self.cpu.pc();
        if self.at_end() {
            self.state = MachineState::Halted;
            log::debug!("halted at pc={} after {} cycles", pc, self.cpu.cycles());
            return Ok(None);
        }

        // Fetch
        let instr = match self.instruction_at(pc) {
            Some(instr) => *instr,
            None => {
                self.state = MachineState::Error;
                return Err(DriverError::BadPc { pc, len: self.program.len() });
            }
        };

        // Execute
        let flow = match self.cpu.execute(&instr) {
            Ok(flow) => flow,
            Err(e) => {
                self.state = MachineState::Error;
                return Err(DriverError::Execute {
                    pc,
                    line: self.source_line(pc).unwrap_or(0),
                    instruction: instr.to_string(),
                    source: e,
                });
            }
        };

        if flow == Flow::Next {
            self.cpu.set_pc(pc + INSTRUCTION_SIZE);
        }
        log::trace!("{:04}: {:<24} -> pc={}", pc, instr, self.cpu.pc());

        Ok(Some(instr))
    }

    /// Run until the program halts.
    ///
    /// Returns the number of instructions executed. Running more than
    /// `max_cycles` instructions is an error.
    pub fn run(&mut self, max_cycles: u64) -> Result<u64, DriverError> {
        self.run_with(max_cycles, |_, _| {})
    }

    /// Like [`Machine::run`], calling `on_step` with the pc and instruction
    /// after each one executes.
    pub fn run_with<F>(&mut self, max_cycles: u64, mut on_step: F) -> Result<u64, DriverError>
    where
        F: FnMut(i32, &Instruction),
    {
        let start = self.cpu.cycles();

        while self.is_running() {
            // Only an instruction past the budget counts; reaching the end does not.
            if self.cpu.cycles() - start >= max_cycles && !self.at_end() {
                return Err(DriverError::CycleLimit(max_cycles));
            }
            let pc = self.cpu.pc();
            if let Some(instr) = self.step()? {
                on_step(pc, &instr);
            }
        }

        Ok(self.cpu.cycles() - start)
    }
}

/// Errors that can occur while driving a program.
#[derive(Debug, Clone, Error)]
pub enum DriverError {
    #[error("machine not running: {0:?}")]
    NotRunning(MachineState),

    #[error("pc {pc} does not address one of the {len} instructions")]
    BadPc { pc: i32, len: usize },

    #[error("{instruction} at pc {pc} (line {line}): {source}")]
    Execute {
        pc: i32,
        line: usize,
        instruction: String,
        source: CpuError,
    },

    #[error("data preload failed: {0}")]
    Preload(#[from] MemoryError),

    #[error("cycle limit of {0} reached")]
    CycleLimit(u64),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::assemble;
    use crate::cpu::memory::DEFAULT_CAPACITY;
    use crate::cpu::Register::*;

    fn machine(source: &str) -> Machine {
        Machine::new(assemble(source).unwrap(), DEFAULT_CAPACITY).unwrap()
    }

    #[test]
    fn test_load_add_store_program() {
        let mut m = machine(
            r#"
            .word 0 9
            .word 4 5
            lw  t1, 0(zero)
            lw  t2, 4(zero)
            add t1, t1, t2
            sw  t1, 8(zero)
            "#,
        );

        assert_eq!(m.run(100).unwrap(), 4);
        assert!(m.is_halted());
        assert_eq!(m.cpu().read_reg(T1), 14);
        assert_eq!(m.cpu().read_word(8), 14);
        assert_eq!(m.cpu().pc(), 16);
    }

    #[test]
    fn test_countdown_loop() {
        let mut m = machine(
            r#"
                addi t0, zero, 5
            loop:
                addi a0, a0, 3
                addi t0, t0, -1
                bne  t0, zero, loop
            "#,
        );

        let cycles = m.run(1000).unwrap();
        assert_eq!(m.cpu().read_reg(A0), 15);
        assert_eq!(m.cpu().read_reg(T0), 0);
        assert_eq!(cycles, 1 + 5 * 3);
    }

    #[test]
    fn test_forward_branch_skips() {
        let mut m = machine(
            r#"
                beq  t0, t0, skip
                addi a0, zero, 1
            skip:
                addi a1, zero, 2
            "#,
        );

        m.run(10).unwrap();
        assert_eq!(m.cpu().read_reg(A0), 0);
        assert_eq!(m.cpu().read_reg(A1), 2);
    }

    #[test]
    fn test_step_reports_instruction_then_halt() {
        let mut m = machine("nop");
        assert_eq!(m.step().unwrap(), Some(Instruction::Nop));
        assert_eq!(m.step().unwrap(), None);
        assert!(m.is_halted());
        assert!(matches!(m.step(), Err(DriverError::NotRunning(MachineState::Halted))));
    }

    #[test]
    fn test_empty_program_is_halted() {
        let m = machine("# nothing");
        assert!(m.is_halted());
    }

    #[test]
    fn test_misaligned_branch_target() {
        let mut m = machine("beq zero, zero, 2\nnop");
        m.step().unwrap();
        assert!(matches!(m.step(), Err(DriverError::BadPc { pc: 2, .. })));
        assert_eq!(m.state, MachineState::Error);
    }

    #[test]
    fn test_memory_fault_is_reported() {
        let mut m = machine("lw t0, -4(zero)");
        let err = m.run(10).unwrap_err();
        assert!(matches!(err, DriverError::Execute { pc: 0, .. }));
        assert!(err.to_string().contains("out of range"));
        assert_eq!(m.state, MachineState::Error);
    }

    #[test]
    fn test_cycle_limit() {
        let mut m = machine("spin: beq zero, zero, spin");
        assert!(matches!(m.run(50), Err(DriverError::CycleLimit(50))));
        assert_eq!(m.cpu().cycles(), 50);
    }

    #[test]
    fn test_program_filling_budget_halts() {
        let mut m = machine("nop");
        assert_eq!(m.run(1).unwrap(), 1);
        assert!(m.is_halted());

        let mut m = machine("addi t0, zero, 1\naddi t0, t0, 1\naddi t0, t0, 1");
        assert_eq!(m.run(3).unwrap(), 3);
        assert!(m.is_halted());
        assert_eq!(m.cpu().read_reg(T0), 3);
    }

    #[test]
    fn test_budget_one_short_is_an_error() {
        let mut m = machine("nop\nnop");
        assert!(matches!(m.run(1), Err(DriverError::CycleLimit(1))));
        assert!(m.is_running());
        assert_eq!(m.run(1).unwrap(), 1);
        assert!(m.is_halted());
    }

    #[test]
    fn test_run_with_reports_each_instruction() {
        let mut m = machine("addi a0, zero, 1\nnop");
        let mut seen = Vec::new();
        m.run_with(10, |pc, instr| seen.push((pc, *instr))).unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0, 0);
        assert_eq!(seen[1], (4, Instruction::Nop));
    }

    #[test]
    fn test_fault_names_source_line() {
        let mut m = machine("# header\n\nnop\nlw t0, -4(zero)");
        assert_eq!(m.source_line(4), Some(4));
        assert_eq!(m.source_line(8), None);
        let err = m.run(10).unwrap_err();
        assert!(matches!(err, DriverError::Execute { pc: 4, line: 4, .. }));
        assert!(err.to_string().contains("(line 4)"));
    }

    #[test]
    fn test_reset_reloads_data() {
        let mut m = machine(".word 12 77\nsw zero, 12(zero)");
        m.run(10).unwrap();
        assert_eq!(m.cpu().read_word(12), 0);

        m.reset().unwrap();
        assert!(m.is_running());
        assert_eq!(m.cpu().read_word(12), 77);
        assert_eq!(m.cpu().cycles(), 0);
    }

    #[test]
    fn test_preload_out_of_range() {
        let program = assemble(".word 4096 1").unwrap();
        assert!(matches!(
            Machine::new(program, DEFAULT_CAPACITY),
            Err(DriverError::Preload(MemoryError::OutOfRange { .. }))
        ));
    }
}
