//! Disassembly listings.
//!
//! Instructions format themselves; this adds pc addresses and, for branches,
//! the absolute target.

use crate::cpu::Instruction;
use crate::driver::INSTRUCTION_SIZE;

/// Format one instruction at `pc`, annotating branch targets.
pub fn disassemble_instruction(pc: i32, instr: &Instruction) -> String {
    match instr.branch_offset() {
        Some(offset) => format!("{:<24} # -> {:04}", instr, pc.wrapping_add(offset)),
        None => instr.to_string(),
    }
}

/// Disassemble a whole instruction stream.
pub fn disassemble(instructions: &[Instruction]) -> String {
    let mut output = String::new();
    output.push_str("# pc    instruction\n");
    output.push_str("# ----  -----------\n");

    for (i, instr) in instructions.iter().enumerate() {
        let pc = i as i32 * INSTRUCTION_SIZE;
        output.push_str(&format!("{:04}:   {}\n", pc, disassemble_instruction(pc, instr)));
    }

    output
}
