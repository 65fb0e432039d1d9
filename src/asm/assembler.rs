//! Two-pass assembler from token lines to resolved instructions.
//!
//! Syntax:
//! ```text
//! # Comment
//!         .word 0 9           # preload memory: .word ADDR VALUE
//! start:  lw   t1, 0(zero)    # rd, offset(rs1)
//!         lw   t2 zero 4      # rd rs1 offset
//!         add  t1, t1, t2
//!         addi t0, t0, -1
//!         sw   t1, 8(zero)    # rs2, offset(rs1)
//!         bne  t0, zero, start
//!         beq  t0, t0, 8      # numeric byte offset
//!         nop
//! ```
//!
//! Branch targets that are labels become `label_pc - pc` byte offsets.

use crate::asm::tokenizer::{tokenize, TokenLine};
use crate::cpu::{Instruction, Register};
use crate::driver::INSTRUCTION_SIZE;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::num::IntErrorKind;
use thiserror::Error;

/// An assembled program.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    /// Instructions in stream order; instruction `i` lives at pc `4 * i`.
    pub instructions: Vec<Instruction>,
    /// `(address, value)` words to store before running.
    pub data: Vec<(u32, u32)>,
    /// Label -> pc.
    pub labels: BTreeMap<String, i32>,
    /// Source line of each instruction.
    pub source_lines: Vec<usize>,
}

impl Program {
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

/// Assemble source text.
pub fn assemble(source: &str) -> Result<Program, AssemblerError> {
    assemble_lines(tokenize(source))
}

/// Assemble already tokenized lines.
pub fn assemble_lines<I>(lines: I) -> Result<Program, AssemblerError>
where
    I: IntoIterator<Item = TokenLine>,
{
    let mut asm = Assembler::default();

    // Pass 1: place labels and statements.
    for line in lines {
        asm.place(line)?;
    }

    // Pass 2: resolve operands.
    asm.finish()
}

/// A statement waiting for pass 2.
struct Statement {
    line: usize,
    pc: i32,
    tokens: Vec<String>,
}

#[derive(Default)]
struct Assembler {
    labels: BTreeMap<String, i32>,
    statements: Vec<Statement>,
    next_pc: i32,
}

impl Assembler {
    fn place(&mut self, line: TokenLine) -> Result<(), AssemblerError> {
        let TokenLine { line, mut tokens } = line;

        // Leading `label:` tokens
        while let Some(label) = tokens.first().and_then(|t| t.strip_suffix(':')) {
            if !is_identifier(label) {
                return Err(AssemblerError::SyntaxError {
                    line,
                    message: format!("invalid label '{}'", label),
                });
            }
            if self.labels.insert(label.to_string(), self.next_pc).is_some() {
                return Err(AssemblerError::DuplicateLabel {
                    line,
                    label: label.to_string(),
                });
            }
            tokens.remove(0);
        }

        if tokens.is_empty() {
            return Ok(());
        }

        let emits = !tokens[0].starts_with('.');
        self.statements.push(Statement {
            line,
            pc: self.next_pc,
            tokens,
        });
        if emits {
            self.next_pc += INSTRUCTION_SIZE;
        }
        Ok(())
    }

    fn finish(self) -> Result<Program, AssemblerError> {
        let mut program = Program::default();

        for stmt in &self.statements {
            let mnemonic = stmt.tokens[0].to_ascii_lowercase();
            if mnemonic.starts_with('.') {
                self.directive(&mnemonic, stmt, &mut program)?;
            } else {
                let instr = self.instruction(&mnemonic, stmt)?;
                program.instructions.push(instr);
                program.source_lines.push(stmt.line);
            }
        }

        program.labels = self.labels;
        Ok(program)
    }

    fn directive(&self, name: &str, stmt: &Statement, program: &mut Program) -> Result<(), AssemblerError> {
        match name {
            ".word" => {
                let [addr, value] = operands::<2>(stmt)?;
                let addr = parse_word(addr, stmt.line)?;
                let value = parse_word(value, stmt.line)?;
                program.data.push((addr, value));
                Ok(())
            }
            _ => Err(AssemblerError::UnknownMnemonic {
                line: stmt.line,
                mnemonic: name.to_string(),
            }),
        }
    }

    fn instruction(&self, mnemonic: &str, stmt: &Statement) -> Result<Instruction, AssemblerError> {
        let line = stmt.line;

        let instr = match mnemonic {
            // Data transfer
            "lw" => match &stmt.tokens[1..] {
                [rd, mem] => {
                    let (offset, rs1) = parse_mem_operand(mem, line)?;
                    Instruction::Lw { rd: parse_reg(rd, line)?, rs1, offset }
                }
                [rd, rs1, offset] => Instruction::Lw {
                    rd: parse_reg(rd, line)?,
                    rs1: parse_reg(rs1, line)?,
                    offset: parse_imm(offset, line)?,
                },
                _ => return Err(arity(stmt, "2 or 3")),
            },
            "sw" => match &stmt.tokens[1..] {
                [rs2, mem] => {
                    let (offset, rs1) = parse_mem_operand(mem, line)?;
                    Instruction::Sw { rs1, rs2: parse_reg(rs2, line)?, offset }
                }
                [rs1, rs2, offset] => Instruction::Sw {
                    rs1: parse_reg(rs1, line)?,
                    rs2: parse_reg(rs2, line)?,
                    offset: parse_imm(offset, line)?,
                },
                _ => return Err(arity(stmt, "2 or 3")),
            },

            // Arithmetic
            "add" | "sub" => {
                let [rd, rs1, rs2] = operands::<3>(stmt)?;
                let (rd, rs1, rs2) = (parse_reg(rd, line)?, parse_reg(rs1, line)?, parse_reg(rs2, line)?);
                if mnemonic == "add" {
                    Instruction::Add { rd, rs1, rs2 }
                } else {
                    Instruction::Sub { rd, rs1, rs2 }
                }
            }
            "addi" => {
                let [rd, rs1, imm] = operands::<3>(stmt)?;
                Instruction::Addi {
                    rd: parse_reg(rd, line)?,
                    rs1: parse_reg(rs1, line)?,
                    imm: parse_imm(imm, line)?,
                }
            }
            "nop" => {
                operands::<0>(stmt)?;
                Instruction::Nop
            }

            // Control flow
            "beq" | "bne" => {
                let [rs1, rs2, target] = operands::<3>(stmt)?;
                let rs1 = parse_reg(rs1, line)?;
                let rs2 = parse_reg(rs2, line)?;
                let offset = self.branch_offset(target, stmt)?;
                if mnemonic == "beq" {
                    Instruction::Beq { rs1, rs2, offset }
                } else {
                    Instruction::Bne { rs1, rs2, offset }
                }
            }

            _ => {
                return Err(AssemblerError::UnknownMnemonic {
                    line,
                    mnemonic: stmt.tokens[0].clone(),
                })
            }
        };

        Ok(instr)
    }

    fn branch_offset(&self, target: &str, stmt: &Statement) -> Result<i32, AssemblerError> {
        if is_identifier(target) {
            let label_pc = self.labels.get(target).ok_or_else(|| AssemblerError::UndefinedLabel {
                line: stmt.line,
                label: target.to_string(),
            })?;
            return Ok(label_pc - stmt.pc);
        }
        parse_imm(target, stmt.line)
    }
}

/// Exactly `N` operands after the mnemonic.
fn operands<const N: usize>(stmt: &Statement) -> Result<[&str; N], AssemblerError> {
    let ops = &stmt.tokens[1..];
    if ops.len() != N {
        return Err(arity(stmt, &N.to_string()));
    }
    let mut out = [""; N];
    for (slot, op) in out.iter_mut().zip(ops) {
        *slot = op.as_str();
    }
    Ok(out)
}

fn arity(stmt: &Statement, expected: &str) -> AssemblerError {
    AssemblerError::SyntaxError {
        line: stmt.line,
        message: format!(
            "{} expects {} operands, found {}",
            stmt.tokens[0],
            expected,
            stmt.tokens.len() - 1
        ),
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

fn parse_reg(name: &str, line: usize) -> Result<Register, AssemblerError> {
    name.parse().map_err(|_| AssemblerError::UnknownRegister {
        line,
        name: name.to_string(),
    })
}

/// Parse `offset(reg)`; an empty offset means 0.
fn parse_mem_operand(operand: &str, line: usize) -> Result<(i32, Register), AssemblerError> {
    let (offset, rest) = operand.split_once('(').ok_or_else(|| AssemblerError::SyntaxError {
        line,
        message: format!("expected offset(register), found '{}'", operand),
    })?;
    let reg = rest.strip_suffix(')').ok_or_else(|| AssemblerError::SyntaxError {
        line,
        message: format!("missing ')' in '{}'", operand),
    })?;

    let offset = if offset.is_empty() { 0 } else { parse_imm(offset, line)? };
    Ok((offset, parse_reg(reg, line)?))
}

/// Parse a decimal or `0x` hex literal, optionally negative.
///
/// Only one leading `-` is allowed; the digits themselves carry no sign.
fn parse_number(literal: &str, line: usize) -> Result<i64, AssemblerError> {
    let invalid = || AssemblerError::SyntaxError {
        line,
        message: format!("invalid number '{}'", literal),
    };
    let out_of_range = || AssemblerError::ValueOutOfRange {
        line,
        value: literal.to_string(),
    };

    let (negative, rest) = match literal.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, literal),
    };
    let (radix, digits) = match rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
        Some(hex) => (16, hex),
        None => (10, rest),
    };
    if digits.is_empty() || digits.starts_with(&['+', '-'][..]) {
        return Err(invalid());
    }

    let magnitude = i64::from_str_radix(digits, radix).map_err(|e| match e.kind() {
        IntErrorKind::PosOverflow => out_of_range(),
        _ => invalid(),
    })?;

    if negative {
        magnitude.checked_neg().ok_or_else(out_of_range)
    } else {
        Ok(magnitude)
    }
}

/// A signed 32-bit immediate.
fn parse_imm(literal: &str, line: usize) -> Result<i32, AssemblerError> {
    let value = parse_number(literal, line)?;
    i32::try_from(value).map_err(|_| AssemblerError::ValueOutOfRange {
        line,
        value: literal.to_string(),
    })
}

/// A full word; negative values are stored as two's complement.
fn parse_word(literal: &str, line: usize) -> Result<u32, AssemblerError> {
    let value = parse_number(literal, line)?;
    if value < i32::MIN as i64 || value > u32::MAX as i64 {
        return Err(AssemblerError::ValueOutOfRange {
            line,
            value: literal.to_string(),
        });
    }
    Ok(value as u32)
}

/// Errors that can occur during assembly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblerError {
    #[error("syntax error on line {line}: {message}")]
    SyntaxError { line: usize, message: String },

    #[error("unknown mnemonic on line {line}: {mnemonic}")]
    UnknownMnemonic { line: usize, mnemonic: String },

    #[error("unknown register on line {line}: {name}")]
    UnknownRegister { line: usize, name: String },

    #[error("undefined label on line {line}: {label}")]
    UndefinedLabel { line: usize, label: String },

    #[error("duplicate label on line {line}: {label}")]
    DuplicateLabel { line: usize, label: String },

    #[error("value out of range on line {line}: {value}")]
    ValueOutOfRange { line: usize, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use Register::*;

    #[test]
    fn test_assemble_simple() {
        let source = r#"
            # load two words and add them
            .word 0 9
            .word 4 0x5
            lw  t1, 0(zero)
            lw  t2, 4(zero)
            add t1, t1, t2
            sw  t1, 8(zero)
        "#;

        let program = assemble(source).unwrap();
        assert_eq!(program.data, vec![(0, 9), (4, 5)]);
        assert_eq!(
            program.instructions,
            vec![
                Instruction::Lw { rd: T1, rs1: Zero, offset: 0 },
                Instruction::Lw { rd: T2, rs1: Zero, offset: 4 },
                Instruction::Add { rd: T1, rs1: T1, rs2: T2 },
                Instruction::Sw { rs1: Zero, rs2: T1, offset: 8 },
            ]
        );
        assert_eq!(program.source_lines, vec![5, 6, 7, 8]);
    }

    #[test]
    fn test_three_operand_memory_forms() {
        let program = assemble("lw t1 sp -4\nsw sp t1 12").unwrap();
        assert_eq!(program.instructions[0], Instruction::Lw { rd: T1, rs1: Sp, offset: -4 });
        assert_eq!(program.instructions[1], Instruction::Sw { rs1: Sp, rs2: T1, offset: 12 });
    }

    #[test]
    fn test_labels_resolve_to_relative_offsets() {
        let source = r#"
        loop:
            addi t0, t0, -1
            bne  t0, zero, loop
            beq  zero, zero, end
            nop
        end: nop
        "#;

        let program = assemble(source).unwrap();
        assert_eq!(program.labels["loop"], 0);
        assert_eq!(program.labels["end"], 16);
        assert_eq!(program.instructions[1], Instruction::Bne { rs1: T0, rs2: Zero, offset: -4 });
        assert_eq!(program.instructions[2], Instruction::Beq { rs1: Zero, rs2: Zero, offset: 8 });
        assert_eq!(program.len(), 5);
    }

    #[test]
    fn test_register_aliases() {
        let program = assemble("add fp, x8, s0\naddi a0, x0, 0x10").unwrap();
        assert_eq!(program.instructions[0], Instruction::Add { rd: S0, rs1: S0, rs2: S0 });
        assert_eq!(program.instructions[1], Instruction::Addi { rd: A0, rs1: Zero, imm: 16 });
    }

    #[test]
    fn test_negative_word_is_twos_complement() {
        let program = assemble(".word 16 -1").unwrap();
        assert_eq!(program.data, vec![(16, 0xFFFF_FFFF)]);
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            assemble("nop\nmul t0, t1, t2"),
            Err(AssemblerError::UnknownMnemonic { line: 2, mnemonic: "mul".into() })
        );
        assert_eq!(
            assemble("add t0, t1, q9"),
            Err(AssemblerError::UnknownRegister { line: 1, name: "q9".into() })
        );
        assert_eq!(
            assemble("beq t0, t1, nowhere"),
            Err(AssemblerError::UndefinedLabel { line: 1, label: "nowhere".into() })
        );
        assert_eq!(
            assemble("a: nop\na: nop"),
            Err(AssemblerError::DuplicateLabel { line: 2, label: "a".into() })
        );
        assert_eq!(
            assemble("addi t0, t0, 0x100000000"),
            Err(AssemblerError::ValueOutOfRange { line: 1, value: "0x100000000".into() })
        );
        assert!(matches!(assemble("add t0, t1"), Err(AssemblerError::SyntaxError { line: 1, .. })));
        assert!(matches!(assemble("lw t0, 4(sp"), Err(AssemblerError::SyntaxError { .. })));
        assert!(matches!(assemble("nop t0"), Err(AssemblerError::SyntaxError { .. })));
    }

    #[test]
    fn test_number_signs() {
        for literal in ["--5", "--9223372036854775808", "0x-5", "-0x-5", "+5", "-", "0x"] {
            let source = format!("addi t0, t0, {}", literal);
            assert!(
                matches!(assemble(&source), Err(AssemblerError::SyntaxError { line: 1, .. })),
                "accepted '{}'",
                literal
            );
        }

        assert_eq!(
            assemble("addi t0, t0, -9223372036854775809"),
            Err(AssemblerError::ValueOutOfRange { line: 1, value: "-9223372036854775809".into() })
        );
        assert_eq!(
            assemble("addi t0, t0, -0x80000000").unwrap().instructions,
            vec![Instruction::Addi { rd: Register::T0, rs1: Register::T0, imm: i32::MIN }]
        );
    }
}
