//! Text handling outside the core.
//!
//! This module provides:
//! - A tokenizer (source text → token lines)
//! - A two-pass assembler (token lines → [`Program`])
//! - A disassembler (instructions → listing text)

pub mod tokenizer;
pub mod assembler;
pub mod disasm;

pub use tokenizer::{tokenize, tokenize_file, TokenLine, TokenizeError, Tokens};
pub use assembler::{assemble, assemble_lines, AssemblerError, Program};
pub use disasm::disassemble;
