//! Source tokenizer.
//!
//! Splits assembly-like text into one token list per non-empty line.
//! `#` starts a comment that runs to the end of the line. Whitespace and
//! commas both separate tokens, and runs of them collapse.

use std::path::Path;
use std::str::Lines;
use thiserror::Error;

/// The tokens of one source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenLine {
    /// 1-based source line number.
    pub line: usize,
    pub tokens: Vec<String>,
}

/// Lazy iterator over the token lines of a source string.
///
/// Cloning it restarts from the same position.
#[derive(Debug, Clone)]
pub struct Tokens<'a> {
    lines: Lines<'a>,
    line_num: usize,
}

/// Tokenize a source string.
pub fn tokenize(source: &str) -> Tokens<'_> {
    Tokens {
        lines: source.lines(),
        line_num: 0,
    }
}

/// Read and tokenize a whole file.
pub fn tokenize_file<P: AsRef<Path>>(path: P) -> Result<Vec<TokenLine>, TokenizeError> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path).map_err(|e| TokenizeError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    Ok(tokenize(&source).collect())
}

/// Split a single line into tokens.
pub fn tokenize_line(line: &str) -> Vec<String> {
    let code = match line.find('#') {
        Some(idx) => &line[..idx],
        None => line,
    };

    code.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

impl Iterator for Tokens<'_> {
    type Item = TokenLine;

    fn next(&mut self) -> Option<TokenLine> {
        for line in self.lines.by_ref() {
            self.line_num += 1;
            let tokens = tokenize_line(line);
            if !tokens.is_empty() {
                return Some(TokenLine {
                    line: self.line_num,
                    tokens,
                });
            }
        }
        None
    }
}

/// Errors that can occur while reading source.
#[derive(Debug, Clone, Error)]
pub enum TokenizeError {
    #[error("failed to read {path}: {message}")]
    Io { path: String, message: String },
}
