//! Program text parser.
//!
//! Converts human-readable program text into a [`Program`]. Parsing only
//! checks the grammar; mnemonics and register names are validated later by
//! the [`Decoder`](super::decoder::Decoder) of the chosen dialect.
//!
//! # Syntax
//!
//! ```text
//! OPCODE operand1, operand2, ...  # optional comment
//! ```
//!
//! - One instruction per line; blank lines are skipped
//! - Mnemonics are case-insensitive identifiers (e.g., `jmp`, `JIE`)
//! - Operands are signed integer literals (`+4`, `-99`, `7`) or register names (`a`)
//! - Commas between operands are optional
//! - Comments start with `#`

use crate::error;
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::program::{Instruction, Operand, Program};
use std::fmt::Write;
use std::fs;
use std::path::Path;

const COMMENT_CHAR: char = '#';

/// Formats a compiler-style diagnostic for parse failures.
fn render_parse_diagnostic(
    file: &str,
    source: &str,
    line: usize,
    offset: usize,
    message: &str,
) -> String {
    let mut diag = String::new();
    let _ = writeln!(diag, "error: {message}");
    let _ = writeln!(diag, " --> {file}:{line}:{offset}");

    if let Some(raw_line) = source.lines().nth(line.saturating_sub(1)) {
        let line_text = raw_line.trim_end_matches('\r');
        let underline = " ".repeat(offset.saturating_sub(1));
        let _ = writeln!(diag, "     |");
        let _ = writeln!(diag, "{:>4} | {}", line, line_text);
        let _ = writeln!(diag, "     | {}^", underline);
    }

    diag
}

/// Logs a diagnostic for parse errors.
fn log_parse_error(file: &str, source: &str, err: &VMError) {
    if let VMError::ParseError {
        line,
        offset,
        message,
    } = err
    {
        error!(
            "\n{}",
            render_parse_diagnostic(file, source, *line, *offset, message)
        );
    } else {
        error!("{err}");
    }
}

#[derive(Debug, Clone)]
struct Token<'a> {
    text: &'a str,
    /// 1-based column offset in the line.
    offset: usize,
}

/// Tokenize a single line.
///
/// Rules:
/// - `#` starts a comment
/// - commas and whitespace separate tokens
fn tokenize(line: &str) -> Vec<Token<'_>> {
    let mut out = Vec::with_capacity(4);
    let mut start: Option<usize> = None;

    for (i, c) in line.char_indices() {
        if c == COMMENT_CHAR {
            if let Some(s) = start.take() {
                out.push(Token {
                    text: &line[s..i],
                    offset: s + 1,
                });
            }
            return out;
        }
        if c == ',' || c.is_whitespace() {
            if let Some(s) = start.take() {
                out.push(Token {
                    text: &line[s..i],
                    offset: s + 1,
                });
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }

    if let Some(s) = start {
        out.push(Token {
            text: &line[s..],
            offset: s + 1,
        });
    }
    out
}

/// Whether `tok` is a single identifier token (`[A-Za-z_][A-Za-z0-9_]*`).
fn is_identifier(tok: &str) -> bool {
    let mut chars = tok.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Parse one operand token.
fn parse_operand(line_no: usize, tok: &Token) -> Result<Operand, VMError> {
    let first = tok.text.chars().next();
    if matches!(first, Some(c) if c.is_ascii_digit() || c == '+' || c == '-') {
        return tok
            .text
            .parse::<i64>()
            .map(Operand::Literal)
            .map_err(|_| VMError::ParseError {
                line: line_no,
                offset: tok.offset,
                message: format!("invalid integer literal '{}'", tok.text),
            });
    }
    if is_identifier(tok.text) {
        return Ok(Operand::Register(tok.text.to_string()));
    }
    Err(VMError::ParseError {
        line: line_no,
        offset: tok.offset,
        message: format!("expected integer literal or register name, got '{}'", tok.text),
    })
}

/// Parse one non-empty tokenized line into an [`Instruction`].
fn parse_instruction(line_no: usize, tokens: &[Token]) -> Result<Instruction, VMError> {
    let (head, rest) = tokens.split_first().ok_or(VMError::ParseError {
        line: line_no,
        offset: 1,
        message: "missing opcode".to_string(),
    })?;

    if !is_identifier(head.text) {
        return Err(VMError::ParseError {
            line: line_no,
            offset: head.offset,
            message: format!("expected opcode, got '{}'", head.text),
        });
    }

    let operands = rest
        .iter()
        .map(|tok| parse_operand(line_no, tok))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Instruction::new(head.text, operands))
}

/// Parse a full source string into a [`Program`].
///
/// Blank and comment-only lines produce no instruction, so instruction
/// indices count only real instructions while error line numbers still
/// refer to the source text.
pub fn parse_source(source: &str) -> Result<Program, VMError> {
    let mut instructions = Vec::new();
    for (line_no, line) in source.lines().enumerate() {
        let tokens = tokenize(line);
        if tokens.is_empty() {
            continue;
        }
        instructions.push(parse_instruction(line_no + 1, &tokens)?);
    }
    Ok(Program::new(instructions))
}

/// Parses source with an associated name for error diagnostics.
///
/// Logs a compiler-style diagnostic on failure.
pub fn parse_source_with_name(source: &str, source_name: &str) -> Result<Program, VMError> {
    let result = parse_source(source);
    if let Err(err) = &result {
        log_parse_error(source_name, source, err);
    }
    result
}

/// Convenience: parse directly from a file path.
pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Program, VMError> {
    let path_ref = path.as_ref();
    let source = fs::read_to_string(path_ref).map_err(|e| VMError::IoError {
        path: path_ref.display().to_string(),
        reason: e.to_string(),
    })?;
    parse_source_with_name(&source, &path_ref.display().to_string())
}
