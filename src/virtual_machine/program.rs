//! Program representation.
//!
//! A [`Program`] is an immutable, zero-indexed sequence of parsed
//! [`Instruction`]s. Instructions are shared behind an [`Arc`], so cloning a
//! program is cheap and parallel searches can hold the same base program.
//! Editing never happens in place: [`Program::with_instruction_replaced`]
//! returns a new program and leaves the original untouched.

use crate::virtual_machine::assembler;
use crate::virtual_machine::errors::VMError;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// A parsed operand: an integer literal or a register name.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum Operand {
    /// Signed integer literal.
    Literal(i64),
    /// Single-token register name, as written in the source.
    Register(String),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Literal(v) if *v >= 0 => write!(f, "+{v}"),
            Operand::Literal(v) => write!(f, "{v}"),
            Operand::Register(name) => write!(f, "{name}"),
        }
    }
}

/// One instruction as written in the source: a mnemonic and its operands.
///
/// Instructions are not tied to a dialect until they are decoded.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Instruction {
    /// Mnemonic, lowercased.
    pub opcode: String,
    /// Operands in source order.
    pub operands: Vec<Operand>,
}

impl Instruction {
    /// Creates an instruction from a mnemonic and operands.
    pub fn new(opcode: impl Into<String>, operands: Vec<Operand>) -> Self {
        Self {
            opcode: opcode.into().to_ascii_lowercase(),
            operands,
        }
    }

    /// Returns a copy with the mnemonic replaced and the operands kept.
    pub fn with_opcode(&self, opcode: &str) -> Self {
        Self::new(opcode, self.operands.clone())
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.opcode)?;
        for (i, operand) in self.operands.iter().enumerate() {
            if i == 0 {
                write!(f, " {operand}")?;
            } else {
                write!(f, ", {operand}")?;
            }
        }
        Ok(())
    }
}

/// Immutable, indexable instruction sequence.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Program {
    instructions: Arc<[Instruction]>,
}

impl Program {
    /// Creates a program from already-parsed instructions.
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self {
            instructions: instructions.into(),
        }
    }

    /// Parses program text, one instruction per line.
    ///
    /// Fails with [`VMError::ParseError`] on the first malformed line.
    pub fn parse(text: &str) -> Result<Self, VMError> {
        assembler::parse_source(text)
    }

    /// Reads and parses a program file.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Self, VMError> {
        assembler::parse_file(path)
    }

    /// Number of instructions.
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Whether the program has no instructions.
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Returns the instruction at `index`, if any.
    pub fn get(&self, index: usize) -> Option<&Instruction> {
        self.instructions.get(index)
    }

    /// Returns all instructions in program order.
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Returns a new program with the instruction at `index` replaced.
    pub fn with_instruction_replaced(
        &self,
        index: usize,
        instruction: Instruction,
    ) -> Result<Self, VMError> {
        if index >= self.len() {
            return Err(VMError::InstructionIndexOutOfBounds {
                index,
                len: self.len(),
            });
        }
        let mut instructions = self.instructions.to_vec();
        instructions[index] = instruction;
        Ok(Self::new(instructions))
    }

    /// Returns a new program with only the mnemonic at `index` swapped to `opcode`.
    pub fn with_opcode_replaced(&self, index: usize, opcode: &str) -> Result<Self, VMError> {
        let replaced = self
            .get(index)
            .ok_or(VMError::InstructionIndexOutOfBounds {
                index,
                len: self.len(),
            })?
            .with_opcode(opcode);
        self.with_instruction_replaced(index, replaced)
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for instruction in self.instructions.iter() {
            writeln!(f, "{instruction}")?;
        }
        Ok(())
    }
}
