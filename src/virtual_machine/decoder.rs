//! Instruction decoding against a dialect's operation table.

use crate::virtual_machine::dialect::Dialect;
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::Operation;
use crate::virtual_machine::program::{Instruction, Program};

/// Decodes parsed instructions into typed operations for one dialect.
///
/// The dialect is chosen at construction, so several decoders for different
/// dialects can coexist.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Decoder {
    dialect: Dialect,
}

impl Decoder {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Decodes one instruction.
    ///
    /// Fails with [`VMError::InvalidOpcode`] if the mnemonic is not in the
    /// dialect's table and [`VMError::UnknownRegister`] if an operand names a
    /// register the dialect does not have.
    pub fn decode(&self, instruction: &Instruction) -> Result<Operation, VMError> {
        let opcode = self.dialect.opcode(&instruction.opcode)?;
        opcode.decode(&instruction.opcode, &instruction.operands, self.dialect)
    }

    /// Decodes every instruction of `program`, in order.
    pub fn decode_program(&self, program: &Program) -> Result<Vec<Operation>, VMError> {
        program
            .instructions()
            .iter()
            .map(|instruction| self.decode(instruction))
            .collect()
    }
}
