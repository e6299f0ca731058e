//! Dialects: closed opcode tables and register sets.
//!
//! A dialect selects which mnemonics are valid, which [`Opcode`] each one maps
//! to, and which registers exist. Swapping dialects is table substitution;
//! nothing outside this module branches on mnemonic strings.

use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::Opcode;
use std::fmt;
use std::str::FromStr;

const ACCUMULATOR_TABLE: &[(&str, Opcode)] = &[
    ("acc", Opcode::Accumulate),
    ("jmp", Opcode::JumpRelative),
    ("nop", Opcode::Nop),
];

const LOCK_TABLE: &[(&str, Opcode)] = &[
    ("hlf", Opcode::Half),
    ("tpl", Opcode::Triple),
    ("inc", Opcode::Increment),
    ("jmp", Opcode::JumpRelative),
    ("jie", Opcode::JumpIfEven),
    ("jio", Opcode::JumpIfOne),
];

const TAPE_TABLE: &[(&str, Opcode)] = &[
    ("add", Opcode::Add),
    ("mul", Opcode::Multiply),
    ("jmp", Opcode::JumpAbsolute),
    ("hlt", Opcode::Halt),
];

/// A virtual machine variant.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Dialect {
    /// Single `acc` register; `acc`, `jmp` (relative) and `nop`.
    Accumulator,
    /// Registers `a` and `b`; halve/triple/increment and conditional jumps.
    Lock,
    /// Flat memory; `add`/`mul` on cells, absolute `jmp`, explicit `hlt`.
    Tape,
}

impl Dialect {
    /// All dialects, in declaration order.
    pub const ALL: [Dialect; 3] = [Dialect::Accumulator, Dialect::Lock, Dialect::Tape];

    /// Returns the tag used to select this dialect.
    pub const fn name(&self) -> &'static str {
        match self {
            Dialect::Accumulator => "accumulator",
            Dialect::Lock => "lock",
            Dialect::Tape => "tape",
        }
    }

    /// Returns the fixed register names, in register-file order.
    pub const fn registers(&self) -> &'static [&'static str] {
        match self {
            Dialect::Accumulator => &["acc"],
            Dialect::Lock => &["a", "b"],
            Dialect::Tape => &[],
        }
    }

    /// Returns the operation table mapping mnemonics to opcodes.
    pub const fn operation_table(&self) -> &'static [(&'static str, Opcode)] {
        match self {
            Dialect::Accumulator => ACCUMULATOR_TABLE,
            Dialect::Lock => LOCK_TABLE,
            Dialect::Tape => TAPE_TABLE,
        }
    }

    /// Whether the dialect has an explicit halt opcode.
    ///
    /// Running past the last instruction halts cleanly in every dialect; an
    /// explicit halt only lets a program stop earlier.
    pub fn has_explicit_halt(&self) -> bool {
        self.operation_table()
            .iter()
            .any(|(_, opcode)| *opcode == Opcode::Halt)
    }

    /// Whether loop detection keyed on the pc alone is sound for this dialect.
    ///
    /// It is only sound when no branch reads a register. In the lock dialect
    /// `jie`/`jio` do, so revisiting a pc there does not prove a loop.
    pub fn pc_loop_detection_sound(&self) -> bool {
        !self.operation_table().iter().any(|(_, opcode)| {
            matches!(opcode, Opcode::JumpIfEven | Opcode::JumpIfOne)
        })
    }

    /// Default opcode pairs swapped by single-mutation search.
    pub const fn default_mutable_pairs(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            Dialect::Accumulator => &[("jmp", "nop")],
            Dialect::Lock | Dialect::Tape => &[],
        }
    }

    /// Looks up the opcode for `mnemonic` (case-insensitive).
    pub fn opcode(&self, mnemonic: &str) -> Result<Opcode, VMError> {
        self.operation_table()
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(mnemonic))
            .map(|(_, opcode)| *opcode)
            .ok_or_else(|| VMError::InvalidOpcode {
                opcode: mnemonic.to_string(),
                dialect: self.name(),
            })
    }

    /// Returns the canonical mnemonic for `mnemonic`, if it is in the table.
    pub fn canonical_mnemonic(&self, mnemonic: &str) -> Option<&'static str> {
        self.operation_table()
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(mnemonic))
            .map(|(name, _)| *name)
    }

    /// Resolves a register name (case-insensitive) to its register-file index.
    pub fn register_index(&self, name: &str) -> Result<usize, VMError> {
        self.registers()
            .iter()
            .position(|r| r.eq_ignore_ascii_case(name))
            .ok_or_else(|| VMError::UnknownRegister {
                name: name.to_string(),
                dialect: self.name(),
            })
    }
}

impl FromStr for Dialect {
    type Err = VMError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        Dialect::ALL
            .into_iter()
            .find(|d| d.name().eq_ignore_ascii_case(tag.trim()))
            .ok_or_else(|| VMError::UnknownDialect {
                tag: tag.to_string(),
            })
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
