//! Instruction set definitions.
//!
//! The [`for_each_opcode!`](crate::for_each_opcode) macro holds the canonical
//! opcode list and invokes a callback macro for code generation, so the
//! opcode tag, its operand signature, the decoded operation and the dispatch
//! to its state-transition function are all generated from one table.
//!
//! This module generates:
//! - The [`Opcode`] tag enum and its operand signatures
//! - The [`Operation`] enum holding decoded, typed operands
//! - `Operation::apply`, which dispatches to the functions in [`ops`](super::ops)
//!
//! Mnemonics are not part of the opcode list: each [`Dialect`](super::dialect::Dialect)
//! maps its own mnemonics onto these tags.
//!
//! # Operand kinds
//!
//! - `Literal`: signed integer literal (`+4`, `-99`, `7`)
//! - `Register`: register name resolved to an index in the dialect's register set
//! - `Address`: non-negative integer literal indexing flat memory

use crate::virtual_machine::dialect::Dialect;
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::ops::{self, Flow};
use crate::virtual_machine::program::Operand;
use crate::virtual_machine::state::MachineState;

/// Upper bound on operands taken by any opcode.
pub const MAX_OPERANDS: usize = 3;

/// Kind of value an operand position accepts.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OperandKind {
    Literal,
    Register,
    Address,
}

/// Invokes a callback macro with the complete opcode definition list.
#[macro_export]
macro_rules! for_each_opcode {
    ($callback:ident) => {
        $callback! {
            // =========================
            // Accumulator updates
            // =========================
            /// acc delta ; acc += delta
            Accumulate => [delta: Literal], op_accumulate,
            /// nop arg ; no effect, operand kept for jump swaps
            Nop => [arg: Literal], op_nop,
            // =========================
            // Unary register mutation
            // =========================
            /// hlf r ; r = floor(r / 2)
            Half => [reg: Register], op_half,
            /// tpl r ; r = r * 3
            Triple => [reg: Register], op_triple,
            /// inc r ; r = r + 1
            Increment => [reg: Register], op_increment,
            // =========================
            // Arithmetic write
            // =========================
            /// add dst, a, b ; mem[dst] = mem[a] + mem[b]
            Add => [dst: Address, a: Address, b: Address], op_add,
            /// mul dst, a, b ; mem[dst] = mem[a] * mem[b]
            Multiply => [dst: Address, a: Address, b: Address], op_multiply,
            // =========================
            // Control flow
            // =========================
            /// jmp offset ; pc += offset
            JumpRelative => [offset: Literal], op_jump_relative,
            /// jmp target ; pc = target
            JumpAbsolute => [target: Literal], op_jump_absolute,
            /// jie r, offset ; if r is even then pc += offset
            JumpIfEven => [reg: Register, offset: Literal], op_jump_if_even,
            /// jio r, offset ; if r == 1 then pc += offset
            JumpIfOne => [reg: Register, offset: Literal], op_jump_if_one,
            /// hlt ; stop execution
            Halt => [], op_halt,
        }
    };
}

#[macro_export]
macro_rules! define_opcodes {
    (
        $(
            $(#[$doc:meta])*
            $name:ident => [
                $( $field:ident : $kind:ident ),* $(,)?
            ], $handler:ident
        ),* $(,)?
    ) => {
        // =========================
        // Opcode tags
        // =========================
        #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
        pub enum Opcode {
            $(
                $(#[$doc])*
                $name,
            )*
        }

        impl Opcode {
            /// Returns the canonical (dialect-independent) name of this opcode.
            pub const fn name(&self) -> &'static str {
                match self {
                    $( Opcode::$name => stringify!($name), )*
                }
            }

            /// Returns the operand kinds this opcode expects, in order.
            pub const fn operand_kinds(&self) -> &'static [OperandKind] {
                match self {
                    $( Opcode::$name => &[ $( OperandKind::$kind ),* ], )*
                }
            }

            /// Decodes parsed operands into a typed [`Operation`].
            ///
            /// `mnemonic` is only used for error messages.
            pub(crate) fn decode(
                self,
                mnemonic: &str,
                operands: &[Operand],
                dialect: Dialect,
            ) -> Result<Operation, VMError> {
                let expected = self.operand_kinds().len();
                if operands.len() != expected {
                    return Err(VMError::ArityMismatch {
                        opcode: mnemonic.to_string(),
                        expected,
                        actual: operands.len(),
                    });
                }

                match self {
                    $(
                        Opcode::$name => {
                            #[allow(unused_mut, unused_variables)]
                            let mut it = operands.iter().enumerate();
                            Ok(Operation::$name {
                                $(
                                    $field: {
                                        let (position, operand) = it
                                            .next()
                                            .ok_or(VMError::ArityMismatch {
                                                opcode: mnemonic.to_string(),
                                                expected,
                                                actual: operands.len(),
                                            })?;
                                        define_opcodes!(@decode $kind, operand, position, mnemonic, dialect)?
                                    },
                                )*
                            })
                        }
                    )*
                }
            }
        }

        // =========================
        // Decoded operations
        // =========================
        #[derive(Copy, Clone, Debug, Eq, PartialEq)]
        pub enum Operation {
            $(
                $(#[$doc])*
                $name {
                    $( $field: define_opcodes!(@ty $kind) ),*
                },
            )*
        }

        impl Operation {
            /// Returns the opcode tag of this operation.
            pub const fn opcode(&self) -> Opcode {
                match self {
                    $( Operation::$name { .. } => Opcode::$name, )*
                }
            }

            /// Applies this operation to `state`, returning how the pc moves.
            #[allow(unused_variables)]
            pub(crate) fn apply(&self, state: &mut MachineState) -> Result<Flow, VMError> {
                match *self {
                    $(
                        Operation::$name { $( $field ),* } => ops::$handler(state $(, $field )*),
                    )*
                }
            }
        }
    };

    // ---------- types ----------
    (@ty Literal)  => { i64 };
    (@ty Register) => { usize };
    (@ty Address)  => { usize };

    // ---------- decoding ----------
    (@decode Literal, $operand:ident, $pos:ident, $mnemonic:ident, $dialect:ident) => {
        match $operand {
            Operand::Literal(v) => Ok::<i64, VMError>(*v),
            Operand::Register(name) => Err(VMError::ExpectedLiteral {
                opcode: $mnemonic.to_string(),
                position: $pos,
                actual: name.clone(),
            }),
        }
    };

    (@decode Register, $operand:ident, $pos:ident, $mnemonic:ident, $dialect:ident) => {
        match $operand {
            Operand::Register(name) => $dialect.register_index(name),
            Operand::Literal(v) => Err(VMError::ExpectedRegister {
                opcode: $mnemonic.to_string(),
                position: $pos,
                actual: v.to_string(),
            }),
        }
    };

    (@decode Address, $operand:ident, $pos:ident, $mnemonic:ident, $dialect:ident) => {
        match $operand {
            Operand::Literal(v) => usize::try_from(*v)
                .map_err(|_| VMError::InvalidAddress { address: *v }),
            Operand::Register(name) => Err(VMError::ExpectedLiteral {
                opcode: $mnemonic.to_string(),
                position: $pos,
                actual: name.clone(),
            }),
        }
    };
}

for_each_opcode!(define_opcodes);
