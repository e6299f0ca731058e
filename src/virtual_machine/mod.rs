//! Minimal register/memory virtual machines.
//!
//! Programs are short, addressable instruction lists. A [`dialect::Dialect`]
//! selects the opcode table and register set; the interpreter runs a program
//! over a private [`state::MachineState`] until it halts, loops or exceeds its
//! step limit.
//!
//! # Architecture
//!
//! - **Program**: immutable instruction list; edits produce new programs
//! - **Dialect**: closed mnemonic-to-opcode table plus fixed register names
//! - **Decoder**: turns parsed instructions into typed operations for one dialect
//! - **Operations**: one pure state-transition function per opcode
//! - **Interpreter**: fetch-decode-execute loop with loop detection and a step limit
//!
//! # Modules
//!
//! - [`assembler`]: Program text parsing and diagnostics
//! - [`decoder`]: Dialect-bound instruction decoding
//! - [`dialect`]: Dialect tables
//! - [`errors`]: Error type shared by every layer
//! - [`isa`]: Opcode definitions and generated dispatch
//! - [`ops`]: State-transition functions
//! - [`program`]: Instruction and program values
//! - [`state`]: Machine state and locations
//! - [`vm`]: Interpreter and execution results

pub mod assembler;
pub mod decoder;
pub mod dialect;
pub mod errors;
pub mod isa;
pub mod ops;
pub mod program;
pub mod state;
pub mod vm;
