use thiserror::Error;

/// Errors that can occur while parsing, decoding, executing or searching programs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VMError {
    /// A source line does not match the instruction grammar.
    #[error("line {line}:{offset}: {message}")]
    ParseError {
        line: usize,
        offset: usize,
        message: String,
    },
    /// Mnemonic is not part of the active dialect's operation table.
    #[error("invalid opcode '{opcode}' for dialect {dialect}")]
    InvalidOpcode {
        opcode: String,
        dialect: &'static str,
    },
    /// Operand names a register outside the dialect's register set.
    #[error("unknown register '{name}' for dialect {dialect}")]
    UnknownRegister { name: String, dialect: &'static str },
    /// Wrong number of operands for an instruction.
    #[error("{opcode} expects {expected} operand(s) but got {actual}")]
    ArityMismatch {
        opcode: String,
        expected: usize,
        actual: usize,
    },
    /// Expected a register operand but got a literal.
    #[error("{opcode} operand {position} must be a register, got {actual}")]
    ExpectedRegister {
        opcode: String,
        position: usize,
        actual: String,
    },
    /// Expected an integer literal but got a register name.
    #[error("{opcode} operand {position} must be an integer literal, got '{actual}'")]
    ExpectedLiteral {
        opcode: String,
        position: usize,
        actual: String,
    },
    /// Memory operand is negative or not representable as an address.
    #[error("invalid memory address {address}")]
    InvalidAddress { address: i64 },
    /// Memory access past the allocated length.
    #[error("address {address} out of bounds (memory length {len})")]
    AddressOutOfBounds { address: usize, len: usize },
    /// Checked arithmetic overflowed.
    #[error("arithmetic overflow in {opcode} at pc {pc}")]
    ArithmeticOverflow { opcode: &'static str, pc: i64 },
    /// Machine state was laid out for a different dialect than the decoder.
    #[error("state for dialect {state} cannot run a {program} program")]
    DialectMismatch {
        program: &'static str,
        state: &'static str,
    },
    /// Program edit targeted an index past the end of the program.
    #[error("instruction index {index} out of bounds (program length {len})")]
    InstructionIndexOutOfBounds { index: usize, len: usize },
    /// Run exceeded its step limit.
    #[error("step limit of {limit} exceeded")]
    StepLimitExceeded { limit: u64 },
    /// Program counter revisited an already executed instruction.
    #[error("infinite loop detected at pc {pc} after {steps} step(s)")]
    LoopDetected { pc: i64, steps: u64 },
    /// Search space exhausted without a satisfying candidate.
    #[error("no satisfying candidate among {evaluated} evaluated")]
    NoSatisfyingCandidate { evaluated: usize },
    /// The mutable opcode pair-set does not form valid swaps for the dialect.
    #[error("invalid mutation set: {reason}")]
    InvalidMutationSet { reason: String },
    /// Parameter grid has more points than can be enumerated.
    #[error("search space too large")]
    SearchSpaceTooLarge,
    /// Parameter sweep requested without a target.
    #[error("parameter sweep needs a target")]
    MissingTarget,
    /// Worker pool could not be started.
    #[error("failed to start worker pool: {reason}")]
    WorkerPool { reason: String },
    /// Unrecognized dialect tag.
    #[error("unknown dialect '{tag}'")]
    UnknownDialect { tag: String },
    /// Malformed location text (register name or `@cell`).
    #[error("invalid location '{text}'")]
    InvalidLocation { text: String },
    /// File I/O error while loading a program.
    #[error("io error reading {path}: {reason}")]
    IoError { path: String, reason: String },
}

impl VMError {
    /// Returns true for run outcomes that a search treats as a rejected candidate.
    pub fn is_non_termination(&self) -> bool {
        matches!(
            self,
            VMError::StepLimitExceeded { .. } | VMError::LoopDetected { .. }
        )
    }

    /// Returns true for failures caused by the values a run computed, as
    /// opposed to a malformed program or request.
    pub fn is_run_failure(&self) -> bool {
        matches!(
            self,
            VMError::ArithmeticOverflow { .. } | VMError::AddressOutOfBounds { .. }
        )
    }
}
