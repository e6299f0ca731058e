//! Small deterministic virtual machines and the searches that drive them.
//!
//! Programs are parsed into immutable instruction lists, decoded against a
//! [`Dialect`] and executed by an [`Interpreter`]. The [`search`] layer uses
//! the interpreter as an oracle to find an initial state (parameter sweep) or
//! a single-instruction edit (mutation search) that satisfies a target.

pub mod invocation;
pub mod search;
pub mod utils;
pub mod virtual_machine;

pub use invocation::{Invocation, Outcome, SearchMode};
pub use search::{SearchConfig, SearchResult, Target};
pub use virtual_machine::dialect::Dialect;
pub use virtual_machine::errors::VMError;
pub use virtual_machine::program::Program;
pub use virtual_machine::state::{Location, MachineState};
pub use virtual_machine::vm::{ExecutionResult, Interpreter, RunConfig, StopReason};
