//! Interpreter: the fetch-decode-execute loop.
//!
//! A run decodes the whole program up front, then executes operations until
//! one of these happens:
//!
//! - the pc leaves `[0, len)`: implicit halt, the run terminated
//! - an explicit halt executes: the run terminated
//! - loop detection is on and the pc revisits an executed instruction
//! - the step limit is reached
//!
//! The last two are reported in [`ExecutionResult::stop`], not as errors.
//! Errors are reserved for malformed programs and failed runs (bad memory
//! access, arithmetic overflow).
//!
//! # Loop detection
//!
//! Loop detection keys on the pc alone. This is only sound for dialects whose
//! branches never read registers (see [`Dialect::pc_loop_detection_sound`]):
//! there, revisiting a pc means the run will retrace the same path forever.
//! In dialects with register-gated branches a revisited pc may be a
//! legitimate loop iteration, so callers should rely on the step limit.

use crate::virtual_machine::decoder::Decoder;
use crate::virtual_machine::dialect::Dialect;
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::Operation;
use crate::virtual_machine::ops::Flow;
use crate::virtual_machine::program::Program;
use crate::virtual_machine::state::MachineState;

/// Default maximum number of executed instructions per run.
pub const DEFAULT_STEP_LIMIT: u64 = 1_000_000;

/// Per-run execution limits.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RunConfig {
    /// Maximum instructions executed before the run is stopped. `None` is unbounded.
    pub max_steps: Option<u64>,
    /// Stop the run when the pc revisits an already executed instruction.
    pub loop_detection: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_steps: Some(DEFAULT_STEP_LIMIT),
            loop_detection: false,
        }
    }
}

impl RunConfig {
    pub fn with_max_steps(mut self, max_steps: Option<u64>) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_loop_detection(mut self, loop_detection: bool) -> Self {
        self.loop_detection = loop_detection;
        self
    }
}

/// Why a run stopped.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum StopReason {
    /// Explicit halt, or the pc left the program.
    Halted,
    /// The pc revisited `pc` with loop detection enabled.
    LoopDetected { pc: i64 },
    /// The step limit was reached.
    StepLimitExceeded { limit: u64 },
}

/// Outcome of one run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ExecutionResult {
    /// State after the last executed instruction.
    pub final_state: MachineState,
    /// Number of instructions executed.
    pub steps: u64,
    pub stop: StopReason,
}

impl ExecutionResult {
    /// Whether the run halted. `false` means a loop or the step limit stopped it.
    pub fn terminated(&self) -> bool {
        self.stop == StopReason::Halted
    }

    /// Converts a non-terminating result into the matching error.
    pub fn into_halted(self) -> Result<Self, VMError> {
        match self.stop {
            StopReason::Halted => Ok(self),
            StopReason::LoopDetected { pc } => Err(VMError::LoopDetected {
                pc,
                steps: self.steps,
            }),
            StopReason::StepLimitExceeded { limit } => Err(VMError::StepLimitExceeded { limit }),
        }
    }
}

/// Runs programs of one dialect.
///
/// Holds no run state: every call to [`Interpreter::run`] works on its own
/// [`MachineState`], so one interpreter can be shared across threads.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Interpreter {
    decoder: Decoder,
}

impl Interpreter {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            decoder: Decoder::new(dialect),
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.decoder.dialect()
    }

    pub fn decoder(&self) -> &Decoder {
        &self.decoder
    }

    /// Runs `program` from `initial_state` until it halts, loops or hits the step limit.
    pub fn run(
        &self,
        program: &Program,
        initial_state: MachineState,
        config: &RunConfig,
    ) -> Result<ExecutionResult, VMError> {
        VM::new(&self.decoder, program, initial_state)?.run(config)
    }
}

/// A single run in progress.
pub struct VM {
    /// Decoded program.
    ops: Vec<Operation>,
    /// Registers, memory and pc.
    state: MachineState,
    /// Instructions executed so far.
    steps: u64,
}

impl VM {
    /// Decodes `program` and prepares a run from `state`.
    pub fn new(decoder: &Decoder, program: &Program, state: MachineState) -> Result<Self, VMError> {
        if state.dialect() != decoder.dialect() {
            return Err(VMError::DialectMismatch {
                program: decoder.dialect().name(),
                state: state.dialect().name(),
            });
        }
        Ok(Self {
            ops: decoder.decode_program(program)?,
            state,
            steps: 0,
        })
    }

    /// Executes until the run stops.
    pub fn run(mut self, config: &RunConfig) -> Result<ExecutionResult, VMError> {
        let mut visited = config.loop_detection.then(|| vec![false; self.ops.len()]);

        loop {
            let pc = self.state.pc;
            let idx = match usize::try_from(pc) {
                Ok(idx) if idx < self.ops.len() => idx,
                _ => {
                    self.state.halted = true;
                    return Ok(self.finish(StopReason::Halted));
                }
            };

            if let Some(visited) = visited.as_mut() {
                if visited[idx] {
                    return Ok(self.finish(StopReason::LoopDetected { pc }));
                }
                visited[idx] = true;
            }

            if let Some(limit) = config.max_steps
                && self.steps >= limit
            {
                return Ok(self.finish(StopReason::StepLimitExceeded { limit }));
            }

            let flow = self.ops[idx].apply(&mut self.state)?;
            self.steps += 1;

            self.state.pc = match flow {
                Flow::Next => pc.saturating_add(1),
                Flow::Relative(offset) => pc.saturating_add(offset),
                Flow::Absolute(target) => target,
                Flow::Halt => {
                    self.state.halted = true;
                    return Ok(self.finish(StopReason::Halted));
                }
            };
        }
    }

    fn finish(self, stop: StopReason) -> ExecutionResult {
        ExecutionResult {
            final_state: self.state,
            steps: self.steps,
            stop,
        }
    }
}
