//! Invocation: one request against the VM, from program text to outcome.
//!
//! An [`Invocation`] bundles everything a caller supplies (program text,
//! dialect, initial overrides, search mode and target) so that the CLI and
//! library users drive the same code path.

use crate::search::mutation::{Mutation, MutationSet, single_mutation};
use crate::search::sweep::{Dimension, sweep_for_target};
use crate::search::{SearchConfig, SearchResult, Target};
use crate::virtual_machine::dialect::Dialect;
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::program::Program;
use crate::virtual_machine::state::{Location, MachineState};
use crate::virtual_machine::vm::{ExecutionResult, Interpreter};

/// What to do with the program.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SearchMode {
    /// Run once from the initial state.
    SingleRun,
    /// Sweep the given dimensions, outermost first, until the target is met.
    ParameterSweep(Vec<Dimension>),
    /// Swap one mnemonic at a time until the program terminates.
    ///
    /// `pairs` of `None` uses the dialect's default pair-set.
    SingleMutation { pairs: Option<Vec<(String, String)>> },
}

/// A fully specified request.
#[derive(Clone, Debug)]
pub struct Invocation {
    pub program_text: String,
    pub dialect: Dialect,
    /// Initial flat memory. Ignored by dialects that never address memory.
    pub memory: Vec<i64>,
    /// Initial values written before any run, in order.
    pub overrides: Vec<(Location, i64)>,
    pub mode: SearchMode,
    /// Required for sweeps; optional extra condition for mutation search.
    pub target: Option<Target>,
    pub config: SearchConfig,
}

impl Invocation {
    /// A single run of `program_text` with default limits.
    pub fn new(program_text: impl Into<String>, dialect: Dialect) -> Self {
        Self {
            program_text: program_text.into(),
            dialect,
            memory: Vec::new(),
            overrides: Vec::new(),
            mode: SearchMode::SingleRun,
            target: None,
            config: SearchConfig::default(),
        }
    }

    pub fn with_mode(mut self, mode: SearchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_target(mut self, target: Target) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_memory(mut self, memory: Vec<i64>) -> Self {
        self.memory = memory;
        self
    }

    pub fn with_override(mut self, location: Location, value: i64) -> Self {
        self.overrides.push((location, value));
        self
    }

    pub fn with_config(mut self, config: SearchConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds the initial machine state from memory and overrides.
    pub fn initial_state(&self) -> Result<MachineState, VMError> {
        let mut state = MachineState::new(self.dialect).with_memory(self.memory.clone());
        for (location, value) in &self.overrides {
            state.set(location, *value)?;
        }
        Ok(state)
    }

    /// Parses, decodes and executes the request.
    pub fn execute(&self) -> Result<Outcome, VMError> {
        self.execute_program(&Program::parse(&self.program_text)?)
    }

    /// Executes the request on an already parsed `program`; `program_text`
    /// is not read.
    pub fn execute_program(&self, program: &Program) -> Result<Outcome, VMError> {
        let state = self.initial_state()?;
        let interpreter = Interpreter::new(self.dialect);

        match &self.mode {
            SearchMode::SingleRun => {
                let result = interpreter.run(program, state, &self.config.run)?;
                Ok(Outcome::Run(result))
            }
            SearchMode::ParameterSweep(dimensions) => {
                let target = self.target.as_ref().ok_or(VMError::MissingTarget)?;
                sweep_for_target(
                    &interpreter,
                    program,
                    &state,
                    dimensions.clone(),
                    &self.config,
                    target,
                )
                .map(Outcome::Sweep)
            }
            SearchMode::SingleMutation { pairs } => {
                let set = match pairs {
                    Some(pairs) => MutationSet::new(self.dialect, pairs.as_slice())?,
                    None => MutationSet::default_for(self.dialect)?,
                };
                if let Some(target) = &self.target {
                    state.get(&target.location)?;
                }
                single_mutation(&interpreter, program, &set, &state, &self.config, |result| {
                    self.target.as_ref().is_none_or(|t| t.is_met(result))
                })
                .map(Outcome::Mutation)
            }
        }
    }
}

/// Result of [`Invocation::execute`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Outcome {
    Run(ExecutionResult),
    Sweep(SearchResult<Vec<i64>>),
    Mutation(SearchResult<Mutation>),
}

impl Outcome {
    /// The run that produced this outcome.
    pub fn result(&self) -> &ExecutionResult {
        match self {
            Outcome::Run(result) => result,
            Outcome::Sweep(found) => &found.result,
            Outcome::Mutation(found) => &found.result,
        }
    }
}
