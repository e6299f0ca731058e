//! Program-space and initial-state search.
//!
//! Both policies use the [`Interpreter`](crate::virtual_machine::vm::Interpreter)
//! purely as an oracle: each candidate gets its own program and machine state
//! values, runs once, and is either accepted or discarded.
//!
//! - [`sweep`]: enumerate a grid of initial-state overrides
//! - [`mutation`]: swap one instruction's opcode within a closed pair-set
//!
//! # Ordering
//!
//! Candidates are numbered in enumeration order and the lowest-numbered
//! accepted candidate always wins, whether the search runs sequentially or on
//! a worker pool. The parallel path uses rayon's `find_map_first`, which
//! returns the first match in enumeration order (not the first to finish) and
//! stops evaluating candidates ordered after a known match.
//!
//! # Failures
//!
//! Candidates that loop, hit the step limit, or fail on their own values
//! (arithmetic overflow, out-of-bounds memory) are rejected and the search
//! moves on. Malformed input (parse, decode, bad locations) is checked before
//! any candidate runs and propagates to the caller. An exhausted search fails
//! with [`VMError::NoSatisfyingCandidate`].

pub mod mutation;
pub mod sweep;

use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::program::Program;
use crate::virtual_machine::state::{Location, MachineState};
use crate::virtual_machine::vm::{ExecutionResult, Interpreter, RunConfig};
use crate::warn;
use rayon::prelude::*;
use std::fmt;
use std::str::FromStr;

/// Limits and scheduling for a search.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SearchConfig {
    /// Limits applied to every candidate run.
    pub run: RunConfig,
    /// Worker threads evaluating candidates. `1` evaluates sequentially.
    pub workers: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            run: RunConfig::default(),
            workers: 1,
        }
    }
}

impl SearchConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_run(mut self, run: RunConfig) -> Self {
        self.run = run;
        self
    }
}

/// The accepted candidate and the run that satisfied the search.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SearchResult<C> {
    pub candidate: C,
    pub result: ExecutionResult,
}

/// Goal for a search: `location` holds `value` after a terminating run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Target {
    pub location: Location,
    pub value: i64,
}

impl Target {
    pub fn new(location: Location, value: i64) -> Self {
        Self { location, value }
    }

    /// Whether `result` terminated with the target value in place.
    pub fn is_met(&self, result: &ExecutionResult) -> bool {
        result.terminated()
            && result
                .final_state
                .get(&self.location)
                .is_ok_and(|v| v == self.value)
    }
}

impl FromStr for Target {
    type Err = VMError;

    /// Parses `LOCATION=VALUE`, e.g. `b=42` or `@0=19690720`.
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let (location, value) = text.split_once('=').ok_or_else(|| VMError::InvalidLocation {
            text: text.to_string(),
        })?;
        let value = value
            .trim()
            .parse::<i64>()
            .map_err(|_| VMError::InvalidLocation {
                text: text.to_string(),
            })?;
        Ok(Self::new(location.parse()?, value))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.location, self.value)
    }
}

/// Runs one candidate.
///
/// `Ok(None)` means the run failed on the candidate's own values and the
/// candidate is rejected. Any other error propagates.
pub(crate) fn run_candidate(
    interpreter: &Interpreter,
    program: &Program,
    state: MachineState,
    run: &RunConfig,
) -> Result<Option<ExecutionResult>, VMError> {
    match interpreter.run(program, state, run) {
        Ok(result) => Ok(Some(result)),
        Err(e) if e.is_run_failure() => {
            warn!("candidate rejected: {e}");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Evaluates candidates `0..count` and returns the lowest-numbered accepted one.
///
/// `evaluate` returns `Ok(None)` for a rejected candidate. An error from a
/// candidate ordered before any accepted one is returned as the result, which
/// is what a sequential scan would report.
pub(crate) fn find_first<C, F>(
    count: usize,
    workers: usize,
    evaluate: F,
) -> Result<Option<SearchResult<C>>, VMError>
where
    C: Send,
    F: Fn(usize) -> Result<Option<SearchResult<C>>, VMError> + Sync + Send,
{
    if workers <= 1 {
        for index in 0..count {
            if let Some(found) = evaluate(index)? {
                return Ok(Some(found));
            }
        }
        return Ok(None);
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|e| VMError::WorkerPool {
            reason: e.to_string(),
        })?;

    pool.install(|| {
        (0..count)
            .into_par_iter()
            .find_map_first(|index| evaluate(index).transpose())
    })
    .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::virtual_machine::dialect::Dialect;
    use crate::virtual_machine::state::MachineState;
    use crate::virtual_machine::vm::StopReason;

    fn fake_result(stop: StopReason) -> ExecutionResult {
        ExecutionResult {
            final_state: MachineState::new(Dialect::Accumulator),
            steps: 0,
            stop,
        }
    }

    fn accept_multiples_of(n: usize, index: usize) -> Result<Option<SearchResult<usize>>, VMError> {
        Ok((index > 0 && index % n == 0).then(|| SearchResult {
            candidate: index,
            result: fake_result(StopReason::Halted),
        }))
    }

    #[test]
    fn find_first_sequential_and_parallel_agree() {
        for workers in [1, 2, 8] {
            let found = find_first(1000, workers, |i| accept_multiples_of(7, i))
                .unwrap()
                .unwrap();
            assert_eq!(found.candidate, 7, "workers = {workers}");
        }
    }

    #[test]
    fn find_first_none_when_exhausted() {
        for workers in [1, 4] {
            assert!(
                find_first(50, workers, |i| accept_multiples_of(100, i))
                    .unwrap()
                    .is_none()
            );
        }
    }

    #[test]
    fn find_first_error_before_match_wins() {
        for workers in [1, 4] {
            let err = find_first(100, workers, |i| {
                if i == 3 {
                    Err(VMError::SearchSpaceTooLarge)
                } else {
                    accept_multiples_of(5, i)
                }
            })
            .unwrap_err();
            assert_eq!(err, VMError::SearchSpaceTooLarge);
        }
    }

    #[test]
    fn find_first_match_before_error_wins() {
        for workers in [1, 4] {
            let found = find_first(100, workers, |i| {
                if i == 60 {
                    Err(VMError::SearchSpaceTooLarge)
                } else {
                    accept_multiples_of(5, i)
                }
            })
            .unwrap()
            .unwrap();
            assert_eq!(found.candidate, 5);
        }
    }

    #[test]
    fn target_requires_termination() {
        let target = Target::new(Location::Register("acc".into()), 0);
        assert!(target.is_met(&fake_result(StopReason::Halted)));
        assert!(!target.is_met(&fake_result(StopReason::LoopDetected { pc: 0 })));
        assert!(!target.is_met(&fake_result(StopReason::StepLimitExceeded { limit: 1 })));
    }

    #[test]
    fn target_on_unknown_location_is_not_met() {
        let target = Target::new(Location::Register("zz".into()), 0);
        assert!(!target.is_met(&fake_result(StopReason::Halted)));
    }

    #[test]
    fn parse_target() {
        assert_eq!(
            "@0=19690720".parse::<Target>().unwrap(),
            Target::new(Location::Cell(0), 19690720)
        );
        assert_eq!(
            "b = -3".parse::<Target>().unwrap(),
            Target::new(Location::Register("b".into()), -3)
        );
        assert!("b".parse::<Target>().is_err());
        assert!("b=x".parse::<Target>().is_err());
    }

    #[test]
    fn workers_never_zero() {
        assert_eq!(SearchConfig::default().with_workers(0).workers, 1);
    }
}
