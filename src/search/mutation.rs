//! Single-instruction mutation search.
//!
//! Every instruction whose mnemonic belongs to the mutable pair-set is a
//! candidate. Candidates are tried in ascending program order, each on a copy
//! of the program with only that one mnemonic swapped to its partner, and the
//! first one whose run terminates (and satisfies the caller's predicate) wins.

use crate::search::{SearchConfig, SearchResult, find_first, run_candidate};
use crate::virtual_machine::dialect::Dialect;
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::program::Program;
use crate::virtual_machine::state::MachineState;
use crate::virtual_machine::vm::{ExecutionResult, Interpreter};
use crate::{info, warn};
use std::fmt;

/// The winning edit: instruction `index` had its mnemonic `from` swapped to `to`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Mutation {
    pub index: usize,
    pub from: &'static str,
    pub to: &'static str,
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}: {} -> {}", self.index, self.from, self.to)
    }
}

/// A closed set of interchangeable mnemonic pairs for one dialect.
///
/// Every pair is validated on construction, so a swap can never produce an
/// instruction the dialect fails to decode.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MutationSet {
    dialect: Dialect,
    pairs: Vec<(&'static str, &'static str)>,
}

impl MutationSet {
    /// Validates `pairs` against `dialect`.
    ///
    /// Each mnemonic must be in the dialect's table, the two sides of a pair
    /// must differ and take the same operands, and no mnemonic may appear in
    /// more than one pair.
    pub fn new<S: AsRef<str>>(dialect: Dialect, pairs: &[(S, S)]) -> Result<Self, VMError> {
        let invalid = |reason: String| VMError::InvalidMutationSet { reason };

        if pairs.is_empty() {
            return Err(invalid(format!("no mutable pairs for {dialect}")));
        }

        let mut canonical: Vec<(&'static str, &'static str)> = Vec::with_capacity(pairs.len());
        for (a, b) in pairs {
            let (a, b) = (a.as_ref(), b.as_ref());
            let lookup = |m: &str| {
                dialect
                    .canonical_mnemonic(m)
                    .ok_or_else(|| invalid(format!("'{m}' is not a {dialect} mnemonic")))
            };
            let (a, b) = (lookup(a)?, lookup(b)?);
            if a == b {
                return Err(invalid(format!("'{a}' cannot swap with itself")));
            }
            if dialect.opcode(a)?.operand_kinds() != dialect.opcode(b)?.operand_kinds() {
                return Err(invalid(format!("'{a}' and '{b}' take different operands")));
            }
            if let Some(m) = [a, b]
                .into_iter()
                .find(|m| canonical.iter().any(|(x, y)| x == m || y == m))
            {
                return Err(invalid(format!("'{m}' appears in more than one pair")));
            }
            canonical.push((a, b));
        }

        Ok(Self {
            dialect,
            pairs: canonical,
        })
    }

    /// The dialect's default pair-set.
    ///
    /// Fails for dialects without one; the caller must then supply pairs.
    pub fn default_for(dialect: Dialect) -> Result<Self, VMError> {
        Self::new(dialect, dialect.default_mutable_pairs())
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn pairs(&self) -> &[(&'static str, &'static str)] {
        &self.pairs
    }

    /// Returns `(canonical, partner)` if `mnemonic` is mutable.
    pub fn alternate(&self, mnemonic: &str) -> Option<(&'static str, &'static str)> {
        self.pairs.iter().find_map(|&(a, b)| {
            if a.eq_ignore_ascii_case(mnemonic) {
                Some((a, b))
            } else if b.eq_ignore_ascii_case(mnemonic) {
                Some((b, a))
            } else {
                None
            }
        })
    }

    /// Lists every candidate edit of `program`, in ascending index order.
    pub fn candidates(&self, program: &Program) -> Vec<Mutation> {
        program
            .instructions()
            .iter()
            .enumerate()
            .filter_map(|(index, instruction)| {
                self.alternate(&instruction.opcode)
                    .map(|(from, to)| Mutation { index, from, to })
            })
            .collect()
    }
}

/// Finds the lowest-index single swap after which `program` terminates and
/// satisfies `accept`.
///
/// Loop detection is always enabled for candidate runs, on top of the
/// configured step limit.
pub fn single_mutation<P>(
    interpreter: &Interpreter,
    program: &Program,
    set: &MutationSet,
    base_state: &MachineState,
    config: &SearchConfig,
    accept: P,
) -> Result<SearchResult<Mutation>, VMError>
where
    P: Fn(&ExecutionResult) -> bool + Sync,
{
    let dialect = interpreter.dialect();
    if set.dialect() != dialect {
        return Err(VMError::InvalidMutationSet {
            reason: format!("pairs are for {}, program is {dialect}", set.dialect()),
        });
    }
    interpreter.decoder().decode_program(program)?;
    if !dialect.pc_loop_detection_sound() {
        warn!("loop detection keys on pc only and may reject valid {dialect} candidates");
    }

    let run = config.run.with_loop_detection(true);
    let candidates = set.candidates(program);
    info!(
        "single-mutation search over {} candidate(s) with {} worker(s)",
        candidates.len(),
        config.workers
    );

    let found = find_first(candidates.len(), config.workers, |n| {
        let mutation = candidates[n];
        let mutated = program.with_opcode_replaced(mutation.index, mutation.to)?;
        let Some(result) = run_candidate(interpreter, &mutated, base_state.clone(), &run)? else {
            return Ok(None);
        };
        Ok((result.terminated() && accept(&result)).then(|| SearchResult {
            candidate: mutation,
            result,
        }))
    })?;

    match found {
        Some(found) => {
            info!("mutation {} terminates after {} step(s)", found.candidate, found.result.steps);
            Ok(found)
        }
        None => {
            warn!("no single mutation of {} candidate(s) terminates", candidates.len());
            Err(VMError::NoSatisfyingCandidate {
                evaluated: candidates.len(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::Target;
    use crate::virtual_machine::state::Location;
    use crate::virtual_machine::vm::{RunConfig, StopReason};

    const LOOPING_CONSOLE: &str = "\
nop +0
acc +1
jmp +4
acc +3
jmp -3
acc -99
acc +1
jmp -4
acc +6
";

    fn acc(result: &ExecutionResult) -> i64 {
        result
            .final_state
            .get(&Location::Register("acc".into()))
            .unwrap()
    }

    fn search(source: &str, workers: usize) -> Result<SearchResult<Mutation>, VMError> {
        let program = Program::parse(source).unwrap();
        single_mutation(
            &Interpreter::new(Dialect::Accumulator),
            &program,
            &MutationSet::default_for(Dialect::Accumulator).unwrap(),
            &MachineState::new(Dialect::Accumulator),
            &SearchConfig::default().with_workers(workers),
            |_| true,
        )
    }

    #[test]
    fn first_terminating_mutation_wins() {
        for workers in [1, 4] {
            let found = search(LOOPING_CONSOLE, workers).unwrap();
            assert_eq!(
                found.candidate,
                Mutation {
                    index: 7,
                    from: "jmp",
                    to: "nop",
                },
                "workers = {workers}"
            );
            assert!(found.result.terminated());
            assert_eq!(acc(&found.result), 8);
            assert_eq!(found.result.final_state.pc, 9);
        }
    }

    #[test]
    fn earlier_candidates_loop() {
        let program = Program::parse(LOOPING_CONSOLE).unwrap();
        let interpreter = Interpreter::new(Dialect::Accumulator);
        let config = RunConfig::default().with_loop_detection(true);
        for (index, to) in [(0, "jmp"), (2, "nop"), (4, "nop")] {
            let mutated = program.with_opcode_replaced(index, to).unwrap();
            let result = interpreter
                .run(&mutated, MachineState::new(Dialect::Accumulator), &config)
                .unwrap();
            assert!(
                matches!(result.stop, StopReason::LoopDetected { .. }),
                "index {index}"
            );
        }
    }

    #[test]
    fn candidates_in_program_order() {
        let program = Program::parse(LOOPING_CONSOLE).unwrap();
        let set = MutationSet::default_for(Dialect::Accumulator).unwrap();
        let indices: Vec<_> = set.candidates(&program).iter().map(|m| m.index).collect();
        assert_eq!(indices, vec![0, 2, 4, 7]);
        assert_eq!(set.candidates(&program)[0].to, "jmp");
    }

    #[test]
    fn original_program_is_untouched() {
        let program = Program::parse(LOOPING_CONSOLE).unwrap();
        let before = program.to_string();
        single_mutation(
            &Interpreter::new(Dialect::Accumulator),
            &program,
            &MutationSet::default_for(Dialect::Accumulator).unwrap(),
            &MachineState::new(Dialect::Accumulator),
            &SearchConfig::default(),
            |_| true,
        )
        .unwrap();
        assert_eq!(program.to_string(), before);
        assert_eq!(program.get(7).unwrap().opcode, "jmp");
    }

    #[test]
    fn failing_candidate_does_not_abort_search() {
        // swap #0 reaches `acc +1` with acc at i64::MAX, swap #2 loops, swap #3 halts
        let program = Program::parse("jmp +2\nacc +1\nnop +0\njmp +1").unwrap();
        let mut base = MachineState::new(Dialect::Accumulator);
        base.set(&Location::Register("acc".into()), i64::MAX).unwrap();
        for workers in [1, 4] {
            let found = single_mutation(
                &Interpreter::new(Dialect::Accumulator),
                &program,
                &MutationSet::default_for(Dialect::Accumulator).unwrap(),
                &base,
                &SearchConfig::default().with_workers(workers),
                |_| true,
            )
            .unwrap();
            assert_eq!(found.candidate.index, 3, "workers = {workers}");
            assert_eq!(acc(&found.result), i64::MAX);
        }
    }

    #[test]
    fn exhausted_search_is_an_error() {
        for workers in [1, 3] {
            assert_eq!(
                search("jmp 0\njmp -1", workers).unwrap_err(),
                VMError::NoSatisfyingCandidate { evaluated: 2 }
            );
        }
        assert_eq!(
            search("acc +1\nacc +2", 1).unwrap_err(),
            VMError::NoSatisfyingCandidate { evaluated: 0 }
        );
    }

    #[test]
    fn predicate_filters_terminating_candidates() {
        // both swaps terminate; only the second leaves acc at 2
        let program = Program::parse("nop +2\nacc +1\njmp +1\nacc +1").unwrap();
        let target = Target::new(Location::Register("acc".into()), 1);
        let found = single_mutation(
            &Interpreter::new(Dialect::Accumulator),
            &program,
            &MutationSet::default_for(Dialect::Accumulator).unwrap(),
            &MachineState::new(Dialect::Accumulator),
            &SearchConfig::default(),
            |result| target.is_met(result),
        )
        .unwrap();
        assert_eq!(found.candidate.index, 0);

        let target = Target::new(Location::Register("acc".into()), 2);
        let found = single_mutation(
            &Interpreter::new(Dialect::Accumulator),
            &program,
            &MutationSet::default_for(Dialect::Accumulator).unwrap(),
            &MachineState::new(Dialect::Accumulator),
            &SearchConfig::default(),
            |result| target.is_met(result),
        )
        .unwrap();
        assert_eq!(found.candidate.index, 2);
    }

    #[test]
    fn lock_dialect_with_supplied_pairs() {
        // a == 0: jio falls through into the self-jump, jie skips it
        let program = Program::parse("jio a, +2\njmp +0\ninc b").unwrap();
        let set = MutationSet::new(Dialect::Lock, &[("jio", "jie")]).unwrap();
        let found = single_mutation(
            &Interpreter::new(Dialect::Lock),
            &program,
            &set,
            &MachineState::new(Dialect::Lock),
            &SearchConfig::default(),
            |_| true,
        )
        .unwrap();
        assert_eq!(found.candidate.to, "jie");
        assert_eq!(
            found
                .result
                .final_state
                .get(&Location::Register("b".into()))
                .unwrap(),
            1
        );
    }

    #[test]
    fn invalid_mutation_sets() {
        let invalid = |dialect, pairs: &[(&str, &str)]| {
            matches!(
                MutationSet::new(dialect, pairs),
                Err(VMError::InvalidMutationSet { .. })
            )
        };
        assert!(invalid(Dialect::Tape, &[("jmp", "nop")]));
        assert!(invalid(Dialect::Lock, &[("inc", "jie")]));
        assert!(invalid(Dialect::Accumulator, &[("jmp", "JMP")]));
        assert!(invalid(Dialect::Accumulator, &[("jmp", "nop"), ("acc", "jmp")]));
        assert!(invalid(Dialect::Accumulator, &[]));
        assert!(matches!(
            MutationSet::default_for(Dialect::Lock),
            Err(VMError::InvalidMutationSet { .. })
        ));
        assert!(MutationSet::new(Dialect::Tape, &[("ADD", "mul")]).is_ok());
    }

    #[test]
    fn alternate_is_symmetric() {
        let set = MutationSet::default_for(Dialect::Accumulator).unwrap();
        assert_eq!(set.alternate("jmp"), Some(("jmp", "nop")));
        assert_eq!(set.alternate("NOP"), Some(("nop", "jmp")));
        assert_eq!(set.alternate("acc"), None);
    }

    #[test]
    fn set_must_match_interpreter_dialect() {
        let program = Program::parse("inc a").unwrap();
        let err = single_mutation(
            &Interpreter::new(Dialect::Lock),
            &program,
            &MutationSet::default_for(Dialect::Accumulator).unwrap(),
            &MachineState::new(Dialect::Lock),
            &SearchConfig::default(),
            |_| true,
        )
        .unwrap_err();
        assert!(matches!(err, VMError::InvalidMutationSet { .. }));
    }

    #[test]
    fn malformed_program_propagates() {
        assert!(matches!(
            search("jmp +1\nhlt", 1),
            Err(VMError::InvalidOpcode { .. })
        ));
    }
}
