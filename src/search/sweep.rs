//! Parameter sweep over initial-state overrides.
//!
//! The grid is enumerated in nested ascending order: the first dimension is
//! the outermost loop, the last dimension varies fastest. The first point in
//! that order whose run satisfies the target wins. This tie-break is part of
//! the contract: with dimensions `x in 0..=9` and `y in 0..=9`, a target met
//! at both `(0, 5)` and `(1, 3)` yields `(0, 5)`.

use crate::search::{SearchConfig, SearchResult, Target, find_first, run_candidate};
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::program::Program;
use crate::virtual_machine::state::{Location, MachineState};
use crate::virtual_machine::vm::{ExecutionResult, Interpreter};
use crate::{info, warn};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

/// One swept location and its inclusive value range.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Dimension {
    pub location: Location,
    pub values: RangeInclusive<i64>,
}

impl Dimension {
    pub fn new(location: Location, values: RangeInclusive<i64>) -> Self {
        Self { location, values }
    }

    /// Number of values, or `None` if it does not fit in `usize`.
    fn len(&self) -> Option<usize> {
        let (lo, hi) = (*self.values.start(), *self.values.end());
        if hi < lo {
            return Some(0);
        }
        usize::try_from(i128::from(hi) - i128::from(lo) + 1).ok()
    }
}

impl FromStr for Dimension {
    type Err = VMError;

    /// Parses `LOCATION=LO..HI` (inclusive), e.g. `@1=0..99`.
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let invalid = || VMError::InvalidLocation {
            text: text.to_string(),
        };
        let (location, range) = text.split_once('=').ok_or_else(invalid)?;
        let (lo, hi) = range.split_once("..").ok_or_else(invalid)?;
        let hi = hi.strip_prefix('=').unwrap_or(hi);
        let lo = lo.trim().parse::<i64>().map_err(|_| invalid())?;
        let hi = hi.trim().parse::<i64>().map_err(|_| invalid())?;
        Ok(Self::new(location.parse()?, lo..=hi))
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}={}..{}",
            self.location,
            self.values.start(),
            self.values.end()
        )
    }
}

/// A bounded k-dimensional grid of override values.
#[derive(Clone, Debug)]
pub struct Grid {
    dimensions: Vec<Dimension>,
    lens: Vec<usize>,
    points: usize,
}

impl Grid {
    /// Builds a grid, failing with [`VMError::SearchSpaceTooLarge`] if the
    /// point count overflows `usize`.
    pub fn new(dimensions: Vec<Dimension>) -> Result<Self, VMError> {
        let lens = dimensions
            .iter()
            .map(|d| d.len().ok_or(VMError::SearchSpaceTooLarge))
            .collect::<Result<Vec<_>, _>>()?;
        let points = lens
            .iter()
            .try_fold(1usize, |acc, len| acc.checked_mul(*len))
            .ok_or(VMError::SearchSpaceTooLarge)?;
        Ok(Self {
            dimensions,
            lens,
            points,
        })
    }

    /// Number of points. A grid with no dimensions has exactly one (empty) point.
    pub fn len(&self) -> usize {
        self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points == 0
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    /// Returns the coordinates of the `index`-th point in enumeration order,
    /// or `None` past the last point.
    pub fn point(&self, index: usize) -> Option<Vec<i64>> {
        if index >= self.points {
            return None;
        }
        let mut coords = vec![0i64; self.dimensions.len()];
        let mut rest = index;
        for (i, dimension) in self.dimensions.iter().enumerate().rev() {
            let len = self.lens[i];
            let offset = rest % len;
            rest /= len;
            // offset < len, which was derived from this range, so this cannot overflow
            coords[i] = (i128::from(*dimension.values.start()) + offset as i128) as i64;
        }
        Some(coords)
    }

    /// Iterates every point in enumeration order.
    pub fn points(&self) -> impl Iterator<Item = Vec<i64>> + '_ {
        (0..self.points).filter_map(|index| self.point(index))
    }

    /// Returns `base` with the point's values written to each dimension's location.
    fn apply(&self, base: &MachineState, coords: &[i64]) -> Result<MachineState, VMError> {
        let mut state = base.clone();
        for (dimension, value) in self.dimensions.iter().zip(coords) {
            state.set(&dimension.location, *value)?;
        }
        Ok(state)
    }
}

/// Finds the first grid point, in enumeration order, whose run satisfies `accept`.
///
/// Only terminating runs are offered to `accept`. Points whose run overflows
/// or touches memory out of bounds are rejected like non-terminating ones.
pub fn parameter_sweep<P>(
    interpreter: &Interpreter,
    program: &Program,
    base_state: &MachineState,
    dimensions: Vec<Dimension>,
    config: &SearchConfig,
    accept: P,
) -> Result<SearchResult<Vec<i64>>, VMError>
where
    P: Fn(&ExecutionResult) -> bool + Sync,
{
    // Surface malformed input before any candidate runs.
    interpreter.decoder().decode_program(program)?;
    for dimension in &dimensions {
        base_state.get(&dimension.location)?;
    }
    if config.run.loop_detection && !interpreter.dialect().pc_loop_detection_sound() {
        warn!(
            "loop detection keys on pc only and may reject valid {} candidates",
            interpreter.dialect()
        );
    }

    let grid = Grid::new(dimensions)?;
    info!(
        "parameter sweep over {} point(s) with {} worker(s)",
        grid.len(),
        config.workers
    );

    let found = find_first(grid.len(), config.workers, |index| {
        let Some(coords) = grid.point(index) else {
            return Ok(None);
        };
        let state = grid.apply(base_state, &coords)?;
        let Some(result) = run_candidate(interpreter, program, state, &config.run)? else {
            return Ok(None);
        };
        Ok((result.terminated() && accept(&result)).then(|| SearchResult {
            candidate: coords,
            result,
        }))
    })?;

    match found {
        Some(found) => {
            info!("sweep satisfied at {:?}", found.candidate);
            Ok(found)
        }
        None => {
            warn!("sweep exhausted {} point(s) without a match", grid.len());
            Err(VMError::NoSatisfyingCandidate {
                evaluated: grid.len(),
            })
        }
    }
}

/// [`parameter_sweep`] with a [`Target`] as the acceptance predicate.
pub fn sweep_for_target(
    interpreter: &Interpreter,
    program: &Program,
    base_state: &MachineState,
    dimensions: Vec<Dimension>,
    config: &SearchConfig,
    target: &Target,
) -> Result<SearchResult<Vec<i64>>, VMError> {
    base_state.get(&target.location)?;
    parameter_sweep(interpreter, program, base_state, dimensions, config, |result| {
        target.is_met(result)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::virtual_machine::dialect::Dialect;
    use crate::virtual_machine::vm::RunConfig;

    fn dim(location: &str, values: RangeInclusive<i64>) -> Dimension {
        Dimension::new(location.parse().unwrap(), values)
    }

    /// mem[0] = 2 * mem[1] + mem[2]
    const TWO_X_PLUS_Y: &str = "add 0, 1, 1\nadd 0, 0, 2";

    fn tape_base() -> MachineState {
        MachineState::new(Dialect::Tape).with_memory(vec![0; 3])
    }

    #[test]
    fn grid_enumerates_outer_first() {
        let grid = Grid::new(vec![dim("@1", 0..=1), dim("@2", 5..=7)]).unwrap();
        assert_eq!(grid.len(), 6);
        let points: Vec<_> = grid.points().collect();
        assert_eq!(
            points,
            vec![
                vec![0, 5],
                vec![0, 6],
                vec![0, 7],
                vec![1, 5],
                vec![1, 6],
                vec![1, 7],
            ]
        );
    }

    #[test]
    fn grid_with_empty_dimension() {
        let grid = Grid::new(vec![dim("@1", 0..=9), dim("@2", 3..=2)]).unwrap();
        assert!(grid.is_empty());
        assert_eq!(grid.points().count(), 0);
        assert_eq!(grid.point(0), None);
    }

    #[test]
    fn grid_without_dimensions_has_one_point() {
        let grid = Grid::new(vec![]).unwrap();
        assert_eq!(grid.len(), 1);
        assert_eq!(grid.point(0), Some(Vec::<i64>::new()));
        assert_eq!(grid.point(1), None);
    }

    #[test]
    fn grid_negative_ranges() {
        let grid = Grid::new(vec![dim("a", -2..=-1)]).unwrap();
        assert_eq!(grid.points().collect::<Vec<_>>(), vec![vec![-2], vec![-1]]);
    }

    #[test]
    fn grid_too_large() {
        assert_eq!(
            Grid::new(vec![dim("a", i64::MIN..=i64::MAX), dim("b", 0..=1)]).unwrap_err(),
            VMError::SearchSpaceTooLarge
        );
    }

    #[test]
    fn sweep_tie_break_is_enumeration_order() {
        let program = Program::parse(TWO_X_PLUS_Y).unwrap();
        let interpreter = Interpreter::new(Dialect::Tape);
        let target = Target::new(Location::Cell(0), 5);
        // satisfiable at (0,5), (1,3) and (2,1)
        for workers in [1, 4] {
            let found = sweep_for_target(
                &interpreter,
                &program,
                &tape_base(),
                vec![dim("@1", 0..=9), dim("@2", 0..=9)],
                &SearchConfig::default().with_workers(workers),
                &target,
            )
            .unwrap();
            assert_eq!(found.candidate, vec![0, 5], "workers = {workers}");
            assert_eq!(found.result.final_state.memory(), &[5, 0, 5]);
        }
    }

    #[test]
    fn sweep_tie_break_follows_dimension_priority() {
        let program = Program::parse(TWO_X_PLUS_Y).unwrap();
        let interpreter = Interpreter::new(Dialect::Tape);
        let target = Target::new(Location::Cell(0), 5);
        // y outermost now: (y=1, x=2) comes first
        let found = sweep_for_target(
            &interpreter,
            &program,
            &tape_base(),
            vec![dim("@2", 0..=9), dim("@1", 0..=9)],
            &SearchConfig::default(),
            &target,
        )
        .unwrap();
        assert_eq!(found.candidate, vec![1, 2]);
    }

    #[test]
    fn sweep_noun_verb_style() {
        // mem[0] = mem[1] * 100 + mem[2]
        let program = Program::parse("mul 0, 1, 3\nadd 0, 0, 2\nhlt").unwrap();
        let interpreter = Interpreter::new(Dialect::Tape);
        let base = MachineState::new(Dialect::Tape).with_memory(vec![0, 0, 0, 100]);
        let found = sweep_for_target(
            &interpreter,
            &program,
            &base,
            vec![dim("@1", 0..=99), dim("@2", 0..=99)],
            &SearchConfig::default().with_workers(3),
            &Target::new(Location::Cell(0), 1202),
        )
        .unwrap();
        assert_eq!(found.candidate, vec![12, 2]);
    }

    #[test]
    fn sweep_register_dialect() {
        // a = 3 * a + 1 after the run
        let program = Program::parse("tpl a\ninc a\njie b, +2\ninc b").unwrap();
        let interpreter = Interpreter::new(Dialect::Lock);
        let found = sweep_for_target(
            &interpreter,
            &program,
            &MachineState::new(Dialect::Lock),
            vec![dim("a", 0..=20)],
            &SearchConfig::default(),
            &Target::new(Location::Register("a".into()), 31),
        )
        .unwrap();
        assert_eq!(found.candidate, vec![10]);
    }

    #[test]
    fn sweep_rejects_non_terminating_candidates() {
        // a == 1 loops forever; everything else halts with a unchanged
        let program = Program::parse("jio a, +0").unwrap();
        let interpreter = Interpreter::new(Dialect::Lock);
        let config = SearchConfig::default().with_run(RunConfig::default().with_max_steps(Some(100)));
        let found = parameter_sweep(
            &interpreter,
            &program,
            &MachineState::new(Dialect::Lock),
            vec![dim("a", 1..=3)],
            &config,
            |_| true,
        )
        .unwrap();
        assert_eq!(found.candidate, vec![2]);
    }

    #[test]
    fn grid_point_past_end() {
        let grid = Grid::new(vec![dim("@1", 0..=1), dim("@2", 0..=2)]).unwrap();
        assert_eq!(grid.point(5), Some(vec![1, 2]));
        assert_eq!(grid.point(6), None);
    }

    #[test]
    fn sweep_skips_candidates_whose_run_fails() {
        // a == 0 falls through to `tpl b` and overflows; a == 1 jumps past the end
        let program = Program::parse("jio a, +2\ntpl b").unwrap();
        let mut base = MachineState::new(Dialect::Lock);
        base.set(&Location::Register("b".into()), i64::MAX / 2).unwrap();
        for workers in [1, 4] {
            let found = sweep_for_target(
                &Interpreter::new(Dialect::Lock),
                &program,
                &base,
                vec![dim("a", 0..=1)],
                &SearchConfig::default().with_workers(workers),
                &Target::new(Location::Register("a".into()), 1),
            )
            .unwrap();
            assert_eq!(found.candidate, vec![1], "workers = {workers}");
        }
    }

    #[test]
    fn sweep_where_every_run_fails_is_exhausted() {
        let program = Program::parse("add 0, 1, 2\nmul 0, 0, 0").unwrap();
        let base = MachineState::new(Dialect::Tape).with_memory(vec![0, i64::MAX, 0]);
        let err = parameter_sweep(
            &Interpreter::new(Dialect::Tape),
            &program,
            &base,
            vec![dim("@2", 0..=2)],
            &SearchConfig::default(),
            |_| true,
        )
        .unwrap_err();
        assert_eq!(err, VMError::NoSatisfyingCandidate { evaluated: 3 });
    }

    #[test]
    fn sweep_exhausted() {
        let program = Program::parse(TWO_X_PLUS_Y).unwrap();
        let err = sweep_for_target(
            &Interpreter::new(Dialect::Tape),
            &program,
            &tape_base(),
            vec![dim("@1", 0..=2), dim("@2", 0..=2)],
            &SearchConfig::default(),
            &Target::new(Location::Cell(0), 1000),
        )
        .unwrap_err();
        assert_eq!(err, VMError::NoSatisfyingCandidate { evaluated: 9 });
    }

    #[test]
    fn sweep_empty_grid_is_exhausted() {
        let program = Program::parse(TWO_X_PLUS_Y).unwrap();
        let err = sweep_for_target(
            &Interpreter::new(Dialect::Tape),
            &program,
            &tape_base(),
            vec![dim("@1", 5..=0)],
            &SearchConfig::default(),
            &Target::new(Location::Cell(0), 0),
        )
        .unwrap_err();
        assert_eq!(err, VMError::NoSatisfyingCandidate { evaluated: 0 });
    }

    #[test]
    fn sweep_propagates_malformed_input() {
        let interpreter = Interpreter::new(Dialect::Tape);
        let bad_program = Program::parse("sub 0, 1, 2").unwrap();
        assert!(matches!(
            sweep_for_target(
                &interpreter,
                &bad_program,
                &tape_base(),
                vec![dim("@1", 5..=0)],
                &SearchConfig::default(),
                &Target::new(Location::Cell(0), 0),
            ),
            Err(VMError::InvalidOpcode { .. })
        ));

        let program = Program::parse(TWO_X_PLUS_Y).unwrap();
        assert!(matches!(
            sweep_for_target(
                &interpreter,
                &program,
                &tape_base(),
                vec![dim("@7", 0..=1)],
                &SearchConfig::default(),
                &Target::new(Location::Cell(0), 0),
            ),
            Err(VMError::AddressOutOfBounds { address: 7, .. })
        ));

        assert!(matches!(
            sweep_for_target(
                &interpreter,
                &program,
                &tape_base(),
                vec![dim("@1", 0..=1)],
                &SearchConfig::default(),
                &Target::new(Location::Register("acc".into()), 0),
            ),
            Err(VMError::UnknownRegister { .. })
        ));
    }

    #[test]
    fn parse_dimension() {
        assert_eq!("@1=0..99".parse::<Dimension>().unwrap(), dim("@1", 0..=99));
        assert_eq!("a=-5..=5".parse::<Dimension>().unwrap(), dim("a", -5..=5));
        assert!("a=5".parse::<Dimension>().is_err());
        assert!("a=x..3".parse::<Dimension>().is_err());
    }
}
