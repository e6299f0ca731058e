//! Machine state and state locations.
//!
//! [`MachineState`] is the mutable-per-run half of the VM: a fixed register
//! file whose names come from the active [`Dialect`], an optional flat
//! memory, the program counter, and the halted flag. Every run owns its own
//! copy, so candidate evaluations never share state.
//!
//! [`Location`] names a single cell of that state (a register or a memory
//! cell) so searches can override inputs and read results generically.

use crate::virtual_machine::dialect::Dialect;
use crate::virtual_machine::errors::VMError;
use std::fmt;
use std::str::FromStr;

/// Prefix marking a memory cell in location text (`@12`).
const CELL_PREFIX: char = '@';

/// Registers, memory, program counter and halted flag for one run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MachineState {
    dialect: Dialect,
    registers: Vec<i64>,
    memory: Vec<i64>,
    /// Index of the next instruction to execute. May leave the program range.
    pub pc: i64,
    /// Set once the run stops on a halt (explicit or implicit).
    pub halted: bool,
}

impl MachineState {
    /// Creates a zeroed state with the register set of `dialect` and no memory.
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            registers: vec![0; dialect.registers().len()],
            memory: Vec::new(),
            pc: 0,
            halted: false,
        }
    }

    /// Replaces the flat memory with `memory`. Its length is fixed for the run.
    pub fn with_memory(mut self, memory: Vec<i64>) -> Self {
        self.memory = memory;
        self
    }

    /// Returns the dialect this state was laid out for.
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Returns the value of register `idx`.
    ///
    /// `idx` comes from decoding against the same dialect, so it is in range.
    pub(crate) fn register(&self, idx: usize) -> i64 {
        self.registers[idx]
    }

    pub(crate) fn set_register(&mut self, idx: usize, value: i64) {
        self.registers[idx] = value;
    }

    /// Reads memory cell `address`.
    ///
    /// Returns [`VMError::AddressOutOfBounds`] past the allocated length.
    pub fn load(&self, address: usize) -> Result<i64, VMError> {
        self.memory
            .get(address)
            .copied()
            .ok_or(VMError::AddressOutOfBounds {
                address,
                len: self.memory.len(),
            })
    }

    /// Writes memory cell `address`.
    ///
    /// Returns [`VMError::AddressOutOfBounds`] past the allocated length.
    pub fn store(&mut self, address: usize, value: i64) -> Result<(), VMError> {
        let len = self.memory.len();
        let slot = self
            .memory
            .get_mut(address)
            .ok_or(VMError::AddressOutOfBounds { address, len })?;
        *slot = value;
        Ok(())
    }

    /// Returns the flat memory.
    pub fn memory(&self) -> &[i64] {
        &self.memory
    }

    /// Returns `(name, value)` pairs for every register, in dialect order.
    pub fn registers(&self) -> impl Iterator<Item = (&'static str, i64)> + '_ {
        self.dialect
            .registers()
            .iter()
            .copied()
            .zip(self.registers.iter().copied())
    }

    /// Reads the value at `location`.
    pub fn get(&self, location: &Location) -> Result<i64, VMError> {
        match location {
            Location::Register(name) => {
                let idx = self.dialect.register_index(name)?;
                Ok(self.registers[idx])
            }
            Location::Cell(address) => self.load(*address),
        }
    }

    /// Writes `value` at `location`.
    pub fn set(&mut self, location: &Location, value: i64) -> Result<(), VMError> {
        match location {
            Location::Register(name) => {
                let idx = self.dialect.register_index(name)?;
                self.registers[idx] = value;
                Ok(())
            }
            Location::Cell(address) => self.store(*address, value),
        }
    }
}

impl fmt::Display for MachineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in self.registers() {
            write!(f, "{name}={value} ")?;
        }
        if !self.memory.is_empty() {
            write!(f, "mem[0]={} len={} ", self.memory[0], self.memory.len())?;
        }
        write!(f, "pc={}", self.pc)?;
        if self.halted {
            write!(f, " halted")?;
        }
        Ok(())
    }
}

/// One addressable cell of machine state.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum Location {
    /// A named register of the active dialect.
    Register(String),
    /// A flat-memory cell.
    Cell(usize),
}

impl FromStr for Location {
    type Err = VMError;

    /// Parses `name` as a register and `@N` as memory cell `N`.
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let invalid = || VMError::InvalidLocation {
            text: text.to_string(),
        };
        let text = text.trim();
        if let Some(cell) = text.strip_prefix(CELL_PREFIX) {
            return cell.parse::<usize>().map(Location::Cell).map_err(|_| invalid());
        }
        let mut chars = text.chars();
        match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
            _ => return Err(invalid()),
        }
        if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(invalid());
        }
        Ok(Location::Register(text.to_ascii_lowercase()))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Register(name) => write!(f, "{name}"),
            Location::Cell(address) => write!(f, "{CELL_PREFIX}{address}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_state_is_zeroed() {
        let state = MachineState::new(Dialect::Lock);
        assert_eq!(state.registers().collect::<Vec<_>>(), vec![("a", 0), ("b", 0)]);
        assert_eq!(state.pc, 0);
        assert!(!state.halted);
        assert!(state.memory().is_empty());
    }

    #[test]
    fn get_and_set_by_location() {
        let mut state = MachineState::new(Dialect::Lock);
        state.set(&"b".parse().unwrap(), 9).unwrap();
        assert_eq!(state.get(&Location::Register("b".into())).unwrap(), 9);
        assert_eq!(state.get(&Location::Register("a".into())).unwrap(), 0);
    }

    #[test]
    fn unknown_register_location() {
        let state = MachineState::new(Dialect::Accumulator);
        assert!(matches!(
            state.get(&Location::Register("x".into())),
            Err(VMError::UnknownRegister { .. })
        ));
    }

    #[test]
    fn cell_out_of_bounds() {
        let mut state = MachineState::new(Dialect::Tape).with_memory(vec![1, 2]);
        assert_eq!(state.get(&Location::Cell(1)).unwrap(), 2);
        assert_eq!(
            state.set(&Location::Cell(2), 5),
            Err(VMError::AddressOutOfBounds { address: 2, len: 2 })
        );
    }

    #[test]
    fn parse_location() {
        assert_eq!("acc".parse::<Location>().unwrap(), Location::Register("acc".into()));
        assert_eq!("A".parse::<Location>().unwrap(), Location::Register("a".into()));
        assert_eq!("@12".parse::<Location>().unwrap(), Location::Cell(12));
        assert!("@-1".parse::<Location>().is_err());
        assert!("1a".parse::<Location>().is_err());
        assert!("".parse::<Location>().is_err());
    }

    #[test]
    fn display_state() {
        let mut state = MachineState::new(Dialect::Accumulator);
        state.set(&Location::Register("acc".into()), 5).unwrap();
        state.pc = 9;
        state.halted = true;
        assert_eq!(state.to_string(), "acc=5 pc=9 halted");
    }
}
