//! State-transition functions for every opcode.
//!
//! Each function receives the machine state and the decoded operands of one
//! instruction, updates registers or memory, and reports how the program
//! counter moves. The program counter itself is advanced by the interpreter.
//! Arithmetic is checked: overflow fails the run instead of wrapping.

use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::state::MachineState;

/// Register written by accumulator-style opcodes.
const ACCUMULATOR: usize = 0;

/// How the program counter moves after an operation.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Flow {
    /// Continue with the next instruction.
    Next,
    /// Move the pc by a signed offset.
    Relative(i64),
    /// Set the pc to an absolute instruction index.
    Absolute(i64),
    /// Stop execution successfully.
    Halt,
}

fn overflow(state: &MachineState, opcode: &'static str) -> VMError {
    VMError::ArithmeticOverflow {
        opcode,
        pc: state.pc,
    }
}

pub(crate) fn op_accumulate(state: &mut MachineState, delta: i64) -> Result<Flow, VMError> {
    let acc = state.register(ACCUMULATOR);
    let value = acc
        .checked_add(delta)
        .ok_or_else(|| overflow(state, "Accumulate"))?;
    state.set_register(ACCUMULATOR, value);
    Ok(Flow::Next)
}

pub(crate) fn op_nop(_state: &mut MachineState, _arg: i64) -> Result<Flow, VMError> {
    Ok(Flow::Next)
}

/// Halves `reg`, rounding toward negative infinity (`-7` becomes `-4`).
pub(crate) fn op_half(state: &mut MachineState, reg: usize) -> Result<Flow, VMError> {
    let value = state.register(reg).div_euclid(2);
    state.set_register(reg, value);
    Ok(Flow::Next)
}

pub(crate) fn op_triple(state: &mut MachineState, reg: usize) -> Result<Flow, VMError> {
    let value = state
        .register(reg)
        .checked_mul(3)
        .ok_or_else(|| overflow(state, "Triple"))?;
    state.set_register(reg, value);
    Ok(Flow::Next)
}

pub(crate) fn op_increment(state: &mut MachineState, reg: usize) -> Result<Flow, VMError> {
    let value = state
        .register(reg)
        .checked_add(1)
        .ok_or_else(|| overflow(state, "Increment"))?;
    state.set_register(reg, value);
    Ok(Flow::Next)
}

pub(crate) fn op_add(
    state: &mut MachineState,
    dst: usize,
    a: usize,
    b: usize,
) -> Result<Flow, VMError> {
    let va = state.load(a)?;
    let vb = state.load(b)?;
    let value = va.checked_add(vb).ok_or_else(|| overflow(state, "Add"))?;
    state.store(dst, value)?;
    Ok(Flow::Next)
}

pub(crate) fn op_multiply(
    state: &mut MachineState,
    dst: usize,
    a: usize,
    b: usize,
) -> Result<Flow, VMError> {
    let va = state.load(a)?;
    let vb = state.load(b)?;
    let value = va
        .checked_mul(vb)
        .ok_or_else(|| overflow(state, "Multiply"))?;
    state.store(dst, value)?;
    Ok(Flow::Next)
}

pub(crate) fn op_jump_relative(_state: &mut MachineState, offset: i64) -> Result<Flow, VMError> {
    Ok(Flow::Relative(offset))
}

pub(crate) fn op_jump_absolute(_state: &mut MachineState, target: i64) -> Result<Flow, VMError> {
    Ok(Flow::Absolute(target))
}

pub(crate) fn op_jump_if_even(
    state: &mut MachineState,
    reg: usize,
    offset: i64,
) -> Result<Flow, VMError> {
    if state.register(reg).rem_euclid(2) == 0 {
        Ok(Flow::Relative(offset))
    } else {
        Ok(Flow::Next)
    }
}

pub(crate) fn op_jump_if_one(
    state: &mut MachineState,
    reg: usize,
    offset: i64,
) -> Result<Flow, VMError> {
    if state.register(reg) == 1 {
        Ok(Flow::Relative(offset))
    } else {
        Ok(Flow::Next)
    }
}

pub(crate) fn op_halt(_state: &mut MachineState) -> Result<Flow, VMError> {
    Ok(Flow::Halt)
}
