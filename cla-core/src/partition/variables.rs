//! IN / OUT bookkeeping shared by the simplex and critical line phases.

use std::fmt;

use super::ordered_set::OrderedIndexSet;
use crate::error::ClaResult;
use crate::workspace::WorkingProblem;

/// Which bound an OUT variable rests on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundSide {
    Lower,
    Upper,
}

/// Per-variable tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarState {
    /// Basic / active
    In,
    /// Fixed at its lower bound
    AtLower,
    /// Fixed at its upper bound
    AtUpper,
}

impl From<BoundSide> for VarState {
    fn from(side: BoundSide) -> Self {
        match side {
            BoundSide::Lower => VarState::AtLower,
            BoundSide::Upper => VarState::AtUpper,
        }
    }
}

impl fmt::Display for VarState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VarState::In => write!(f, "IN"),
            VarState::AtLower => write!(f, "LO"),
            VarState::AtUpper => write!(f, "UP"),
        }
    }
}

/// IN set, OUT set and a state tag for every variable index.
///
/// Indices `0..n` are securities and slacks, `n..n+m` are artificial basis
/// variables during the simplex and Lagrange multipliers during the critical
/// line phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariablePartition {
    in_vars: OrderedIndexSet,
    out_vars: OrderedIndexSet,
    states: Vec<VarState>,
}

impl VariablePartition {
    /// Empty partition over `size` indices, every tag initialised to lower.
    pub fn new(size: usize) -> Self {
        Self {
            in_vars: OrderedIndexSet::with_capacity(size),
            out_vars: OrderedIndexSet::with_capacity(size),
            states: vec![VarState::AtLower; size],
        }
    }

    pub fn size(&self) -> usize {
        self.states.len()
    }

    /// Place `j` in the IN set without touching OUT (setup only).
    pub fn add_in(&mut self, j: usize) -> ClaResult<()> {
        self.in_vars.insert(j)?;
        self.states[j] = VarState::In;
        Ok(())
    }

    /// Place `j` in the OUT set at `side` without touching IN (setup only).
    pub fn add_out(&mut self, j: usize, side: BoundSide) -> ClaResult<()> {
        self.out_vars.insert(j)?;
        self.states[j] = side.into();
        Ok(())
    }

    /// Variable `j` moves from OUT to IN.
    pub fn enter(&mut self, j: usize) -> ClaResult<()> {
        self.out_vars.delete(j)?;
        self.in_vars.insert(j)?;
        self.states[j] = VarState::In;
        Ok(())
    }

    /// Variable `j` leaves IN at `side`.
    ///
    /// Only securities and slacks are parked in OUT; an artificial basis
    /// variable that leaves is dropped from both sets for good.
    pub fn leave(&mut self, j: usize, side: BoundSide, problem: &WorkingProblem) -> ClaResult<()> {
        self.in_vars.delete(j)?;
        if !problem.is_artificial(j) {
            self.out_vars.insert(j)?;
        }
        self.states[j] = side.into();
        Ok(())
    }

    #[inline]
    pub fn state(&self, j: usize) -> VarState {
        self.states[j]
    }

    #[inline]
    pub fn is_at_upper(&self, j: usize) -> bool {
        self.states[j] == VarState::AtUpper
    }

    #[inline]
    pub fn is_at_lower(&self, j: usize) -> bool {
        self.states[j] == VarState::AtLower
    }

    #[inline]
    pub fn in_count(&self) -> usize {
        self.in_vars.len()
    }

    #[inline]
    pub fn out_count(&self) -> usize {
        self.out_vars.len()
    }

    #[inline]
    pub fn in_var_at(&self, pos: usize) -> usize {
        self.in_vars.at(pos)
    }

    #[inline]
    pub fn out_var_at(&self, pos: usize) -> usize {
        self.out_vars.at(pos)
    }

    pub fn position_of_in(&self, j: usize) -> ClaResult<usize> {
        self.in_vars.position_of(j)
    }

    pub fn position_of_out(&self, j: usize) -> ClaResult<usize> {
        self.out_vars.position_of(j)
    }

    pub fn in_vars(&self) -> &OrderedIndexSet {
        &self.in_vars
    }

    pub fn out_vars(&self) -> &OrderedIndexSet {
        &self.out_vars
    }

    /// Grow (or shrink) the index range, keeping set contents and tags.
    pub fn resize(&mut self, size: usize) {
        self.in_vars.resize(size);
        self.out_vars.resize(size);
        self.states.resize(size, VarState::AtLower);
    }
}

impl fmt::Display for VariablePartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "state   ")?;
        for s in &self.states {
            write!(f, " {} ", s)?;
        }
        writeln!(f)?;
        write!(f, "inVars  ")?;
        for j in self.in_vars.iter() {
            write!(f, " {} ", j)?;
        }
        writeln!(f)?;
        write!(f, "outVars ")?;
        for j in self.out_vars.iter() {
            write!(f, " {} ", j)?;
        }
        Ok(())
    }
}
