//! Rank-one updates of the bordered inverse when a variable changes sides.

use super::CriticalLineTracer;
use crate::error::{ClaError, ClaResult};
use crate::partition::{BoundSide, VariablePartition};
use crate::workspace::{RunState, WorkingProblem};

impl CriticalLineTracer {
    /// `j_add` comes IN: grow `Mi` by one row and column.
    pub(super) fn add_variable(
        &mut self,
        j_add: usize,
        partition: &mut VariablePartition,
        problem: &WorkingProblem,
        state: &RunState,
    ) -> ClaResult<()> {
        let mmat = &problem.mmat;
        let in_vars: Vec<usize> = partition.in_vars().iter().collect();

        // xi = Mi(IN,IN) · M(IN,jAdd)
        for &j in &in_vars {
            let mut sum = 0.0;
            for &k in &in_vars {
                sum += self.mi[(j, k)] * mmat[(k, j_add)];
            }
            self.xi[j] = sum;
        }

        let mut xij = mmat[(j_add, j_add)];
        for &k in &in_vars {
            xij -= mmat[(j_add, k)] * self.xi[k];
        }
        if xij == 0.0 || !xij.is_finite() {
            return Err(ClaError::NumericalBreakdown("zero pivot when adding a variable"));
        }

        for (p, &j) in in_vars.iter().enumerate() {
            for &k in &in_vars[..p] {
                let v = self.mi[(j, k)] + self.xi[j] * self.xi[k] / xij;
                self.mi[(j, k)] = v;
                self.mi[(k, j)] = v;
            }
            self.mi[(j, j)] += self.xi[j] * self.xi[j] / xij;
            let edge = -self.xi[j] / xij;
            self.mi[(j, j_add)] = edge;
            self.mi[(j_add, j)] = edge;
        }
        self.mi[(j_add, j_add)] = 1.0 / xij;

        let w_add = state.weights[j_add];
        for &j in &in_vars {
            self.bbar[j] += mmat[(j, j_add)] * w_add;
        }

        partition.enter(j_add)?;

        let mut sum = 0.0;
        for j in partition.out_vars().iter() {
            sum -= mmat[(j_add, j)] * state.weights[j];
        }
        self.bbar[j_add] = sum;
        Ok(())
    }

    /// `j_del` goes OUT at `side`: shrink `Mi` by one row and column.
    pub(super) fn delete_variable(
        &mut self,
        j_del: usize,
        side: BoundSide,
        partition: &mut VariablePartition,
        problem: &WorkingProblem,
        state: &RunState,
    ) -> ClaResult<()> {
        let w_del = state.weights[j_del];
        self.alpha[j_del] = w_del;
        self.beta[j_del] = 0.0;

        partition.leave(j_del, side, problem)?;

        let pivot = self.mi[(j_del, j_del)];
        if pivot == 0.0 || !pivot.is_finite() {
            return Err(ClaError::NumericalBreakdown("zero pivot when deleting a variable"));
        }

        let in_vars: Vec<usize> = partition.in_vars().iter().collect();
        for &j in &in_vars {
            let factor = self.mi[(j, j_del)] / pivot;
            for &k in &in_vars {
                let v = self.mi[(j_del, k)];
                self.mi[(j, k)] -= factor * v;
            }
        }

        for &j in &in_vars {
            self.bbar[j] -= problem.mmat[(j, j_del)] * w_del;
        }
        Ok(())
    }
}
