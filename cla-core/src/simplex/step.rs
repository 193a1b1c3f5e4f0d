use super::inverse;
use super::{BoundedSimplex, SimplexPhase};
use crate::error::{ClaError, ClaResult};
use crate::partition::{BoundSide, VariablePartition};
use crate::problem::{SolveStatus, INFINITY};
use crate::trace::{Trace, TracePoint};
use crate::workspace::{RunState, WorkingProblem};

impl BoundedSimplex {
    /// Pivot until no OUT variable has a positive profit.
    pub(super) fn run_phase(
        &mut self,
        phase: SimplexPhase,
        partition: &mut VariablePartition,
        problem: &WorkingProblem,
        state: &mut RunState,
        trace: &mut Trace<'_>,
    ) -> ClaResult<SolveStatus> {
        let n = problem.num_vars;
        let m = problem.num_constraints;
        let eps = self.epsilon;
        let mut step = 0usize;

        loop {
            step += 1;
            trace.line(TracePoint::SimplexStep, || format!(">> {}", step));
            if self.diagnostics.samples(step) {
                trace.line(TracePoint::SimplexStep, || partition.to_string());
                trace.vector(TracePoint::SimplexStep, "x       ", &state.weights);
                trace.matrix(TracePoint::SimplexStep, "Ai      ", &state.basis_inverse);
            }

            self.compute_prices(partition, state, m);
            trace.vector(TracePoint::BeforeEnteringSelection, "price   ", &self.price);

            let entering = self.select_entering(partition, problem, m);
            trace.vector(TracePoint::AfterEnteringSelection, "profit  ", &self.profit);

            let (j_in, profit_max) = match entering {
                Some((j, p)) if p >= eps => (j, p),
                _ => return Ok(self.phase_end(phase, partition, state)),
            };
            trace.line(TracePoint::AfterEnteringSelection, || {
                format!("jMax {} profitMax {}", j_in, profit_max)
            });
            if self.diagnostics.should_log(step) {
                eprintln!(
                    "simplex {:?} step {:4}: entering={} profit={:.3e} artificials={}",
                    phase, step, j_in, profit_max, self.num_in_artificials
                );
            }

            let increasing = !partition.is_at_upper(j_in);
            for i in 0..m {
                let mut rate = 0.0;
                for k in 0..m {
                    rate -= state.basis_inverse[(i, k)] * problem.lhs[(k, j_in)];
                }
                self.adj_rate[i] = if increasing { rate } else { -rate };
            }

            // Ratio test; the entering variable's own bound range is the
            // first candidate.
            let mut theta = if problem.upper[j_in] >= INFINITY {
                INFINITY
            } else {
                problem.upper[j_in] - problem.lower[j_in]
            };
            let mut i_out: Option<usize> = None;
            let mut out_side = if increasing { BoundSide::Upper } else { BoundSide::Lower };

            for i in 0..m {
                let j = partition.in_var_at(i);
                let rate = self.adj_rate[i];
                if rate < -eps {
                    let t = (problem.lower[j] - state.weights[j]) / rate;
                    if t < theta {
                        theta = t;
                        i_out = Some(i);
                        out_side = BoundSide::Lower;
                    }
                } else if rate > eps && problem.upper[j] < INFINITY {
                    let t = (problem.upper[j] - state.weights[j]) / rate;
                    if t < theta {
                        theta = t;
                        i_out = Some(i);
                        out_side = BoundSide::Upper;
                    }
                }
            }
            trace.vector(TracePoint::AfterRatioTest, "adjRate ", &self.adj_rate);
            trace.line(TracePoint::AfterRatioTest, || {
                format!("theta {} iOut {:?} outSide {:?}", theta, i_out, out_side)
            });

            if theta >= INFINITY {
                return Ok(SolveStatus::Unbounded);
            }

            let j_out = match i_out {
                Some(i) => partition.in_var_at(i),
                None => j_in,
            };

            for i in 0..m {
                let j = partition.in_var_at(i);
                state.weights[j] += theta * self.adj_rate[i];
            }
            if increasing {
                state.weights[j_in] += theta;
            } else {
                state.weights[j_in] -= theta;
            }

            partition.enter(j_in)?;
            partition.leave(j_out, out_side, problem)?;

            if j_in != j_out {
                let del_row = i_out.ok_or(ClaError::MissingCandidate("ratio test picked no basis row"))?;
                inverse::pivot(&mut state.basis_inverse, &self.adj_rate, del_row, increasing)?;
                let add_row = partition.position_of_in(j_in)?;
                inverse::reorder_rows(&mut state.basis_inverse, del_row, add_row);
                trace.matrix(TracePoint::AfterInverseUpdate, "Ai      ", &state.basis_inverse);
            }

            match phase {
                SimplexPhase::Feasibility => self.feasibility_iters += 1,
                SimplexPhase::Optimize => self.optimize_iters += 1,
            }

            if phase == SimplexPhase::Feasibility && j_out >= n {
                self.num_in_artificials -= 1;
                if self.num_in_artificials == 0 {
                    return Ok(SolveStatus::Ok);
                }
            }
        }
    }

    /// `price = -Aiᵀ z_B`
    fn compute_prices(&mut self, partition: &VariablePartition, state: &RunState, m: usize) {
        for i in 0..m {
            let mut sum = 0.0;
            for pos in 0..partition.in_count() {
                sum -= state.basis_inverse[(pos, i)] * self.z[partition.in_var_at(pos)];
            }
            self.price[i] = sum;
        }
    }

    /// Profit of every OUT variable, sign-flipped for variables at their
    /// upper bound. Returns the best candidate; ties go to the later index.
    fn select_entering(
        &mut self,
        partition: &VariablePartition,
        problem: &WorkingProblem,
        m: usize,
    ) -> Option<(usize, f64)> {
        let mut best: Option<(usize, f64)> = None;
        let mut profit_max = 0.0;

        for j in partition.out_vars().iter() {
            let mut profit = self.z[j];
            for i in 0..m {
                profit += problem.lhs[(i, j)] * self.price[i];
            }
            if partition.is_at_upper(j) {
                profit = -profit;
            }
            self.profit[j] = profit;
            if profit >= profit_max {
                profit_max = profit;
                best = Some((j, profit));
            }
        }
        best
    }

    /// No improving variable is left. The feasibility phase only gets here
    /// with artificials still basic: positive ones mean infeasible, all-zero
    /// ones mean degenerate.
    fn phase_end(&self, phase: SimplexPhase, partition: &VariablePartition, state: &RunState) -> SolveStatus {
        if phase == SimplexPhase::Optimize {
            return SolveStatus::Ok;
        }
        let count = partition.in_count();
        for t in 0..self.num_in_artificials {
            let j = partition.in_var_at(count - 1 - t);
            if state.weights[j] > self.epsilon {
                return SolveStatus::Infeasible;
            }
        }
        SolveStatus::Degenerate
    }
}
