//! Bounded two-phase simplex.
//!
//! Phase one drives the artificial basis variables out of the basis to reach
//! a feasible vertex; phase two walks vertices toward maximum expected return.
//! The final vertex seeds the critical line tracer.

mod inverse;
mod step;

use crate::diagnostics::DiagnosticsConfig;
use crate::error::ClaResult;
use crate::partition::{BoundSide, VariablePartition};
use crate::problem::{SolveStatus, SolverSettings, MU_NUDGE};
use crate::trace::{Trace, TracePoint};
use crate::workspace::{RunState, WorkingProblem};

/// Which objective the current phase prices with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimplexPhase {
    /// Minimise the artificial variables (cost -1 each)
    Feasibility,
    /// Maximise expected return
    Optimize,
}

/// Simplex driver. Owns the pricing workspace; the partition, working
/// problem and run state are borrowed from the orchestrator.
#[derive(Debug, Clone)]
pub struct BoundedSimplex {
    /// Phase cost per variable
    z: Vec<f64>,
    /// Simplex multipliers, one per constraint
    price: Vec<f64>,
    /// Reduced profit per variable; only OUT entries are meaningful
    profit: Vec<f64>,
    /// Rate of change of each basic variable per unit entering step
    adj_rate: Vec<f64>,
    /// Artificial variables still in the basis
    num_in_artificials: usize,

    epsilon: f64,
    allow_degenerate: bool,
    verbose: bool,
    diagnostics: DiagnosticsConfig,

    pub feasibility_iters: usize,
    pub optimize_iters: usize,
}

impl BoundedSimplex {
    pub fn new(problem: &WorkingProblem, settings: &SolverSettings) -> Self {
        let size = problem.size();
        let m = problem.num_constraints;
        Self {
            z: vec![0.0; size],
            price: vec![0.0; m],
            profit: vec![0.0; size],
            adj_rate: vec![0.0; m],
            num_in_artificials: 0,
            epsilon: settings.epsilon,
            allow_degenerate: settings.allow_degenerate,
            verbose: settings.verbose,
            diagnostics: DiagnosticsConfig::default(),
            feasibility_iters: 0,
            optimize_iters: 0,
        }
    }

    /// Sample the per-step progress lines and state dumps.
    pub fn with_diagnostics(mut self, diagnostics: DiagnosticsConfig) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Run both phases. On [`SolveStatus::Ok`] the partition, weights and
    /// basis inverse describe the return-maximizing vertex and the expected
    /// returns carry the tie-breaking nudge.
    pub fn run(
        &mut self,
        partition: &mut VariablePartition,
        problem: &mut WorkingProblem,
        state: &mut RunState,
        trace: &mut Trace<'_>,
    ) -> ClaResult<SolveStatus> {
        self.setup(partition, problem, state)?;

        let status = self.run_phase(SimplexPhase::Feasibility, partition, problem, state, trace)?;
        trace.line(TracePoint::PhaseEnd, || format!("feasibility phase: {}", status));

        match status {
            SolveStatus::Ok => {
                problem.drop_artificials();
                state.weights.truncate(problem.num_vars);
            }
            SolveStatus::Degenerate if self.allow_degenerate => {
                if self.verbose {
                    eprintln!(
                        "simplex: degenerate feasibility phase, pinning {} artificial variables to [0, {:e}]",
                        problem.num_constraints, self.epsilon
                    );
                }
                problem.absorb_artificials(self.epsilon);
                let size = problem.size();
                partition.resize(size);
                self.z.resize(size, 0.0);
                self.profit.resize(size, 0.0);
            }
            _ => return Ok(status),
        }

        for j in 0..problem.num_vars {
            self.z[j] = problem.expected_returns[j];
        }

        let status = self.run_phase(SimplexPhase::Optimize, partition, problem, state, trace)?;
        trace.line(TracePoint::PhaseEnd, || format!("optimize phase: {}", status));

        if status.is_ok() {
            self.alter_mu(partition, problem);
        }

        if self.verbose {
            eprintln!(
                "simplex: {} ({} feasibility + {} optimize steps)",
                status, self.feasibility_iters, self.optimize_iters
            );
        }
        Ok(status)
    }

    /// Every variable starts out at its lower bound; one artificial per
    /// constraint absorbs the residual.
    fn setup(
        &mut self,
        partition: &mut VariablePartition,
        problem: &mut WorkingProblem,
        state: &mut RunState,
    ) -> ClaResult<()> {
        let n = problem.num_vars;
        let m = problem.num_constraints;

        for j in 0..n {
            partition.add_out(j, BoundSide::Lower)?;
            state.weights[j] = problem.lower[j];
            self.z[j] = 0.0;
        }

        for i in 0..m {
            let mut residual = problem.rhs[i];
            for j in 0..n {
                residual -= problem.lhs[(i, j)] * problem.lower[j];
            }
            let coef = if residual >= 0.0 { 1.0 } else { -1.0 };
            problem.lhs[(i, n + i)] = coef;
            state.basis_inverse[(i, i)] = coef;

            partition.add_in(n + i)?;
            state.weights[n + i] = residual.abs();
            self.z[n + i] = -1.0;
        }
        self.num_in_artificials = m;
        Ok(())
    }

    /// Nudge the return of every OUT variable with a near-zero profit so that
    /// the first critical line is entered with no ties.
    fn alter_mu(&self, partition: &VariablePartition, problem: &mut WorkingProblem) {
        for j in partition.out_vars().iter() {
            if self.profit[j] > -MU_NUDGE {
                if partition.is_at_lower(j) {
                    problem.expected_returns[j] -= MU_NUDGE;
                } else {
                    problem.expected_returns[j] += MU_NUDGE;
                }
            }
        }
    }
}
