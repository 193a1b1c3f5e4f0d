//! Critical line tracer.
//!
//! Starting from the return-maximizing vertex, λE is lowered step by step.
//! On each critical line the IN variables move linearly in λE
//! (`w = α + β·λE`); the line ends when an IN variable hits a bound (λA) or
//! an OUT variable wants to come IN (λB). Each step applies the pending
//! add/delete as a rank-one update of the bordered inverse `Mi` and emits a
//! corner portfolio.

mod corner;
mod update;

pub use corner::{CornerPortfolio, FrontierSegment};

use nalgebra::DMatrix;

use crate::error::{ClaError, ClaResult};
use crate::partition::{BoundSide, VariablePartition};
use crate::problem::{SolverSettings, INFINITY, INVALID, KINK_THRESHOLD};
use crate::trace::{Trace, TracePoint};
use crate::workspace::{RunState, WorkingProblem};

#[derive(Debug, Clone)]
pub struct CriticalLineTracer {
    /// Inverse of M restricted to the IN set, stored at full (n+m)² size
    mi: DMatrix<f64>,
    bbar: Vec<f64>,
    alpha: Vec<f64>,
    beta: Vec<f64>,
    xi: Vec<f64>,

    lambda_a: f64,
    lambda_b: f64,
    /// IN variable that reaches a bound first, and which bound
    leaving: Option<(usize, BoundSide)>,
    /// OUT variable that comes IN first, and the bound it leaves
    entering: Option<(usize, BoundSide)>,

    old_lambda_e: f64,
    iteration: usize,
    epsilon: f64,
}

impl CriticalLineTracer {
    /// Build `Mi` and `bbar` for the simplex vertex. The multipliers
    /// `n..n+m` join the IN set here.
    pub fn setup(
        partition: &mut VariablePartition,
        problem: &mut WorkingProblem,
        state: &mut RunState,
        settings: &SolverSettings,
        trace: &mut Trace<'_>,
    ) -> ClaResult<Self> {
        let n = problem.num_vars;
        let m = problem.num_constraints;
        let size = n + m;

        state.weights.resize(size, 0.0);

        let mut alpha = vec![0.0; size];
        let beta = vec![0.0; size];
        for j in partition.out_vars().iter() {
            alpha[j] = state.weights[j];
        }

        for j in n..size {
            partition.add_in(j)?;
        }
        problem.install_border();

        let mmat = &problem.mmat;
        let mut bbar = vec![0.0; size];
        for j in partition.in_vars().iter() {
            let mut sum = if j < n { 0.0 } else { problem.rhs[j - n] };
            for k in partition.out_vars().iter() {
                sum -= mmat[(j, k)] * state.weights[k];
            }
            bbar[j] = sum;
        }

        // Mi = | 0     Ai            |
        //      | Aiᵀ  -Aiᵀ·C_BB·Ai   |
        let ai = &state.basis_inverse;
        let basic: Vec<usize> = (0..m).map(|p| partition.in_var_at(p)).collect();
        let mut mi = DMatrix::zeros(size, size);
        for (p, &j) in basic.iter().enumerate() {
            for i in 0..m {
                mi[(n + i, j)] = ai[(p, i)];
                mi[(j, n + i)] = ai[(p, i)];
            }
        }

        let c_bb = DMatrix::from_fn(m, m, |p, q| mmat[(basic[p], basic[q])]);
        let lower_right = -(ai.transpose() * c_bb * ai);
        mi.view_mut((n, n), (m, m)).copy_from(&lower_right);

        trace.vector(TracePoint::ClaSetup, "bbar     ", &bbar);
        trace.matrix(TracePoint::ClaSetup, "Mi       ", &mi);

        Ok(Self {
            mi,
            bbar,
            alpha,
            beta,
            xi: vec![0.0; size],
            lambda_a: 0.0,
            lambda_b: 0.0,
            leaving: None,
            entering: None,
            old_lambda_e: 0.0,
            iteration: 0,
            epsilon: settings.epsilon,
        })
    }

    pub fn bordered_inverse(&self) -> &DMatrix<f64> {
        &self.mi
    }

    /// Apply the pending change, find the next critical λE and compute the
    /// corner portfolio there.
    pub fn iterate(
        &mut self,
        partition: &mut VariablePartition,
        problem: &WorkingProblem,
        state: &mut RunState,
        trace: &mut Trace<'_>,
    ) -> ClaResult<CornerPortfolio> {
        self.iteration += 1;
        let t = self.iteration;

        trace.line(TracePoint::BeforeStructuralChange, || {
            format!(
                ">> {} lambdaA {} lambdaB {} leaving {:?} entering {:?}",
                t, self.lambda_a, self.lambda_b, self.leaving, self.entering
            )
        });
        trace.line(TracePoint::BeforeStructuralChange, || partition.to_string());

        if t > 1 {
            if self.lambda_a > self.lambda_b {
                let (j_del, side) = self
                    .leaving
                    .ok_or(ClaError::MissingCandidate("no variable recorded to go OUT"))?;
                self.delete_variable(j_del, side, partition, problem, state)?;
            } else {
                let (j_add, _) = self
                    .entering
                    .ok_or(ClaError::MissingCandidate("no variable recorded to come IN"))?;
                self.add_variable(j_add, partition, problem, state)?;
            }
        }

        self.select_leaving(partition, problem);
        trace.vector(TracePoint::AfterLeavingSelection, "alphav   ", &self.alpha);
        trace.vector(TracePoint::AfterLeavingSelection, "betav    ", &self.beta);
        trace.line(TracePoint::AfterLeavingSelection, || {
            format!("lambdaA {} leaving {:?}", self.lambda_a, self.leaving)
        });

        self.select_entering(partition, problem);
        trace.line(TracePoint::AfterEnteringCandidate, || {
            format!("lambdaB {} entering {:?}", self.lambda_b, self.entering)
        });

        state.lambda_e = self.lambda_a.max(self.lambda_b).max(0.0);

        let corner = self.compute_corner(partition, problem, state);
        trace.line(TracePoint::CornerComputed, || {
            format!(
                "corner {} lambdaE {} E {} V {}",
                t, corner.lambda_e, corner.expected_return, corner.variance
            )
        });
        trace.vector(TracePoint::CornerComputed, "weights  ", &corner.weights);
        Ok(corner)
    }

    /// α and β for every IN variable; λA is the largest λE at which a
    /// non-multiplier hits one of its bounds.
    fn select_leaving(&mut self, partition: &VariablePartition, problem: &WorkingProblem) {
        let n = problem.num_vars;
        let eps = self.epsilon;
        self.lambda_a = 0.0;
        self.leaving = None;

        for j in partition.in_vars().iter() {
            let mut alpha = 0.0;
            let mut beta = 0.0;
            for k in partition.in_vars().iter() {
                alpha += self.mi[(j, k)] * self.bbar[k];
                if k < n {
                    beta += self.mi[(j, k)] * problem.expected_returns[k];
                }
            }
            self.alpha[j] = alpha;
            self.beta[j] = beta;

            if j >= n {
                continue;
            }
            let candidate = if beta > eps {
                Some(((problem.lower[j] - alpha) / beta, BoundSide::Lower))
            } else if problem.upper[j] < INFINITY && beta < -eps {
                Some(((problem.upper[j] - alpha) / beta, BoundSide::Upper))
            } else {
                None
            };
            if let Some((lambda, side)) = candidate {
                if lambda >= self.lambda_a {
                    self.lambda_a = lambda;
                    self.leaving = Some((j, side));
                }
            }
        }
    }

    /// λB is the largest λE at which an OUT variable's reduced gradient
    /// changes sign.
    fn select_entering(&mut self, partition: &VariablePartition, problem: &WorkingProblem) {
        let eps = self.epsilon;
        let size = problem.size();
        let mmat = &problem.mmat;
        self.lambda_b = 0.0;
        self.entering = None;

        for j in partition.out_vars().iter() {
            let mut gamma = 0.0;
            let mut delta = -problem.expected_returns[j];
            for k in 0..size {
                gamma += mmat[(j, k)] * self.alpha[k];
                delta += mmat[(j, k)] * self.beta[k];
            }

            let side = if partition.is_at_lower(j) {
                if delta > eps { Some(BoundSide::Lower) } else { None }
            } else if delta < -eps {
                Some(BoundSide::Upper)
            } else {
                None
            };
            if let Some(side) = side {
                let lambda = -gamma / delta;
                if lambda >= self.lambda_b {
                    self.lambda_b = lambda;
                    self.entering = Some((j, side));
                }
            }
        }
    }

    /// Weights, E and V at the new λE, plus the segment coefficients
    /// back to the previous corner.
    fn compute_corner(
        &mut self,
        partition: &VariablePartition,
        problem: &WorkingProblem,
        state: &mut RunState,
    ) -> CornerPortfolio {
        let free = partition.in_count() - problem.num_constraints;
        let lambda_e = state.lambda_e;

        let mut d_e = 0.0;
        for pos in 0..free {
            let j = partition.in_var_at(pos);
            state.weights[j] = self.alpha[j] + self.beta[j] * lambda_e;
            d_e += self.beta[j] * problem.expected_returns[j];
        }

        if d_e < KINK_THRESHOLD {
            state.a0 = INVALID;
            state.a1 = INVALID;
            state.a2 = INVALID;
            state.expected_return = problem.portfolio_return(&state.weights);
            state.variance = problem.portfolio_variance(&state.weights);
        } else {
            let e = state.expected_return;
            state.a2 = 1.0 / d_e;
            state.a1 = 2.0 * (self.old_lambda_e - state.a2 * e);
            state.a0 = state.variance - state.a1 * e - state.a2 * e * e;
            let e = e + (lambda_e - self.old_lambda_e) * d_e;
            state.expected_return = e;
            state.variance = state.a0 + state.a1 * e + state.a2 * e * e;
        }
        self.old_lambda_e = lambda_e;

        let segment = if state.has_segment() {
            Some(FrontierSegment { a0: state.a0, a1: state.a1, a2: state.a2 })
        } else {
            None
        };

        CornerPortfolio {
            iteration: self.iteration,
            weights: state.weights[..problem.num_securities].to_vec(),
            expected_return: state.expected_return,
            variance: state.variance,
            lambda_e,
            segment,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::{ProblemBuilder, ProblemData, SolveStatus};
    use crate::simplex::BoundedSimplex;

    struct Fixture {
        partition: VariablePartition,
        problem: WorkingProblem,
        state: RunState,
        tracer: CriticalLineTracer,
    }

    fn start(data: &ProblemData) -> Fixture {
        let settings = SolverSettings::default().with_allow_degenerate(false);
        let mut problem = WorkingProblem::from_problem(data);
        let mut state = RunState::new(&problem);
        let mut partition = VariablePartition::new(problem.size());
        let mut trace = Trace::disabled();
        let status = BoundedSimplex::new(&problem, &settings)
            .run(&mut partition, &mut problem, &mut state, &mut trace)
            .unwrap();
        assert_eq!(status, SolveStatus::Ok);
        let tracer =
            CriticalLineTracer::setup(&mut partition, &mut problem, &mut state, &settings, &mut trace).unwrap();
        Fixture { partition, problem, state, tracer }
    }

    fn assert_inverse_of_in_block(f: &Fixture) {
        let idx: Vec<usize> = f.partition.in_vars().iter().collect();
        let p = idx.len();
        let m_in = DMatrix::from_fn(p, p, |r, c| f.problem.mmat[(idx[r], idx[c])]);
        let mi_in = DMatrix::from_fn(p, p, |r, c| f.tracer.bordered_inverse()[(idx[r], idx[c])]);
        let err = (mi_in * m_in - DMatrix::<f64>::identity(p, p)).abs().max();
        assert!(err < 1e-9, "Mi·M(IN,IN) deviates from I by {}", err);
    }

    fn two_asset() -> ProblemData {
        ProblemBuilder::new(2, &['='])
            .unwrap()
            .expected_returns(&[0.1, 0.2])
            .upper_bounds(&[1.0, 1.0])
            .covariance_packed(&[1.0, 0.0, 1.0])
            .budget_constraint()
            .build()
            .unwrap()
    }

    #[test]
    fn test_setup_inverts_bordered_block() {
        let data = ProblemBuilder::new(4, &['=', '<'])
            .unwrap()
            .expected_returns(&[0.05, 0.12, 0.08, 0.10])
            .upper_bounds(&[0.5, 0.3, 0.6, 0.4])
            .covariance_packed(&[0.04, 0.01, 0.09, 0.0, 0.02, 0.06, 0.005, 0.01, 0.01, 0.05])
            .constraints(&[vec![1.0; 4], vec![1.0, 1.0, 0.0, 0.0]], &[1.0, 0.7])
            .build()
            .unwrap();
        let f = start(&data);
        assert_eq!(f.partition.in_count(), 2 + 2);
        assert_inverse_of_in_block(&f);
    }

    #[test]
    fn test_two_asset_frontier() {
        let mut f = start(&two_asset());
        let mut trace = Trace::disabled();

        let first = f
            .tracer
            .iterate(&mut f.partition, &f.problem, &mut f.state, &mut trace)
            .unwrap();
        assert!(first.is_kink());
        assert!((first.lambda_e - 10.0).abs() < 1e-9);
        assert_eq!(first.weights, vec![0.0, 1.0]);
        assert!((first.expected_return - 0.2).abs() < 1e-12);
        assert!((first.variance - 1.0).abs() < 1e-12);

        let second = f
            .tracer
            .iterate(&mut f.partition, &f.problem, &mut f.state, &mut trace)
            .unwrap();
        assert_inverse_of_in_block(&f);
        assert_eq!(second.lambda_e, 0.0);
        assert!((second.weights[0] - 0.5).abs() < 1e-12);
        assert!((second.weights[1] - 0.5).abs() < 1e-12);
        assert!((second.expected_return - 0.15).abs() < 1e-12);
        assert!((second.variance - 0.5).abs() < 1e-9);

        let seg = second.segment.unwrap();
        assert!((seg.a2 - 200.0).abs() < 1e-6);
        assert!((seg.variance_at(0.2) - first.variance).abs() < 1e-9);
        assert!((seg.variance_at(0.15) - second.variance).abs() < 1e-9);
    }

    #[test]
    fn test_delete_restores_inverse() {
        // Third asset is capped, so its weight leaves at the upper bound as
        // λE falls and the low-risk asset takes over.
        let data = ProblemBuilder::new(3, &['='])
            .unwrap()
            .expected_returns(&[0.05, 0.15, 0.10])
            .upper_bounds(&[1.0, 1.0, 0.3])
            .covariance_packed(&[0.01, 0.0, 0.09, 0.0, 0.0, 0.04])
            .budget_constraint()
            .build()
            .unwrap();
        let mut f = start(&data);
        let mut trace = Trace::disabled();
        let mut last = f64::INFINITY;
        for _ in 0..10 {
            let c = f
                .tracer
                .iterate(&mut f.partition, &f.problem, &mut f.state, &mut trace)
                .unwrap();
            assert_inverse_of_in_block(&f);
            assert!(c.lambda_e <= last + 1e-12);
            let total: f64 = c.weights.iter().sum();
            assert!((total - 1.0).abs() < 1e-9);
            last = c.lambda_e;
            if c.lambda_e < 1e-5 {
                break;
            }
        }
        assert!(last < 1e-5);
    }
}
