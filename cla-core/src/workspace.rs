//! Algorithm-private working copy of the problem and the per-run state.
//!
//! Index layout shared by every phase:
//!
//! ```text
//! 0 .. k          securities
//! k .. n          slack variables, one per inequality, in constraint order
//! n .. n+m        artificial basis variables (simplex) / Lagrange multipliers (CLA)
//! ```

use nalgebra::DMatrix;

use crate::problem::{ConstraintType, ProblemData, INFINITY, INVALID};

/// Derived problem in the bordered layout the algorithm works on.
///
/// Built from a [`ProblemData`] at setup; the caller's data is never touched.
#[derive(Debug, Clone)]
pub struct WorkingProblem {
    /// Securities (k)
    pub num_securities: usize,
    /// Slack variables
    pub num_slack_vars: usize,
    /// Variables n = k + slacks (+ m after absorbing artificials)
    pub num_vars: usize,
    /// Constraints (m)
    pub num_constraints: usize,

    /// Expected return per variable (length n); slacks and artificials are 0
    pub expected_returns: Vec<f64>,
    /// Lower bounds (length n+m during feasibility, n afterwards)
    pub lower: Vec<f64>,
    /// Upper bounds, [`INFINITY`] when absent
    pub upper: Vec<f64>,

    /// Bordered coefficient matrix, (n+m) × (n+m): covariance in the top-left
    /// k × k block, constraint rows mirrored into rows/columns n..n+m.
    pub mmat: DMatrix<f64>,
    /// Constraint left-hand sides, m × (n+m) (m × n once artificials are dropped)
    pub lhs: DMatrix<f64>,
    /// Constraint right-hand sides (sign-flipped for `>` rows)
    pub rhs: Vec<f64>,
    /// Original constraint senses
    pub kinds: Vec<ConstraintType>,
}

impl WorkingProblem {
    /// Install slack columns and lay the problem out for the solver.
    pub fn from_problem(problem: &ProblemData) -> Self {
        let k = problem.num_securities();
        let m = problem.num_constraints();
        let num_slack_vars = problem.num_slack_vars();
        let n = k + num_slack_vars;
        let size = n + m;

        let mut expected_returns = vec![0.0; n];
        expected_returns[..k].copy_from_slice(&problem.expected_returns);

        let mut lower = vec![0.0; size];
        let mut upper = vec![INFINITY; size];
        lower[..k].copy_from_slice(&problem.lower_bounds);
        for (u, &b) in upper.iter_mut().zip(&problem.upper_bounds) {
            *u = b.min(INFINITY);
        }

        let mut mmat = DMatrix::zeros(size, size);
        mmat.view_mut((0, 0), (k, k)).copy_from(&problem.covariance);

        let mut lhs = DMatrix::zeros(m, size);
        let mut rhs = vec![0.0; m];
        let mut slack = k;
        for (i, c) in problem.constraints.iter().enumerate() {
            // `>` rows become `<` rows
            let sign = if c.kind == ConstraintType::GreaterThan { -1.0 } else { 1.0 };
            for (j, &a) in c.coefficients.iter().enumerate() {
                lhs[(i, j)] = sign * a;
            }
            rhs[i] = sign * c.rhs;
            if c.kind.needs_slack() {
                lhs[(i, slack)] = 1.0;
                slack += 1;
            }
        }

        Self {
            num_securities: k,
            num_slack_vars,
            num_vars: n,
            num_constraints: m,
            expected_returns,
            lower,
            upper,
            mmat,
            lhs,
            rhs,
            kinds: problem.constraints.iter().map(|c| c.kind).collect(),
        }
    }

    /// Size of the full index range, n + m.
    #[inline]
    pub fn size(&self) -> usize {
        self.num_vars + self.num_constraints
    }

    /// True for indices past the securities and slacks. Such a variable is
    /// dropped, not parked in OUT, when it leaves the basis.
    #[inline]
    pub fn is_artificial(&self, j: usize) -> bool {
        j >= self.num_securities + self.num_slack_vars
    }

    /// Forget the artificial basis variables after a clean feasibility phase.
    pub fn drop_artificials(&mut self) {
        let n = self.num_vars;
        self.lower.truncate(n);
        self.upper.truncate(n);
        self.lhs = self.lhs.columns(0, n).into_owned();
    }

    /// Keep the artificial basis variables as ordinary variables pinned to
    /// `[0, epsilon]` (degenerate continuation).
    ///
    /// The bordered matrix is regrown for the new index range; only its
    /// covariance block survives, the border is rebuilt later.
    pub fn absorb_artificials(&mut self, epsilon: f64) {
        let m = self.num_constraints;
        let k = self.num_securities;
        let old_n = self.num_vars;
        let n = old_n + m;

        self.num_vars = n;
        self.expected_returns.resize(n, 0.0);
        self.lower.resize(n, 0.0);
        self.upper.resize(n, INFINITY);
        for j in old_n..n {
            self.upper[j] = epsilon;
        }

        let mut mmat = DMatrix::zeros(n + m, n + m);
        mmat.view_mut((0, 0), (k, k))
            .copy_from(&self.mmat.view((0, 0), (k, k)));
        self.mmat = mmat;

        self.lhs.resize_mut(m, n + m, 0.0);
    }

    /// Mirror the constraint rows into rows and columns n..n+m of the
    /// bordered matrix.
    pub fn install_border(&mut self) {
        let n = self.num_vars;
        for i in 0..self.num_constraints {
            for j in 0..n {
                let a = self.lhs[(i, j)];
                self.mmat[(n + i, j)] = a;
                self.mmat[(j, n + i)] = a;
            }
        }
    }

    /// `μ·w` over the securities.
    pub fn portfolio_return(&self, weights: &[f64]) -> f64 {
        (0..self.num_securities)
            .map(|j| self.expected_returns[j] * weights[j])
            .sum()
    }

    /// `wᵀ C w` over the securities, off-diagonal terms counted twice.
    pub fn portfolio_variance(&self, weights: &[f64]) -> f64 {
        let mut v = 0.0;
        for j in 0..self.num_securities {
            v += self.mmat[(j, j)] * weights[j] * weights[j];
            for l in 0..j {
                v += 2.0 * self.mmat[(j, l)] * weights[j] * weights[l];
            }
        }
        v
    }
}

/// Mutable state of one optimization run.
#[derive(Debug, Clone)]
pub struct RunState {
    /// Variable values; the first k entries are the portfolio
    pub weights: Vec<f64>,
    /// Inverse of the active constraint-column submatrix (m × m), rows
    /// aligned with the ascending IN set
    pub basis_inverse: DMatrix<f64>,
    /// Current risk-aversion parameter
    pub lambda_e: f64,
    /// Portfolio expected return
    pub expected_return: f64,
    /// Portfolio variance
    pub variance: f64,
    /// `V = a0 + a1·E + a2·E²` on the current segment ([`INVALID`] at a kink)
    pub a0: f64,
    pub a1: f64,
    pub a2: f64,
}

impl RunState {
    pub fn new(problem: &WorkingProblem) -> Self {
        let m = problem.num_constraints;
        Self {
            weights: vec![0.0; problem.size()],
            basis_inverse: DMatrix::zeros(m, m),
            lambda_e: 0.0,
            expected_return: 0.0,
            variance: 0.0,
            a0: INVALID,
            a1: INVALID,
            a2: INVALID,
        }
    }

    pub fn has_segment(&self) -> bool {
        self.a0 != INVALID
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::ProblemBuilder;

    fn problem() -> ProblemData {
        ProblemBuilder::new(3, &['=', '>', '<'])
            .unwrap()
            .expected_returns(&[0.1, 0.2, 0.3])
            .upper_bounds(&[0.6, 0.6, f64::INFINITY])
            .covariance_packed(&[1.0, 0.1, 2.0, 0.2, 0.3, 3.0])
            .constraints(
                &[vec![1.0, 1.0, 1.0], vec![1.0, 2.0, 0.0], vec![0.0, 1.0, 1.0]],
                &[1.0, 0.2, 0.8],
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_slack_columns_are_installed() {
        let wp = WorkingProblem::from_problem(&problem());
        assert_eq!(wp.num_vars, 5);
        assert_eq!(wp.size(), 8);

        // `>` row flipped, slack 3 for row 1, slack 4 for row 2
        assert_eq!(wp.lhs.row(1).iter().copied().collect::<Vec<_>>(),
                   vec![-1.0, -2.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(wp.rhs, vec![1.0, -0.2, 0.8]);
        assert_eq!(wp.lhs[(2, 4)], 1.0);
        assert_eq!(wp.lhs[(0, 3)], 0.0);

        assert_eq!(wp.upper[2], INFINITY);
        assert_eq!(wp.upper[3], INFINITY);
        assert_eq!(wp.expected_returns, vec![0.1, 0.2, 0.3, 0.0, 0.0]);
        assert_eq!(wp.mmat[(2, 1)], 0.3);
        assert!(wp.is_artificial(5));
        assert!(!wp.is_artificial(4));
    }

    #[test]
    fn test_border_mirrors_constraints() {
        let mut wp = WorkingProblem::from_problem(&problem());
        wp.drop_artificials();
        assert_eq!(wp.lhs.ncols(), 5);
        wp.install_border();
        for i in 0..3 {
            for j in 0..5 {
                assert_eq!(wp.mmat[(5 + i, j)], wp.lhs[(i, j)]);
                assert_eq!(wp.mmat[(j, 5 + i)], wp.lhs[(i, j)]);
            }
        }
        assert_eq!(wp.mmat, wp.mmat.transpose());
    }

    #[test]
    fn test_absorb_artificials_keeps_covariance() {
        let mut wp = WorkingProblem::from_problem(&problem());
        wp.absorb_artificials(1e-8);
        assert_eq!(wp.num_vars, 8);
        assert_eq!(wp.mmat.nrows(), 11);
        assert_eq!(wp.lhs.ncols(), 11);
        assert_eq!(wp.mmat[(1, 1)], 2.0);
        assert_eq!(wp.upper[6], 1e-8);
        assert_eq!(wp.expected_returns.len(), 8);
        // artificials stay artificial for the leave rule
        assert!(wp.is_artificial(5));
    }

    #[test]
    fn test_variance_counts_cross_terms_twice() {
        let wp = WorkingProblem::from_problem(&problem());
        let w = [0.5, 0.5, 0.0, 0.0, 0.0];
        let expected = 0.25 * 1.0 + 0.25 * 2.0 + 2.0 * 0.25 * 0.1;
        assert!((wp.portfolio_variance(&w) - expected).abs() < 1e-15);
        assert!((wp.portfolio_return(&w) - 0.15).abs() < 1e-15);
    }
}
