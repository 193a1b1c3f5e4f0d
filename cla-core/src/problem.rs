//! Problem data structures, settings and validation.
//!
//! This module defines the caller-facing description of a mean-variance
//! problem and the solver knobs. The algorithm never mutates a
//! [`ProblemData`]; it derives a private working copy
//! ([`crate::workspace::WorkingProblem`]) at setup.

use std::fmt;

use nalgebra::DMatrix;

use crate::error::{ClaError, ClaResult};

/// Comparison tolerance used by both algorithm phases.
pub const EPSILON: f64 = 1e-8;

/// Internal value for an absent upper bound.
pub const INFINITY: f64 = 1e30;

/// Sentinel for the segment coefficients of a kink corner.
pub const INVALID: f64 = 9.999e99;

/// Expected-return nudge applied to tied OUT variables after the simplex.
pub const MU_NUDGE: f64 = 1e-6;

/// Below this dE/dλ a corner is treated as a kink.
pub const KINK_THRESHOLD: f64 = 1e-9;

/// Floor applied to `end_lambda_e`.
pub const MIN_END_LAMBDA: f64 = 1e-8;

/// Constraint sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintType {
    /// `a·w = b`
    Equal,
    /// `a·w ≤ b` (gets a slack variable)
    LessThan,
    /// `a·w ≥ b` (flipped to `≤` and gets a slack variable)
    GreaterThan,
}

impl ConstraintType {
    pub fn as_char(&self) -> char {
        match self {
            ConstraintType::Equal => '=',
            ConstraintType::LessThan => '<',
            ConstraintType::GreaterThan => '>',
        }
    }

    /// True for the senses that require a slack column.
    pub fn needs_slack(&self) -> bool {
        !matches!(self, ConstraintType::Equal)
    }
}

impl TryFrom<char> for ConstraintType {
    type Error = ClaError;

    fn try_from(c: char) -> Result<Self, Self::Error> {
        match c {
            '=' => Ok(ConstraintType::Equal),
            '<' => Ok(ConstraintType::LessThan),
            '>' => Ok(ConstraintType::GreaterThan),
            other => Err(ClaError::Configuration(format!(
                "unknown constraint type {:?}, expected one of '=', '<', '>'",
                other
            ))),
        }
    }
}

/// One linear constraint over the securities.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    /// Coefficients, one per security
    pub coefficients: Vec<f64>,
    /// Sense
    pub kind: ConstraintType,
    /// Right-hand side
    pub rhs: f64,
}

/// Mean-variance problem over `k` securities.
///
/// ```text
/// maximize    E - λ V      for every λ from its feasible maximum down to end_lambda_e
/// E = μ·w,    V = wᵀ C w
/// subject to  constraints, lower ≤ w ≤ upper
/// ```
///
/// The covariance must be symmetric and positive semi-definite; only the
/// symmetry is checked.
#[derive(Debug, Clone, PartialEq)]
pub struct ProblemData {
    /// Expected return per security (length k)
    pub expected_returns: Vec<f64>,

    /// Covariance matrix (k × k, symmetric)
    pub covariance: DMatrix<f64>,

    /// Lower bound per security (length k)
    pub lower_bounds: Vec<f64>,

    /// Upper bound per security (length k, `f64::INFINITY` or [`INFINITY`] = none)
    pub upper_bounds: Vec<f64>,

    /// Linear constraints (at least one)
    pub constraints: Vec<Constraint>,
}

impl ProblemData {
    /// Number of securities (k)
    pub fn num_securities(&self) -> usize {
        self.expected_returns.len()
    }

    /// Number of constraints (m)
    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    /// Number of inequality constraints, i.e. slack variables
    pub fn num_slack_vars(&self) -> usize {
        self.constraints.iter().filter(|c| c.kind.needs_slack()).count()
    }

    /// Validate dimensions, finiteness and bound ordering.
    pub fn validate(&self) -> ClaResult<()> {
        let k = self.num_securities();
        let invalid = |msg: String| Err(ClaError::InvalidProblem(msg));

        if k == 0 {
            return invalid("problem has no securities".to_string());
        }
        if self.constraints.is_empty() {
            return invalid("problem has no constraints (a budget constraint is required)".to_string());
        }
        if self.covariance.nrows() != k || self.covariance.ncols() != k {
            return invalid(format!(
                "covariance has shape {}×{}, expected {}×{}",
                self.covariance.nrows(),
                self.covariance.ncols(),
                k,
                k
            ));
        }
        if self.expected_returns.len() != k {
            return invalid(format!(
                "expected_returns has length {}, expected {}",
                self.expected_returns.len(),
                k
            ));
        }
        if self.lower_bounds.len() != k {
            return invalid(format!("lower_bounds has length {}, expected {}", self.lower_bounds.len(), k));
        }
        if self.upper_bounds.len() != k {
            return invalid(format!("upper_bounds has length {}, expected {}", self.upper_bounds.len(), k));
        }

        if let Some(j) = self.expected_returns.iter().position(|v| !v.is_finite()) {
            return invalid(format!("expected return of security {} is not finite", j));
        }
        for j in 0..k {
            let (lo, up) = (self.lower_bounds[j], self.upper_bounds[j]);
            if !lo.is_finite() {
                return invalid(format!("lower bound of security {} is not finite", j));
            }
            if up.is_nan() {
                return invalid(format!("upper bound of security {} is NaN", j));
            }
            if lo > up {
                return invalid(format!(
                    "security {} has lower bound {} > upper bound {}",
                    j, lo, up
                ));
            }
        }

        let scale = self.covariance.iter().fold(1.0_f64, |acc, v| acc.max(v.abs()));
        for i in 0..k {
            for j in 0..i {
                let (a, b) = (self.covariance[(i, j)], self.covariance[(j, i)]);
                if !a.is_finite() || !b.is_finite() {
                    return invalid(format!("covariance entry ({}, {}) is not finite", i, j));
                }
                if (a - b).abs() > 1e-12 * scale {
                    return invalid(format!(
                        "covariance is not symmetric at ({}, {}): {} vs {}",
                        i, j, a, b
                    ));
                }
            }
            if !self.covariance[(i, i)].is_finite() {
                return invalid(format!("covariance entry ({}, {}) is not finite", i, i));
            }
        }

        for (i, c) in self.constraints.iter().enumerate() {
            if c.coefficients.len() != k {
                return invalid(format!(
                    "constraint {} has {} coefficients, expected {}",
                    i,
                    c.coefficients.len(),
                    k
                ));
            }
            if !c.rhs.is_finite() || c.coefficients.iter().any(|v| !v.is_finite()) {
                return invalid(format!("constraint {} has non-finite data", i));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone)]
enum CovarianceInput {
    Packed(Vec<f64>),
    Full(Vec<Vec<f64>>),
}

/// Step-by-step construction of a [`ProblemData`].
///
/// The security count and constraint senses come first; everything else can
/// be set in any order. Bounds default to `[0, +∞)`. Dimension mismatches
/// are reported by [`ProblemBuilder::build`].
#[derive(Debug, Clone)]
pub struct ProblemBuilder {
    num_securities: usize,
    kinds: Vec<ConstraintType>,
    expected_returns: Vec<f64>,
    lower_bounds: Vec<f64>,
    upper_bounds: Vec<f64>,
    covariance: Option<CovarianceInput>,
    lhs: Vec<Vec<f64>>,
    rhs: Vec<f64>,
}

impl ProblemBuilder {
    /// Start a problem with `num_securities` securities and one constraint per
    /// character of `constraint_types` (`'='`, `'<'` or `'>'`).
    pub fn new(num_securities: usize, constraint_types: &[char]) -> ClaResult<Self> {
        let kinds = constraint_types
            .iter()
            .map(|&c| ConstraintType::try_from(c))
            .collect::<ClaResult<Vec<_>>>()?;
        let m = kinds.len();

        Ok(Self {
            num_securities,
            kinds,
            expected_returns: vec![0.0; num_securities],
            lower_bounds: vec![0.0; num_securities],
            upper_bounds: vec![f64::INFINITY; num_securities],
            covariance: None,
            lhs: vec![vec![0.0; num_securities]; m],
            rhs: vec![0.0; m],
        })
    }

    pub fn expected_returns(mut self, mu: &[f64]) -> Self {
        self.expected_returns = mu.to_vec();
        self
    }

    pub fn lower_bounds(mut self, lower: &[f64]) -> Self {
        self.lower_bounds = lower.to_vec();
        self
    }

    pub fn upper_bounds(mut self, upper: &[f64]) -> Self {
        self.upper_bounds = upper.to_vec();
        self
    }

    /// Covariance as a row-wise packed lower triangle:
    /// `c00, c10, c11, c20, c21, c22, ...`
    pub fn covariance_packed(mut self, packed: &[f64]) -> Self {
        self.covariance = Some(CovarianceInput::Packed(packed.to_vec()));
        self
    }

    /// Covariance as full rows.
    pub fn covariance_matrix(mut self, rows: &[Vec<f64>]) -> Self {
        self.covariance = Some(CovarianceInput::Full(rows.to_vec()));
        self
    }

    /// Constraint left-hand sides (one row of k coefficients per constraint)
    /// and right-hand sides.
    pub fn constraints(mut self, lhs: &[Vec<f64>], rhs: &[f64]) -> Self {
        self.lhs = lhs.to_vec();
        self.rhs = rhs.to_vec();
        self
    }

    /// Make the first constraint the budget constraint `Σw = 1`.
    pub fn budget_constraint(mut self) -> Self {
        if let Some(row) = self.lhs.first_mut() {
            row.iter_mut().for_each(|v| *v = 1.0);
        }
        if let Some(b) = self.rhs.first_mut() {
            *b = 1.0;
        }
        self
    }

    /// Assemble and validate.
    pub fn build(self) -> ClaResult<ProblemData> {
        let k = self.num_securities;
        let m = self.kinds.len();

        let covariance = match self.covariance {
            None => {
                return Err(ClaError::InvalidProblem("covariance was not set".to_string()));
            }
            Some(CovarianceInput::Packed(packed)) => {
                let expected = k * (k + 1) / 2;
                if packed.len() != expected {
                    return Err(ClaError::InvalidProblem(format!(
                        "packed covariance has {} entries, expected {}",
                        packed.len(),
                        expected
                    )));
                }
                let mut c = DMatrix::zeros(k, k);
                let mut idx = 0;
                for i in 0..k {
                    for j in 0..=i {
                        c[(i, j)] = packed[idx];
                        c[(j, i)] = packed[idx];
                        idx += 1;
                    }
                }
                c
            }
            Some(CovarianceInput::Full(rows)) => {
                if rows.len() != k || rows.iter().any(|r| r.len() != k) {
                    return Err(ClaError::InvalidProblem(format!(
                        "covariance must be {}×{}",
                        k, k
                    )));
                }
                DMatrix::from_fn(k, k, |i, j| rows[i][j])
            }
        };

        if self.lhs.len() != m || self.rhs.len() != m {
            return Err(ClaError::InvalidProblem(format!(
                "got {} constraint rows and {} right-hand sides for {} constraint types",
                self.lhs.len(),
                self.rhs.len(),
                m
            )));
        }

        let constraints = self
            .lhs
            .into_iter()
            .zip(self.rhs)
            .zip(self.kinds)
            .map(|((coefficients, rhs), kind)| Constraint { coefficients, kind, rhs })
            .collect();

        let problem = ProblemData {
            expected_returns: self.expected_returns,
            covariance,
            lower_bounds: self.lower_bounds,
            upper_bounds: self.upper_bounds,
            constraints,
        };
        problem.validate()?;
        Ok(problem)
    }
}

/// Solver settings and parameters.
#[derive(Debug, Clone)]
pub struct SolverSettings {
    /// Stop after this many corner portfolios
    pub max_corner_portfolios: usize,

    /// Stop once λE drops below this value (floored at [`MIN_END_LAMBDA`])
    pub end_lambda_e: f64,

    /// Continue past a degenerate feasibility phase by pinning the residual
    /// artificial variables to `[0, epsilon]`.
    ///
    /// Best effort only: the continuation is numerically fragile and its
    /// results should be checked by the caller.
    pub allow_degenerate: bool,

    /// Comparison tolerance for profits, rates and residual artificials
    pub epsilon: f64,

    /// Time limit in milliseconds (None = no limit)
    pub time_limit_ms: Option<u64>,

    /// Enable verbose logging
    pub verbose: bool,
}

impl Default for SolverSettings {
    fn default() -> Self {
        let max_corner_portfolios = std::env::var("CLA_MAX_CORNERS")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(100);
        let end_lambda_e = std::env::var("CLA_END_LAMBDA")
            .ok()
            .and_then(|s| s.parse::<f64>().ok())
            .unwrap_or(1e-5);

        Self {
            max_corner_portfolios,
            end_lambda_e,
            allow_degenerate: std::env::var("CLA_ALLOW_DEGENERATE")
                .ok()
                .map(|s| s == "1" || s.to_lowercase() == "true")
                .unwrap_or(false),
            epsilon: EPSILON,
            time_limit_ms: None,
            verbose: false,
        }
    }
}

impl SolverSettings {
    /// Create settings with verbose output enabled.
    pub fn verbose() -> Self {
        Self {
            verbose: true,
            ..Self::default()
        }
    }

    pub fn with_max_corner_portfolios(mut self, max: usize) -> Self {
        self.max_corner_portfolios = max;
        self
    }

    pub fn with_end_lambda_e(mut self, lambda: f64) -> Self {
        self.end_lambda_e = lambda.max(MIN_END_LAMBDA);
        self
    }

    pub fn with_allow_degenerate(mut self, allow: bool) -> Self {
        self.allow_degenerate = allow;
        self
    }

    /// Set time limit in seconds.
    pub fn with_time_limit(mut self, seconds: f64) -> Self {
        self.time_limit_ms = Some((seconds * 1000.0) as u64);
        self
    }

    /// `end_lambda_e` with the floor applied.
    pub fn effective_end_lambda(&self) -> f64 {
        self.end_lambda_e.max(MIN_END_LAMBDA)
    }
}

/// Run result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// Frontier traced
    Ok,

    /// Constraints and bounds admit no portfolio
    Infeasible,

    /// Expected return is unbounded over the feasible set
    Unbounded,

    /// Feasibility phase ended with artificial variables at zero but still basic
    Degenerate,
}

impl SolveStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, SolveStatus::Ok)
    }
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveStatus::Ok => write!(f, "OK"),
            SolveStatus::Infeasible => write!(f, "ERROR_INFEASIBLE"),
            SolveStatus::Unbounded => write!(f, "ERROR_UNBOUNDED"),
            SolveStatus::Degenerate => write!(f, "ERROR_DEGENERATE"),
        }
    }
}

/// Why the frontier loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// λE fell below `end_lambda_e`
    EndLambda,
    /// `max_corner_portfolios` corners were emitted
    MaxCorners,
    /// `time_limit_ms` elapsed
    TimeLimit,
    /// The cancel callback returned true
    Cancelled,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::EndLambda => write!(f, "EndLambda"),
            StopReason::MaxCorners => write!(f, "MaxCorners"),
            StopReason::TimeLimit => write!(f, "TimeLimit"),
            StopReason::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// Run statistics.
#[derive(Debug, Clone, Default)]
pub struct SolveInfo {
    /// Simplex steps in the feasibility phase
    pub feasibility_iters: usize,

    /// Simplex steps in the return-maximizing phase
    pub optimize_iters: usize,

    /// Corner portfolios emitted
    pub corner_portfolios: usize,

    /// Total solve time (milliseconds)
    pub solve_time_ms: u64,
}
