//! cla-core: Markowitz mean-variance frontier by the Critical Line Algorithm
//!
//! Given expected returns, a covariance matrix, per-security bounds and
//! linear constraints, the solver traces the whole efficient frontier as a
//! finite sequence of corner portfolios:
//!
//! - **Bounded simplex**: a two-phase simplex finds a feasible vertex, then
//!   the vertex of maximum expected return.
//! - **Critical lines**: starting there, the risk-aversion parameter λE is
//!   lowered; between corners the free weights move linearly, and each
//!   change of the free set is a rank-one update of the bordered inverse.
//!
//! Each corner carries its weights, E, V, λE and the coefficients of the
//! quadratic `V = a0 + a1·E + a2·E²` on the segment that ends there.
//!
//! # Example
//!
//! ```ignore
//! use cla_core::{optimize, ProblemBuilder, SolverSettings};
//!
//! let problem = ProblemBuilder::new(2, &['='])?
//!     .expected_returns(&[0.1, 0.2])
//!     .upper_bounds(&[1.0, 1.0])
//!     .covariance_packed(&[1.0, 0.0, 1.0])
//!     .budget_constraint()
//!     .build()?;
//!
//! let frontier = optimize(&problem, &SolverSettings::default())?;
//! for c in &frontier.corners {
//!     println!("{:3} E={:.5} sd={:.5} lambda={:.5}", c.iteration, c.expected_return,
//!              c.standard_deviation(), c.lambda_e);
//! }
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::needless_range_loop)] // index loops mirror the partition algebra

pub mod cla;
pub mod diagnostics;
pub mod error;
pub mod partition;
pub mod problem;
pub mod simplex;
pub mod solve;
pub mod trace;
pub mod workspace;

pub use cla::{CornerPortfolio, FrontierSegment};
pub use error::{ClaError, ClaResult};
pub use problem::{
    Constraint, ConstraintType, ProblemBuilder, ProblemData, SolveInfo, SolveStatus,
    SolverSettings, StopReason, EPSILON, INFINITY, INVALID,
};
pub use solve::{find_vertex, optimize, CornerSink, Frontier, Optimizer, RunOutcome, Vertex};
pub use trace::{StderrTrace, Trace, TracePoint, TraceSink};
