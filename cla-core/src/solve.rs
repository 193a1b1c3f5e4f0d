//! Run orchestration: simplex, tracer setup, then the corner loop.

use std::time::{Duration, Instant};

use nalgebra::DMatrix;

use crate::cla::{CornerPortfolio, CriticalLineTracer};
use crate::diagnostics::DiagnosticsConfig;
use crate::error::{ClaError, ClaResult};
use crate::partition::VariablePartition;
use crate::problem::{ProblemData, SolveInfo, SolveStatus, SolverSettings, StopReason};
use crate::simplex::BoundedSimplex;
use crate::trace::{StderrTrace, Trace, TraceSink};
use crate::workspace::{RunState, WorkingProblem};

/// Receiver of corner portfolios, called once per CLA iteration.
pub trait CornerSink {
    fn corner(&mut self, problem: &ProblemData, corner: &CornerPortfolio);
}

impl CornerSink for Vec<CornerPortfolio> {
    fn corner(&mut self, _problem: &ProblemData, corner: &CornerPortfolio) {
        self.push(corner.clone());
    }
}

impl<F> CornerSink for F
where
    F: FnMut(&ProblemData, &CornerPortfolio),
{
    fn corner(&mut self, problem: &ProblemData, corner: &CornerPortfolio) {
        self(problem, corner)
    }
}

/// Result of [`Optimizer::run`].
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub status: SolveStatus,
    /// Set when the corner loop ran
    pub stop_reason: Option<StopReason>,
    /// Security weights of the last corner (the simplex vertex if none was
    /// emitted); `None` unless `status` is Ok
    pub weights: Option<Vec<f64>>,
    /// Expected returns after the tie-break nudge, one per security
    pub adjusted_returns: Vec<f64>,
    pub info: SolveInfo,
}

/// All corners of one run, as collected by [`optimize`].
#[derive(Debug, Clone)]
pub struct Frontier {
    pub status: SolveStatus,
    pub stop_reason: Option<StopReason>,
    pub corners: Vec<CornerPortfolio>,
    pub adjusted_returns: Vec<f64>,
    pub info: SolveInfo,
}

impl Frontier {
    pub fn is_ok(&self) -> bool {
        self.status.is_ok()
    }

    /// The minimum-variance end of the traced frontier.
    pub fn last(&self) -> Option<&CornerPortfolio> {
        self.corners.last()
    }
}

/// Starting vertex of the critical line phase, as left by the simplex.
#[derive(Debug, Clone)]
pub struct Vertex {
    pub status: SolveStatus,
    /// Security weights
    pub weights: Vec<f64>,
    pub partition: VariablePartition,
    pub basis_inverse: DMatrix<f64>,
    pub adjusted_returns: Vec<f64>,
}

/// One optimization run over a borrowed problem.
pub struct Optimizer<'a> {
    problem: &'a ProblemData,
    settings: &'a SolverSettings,
    trace: Option<&'a mut dyn TraceSink>,
    cancel: Option<&'a dyn Fn() -> bool>,
}

impl<'a> Optimizer<'a> {
    pub fn new(problem: &'a ProblemData, settings: &'a SolverSettings) -> Self {
        Self {
            problem,
            settings,
            trace: None,
            cancel: None,
        }
    }

    pub fn with_trace(mut self, sink: &'a mut dyn TraceSink) -> Self {
        self.trace = Some(sink);
        self
    }

    /// Checked after every emitted corner; returning true stops the run.
    pub fn with_cancel(mut self, cancel: &'a dyn Fn() -> bool) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn run(self, sink: &mut dyn CornerSink) -> ClaResult<RunOutcome> {
        let problem = self.problem;
        let settings = self.settings;
        check_settings(settings)?;
        problem.validate()?;

        let diag = DiagnosticsConfig::from_env();
        let start = Instant::now();
        let k = problem.num_securities();

        let mut stderr_trace = StderrTrace;
        let sink_trace: Option<&mut dyn TraceSink> = match self.trace {
            Some(t) => Some(t),
            None if diag.enabled => Some(&mut stderr_trace),
            None => None,
        };
        let mut trace = Trace::new(sink_trace);

        if settings.verbose || diag.enabled {
            eprintln!(
                "cla: securities={} constraints={} slacks={}",
                k,
                problem.num_constraints(),
                problem.num_slack_vars(),
            );
        }

        let mut working = WorkingProblem::from_problem(problem);
        let mut state = RunState::new(&working);
        let mut partition = VariablePartition::new(working.size());
        let mut simplex = BoundedSimplex::new(&working, settings).with_diagnostics(diag.clone());
        let status = simplex.run(&mut partition, &mut working, &mut state, &mut trace)?;

        let mut info = SolveInfo {
            feasibility_iters: simplex.feasibility_iters,
            optimize_iters: simplex.optimize_iters,
            ..Default::default()
        };
        let adjusted_returns = working.expected_returns[..k].to_vec();

        if !status.is_ok() {
            if settings.verbose || diag.enabled {
                eprintln!("cla: {}", failure_hint(status));
            }
            info.solve_time_ms = start.elapsed().as_millis() as u64;
            return Ok(RunOutcome {
                status,
                stop_reason: None,
                weights: None,
                adjusted_returns,
                info,
            });
        }

        let mut tracer = CriticalLineTracer::setup(&mut partition, &mut working, &mut state, settings, &mut trace)?;
        let end_lambda = settings.effective_end_lambda();
        let time_limit = settings.time_limit_ms.map(Duration::from_millis);
        let mut stop_reason = StopReason::MaxCorners;

        for _ in 0..settings.max_corner_portfolios {
            let corner = tracer.iterate(&mut partition, &working, &mut state, &mut trace)?;
            info.corner_portfolios += 1;

            if settings.verbose || diag.should_log(corner.iteration) {
                eprintln!(
                    "corner {:3}: lambdaE={:.5e} E={:.6} sd={:.6}{}",
                    corner.iteration,
                    corner.lambda_e,
                    corner.expected_return,
                    corner.standard_deviation(),
                    if corner.is_kink() { " (kink)" } else { "" },
                );
            }

            sink.corner(problem, &corner);

            if corner.lambda_e < end_lambda {
                stop_reason = StopReason::EndLambda;
                break;
            }
            if let Some(limit) = time_limit {
                if start.elapsed() >= limit {
                    stop_reason = StopReason::TimeLimit;
                    break;
                }
            }
            if let Some(cancel) = self.cancel {
                if cancel() {
                    stop_reason = StopReason::Cancelled;
                    break;
                }
            }
        }

        info.solve_time_ms = start.elapsed().as_millis() as u64;
        if settings.verbose || diag.enabled {
            eprintln!(
                "cla: {} corners, stopped on {} after {}ms",
                info.corner_portfolios, stop_reason, info.solve_time_ms
            );
        }

        Ok(RunOutcome {
            status,
            stop_reason: Some(stop_reason),
            weights: Some(state.weights[..k].to_vec()),
            adjusted_returns,
            info,
        })
    }
}

/// Trace the whole frontier and collect every corner.
pub fn optimize(problem: &ProblemData, settings: &SolverSettings) -> ClaResult<Frontier> {
    let mut corners = Vec::new();
    let outcome = Optimizer::new(problem, settings).run(&mut corners)?;
    Ok(Frontier {
        status: outcome.status,
        stop_reason: outcome.stop_reason,
        corners,
        adjusted_returns: outcome.adjusted_returns,
        info: outcome.info,
    })
}

/// Run only the two simplex phases.
pub fn find_vertex(problem: &ProblemData, settings: &SolverSettings) -> ClaResult<Vertex> {
    check_settings(settings)?;
    problem.validate()?;

    let k = problem.num_securities();
    let mut working = WorkingProblem::from_problem(problem);
    let mut state = RunState::new(&working);
    let mut partition = VariablePartition::new(working.size());
    let status = BoundedSimplex::new(&working, settings).run(
        &mut partition,
        &mut working,
        &mut state,
        &mut Trace::disabled(),
    )?;

    Ok(Vertex {
        status,
        weights: state.weights[..k].to_vec(),
        partition,
        basis_inverse: state.basis_inverse,
        adjusted_returns: working.expected_returns[..k].to_vec(),
    })
}

fn check_settings(settings: &SolverSettings) -> ClaResult<()> {
    if !(settings.epsilon > 0.0 && settings.epsilon.is_finite()) {
        return Err(ClaError::Configuration(format!(
            "epsilon must be positive and finite, got {}",
            settings.epsilon
        )));
    }
    if settings.end_lambda_e.is_nan() {
        return Err(ClaError::Configuration("end_lambda_e is NaN".to_string()));
    }
    Ok(())
}

fn failure_hint(status: SolveStatus) -> &'static str {
    match status {
        SolveStatus::Infeasible => "infeasible problem, check constraints and bounds",
        SolveStatus::Unbounded => "unbounded expected return, check for a budget constraint",
        SolveStatus::Degenerate => "degenerate problem, set allow_degenerate to continue anyway",
        SolveStatus::Ok => "ok",
    }
}
