//! End-to-end tests for the frontier solver.
//!
//! The canonical 10-security case checks the published first corner; the
//! random cases check the structural properties every traced frontier must
//! have (feasibility, monotone λE, consistent E/V bookkeeping).

use cla_core::{
    find_vertex, optimize, CornerPortfolio, Frontier, Optimizer, ProblemBuilder, ProblemData,
    SolveStatus, SolverSettings, StopReason, TracePoint, TraceSink, INFINITY,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const FEAS_TOL: f64 = 1e-9;

fn markowitz_todd() -> ProblemData {
    let packed = [
        0.4075516,
        0.0317584, 0.9063047,
        0.0518392, 0.0313639, 0.1949090,
        0.0566390, 0.0268726, 0.0440849, 0.1952847,
        0.0330226, 0.0191717, 0.0300677, 0.0277735, 0.3405911,
        0.0082778, 0.0093438, 0.0132274, 0.0052667, 0.0077706, 0.1598387,
        0.0216594, 0.0249504, 0.0352597, 0.0137581, 0.0206784, 0.0210558, 0.6805671,
        0.0133242, 0.0076104, 0.0115493, 0.0078088, 0.0073641, 0.0051869, 0.0137788, 0.9552692,
        0.0343476, 0.0287487, 0.0427563, 0.0291418, 0.0254266, 0.0172374, 0.0462703, 0.0106553, 0.3168158,
        0.0224990, 0.0133687, 0.0205730, 0.0164038, 0.0128408, 0.0072378, 0.0192609, 0.0076096, 0.0185432, 0.1107929,
    ];
    ProblemBuilder::new(10, &['=', '>', '<'])
        .unwrap()
        .constraints(
            &[
                vec![1.0; 10],
                vec![1.0, 1.0, 1.0, 0.5, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
                vec![0.0, 0.0, 0.0, 0.5, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0],
            ],
            &[1.0, 0.2, 0.5],
        )
        .lower_bounds(&[0.10, 0.0, 0.0, 0.0, 0.10, 0.0, 0.0, 0.0, 0.0, 0.0])
        .upper_bounds(&[0.30; 10])
        .expected_returns(&[1.175, 1.190, 0.396, 1.120, 0.346, 0.679, 0.089, 0.730, 0.481, 1.080])
        .covariance_packed(&packed)
        .build()
        .unwrap()
}

/// Long-only budget problem with covariance `G·Gᵀ/k + 0.01·I`.
fn random_portfolio(rng: &mut ChaCha8Rng, with_side_constraints: bool) -> ProblemData {
    let k: usize = rng.gen_range(4..=12);
    let g: Vec<Vec<f64>> = (0..k)
        .map(|_| (0..k).map(|_| rng.gen_range(-1.0..1.0)).collect())
        .collect();
    let cov: Vec<Vec<f64>> = (0..k)
        .map(|i| {
            (0..k)
                .map(|j| {
                    let dot: f64 = (0..k).map(|t| g[i][t] * g[j][t]).sum();
                    dot / k as f64 + if i == j { 0.01 } else { 0.0 }
                })
                .collect()
        })
        .collect();
    let mu: Vec<f64> = (0..k).map(|_| rng.gen_range(0.01..0.2)).collect();

    if with_side_constraints {
        let half: Vec<f64> = (0..k).map(|j| if j < k / 2 { 1.0 } else { 0.0 }).collect();
        let mut last = vec![0.0; k];
        last[k - 1] = 1.0;
        ProblemBuilder::new(k, &['=', '<', '>'])
            .unwrap()
            .expected_returns(&mu)
            .upper_bounds(&vec![0.5; k])
            .covariance_matrix(&cov)
            .constraints(&[vec![1.0; k], half, last], &[1.0, 0.6, 0.05])
            .build()
            .unwrap()
    } else {
        let cap = (3.0 / k as f64 + 0.1).min(1.0);
        ProblemBuilder::new(k, &['='])
            .unwrap()
            .expected_returns(&mu)
            .upper_bounds(&vec![cap; k])
            .covariance_matrix(&cov)
            .budget_constraint()
            .build()
            .unwrap()
    }
}

fn settings() -> SolverSettings {
    SolverSettings {
        max_corner_portfolios: 100,
        end_lambda_e: 1e-5,
        allow_degenerate: false,
        ..Default::default()
    }
}

fn direct_variance(problem: &ProblemData, w: &[f64]) -> f64 {
    let k = problem.num_securities();
    let mut v = 0.0;
    for i in 0..k {
        for j in 0..k {
            v += w[i] * problem.covariance[(i, j)] * w[j];
        }
    }
    v
}

fn assert_feasible(problem: &ProblemData, corner: &CornerPortfolio) {
    for (j, &w) in corner.weights.iter().enumerate() {
        assert!(
            w >= problem.lower_bounds[j] - FEAS_TOL && w <= problem.upper_bounds[j] + FEAS_TOL,
            "corner {}: weight {} = {} outside [{}, {}]",
            corner.iteration, j, w, problem.lower_bounds[j], problem.upper_bounds[j]
        );
    }
    for (i, c) in problem.constraints.iter().enumerate() {
        let lhs: f64 = c.coefficients.iter().zip(&corner.weights).map(|(a, w)| a * w).sum();
        let ok = match c.kind.as_char() {
            '=' => (lhs - c.rhs).abs() <= FEAS_TOL,
            '<' => lhs <= c.rhs + FEAS_TOL,
            _ => lhs >= c.rhs - FEAS_TOL,
        };
        assert!(ok, "corner {}: constraint {} violated ({} {} {})", corner.iteration, i, lhs, c.kind.as_char(), c.rhs);
    }
}

fn assert_frontier_properties(problem: &ProblemData, frontier: &Frontier) {
    assert_eq!(frontier.status, SolveStatus::Ok);
    assert!(!frontier.corners.is_empty());

    let mut previous = f64::INFINITY;
    for corner in &frontier.corners {
        assert_feasible(problem, corner);

        assert!(
            corner.lambda_e <= previous * (1.0 + 1e-12),
            "lambdaE increased at corner {}: {} -> {}",
            corner.iteration, previous, corner.lambda_e
        );
        previous = corner.lambda_e;

        let e: f64 = frontier
            .adjusted_returns
            .iter()
            .zip(&corner.weights)
            .map(|(m, w)| m * w)
            .sum();
        assert!((e - corner.expected_return).abs() <= 1e-6, "E mismatch at corner {}", corner.iteration);

        let v = direct_variance(problem, &corner.weights);
        assert!(
            (v - corner.variance).abs() <= 1e-6,
            "V mismatch at corner {}: recorded {} direct {}",
            corner.iteration, corner.variance, v
        );

        if let Some(seg) = corner.segment {
            assert!((seg.variance_at(corner.expected_return) - corner.variance).abs() <= 1e-6);
        }
    }
}

/// λE drops at every corner. The only repeat allowed is a single tie, where
/// one variable leaves and another enters at the same λE; the corner after a
/// tie must drop again.
fn assert_strictly_decreasing(frontier: &Frontier) {
    let lambdas: Vec<f64> = frontier.corners.iter().map(|c| c.lambda_e).collect();
    let mut tied = false;
    for (t, pair) in lambdas.windows(2).enumerate() {
        let (prev, next) = (pair[0], pair[1]);
        let tie = (prev - next).abs() <= 1e-9 * prev.abs().max(1.0);
        if tie {
            assert!(!tied, "lambdaE stalled over corners {}..{}: {:?}", t, t + 2, &lambdas[t.saturating_sub(1)..t + 2]);
        } else {
            assert!(next < prev, "lambdaE rose after corner {}: {} -> {}", t + 1, prev, next);
        }
        tied = tie;
    }
}

#[test]
fn test_canonical_case() {
    let problem = markowitz_todd();
    let frontier = optimize(&problem, &settings()).expect("optimize failed");

    println!("\n=== Markowitz-Todd frontier ===");
    for c in &frontier.corners {
        println!(
            "{:3} E={:.5} sd={:.5} lambda={:.5} kink={}",
            c.iteration, c.expected_return, c.standard_deviation(), c.lambda_e, c.is_kink()
        );
    }

    assert_frontier_properties(&problem, &frontier);
    assert_strictly_decreasing(&frontier);
    assert_eq!(frontier.stop_reason, Some(StopReason::EndLambda));

    let first = &frontier.corners[0];
    let expected = [0.3, 0.3, 0.0, 0.3, 0.1, 0.0, 0.0, 0.0, 0.0, 0.0];
    for (w, x) in first.weights.iter().zip(expected) {
        assert!((w - x).abs() < 1e-9, "first corner weights {:?}", first.weights);
    }
    assert!((first.expected_return - 1.0801).abs() < 1e-5);
    assert!((first.variance - 0.16477527).abs() < 1e-6);
    assert!(first.is_kink());

    let last = frontier.last().unwrap();
    assert!(last.lambda_e < 1e-5);
    assert!((last.expected_return - 0.81493172).abs() < 1e-5);
    assert!((last.variance - 0.04392462).abs() < 1e-6);

    // every corner's unadjusted return stays within the nudge of the recorded E
    for c in &frontier.corners {
        let e: f64 = problem.expected_returns.iter().zip(&c.weights).map(|(m, w)| m * w).sum();
        assert!((e - c.expected_return).abs() < 1e-5);
    }
}

#[test]
fn test_random_budget_problems() {
    let mut rng = ChaCha8Rng::seed_from_u64(20240601);
    for trial in 0..25 {
        let problem = random_portfolio(&mut rng, false);
        let frontier = optimize(&problem, &settings()).expect("optimize failed");
        println!("trial {}: k={} corners={}", trial, problem.num_securities(), frontier.corners.len());
        assert_frontier_properties(&problem, &frontier);
        assert_strictly_decreasing(&frontier);
        assert_eq!(frontier.stop_reason, Some(StopReason::EndLambda));
    }
}

#[test]
fn test_random_problems_with_side_constraints() {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    for _ in 0..25 {
        let problem = random_portfolio(&mut rng, true);
        let frontier = optimize(&problem, &settings()).expect("optimize failed");
        assert_frontier_properties(&problem, &frontier);
        assert_strictly_decreasing(&frontier);
    }
}

#[test]
fn test_vertex_is_reproducible() {
    let problem = markowitz_todd();
    let a = find_vertex(&problem, &settings()).unwrap();
    let b = find_vertex(&problem, &settings()).unwrap();
    assert_eq!(a.status, SolveStatus::Ok);
    assert_eq!(a.partition, b.partition);
    assert_eq!(a.weights, b.weights);
    assert_eq!(a.basis_inverse, b.basis_inverse);

    // a full run does not disturb the caller's data either
    let before = problem.clone();
    let first = optimize(&problem, &settings()).unwrap();
    let second = optimize(&problem, &settings()).unwrap();
    assert_eq!(problem, before);
    assert_eq!(first.corners, second.corners);
}

#[test]
fn test_max_corners_stops_early() {
    let problem = markowitz_todd();
    let frontier = optimize(&problem, &settings().with_max_corner_portfolios(3)).unwrap();
    assert_eq!(frontier.corners.len(), 3);
    assert_eq!(frontier.stop_reason, Some(StopReason::MaxCorners));
    assert_eq!(frontier.info.corner_portfolios, 3);
}

#[test]
fn test_cancel_stops_after_first_corner() {
    let problem = markowitz_todd();
    let settings = settings();
    let cancel = || true;
    let mut corners: Vec<CornerPortfolio> = Vec::new();
    let outcome = Optimizer::new(&problem, &settings)
        .with_cancel(&cancel)
        .run(&mut corners)
        .unwrap();
    assert_eq!(corners.len(), 1);
    assert_eq!(outcome.stop_reason, Some(StopReason::Cancelled));
    assert_eq!(outcome.weights.as_deref(), Some(&corners[0].weights[..]));
}

#[derive(Default)]
struct CollectTrace {
    lines: usize,
    simplex_lines: usize,
}

impl TraceSink for CollectTrace {
    fn line(&mut self, point: TracePoint, _text: &str) {
        self.lines += 1;
        if point.is_simplex() {
            self.simplex_lines += 1;
        }
    }
}

#[test]
fn test_trace_sink_does_not_change_results() {
    let problem = markowitz_todd();
    let settings = settings();
    let plain = optimize(&problem, &settings).unwrap();

    let mut sink = CollectTrace::default();
    let mut traced: Vec<CornerPortfolio> = Vec::new();
    let outcome = Optimizer::new(&problem, &settings)
        .with_trace(&mut sink)
        .run(&mut traced)
        .unwrap();

    println!("trace: {} lines, {} from the simplex", sink.lines, sink.simplex_lines);
    assert!(sink.simplex_lines > 0);
    assert!(sink.lines > sink.simplex_lines);
    assert_eq!(outcome.status, plain.status);
    assert_eq!(outcome.stop_reason, plain.stop_reason);
    assert_eq!(traced, plain.corners);
}

#[test]
fn test_time_limit_stops_after_first_corner() {
    let problem = markowitz_todd();
    let settings = SolverSettings {
        time_limit_ms: Some(0),
        ..settings()
    };
    let frontier = optimize(&problem, &settings).unwrap();
    assert_eq!(frontier.status, SolveStatus::Ok);
    assert_eq!(frontier.stop_reason, Some(StopReason::TimeLimit));
    assert_eq!(frontier.corners.len(), 1);
    assert!(frontier.corners[0].lambda_e >= settings.end_lambda_e);
}

#[test]
fn test_infeasible_problem() {
    let problem = ProblemBuilder::new(3, &['=', '>', '<'])
        .unwrap()
        .expected_returns(&[0.1, 0.2, 0.3])
        .upper_bounds(&[1.0, 0.0, 0.0])
        .covariance_packed(&[1.0, 0.0, 1.0, 0.0, 0.0, 1.0])
        .constraints(
            &[vec![1.0, 1.0, 1.0], vec![1.0, 0.0, 0.0], vec![1.0, 0.0, 0.0]],
            &[1.0, 2.0, 1.0],
        )
        .build()
        .unwrap();
    let frontier = optimize(&problem, &settings()).unwrap();
    assert_eq!(frontier.status, SolveStatus::Infeasible);
    assert!(frontier.corners.is_empty());
    assert_eq!(frontier.stop_reason, None);
}

#[test]
fn test_unbounded_problem() {
    let problem = ProblemBuilder::new(2, &['>'])
        .unwrap()
        .expected_returns(&[0.1, 0.2])
        .upper_bounds(&[INFINITY, INFINITY])
        .covariance_packed(&[1.0, 0.0, 1.0])
        .constraints(&[vec![1.0, 1.0]], &[1.0])
        .build()
        .unwrap();
    let frontier = optimize(&problem, &settings()).unwrap();
    assert_eq!(frontier.status, SolveStatus::Unbounded);
    assert!(frontier.corners.is_empty());
}

#[test]
fn test_degenerate_problem() {
    let problem = ProblemBuilder::new(3, &['=', '='])
        .unwrap()
        .expected_returns(&[0.1, 0.2, 0.15])
        .upper_bounds(&[1.0, 1.0, 1.0])
        .covariance_packed(&[1.0, 0.0, 1.0, 0.0, 0.0, 0.5])
        .constraints(&[vec![1.0; 3], vec![1.0; 3]], &[1.0, 1.0])
        .build()
        .unwrap();

    let frontier = optimize(&problem, &settings()).unwrap();
    assert_eq!(frontier.status, SolveStatus::Degenerate);
    assert!(frontier.corners.is_empty());

    let relaxed = settings().with_allow_degenerate(true);
    let frontier = optimize(&problem, &relaxed).unwrap();
    assert_eq!(frontier.status, SolveStatus::Ok);
    let last = frontier.last().unwrap();
    let total: f64 = last.weights.iter().sum();
    assert!((total - 1.0).abs() < 1e-7);
    assert!((last.weights[2] - 0.5).abs() < 1e-7);
}
