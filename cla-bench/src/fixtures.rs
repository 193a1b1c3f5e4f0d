use anyhow::Result;
use clap::ValueEnum;
use cla_core::{ProblemBuilder, ProblemData};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum FixtureChoice {
    /// 10 securities, three constraints (the textbook example)
    MarkowitzTodd,
    /// Seeded long-only budget problem
    Random,
}

pub fn load_fixture(choice: FixtureChoice, securities: usize, seed: u64) -> Result<ProblemData> {
    match choice {
        FixtureChoice::MarkowitzTodd => markowitz_todd(),
        FixtureChoice::Random => random_portfolio(securities, seed),
    }
}

pub fn markowitz_todd() -> Result<ProblemData> {
    let covariance = [
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

    let problem = ProblemBuilder::new(10, &['=', '>', '<'])?
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
        .covariance_packed(&covariance)
        .build()?;
    Ok(problem)
}

/// Long-only, fully invested portfolio over `n` securities.
///
/// Covariance is `G·Gᵀ/n + 0.01·I` with `G` uniform in [-1, 1), so it is
/// positive definite; returns are uniform in [0.01, 0.2). Weights are capped
/// so that at least a handful of securities must be held.
pub fn random_portfolio(n: usize, seed: u64) -> Result<ProblemData> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let g: Vec<Vec<f64>> = (0..n)
        .map(|_| (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect())
        .collect();
    let covariance: Vec<Vec<f64>> = (0..n)
        .map(|i| {
            (0..n)
                .map(|j| {
                    let dot: f64 = (0..n).map(|t| g[i][t] * g[j][t]).sum();
                    dot / n as f64 + if i == j { 0.01 } else { 0.0 }
                })
                .collect()
        })
        .collect();
    let mu: Vec<f64> = (0..n).map(|_| rng.gen_range(0.01..0.2)).collect();
    let cap = (3.0 / n.max(1) as f64 + 0.1).min(1.0);

    let problem = ProblemBuilder::new(n, &['='])?
        .expected_returns(&mu)
        .upper_bounds(&vec![cap; n])
        .covariance_matrix(&covariance)
        .budget_constraint()
        .build()?;
    Ok(problem)
}
