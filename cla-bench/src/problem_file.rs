//! JSON problem files.
//!
//! ```json
//! {
//!   "expected_returns": [0.1, 0.2],
//!   "covariance": [[1.0, 0.0], [0.0, 1.0]],
//!   "upper_bounds": [1.0, 1.0],
//!   "constraints": [{ "kind": "=", "coefficients": [1.0, 1.0], "rhs": 1.0 }]
//! }
//! ```
//!
//! `covariance_packed` (row-wise lower triangle) may replace `covariance`.
//! Missing bounds default to `[0, +∞)`; `null` in `upper_bounds` means no
//! upper bound.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use cla_core::{ProblemBuilder, ProblemData};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProblemFile {
    expected_returns: Vec<f64>,
    #[serde(default)]
    covariance: Option<Vec<Vec<f64>>>,
    #[serde(default)]
    covariance_packed: Option<Vec<f64>>,
    #[serde(default)]
    lower_bounds: Option<Vec<f64>>,
    #[serde(default)]
    upper_bounds: Option<Vec<Option<f64>>>,
    constraints: Vec<ConstraintEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConstraintEntry {
    kind: char,
    coefficients: Vec<f64>,
    rhs: f64,
}

pub fn load_problem(path: &Path) -> Result<ProblemData> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read problem file {}", path.display()))?;
    parse_problem(&text).with_context(|| format!("Invalid problem file {}", path.display()))
}

pub fn parse_problem(text: &str) -> Result<ProblemData> {
    let file: ProblemFile = serde_json::from_str(text).context("Malformed problem JSON")?;
    let k = file.expected_returns.len();

    let kinds: Vec<char> = file.constraints.iter().map(|c| c.kind).collect();
    let lhs: Vec<Vec<f64>> = file.constraints.iter().map(|c| c.coefficients.clone()).collect();
    let rhs: Vec<f64> = file.constraints.iter().map(|c| c.rhs).collect();

    let mut builder = ProblemBuilder::new(k, &kinds)?
        .expected_returns(&file.expected_returns)
        .constraints(&lhs, &rhs);

    builder = match (file.covariance, file.covariance_packed) {
        (Some(rows), None) => builder.covariance_matrix(&rows),
        (None, Some(packed)) => builder.covariance_packed(&packed),
        (Some(_), Some(_)) => bail!("Give either covariance or covariance_packed, not both"),
        (None, None) => bail!("Missing covariance"),
    };

    if let Some(lower) = file.lower_bounds {
        builder = builder.lower_bounds(&lower);
    }
    if let Some(upper) = file.upper_bounds {
        let upper: Vec<f64> = upper.into_iter().map(|u| u.unwrap_or(f64::INFINITY)).collect();
        builder = builder.upper_bounds(&upper);
    }

    Ok(builder.build()?)
}
