use crate::problem::INVALID;

/// Quadratic `V = a0 + a1·E + a2·E²` of the frontier between two adjacent
/// corner portfolios.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrontierSegment {
    pub a0: f64,
    pub a1: f64,
    pub a2: f64,
}

impl FrontierSegment {
    /// Variance on this segment at expected return `e`.
    pub fn variance_at(&self, e: f64) -> f64 {
        self.a0 + self.a1 * e + self.a2 * e * e
    }
}

/// One point where the set of free variables changes.
#[derive(Debug, Clone, PartialEq)]
pub struct CornerPortfolio {
    /// 1-based CLA iteration that produced this corner
    pub iteration: usize,
    /// Security weights (length k)
    pub weights: Vec<f64>,
    /// `μ·w` with the nudged returns
    pub expected_return: f64,
    pub variance: f64,
    pub lambda_e: f64,
    /// Segment ending at this corner; `None` at a kink
    pub segment: Option<FrontierSegment>,
}

impl CornerPortfolio {
    pub fn standard_deviation(&self) -> f64 {
        self.variance.max(0.0).sqrt()
    }

    /// True when E and V were recomputed from the weights instead of the
    /// segment quadratic.
    pub fn is_kink(&self) -> bool {
        self.segment.is_none()
    }

    /// `(a0, a1, a2)`, or the [`INVALID`] sentinel triple at a kink.
    pub fn coefficients(&self) -> (f64, f64, f64) {
        match self.segment {
            Some(s) => (s.a0, s.a1, s.a2),
            None => (INVALID, INVALID, INVALID),
        }
    }
}
