//! Basis inverse maintenance for the bounded simplex.
//!
//! The inverse is kept dense (m × m); its rows follow the IN set in
//! ascending order, so a pivot is a row elimination followed by moving the
//! pivot row to the entering variable's new position.

use nalgebra::DMatrix;

use crate::error::{ClaError, ClaResult};

/// Eliminate with pivot row `i_out` after the entering column produced
/// adjustment rates `adj_rate`.
///
/// `increasing` is true when the entering variable comes off its lower bound
/// (the rates were computed as `-Ai·a_j`), false when it comes off its upper
/// bound (rates sign-flipped).
pub fn pivot(ai: &mut DMatrix<f64>, adj_rate: &[f64], i_out: usize, increasing: bool) -> ClaResult<()> {
    let m = ai.nrows();
    let p = adj_rate[i_out];
    if p == 0.0 || !p.is_finite() {
        return Err(ClaError::NumericalBreakdown("zero pivot in basis inverse update"));
    }

    for i in 0..m {
        if i != i_out {
            let t = adj_rate[i] / p;
            for k in 0..m {
                let v = ai[(i_out, k)];
                ai[(i, k)] -= v * t;
            }
        }
    }

    let d = if increasing { -p } else { p };
    for k in 0..m {
        ai[(i_out, k)] /= d;
    }
    Ok(())
}

/// Move row `del_row` to `add_row`, shifting the rows in between by one.
pub fn reorder_rows(ai: &mut DMatrix<f64>, del_row: usize, add_row: usize) {
    if add_row > del_row {
        for i in del_row..add_row {
            ai.swap_rows(i, i + 1);
        }
    } else if add_row < del_row {
        for i in (add_row + 1..=del_row).rev() {
            ai.swap_rows(i, i - 1);
        }
    }
}
