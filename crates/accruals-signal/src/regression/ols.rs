//! Ordinary least squares via Householder QR.

use crate::error::{Result, SignalError};
use ndarray::{Array1, Array2, s};

/// Relative threshold on the diagonal of R below which a column is treated
/// as linearly dependent.
pub const RANK_TOLERANCE: f64 = 1e-10;

/// A fitted least-squares model.
#[derive(Debug, Clone)]
pub struct OlsFit {
    /// Coefficients, one per design column
    pub coefficients: Array1<f64>,
    /// Fitted values
    pub fitted: Array1<f64>,
    /// Observed minus fitted
    pub residuals: Array1<f64>,
}

/// Solve `min ||y - X b||` for a full-column-rank design.
///
/// # Errors
/// * `DimensionMismatch` if `y` and `X` disagree on the number of rows
/// * `InsufficientData` if there are fewer rows than columns
/// * `Singular` if `X` is rank deficient
pub fn fit_ols(x: &Array2<f64>, y: &Array1<f64>) -> Result<OlsFit> {
    let (n, k) = x.dim();
    if y.len() != n {
        return Err(SignalError::DimensionMismatch {
            expected: n,
            actual: y.len(),
            context: "response".to_string(),
        });
    }
    if n < k {
        return Err(SignalError::InsufficientData {
            required: k,
            actual: n,
        });
    }

    let mut r = x.to_owned();
    let mut qty = y.to_owned();

    // Reduce X to upper-triangular R while applying the same reflections to y
    for j in 0..k {
        let mut v = r.slice(s![j.., j]).to_owned();
        let norm = v.dot(&v).sqrt();
        if norm == 0.0 {
            continue;
        }
        let alpha = if v[0] > 0.0 { -norm } else { norm };
        v[0] -= alpha;
        let v_norm_sq = v.dot(&v);
        if v_norm_sq == 0.0 {
            continue;
        }

        for c in j..k {
            let mut column = r.slice_mut(s![j.., c]);
            let f = 2.0 * v.dot(&column) / v_norm_sq;
            column.scaled_add(-f, &v);
        }
        let mut tail = qty.slice_mut(s![j..]);
        let f = 2.0 * v.dot(&tail) / v_norm_sq;
        tail.scaled_add(-f, &v);
    }

    let max_diag = (0..k).map(|i| r[[i, i]].abs()).fold(0.0_f64, f64::max);
    let rank = (0..k)
        .filter(|&i| r[[i, i]].abs() > RANK_TOLERANCE * max_diag)
        .count();
    if max_diag == 0.0 || rank < k {
        return Err(SignalError::Singular { rank, columns: k });
    }

    let mut coefficients = Array1::<f64>::zeros(k);
    for i in (0..k).rev() {
        let tail: f64 = ((i + 1)..k).map(|c| r[[i, c]] * coefficients[c]).sum();
        coefficients[i] = (qty[i] - tail) / r[[i, i]];
    }

    let fitted = x.dot(&coefficients);
    let residuals = y - &fitted;

    Ok(OlsFit {
        coefficients,
        fitted,
        residuals,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_recovers_exact_coefficients() {
        let x = array![
            [1.0, 1.0, 2.0],
            [1.0, 2.0, 1.0],
            [1.0, 3.0, 5.0],
            [1.0, 4.0, 3.0],
            [1.0, 5.0, 8.0],
        ];
        let beta = array![0.5, -1.5, 2.0];
        let y = x.dot(&beta);

        let fit = fit_ols(&x, &y).unwrap();
        for (got, want) in fit.coefficients.iter().zip(beta.iter()) {
            assert_abs_diff_eq!(*got, *want, epsilon = 1e-10);
        }
        for r in &fit.residuals {
            assert_abs_diff_eq!(*r, 0.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_simple_line_residuals() {
        // y = 1 + 2x with one shifted point
        let x = array![[1.0, 0.0], [1.0, 1.0], [1.0, 2.0], [1.0, 3.0]];
        let y = array![1.0, 3.0, 5.0, 9.0];
        let fit = fit_ols(&x, &y).unwrap();

        // Normal equations: intercept 0.6, slope 2.6
        assert_abs_diff_eq!(fit.coefficients[0], 0.6, epsilon = 1e-10);
        assert_abs_diff_eq!(fit.coefficients[1], 2.6, epsilon = 1e-10);
        assert_abs_diff_eq!(fit.residuals.sum(), 0.0, epsilon = 1e-10);
        assert_abs_diff_eq!(fit.residuals[3], 0.6, epsilon = 1e-10);
    }

    #[test]
    fn test_collinear_design_is_singular() {
        let x = array![
            [1.0, 2.0, 4.0],
            [1.0, 3.0, 6.0],
            [1.0, 4.0, 8.0],
            [1.0, 5.0, 10.0],
        ];
        let y = array![1.0, 2.0, 3.0, 5.0];
        let err = fit_ols(&x, &y).unwrap_err();
        assert!(matches!(err, SignalError::Singular { rank: 2, columns: 3 }));
    }

    #[test]
    fn test_constant_regressor_is_singular() {
        let x = array![[1.0, 7.0], [1.0, 7.0], [1.0, 7.0]];
        let y = array![1.0, 2.0, 3.0];
        assert!(fit_ols(&x, &y).unwrap_err().is_recoverable());
    }

    #[test]
    fn test_dimension_checks() {
        let x = Array2::<f64>::ones((2, 3));
        let y = Array1::<f64>::ones(2);
        assert!(matches!(
            fit_ols(&x, &y),
            Err(SignalError::InsufficientData { required: 3, actual: 2 })
        ));

        let y = Array1::<f64>::ones(5);
        assert!(matches!(
            fit_ols(&x, &y),
            Err(SignalError::DimensionMismatch { .. })
        ));
    }
}
