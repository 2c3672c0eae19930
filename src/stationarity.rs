//! Augmented Dickey-Fuller stationarity test
//!
//! Used by the stability pass to decide whether a fixed-load metric is
//! mean-reverting or wanders. The unit-root regression is
//!
//! ```text
//! Δy_t = α + β·y_{t-1} + Σ γ_i·Δy_{t-i} + ε_t
//! ```
//!
//! with the lag order fixed by Schwert's rule, and the t-statistic on β
//! mapped to an approximate p-value with MacKinnon's response-surface
//! polynomials for the constant-only case.
//!
//! # References
//!
//! Dickey, D. A., & Fuller, W. A. (1979). Distribution of the estimators for
//! autoregressive time series with a unit root. JASA, 74(366a).
//!
//! MacKinnon, J. G. (1994). Approximate asymptotic distribution functions for
//! unit-root and cointegration tests. Journal of Business & Economic
//! Statistics, 12(2).

use anyhow::Result;

/// Outcome of one Augmented Dickey-Fuller test
#[derive(Debug, Clone)]
pub struct AdfResult {
    /// t-statistic on the lagged level (tau)
    pub statistic: f64,
    /// Approximate MacKinnon p-value; small values reject the unit root
    /// (i.e. indicate a stationary series)
    pub p_value: f64,
    /// Number of lagged difference terms included
    pub lags: usize,
    /// Observations used in the regression
    pub nobs: usize,
}

// MacKinnon (1994) response-surface coefficients for the constant-only
// ("c") regression, as tabulated for the tau distribution.
const TAU_STAR: f64 = -1.61;
const TAU_MIN: f64 = -18.83;
const TAU_MAX: f64 = 2.74;
const TAU_SMALLP: [f64; 3] = [2.1659, 1.4412, 0.038_269];
const TAU_LARGEP: [f64; 4] = [1.7339, 0.932_02, -0.127_45, -0.010_368];

/// Run the ADF test with a constant term and Schwert-rule lag order.
///
/// Fails on series too short for the regression or on a degenerate design
/// matrix (e.g. a perfectly constant series); callers gate those out first.
pub fn adf_test(values: &[f64]) -> Result<AdfResult> {
    let n = values.len();
    if n < 8 {
        anyhow::bail!("need at least 8 samples for an ADF test, got {n}");
    }

    // Schwert (1989) rule of thumb, capped so the regression keeps more
    // observations than parameters.
    let schwert = (12.0 * (n as f64 / 100.0).powf(0.25)).floor() as usize;
    let lags = schwert.min(n / 2 - 3);

    let diffs: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();

    // Regression rows: t runs over diffs indices [lags, diffs.len())
    let nobs = diffs.len() - lags;
    let k = 2 + lags; // level, constant, lagged diffs
    if nobs <= k {
        anyhow::bail!("too few observations ({nobs}) for {k} ADF regressors");
    }

    let mut rows: Vec<Vec<f64>> = Vec::with_capacity(nobs);
    let mut targets: Vec<f64> = Vec::with_capacity(nobs);
    for t in lags..diffs.len() {
        let mut row = Vec::with_capacity(k);
        row.push(values[t]); // y_{t-1} relative to Δy_t = y[t+1] - y[t]
        row.push(1.0);
        for i in 1..=lags {
            row.push(diffs[t - i]);
        }
        rows.push(row);
        targets.push(diffs[t]);
    }

    let (beta, se_beta0) = ols_first_coefficient(&rows, &targets)?;
    let statistic = beta / se_beta0;
    Ok(AdfResult {
        statistic,
        p_value: mackinnon_p(statistic),
        lags,
        nobs,
    })
}

/// Solve the OLS system and return (first coefficient, its standard error)
fn ols_first_coefficient(rows: &[Vec<f64>], targets: &[f64]) -> Result<(f64, f64)> {
    let n = rows.len();
    let k = rows[0].len();

    // Normal equations: (X'X) b = X'y
    let mut xtx = vec![vec![0.0; k]; k];
    let mut xty = vec![0.0; k];
    for (row, &y) in rows.iter().zip(targets) {
        for i in 0..k {
            xty[i] += row[i] * y;
            for j in 0..k {
                xtx[i][j] += row[i] * row[j];
            }
        }
    }

    let beta = solve(&xtx, &xty)?;

    // First column of (X'X)^{-1} for se(beta_0)
    let mut e0 = vec![0.0; k];
    e0[0] = 1.0;
    let inv_col0 = solve(&xtx, &e0)?;

    let mut rss = 0.0;
    for (row, &y) in rows.iter().zip(targets) {
        let fitted: f64 = row.iter().zip(&beta).map(|(x, b)| x * b).sum();
        rss += (y - fitted) * (y - fitted);
    }
    let sigma2 = rss / (n - k) as f64;
    let var0 = sigma2 * inv_col0[0];
    if var0 <= 0.0 || !var0.is_finite() {
        anyhow::bail!("ADF regression produced a non-positive coefficient variance");
    }
    Ok((beta[0], var0.sqrt()))
}

/// Gaussian elimination with partial pivoting for a small dense system
fn solve(matrix: &[Vec<f64>], rhs: &[f64]) -> Result<Vec<f64>> {
    let k = rhs.len();
    let mut a: Vec<Vec<f64>> = matrix.iter().map(|row| row.clone()).collect();
    let mut b = rhs.to_vec();

    for col in 0..k {
        let pivot = (col..k)
            .max_by(|&i, &j| {
                a[i][col]
                    .abs()
                    .partial_cmp(&a[j][col].abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(col);
        if a[pivot][col].abs() < 1e-12 {
            anyhow::bail!("singular design matrix in ADF regression");
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in (col + 1)..k {
            let factor = a[row][col] / a[col][col];
            for j in col..k {
                a[row][j] -= factor * a[col][j];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; k];
    for col in (0..k).rev() {
        let tail: f64 = ((col + 1)..k).map(|j| a[col][j] * x[j]).sum();
        x[col] = (b[col] - tail) / a[col][col];
    }
    Ok(x)
}

/// MacKinnon (1994) approximate p-value for a constant-only tau statistic
fn mackinnon_p(tau: f64) -> f64 {
    if tau <= TAU_MIN {
        return 0.0;
    }
    if tau >= TAU_MAX {
        return 1.0;
    }
    let z = if tau <= TAU_STAR {
        polyval(&TAU_SMALLP, tau)
    } else {
        polyval(&TAU_LARGEP, tau)
    };
    norm_cdf(z)
}

fn polyval(coeffs: &[f64], x: f64) -> f64 {
    coeffs
        .iter()
        .enumerate()
        .map(|(i, c)| c * x.powi(i as i32))
        .sum()
}

/// Standard normal CDF via the Abramowitz & Stegun 7.1.26 erf approximation
fn norm_cdf(x: f64) -> f64 {
    let t = x / std::f64::consts::SQRT_2;
    0.5 * (1.0 + erf(t))
}

fn erf(x: f64) -> f64 {
    const A1: f64 = 0.254_829_592;
    const A2: f64 = -0.284_496_736;
    const A3: f64 = 1.421_413_741;
    const A4: f64 = -1.453_152_027;
    const A5: f64 = 1.061_405_429;
    const P: f64 = 0.327_591_1;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let t = 1.0 / (1.0 + P * x);
    let y = 1.0 - (((((A5 * t + A4) * t) + A3) * t + A2) * t + A1) * t * (-x * x).exp();
    sign * y
}
