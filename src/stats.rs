//! Shared descriptive statistics for the detection passes
//!
//! Wraps trueno's SIMD-optimized vector primitives for the basic moments and
//! aprender's DescriptiveStats for quantiles, plus the small rolling and
//! regression helpers the detectors share. Values are carried as f64 at the
//! API surface and narrowed to f32 at the trueno boundary.

use anyhow::{anyhow, Context, Result};
use aprender::stats::DescriptiveStats;
use trueno::Vector;

fn to_f32(values: &[f64]) -> Vec<f32> {
    values.iter().map(|&v| v as f32).collect()
}

/// Arithmetic mean (0.0 for an empty slice)
pub fn mean(values: &[f64]) -> f64 {
    let v = Vector::from_slice(&to_f32(values));
    v.mean().unwrap_or(0.0) as f64
}

/// Standard deviation (0.0 for fewer than two samples)
pub fn stddev(values: &[f64]) -> f64 {
    let v = Vector::from_slice(&to_f32(values));
    v.stddev().unwrap_or(0.0) as f64
}

/// Population variance
pub fn variance(values: &[f64]) -> Result<f64> {
    let v = Vector::from_slice(&to_f32(values));
    let var = v.variance().context("failed to compute variance")?;
    Ok(var as f64)
}

/// Quantile in [0, 1] via aprender's DescriptiveStats (R-7 method)
pub fn quantile(values: &[f64], q: f64) -> Result<f64> {
    let v = Vector::from_slice(&to_f32(values));
    let stats = DescriptiveStats::new(&v);
    stats
        .quantile(q)
        .map(|x| x as f64)
        .map_err(|e| anyhow!("failed to compute quantile({q}): {e}"))
}

/// Rolling mean and standard deviation over trailing windows.
///
/// Entry `i` covers samples `[i + 1 - window, i]`; the warm-up prefix
/// (first `window - 1` entries) is `None`.
pub fn rolling_mean_std(values: &[f64], window: usize) -> Vec<Option<(f64, f64)>> {
    let mut out = vec![None; values.len()];
    if window == 0 || values.len() < window {
        return out;
    }
    for i in (window - 1)..values.len() {
        let slice = &values[i + 1 - window..=i];
        out[i] = Some((mean(slice), stddev(slice)));
    }
    out
}

/// Pearson correlation coefficient between two equal-length slices.
///
/// Returns 0.0 when either side has zero variance (flat window), which
/// treats a stalled metric as uncorrelated with load rather than undefined.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    debug_assert_eq!(x.len(), y.len());
    let n = x.len();
    if n < 2 {
        return 0.0;
    }
    let mx = mean(x);
    let my = mean(y);
    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for i in 0..n {
        let dx = x[i] - mx;
        let dy = y[i] - my;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x <= f64::EPSILON || var_y <= f64::EPSILON {
        return 0.0;
    }
    cov / (var_x.sqrt() * var_y.sqrt())
}

/// Rolling Pearson correlation over trailing windows; warm-up prefix is `None`
pub fn rolling_pearson(x: &[f64], y: &[f64], window: usize) -> Vec<Option<f64>> {
    debug_assert_eq!(x.len(), y.len());
    let mut out = vec![None; x.len()];
    if window < 2 || x.len() < window {
        return out;
    }
    for i in (window - 1)..x.len() {
        let lo = i + 1 - window;
        out[i] = Some(pearson(&x[lo..=i], &y[lo..=i]));
    }
    out
}

/// Ordinary least squares fit `y = slope * x + intercept`
pub fn ols_slope(x: &[f64], y: &[f64]) -> Result<(f64, f64)> {
    debug_assert_eq!(x.len(), y.len());
    if x.len() < 2 {
        anyhow::bail!("need at least 2 samples for a least-squares fit");
    }
    let mx = mean(x);
    let my = mean(y);
    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for i in 0..x.len() {
        let dx = x[i] - mx;
        sxx += dx * dx;
        sxy += dx * (y[i] - my);
    }
    if sxx <= f64::EPSILON {
        anyhow::bail!("degenerate regressor: all x values identical");
    }
    let slope = sxy / sxx;
    Ok((slope, my - slope * mx))
}

/// Standardize a column in place: (x - mean) / std.
///
/// A zero-variance column becomes all zeros so a constant feature carries no
/// weight in downstream distance-based models.
pub fn standardize(column: &mut [f64]) {
    let m = mean(column);
    let s = stddev(column);
    if s <= f64::EPSILON {
        column.iter_mut().for_each(|v| *v = 0.0);
        return;
    }
    column.iter_mut().for_each(|v| *v = (*v - m) / s);
}
