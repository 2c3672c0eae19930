//! Trend-stability verdict for fixed-load metrics
//!
//! One pass/fail per metric: a metric is stable when its least-squares
//! trend over elapsed time is flat and the series is stationary by the
//! Augmented Dickey-Fuller test. A change-point pass (binary segmentation)
//! is carried on the outcome for future baseline computation; the verdict
//! does not consume it.

use anyhow::Result;

use crate::changepoint;
use crate::check::{CheckResult, DetectorMethod};
use crate::config::EngineConfig;
use crate::frame::MetricSeries;
use crate::stationarity;
use crate::stats;

/// How the verdict classified the metric's trend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StabilityClass {
    /// Variance below the configured floor; trivially stable
    Constant,
    /// Flat slope and stationary
    Stable,
    /// Slope above the threshold
    Increase,
    /// Slope below the negative threshold, or non-stationary drift
    Degradation,
}

impl StabilityClass {
    fn as_str(self) -> &'static str {
        match self {
            StabilityClass::Constant => "constant",
            StabilityClass::Stable => "stable",
            StabilityClass::Increase => "increase",
            StabilityClass::Degradation => "degradation",
        }
    }
}

/// Full stability assessment for one metric
#[derive(Debug, Clone)]
pub struct StabilityOutcome {
    pub check: CheckResult,
    pub classification: StabilityClass,
    pub slope: Option<f64>,
    pub p_value: Option<f64>,
    /// Break points from binary segmentation; informational only
    pub change_points: Vec<usize>,
}

pub struct MetricStabilityDetector;

impl MetricStabilityDetector {
    /// Assess one fixed-load metric.
    ///
    /// The series must be strictly time-indexed; anything else is a caller
    /// bug and fails the whole run.
    pub fn assess(series: &MetricSeries, config: &EngineConfig) -> Result<StabilityOutcome> {
        if !series.is_time_indexed() {
            anyhow::bail!(
                "series '{}' is not time-indexed: timestamps must be strictly increasing",
                series.metric()
            );
        }

        let values = series.values();
        let metric = series.metric();
        let variance = stats::variance(values)?;

        if variance < config.numpy_var_threshold {
            return Ok(StabilityOutcome {
                check: CheckResult::passed(
                    DetectorMethod::TrendStability.as_str(),
                    metric,
                    format!("{metric} is constant during the fixed-load period"),
                    None,
                ),
                classification: StabilityClass::Constant,
                slope: None,
                p_value: None,
                change_points: Vec::new(),
            });
        }

        let elapsed = series.elapsed_seconds();
        let (slope, _intercept) = stats::ols_slope(&elapsed, values)?;
        let adf = stationarity::adf_test(values)?;

        let penalty = 2.0 * (values.len() as f64).ln() * variance;
        let change_points = changepoint::binary_segmentation(values, penalty);

        let stable = slope.abs() < config.slope_threshold && adf.p_value < config.p_value_threshold;
        let outcome = if stable {
            StabilityOutcome {
                check: CheckResult::passed(
                    DetectorMethod::TrendStability.as_str(),
                    metric,
                    format!(
                        "{metric} is stable: slope {slope:.4}/s, ADF p-value {:.4}",
                        adf.p_value
                    ),
                    Some(slope),
                ),
                classification: StabilityClass::Stable,
                slope: Some(slope),
                p_value: Some(adf.p_value),
                change_points,
            }
        } else {
            let classification = if slope > config.slope_threshold {
                StabilityClass::Increase
            } else {
                StabilityClass::Degradation
            };
            StabilityOutcome {
                check: CheckResult::failed(
                    DetectorMethod::TrendStability.as_str(),
                    metric,
                    format!(
                        "{metric} trend issue ({}): slope {slope:.4}/s, ADF p-value {:.4}",
                        classification.as_str(),
                        adf.p_value
                    ),
                    Some(slope),
                ),
                classification,
                slope: Some(slope),
                p_value: Some(adf.p_value),
                change_points,
            }
        };
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::CheckStatus;

    fn series(values: Vec<f64>) -> MetricSeries {
        let n = values.len() as i64;
        MetricSeries::new("overalThroughput", (0..n).map(|i| i * 5).collect(), values)
            .unwrap()
    }

    fn noise(len: usize, amplitude: f64) -> Vec<f64> {
        let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
        (0..len)
            .map(|_| {
                state = state
                    .wrapping_mul(6_364_136_223_846_793_005)
                    .wrapping_add(1_442_695_040_888_963_407);
                ((state >> 11) as f64 / (1u64 << 53) as f64 - 0.5) * amplitude
            })
            .collect()
    }

    #[test]
    fn test_constant_series_passes_with_no_value() {
        // independent of how strict the other thresholds are
        let config = EngineConfig {
            slope_threshold: 1e-12,
            p_value_threshold: 1e-12,
            ..EngineConfig::default()
        };
        let outcome = MetricStabilityDetector::assess(&series(vec![42.0; 50]), &config).unwrap();
        assert_eq!(outcome.check.status, CheckStatus::Passed);
        assert_eq!(outcome.classification, StabilityClass::Constant);
        assert_eq!(outcome.check.value, None);
        assert_eq!(outcome.slope, None);
    }

    #[test]
    fn test_stationary_noise_passes() {
        let values: Vec<f64> = noise(80, 4.0).iter().map(|n| 200.0 + n).collect();
        let outcome =
            MetricStabilityDetector::assess(&series(values), &EngineConfig::default()).unwrap();
        assert_eq!(outcome.check.status, CheckStatus::Passed);
        assert_eq!(outcome.classification, StabilityClass::Stable);
        assert!(outcome.p_value.unwrap() < 0.05);
    }

    #[test]
    fn test_rising_trend_is_increase() {
        let values: Vec<f64> = noise(80, 1.0)
            .iter()
            .enumerate()
            .map(|(i, n)| 100.0 + i as f64 * 2.0 + n)
            .collect();
        let outcome =
            MetricStabilityDetector::assess(&series(values), &EngineConfig::default()).unwrap();
        assert_eq!(outcome.check.status, CheckStatus::Failed);
        assert_eq!(outcome.classification, StabilityClass::Increase);
        assert!(outcome.slope.unwrap() > 0.0);
    }

    #[test]
    fn test_falling_trend_is_degradation() {
        let values: Vec<f64> = noise(80, 1.0)
            .iter()
            .enumerate()
            .map(|(i, n)| 500.0 - i as f64 * 2.0 + n)
            .collect();
        let outcome =
            MetricStabilityDetector::assess(&series(values), &EngineConfig::default()).unwrap();
        assert_eq!(outcome.check.status, CheckStatus::Failed);
        assert_eq!(outcome.classification, StabilityClass::Degradation);
        assert!(outcome.slope.unwrap() < 0.0);
    }

    #[test]
    fn test_level_shift_exposes_change_point() {
        let mut values: Vec<f64> = noise(40, 2.0).iter().map(|n| 100.0 + n).collect();
        values.extend(noise(40, 2.0).iter().map(|n| 300.0 + n));
        let outcome =
            MetricStabilityDetector::assess(&series(values), &EngineConfig::default()).unwrap();
        assert!(
            outcome.change_points.iter().any(|&cp| (38..=42).contains(&cp)),
            "expected a break near 40, got {:?}",
            outcome.change_points
        );
    }

    #[test]
    fn test_unordered_timestamps_are_fatal() {
        let bad = MetricSeries::new(
            "overalThroughput",
            vec![0, 10, 5, 20],
            vec![1.0, 2.0, 3.0, 4.0],
        )
        .unwrap();
        let err = MetricStabilityDetector::assess(&bad, &EngineConfig::default()).unwrap_err();
        assert!(err.to_string().contains("not time-indexed"));
    }
}
