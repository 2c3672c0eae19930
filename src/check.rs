//! Check results and anomaly records emitted by the detection passes
//!
//! These are the immutable records returned to the caller per `analyze`
//! invocation; the engine never persists them.

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// Pass/fail status of one check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CheckStatus {
    Passed,
    Failed,
}

/// The closed set of detection methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum DetectorMethod {
    IsolationForest,
    ZScore,
    TrendStability,
    RampUpCorrelation,
}

impl DetectorMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            DetectorMethod::IsolationForest => "isolation_forest",
            DetectorMethod::ZScore => "z_score",
            DetectorMethod::TrendStability => "trend_stability",
            DetectorMethod::RampUpCorrelation => "ramp_up_correlation",
        }
    }
}

impl fmt::Display for DetectorMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One check's outcome for one metric
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckResult {
    pub status: CheckStatus,
    /// Method name, or a comma-joined set for merged anomaly windows
    pub method: String,
    pub metric: String,
    pub description: String,
    pub value: Option<f64>,
}

impl CheckResult {
    pub fn passed(
        method: impl Into<String>,
        metric: impl Into<String>,
        description: impl Into<String>,
        value: Option<f64>,
    ) -> Self {
        Self {
            status: CheckStatus::Passed,
            method: method.into(),
            metric: metric.into(),
            description: description.into(),
            value,
        }
    }

    pub fn failed(
        method: impl Into<String>,
        metric: impl Into<String>,
        description: impl Into<String>,
        value: Option<f64>,
    ) -> Self {
        Self {
            status: CheckStatus::Failed,
            method: method.into(),
            metric: metric.into(),
            description: description.into(),
            value,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == CheckStatus::Failed
    }
}

/// Direction of an anomalous excursion relative to its baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    Increase,
    Decrease,
}

/// A debounced multi-point anomaly episode on a fixed-load metric
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyWindow {
    pub metric: String,
    /// Epoch seconds of the first anomalous sample
    pub start: i64,
    /// Epoch seconds of the last anomalous sample
    pub end: i64,
    pub direction: Direction,
    /// Rolling mean of the samples just before the window opened
    pub baseline: f64,
    /// The excursion's most significant value (furthest from baseline side)
    pub significant_value: f64,
    /// Detection methods that contributed at least one point
    pub methods: BTreeSet<DetectorMethod>,
}

impl AnomalyWindow {
    /// Comma-joined contributing method names, in fixed order
    pub fn method_names(&self) -> String {
        self.methods
            .iter()
            .map(|m| m.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// A single-point saturation candidate found during ramp-up.
///
/// Distinct from [`AnomalyWindow`]: it marks the load level where a metric
/// stopped scaling linearly and is excluded from window merging.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaturationPoint {
    pub metric: String,
    /// Epoch seconds of the sample immediately preceding the first breach
    pub timestamp: i64,
    /// Metric value at the tipping point
    pub value: f64,
    /// Load level at the tipping point
    pub load: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_names_fixed_order() {
        let window = AnomalyWindow {
            metric: "overalThroughput".to_string(),
            start: 0,
            end: 10,
            direction: Direction::Increase,
            baseline: 100.0,
            significant_value: 150.0,
            methods: [DetectorMethod::ZScore, DetectorMethod::IsolationForest]
                .into_iter()
                .collect(),
        };
        assert_eq!(window.method_names(), "isolation_forest, z_score");
    }

    #[test]
    fn test_check_result_constructors() {
        let passed = CheckResult::passed("z_score", "m", "ok", None);
        assert_eq!(passed.status, CheckStatus::Passed);
        assert!(!passed.is_failed());

        let failed = CheckResult::failed("z_score", "m", "bad", Some(1.5));
        assert!(failed.is_failed());
        assert_eq!(failed.value, Some(1.5));
    }
}
