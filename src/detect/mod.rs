//! The closed detector set and the shared label column
//!
//! Detectors are a small set of tagged variants rather than open-ended
//! dynamic dispatch: each declares a period affinity, and the engine asks
//! the registry for the detectors matching the active period. Fixed-Load
//! point detectors accumulate into one [`LabelColumn`] per metric — marking
//! a point unions in the method, never overwrites another detector's label.

mod correlation;
mod isolation;
mod stability;
mod zscore;

pub use correlation::{RampUpCorrelationDetector, RampUpOutcome, BREACH_CONFIRMATION_RUN};
pub use isolation::IsolationForestDetector;
pub use stability::{MetricStabilityDetector, StabilityClass, StabilityOutcome};
pub use zscore::ZScoreDetector;

use std::collections::BTreeSet;

use crate::check::DetectorMethod;
use crate::period::PeriodKind;

/// The closed set of detectors the engine can dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorKind {
    IsolationForest,
    ZScore,
    Stability,
    RampUpCorrelation,
}

impl DetectorKind {
    /// Which period this detector analyzes
    pub fn period_affinity(self) -> PeriodKind {
        match self {
            DetectorKind::IsolationForest
            | DetectorKind::ZScore
            | DetectorKind::Stability => PeriodKind::FixedLoad,
            DetectorKind::RampUpCorrelation => PeriodKind::RampUp,
        }
    }

    pub fn method(self) -> DetectorMethod {
        match self {
            DetectorKind::IsolationForest => DetectorMethod::IsolationForest,
            DetectorKind::ZScore => DetectorMethod::ZScore,
            DetectorKind::Stability => DetectorMethod::TrendStability,
            DetectorKind::RampUpCorrelation => DetectorMethod::RampUpCorrelation,
        }
    }
}

/// Detectors to run for a period, in their fixed execution order.
///
/// The point detectors come first so the stability verdict and the window
/// collector see a fully accumulated label column.
pub fn detectors_for(period: PeriodKind) -> &'static [DetectorKind] {
    match period {
        PeriodKind::FixedLoad => &[
            DetectorKind::IsolationForest,
            DetectorKind::ZScore,
            DetectorKind::Stability,
        ],
        PeriodKind::RampUp => &[DetectorKind::RampUpCorrelation],
    }
}

/// Per-sample label of one metric
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PointLabel {
    Normal,
    Anomalous(BTreeSet<DetectorMethod>),
}

/// The per-metric label column Fixed-Load detectors accumulate into
#[derive(Debug, Clone)]
pub struct LabelColumn {
    labels: Vec<PointLabel>,
}

impl LabelColumn {
    pub fn new(len: usize) -> Self {
        Self {
            labels: vec![PointLabel::Normal; len],
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Mark a point anomalous for `method`, preserving marks from other
    /// detectors
    pub fn mark(&mut self, index: usize, method: DetectorMethod) {
        match &mut self.labels[index] {
            PointLabel::Anomalous(methods) => {
                methods.insert(method);
            }
            label => {
                *label = PointLabel::Anomalous([method].into_iter().collect());
            }
        }
    }

    pub fn is_anomalous(&self, index: usize) -> bool {
        matches!(self.labels[index], PointLabel::Anomalous(_))
    }

    pub fn methods(&self, index: usize) -> Option<&BTreeSet<DetectorMethod>> {
        match &self.labels[index] {
            PointLabel::Anomalous(methods) => Some(methods),
            PointLabel::Normal => None,
        }
    }

    /// Rendered label for reports: `"Normal"` or `"Anomaly: m1, m2"`
    pub fn render(&self, index: usize) -> String {
        match &self.labels[index] {
            PointLabel::Normal => "Normal".to_string(),
            PointLabel::Anomalous(methods) => {
                let joined = methods
                    .iter()
                    .map(|m| m.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("Anomaly: {joined}")
            }
        }
    }

    pub fn anomaly_count(&self) -> usize {
        self.labels
            .iter()
            .filter(|l| matches!(l, PointLabel::Anomalous(_)))
            .count()
    }
}
