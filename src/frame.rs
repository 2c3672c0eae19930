//! Timestamp-indexed metric frames and series
//!
//! The engine consumes one merged frame per test run: a shared, strictly
//! increasing timestamp index plus one numeric column per metric. All
//! validation happens at construction so the analysis passes can assume
//! well-formed input.

use serde::Serialize;
use std::collections::BTreeMap;
use std::ops::Range;
use thiserror::Error;

/// Errors raised while constructing or indexing a metric frame
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("metric frame has no samples")]
    Empty,

    #[error("timestamps must be strictly increasing (violated at index {0})")]
    NotMonotonic(usize),

    #[error("column '{metric}' has {len} values for {expected} timestamps")]
    LengthMismatch {
        metric: String,
        len: usize,
        expected: usize,
    },

    #[error("column '{metric}' contains a non-finite value at index {index}")]
    NonFinite { metric: String, index: usize },

    #[error("unknown metric column '{0}'")]
    UnknownMetric(String),
}

/// One labeled sample of a metric series
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    /// Epoch seconds
    pub timestamp: i64,
    pub value: f64,
}

/// A single metric's values for one test run.
///
/// Timestamps are epoch seconds. Ordering is the caller's contract when a
/// series is built directly; series extracted from a [`MetricFrame`] inherit
/// the frame's validated index. The stability detector re-checks ordering as
/// a fatal precondition.
#[derive(Debug, Clone)]
pub struct MetricSeries {
    metric: String,
    timestamps: Vec<i64>,
    values: Vec<f64>,
}

impl MetricSeries {
    /// Build a series from parallel timestamp/value vectors.
    ///
    /// Rejects length mismatches and non-finite values; does not verify
    /// timestamp ordering (see type-level docs).
    pub fn new(
        metric: impl Into<String>,
        timestamps: Vec<i64>,
        values: Vec<f64>,
    ) -> Result<Self, FrameError> {
        let metric = metric.into();
        if timestamps.len() != values.len() {
            return Err(FrameError::LengthMismatch {
                metric,
                len: values.len(),
                expected: timestamps.len(),
            });
        }
        if let Some(index) = values.iter().position(|v| !v.is_finite()) {
            return Err(FrameError::NonFinite { metric, index });
        }
        Ok(Self {
            metric,
            timestamps,
            values,
        })
    }

    pub fn metric(&self) -> &str {
        &self.metric
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn timestamps(&self) -> &[i64] {
        &self.timestamps
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn sample(&self, index: usize) -> Sample {
        Sample {
            timestamp: self.timestamps[index],
            value: self.values[index],
        }
    }

    /// True iff timestamps are strictly increasing
    pub fn is_time_indexed(&self) -> bool {
        self.timestamps.windows(2).all(|w| w[0] < w[1])
    }

    /// Seconds elapsed since the first sample, per sample
    pub fn elapsed_seconds(&self) -> Vec<f64> {
        let start = self.timestamps.first().copied().unwrap_or(0);
        self.timestamps
            .iter()
            .map(|ts| (ts - start) as f64)
            .collect()
    }

    /// Sub-series over `range`, keeping original timestamps
    pub fn slice(&self, range: Range<usize>) -> MetricSeries {
        MetricSeries {
            metric: self.metric.clone(),
            timestamps: self.timestamps[range.clone()].to_vec(),
            values: self.values[range].to_vec(),
        }
    }

    /// Sub-series gathering the given sample indices (ascending)
    pub fn gather(&self, indices: &[usize]) -> MetricSeries {
        MetricSeries {
            metric: self.metric.clone(),
            timestamps: indices.iter().map(|&i| self.timestamps[i]).collect(),
            values: indices.iter().map(|&i| self.values[i]).collect(),
        }
    }
}

/// A merged, timestamp-indexed frame: the engine's sole input.
///
/// Columns are kept in a `BTreeMap` so every iteration over metrics is in
/// sorted name order, which keeps one engine invocation deterministic.
#[derive(Debug, Clone)]
pub struct MetricFrame {
    timestamps: Vec<i64>,
    columns: BTreeMap<String, Vec<f64>>,
}

impl MetricFrame {
    /// Build a frame from a shared timestamp index and named columns.
    ///
    /// Rejects empty frames, non-increasing timestamps, length mismatches
    /// and non-finite values.
    pub fn new(
        timestamps: Vec<i64>,
        columns: BTreeMap<String, Vec<f64>>,
    ) -> Result<Self, FrameError> {
        if timestamps.is_empty() {
            return Err(FrameError::Empty);
        }
        if let Some(i) = timestamps.windows(2).position(|w| w[0] >= w[1]) {
            return Err(FrameError::NotMonotonic(i + 1));
        }
        for (metric, values) in &columns {
            if values.len() != timestamps.len() {
                return Err(FrameError::LengthMismatch {
                    metric: metric.clone(),
                    len: values.len(),
                    expected: timestamps.len(),
                });
            }
            if let Some(index) = values.iter().position(|v| !v.is_finite()) {
                return Err(FrameError::NonFinite {
                    metric: metric.clone(),
                    index,
                });
            }
        }
        Ok(Self {
            timestamps,
            columns,
        })
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[i64] {
        &self.timestamps
    }

    /// Metric names in sorted order
    pub fn metric_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn has_metric(&self, metric: &str) -> bool {
        self.columns.contains_key(metric)
    }

    pub fn column(&self, metric: &str) -> Result<&[f64], FrameError> {
        self.columns
            .get(metric)
            .map(Vec::as_slice)
            .ok_or_else(|| FrameError::UnknownMetric(metric.to_string()))
    }

    /// Extract one column as an owned series
    pub fn series(&self, metric: &str) -> Result<MetricSeries, FrameError> {
        let values = self.column(metric)?.to_vec();
        Ok(MetricSeries {
            metric: metric.to_string(),
            timestamps: self.timestamps.clone(),
            values,
        })
    }

    /// Sub-frame over a contiguous sample range
    pub fn slice(&self, range: Range<usize>) -> MetricFrame {
        MetricFrame {
            timestamps: self.timestamps[range.clone()].to_vec(),
            columns: self
                .columns
                .iter()
                .map(|(name, values)| (name.clone(), values[range.clone()].to_vec()))
                .collect(),
        }
    }
}
