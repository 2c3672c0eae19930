//! Debounced merging of per-point anomaly labels into windows
//!
//! Per-point statistical flags are noisy. This state machine merges
//! contiguous and near-contiguous anomalous runs into one episode while
//! still separating excursions more than a buffer's worth of normal
//! samples apart: brief reversions to normal are buffered instead of
//! closing the window, and only a full buffer (or the end of the stream)
//! closes it.

use std::collections::BTreeSet;

use crate::check::{AnomalyWindow, CheckResult, Direction};
use crate::detect::LabelColumn;
use crate::frame::MetricSeries;
use crate::stats;

/// Normal samples tolerated inside a window before it closes
const RETURN_TO_NORMAL_CAPACITY: usize = 3;

/// Samples preceding a window that form its baseline
const BASELINE_LOOKBACK: usize = 3;

/// Windows and checks produced for one metric's label stream
#[derive(Debug, Clone)]
pub struct WindowOutcome {
    pub windows: Vec<AnomalyWindow>,
    pub checks: Vec<CheckResult>,
}

pub struct AnomalyWindowCollector;

struct OpenWindow {
    start: i64,
    end: i64,
    baseline: f64,
    values: Vec<f64>,
    methods: BTreeSet<crate::check::DetectorMethod>,
    normal_streak: usize,
}

impl AnomalyWindowCollector {
    /// Merge a metric's label stream into debounced anomaly windows.
    ///
    /// Emits one Failed check per closed window; a metric that never went
    /// anomalous yields a single Passed check.
    pub fn collect(series: &MetricSeries, labels: &LabelColumn) -> WindowOutcome {
        debug_assert_eq!(series.len(), labels.len());

        let mut windows = Vec::new();
        let mut active: Option<OpenWindow> = None;

        for i in 0..series.len() {
            let sample = series.sample(i);
            if labels.is_anomalous(i) {
                let methods = labels
                    .methods(i)
                    .cloned()
                    .unwrap_or_default();
                match active.as_mut() {
                    None => {
                        active = Some(OpenWindow {
                            start: sample.timestamp,
                            end: sample.timestamp,
                            baseline: baseline_before(series, i),
                            values: vec![sample.value],
                            methods,
                            normal_streak: 0,
                        });
                    }
                    Some(window) => {
                        window.end = sample.timestamp;
                        window.values.push(sample.value);
                        window.methods.extend(methods);
                        window.normal_streak = 0;
                    }
                }
            } else if let Some(window) = active.as_mut() {
                window.normal_streak += 1;
                let buffer_full = window.normal_streak >= RETURN_TO_NORMAL_CAPACITY;
                if buffer_full {
                    if let Some(open) = active.take() {
                        windows.push(close(series.metric(), open));
                    }
                }
            }
        }
        if let Some(window) = active.take() {
            windows.push(close(series.metric(), window));
        }

        let checks = if windows.is_empty() {
            vec![CheckResult::passed(
                "anomaly_window",
                series.metric(),
                format!(
                    "{} shows no anomalous excursions during the fixed-load period",
                    series.metric()
                ),
                None,
            )]
        } else {
            windows
                .iter()
                .map(|w| {
                    CheckResult::failed(
                        w.method_names(),
                        w.metric.clone(),
                        format!(
                            "{} {} from baseline {:.2} to {:.2} between {} and {}",
                            w.metric,
                            match w.direction {
                                Direction::Increase => "increased",
                                Direction::Decrease => "decreased",
                            },
                            w.baseline,
                            w.significant_value,
                            w.start,
                            w.end
                        ),
                        Some(w.significant_value),
                    )
                })
                .collect()
        };

        WindowOutcome { windows, checks }
    }
}

/// Rolling mean of up to [`BASELINE_LOOKBACK`] samples before `index`, or
/// the current value when the window opens on the first sample
fn baseline_before(series: &MetricSeries, index: usize) -> f64 {
    if index == 0 {
        return series.values()[0];
    }
    let lo = index.saturating_sub(BASELINE_LOOKBACK);
    stats::mean(&series.values()[lo..index])
}

fn close(metric: &str, window: OpenWindow) -> AnomalyWindow {
    let max = window.values.iter().copied().fold(f64::MIN, f64::max);
    let min = window.values.iter().copied().fold(f64::MAX, f64::min);
    let (significant_value, direction) = if max > window.baseline {
        (max, Direction::Increase)
    } else {
        (min, Direction::Decrease)
    };
    AnomalyWindow {
        metric: metric.to_string(),
        start: window.start,
        end: window.end,
        direction,
        baseline: window.baseline,
        significant_value,
        methods: window.methods,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::{CheckStatus, DetectorMethod};

    fn series(values: Vec<f64>) -> MetricSeries {
        let n = values.len() as i64;
        MetricSeries::new("overalThroughput", (0..n).map(|i| i * 10).collect(), values)
            .unwrap()
    }

    fn labels_at(len: usize, anomalous: &[usize]) -> LabelColumn {
        let mut labels = LabelColumn::new(len);
        for &i in anomalous {
            labels.mark(i, DetectorMethod::ZScore);
        }
        labels
    }

    #[test]
    fn test_clean_metric_yields_single_passed_check() {
        let series = series(vec![100.0; 10]);
        let outcome = AnomalyWindowCollector::collect(&series, &LabelColumn::new(10));
        assert!(outcome.windows.is_empty());
        assert_eq!(outcome.checks.len(), 1);
        assert_eq!(outcome.checks[0].status, CheckStatus::Passed);
    }

    #[test]
    fn test_contiguous_run_is_one_window() {
        let mut values = vec![100.0; 12];
        for i in 5..8 {
            values[i] = 300.0 + i as f64;
        }
        let series = series(values);
        let outcome = AnomalyWindowCollector::collect(&series, &labels_at(12, &[5, 6, 7]));

        assert_eq!(outcome.windows.len(), 1);
        let window = &outcome.windows[0];
        assert_eq!(window.start, 50);
        assert_eq!(window.end, 70);
        assert_eq!(window.direction, Direction::Increase);
        assert_eq!(window.significant_value, 307.0);
        assert!((window.baseline - 100.0).abs() < 1e-6);
        assert_eq!(outcome.checks.len(), 1);
        assert_eq!(outcome.checks[0].status, CheckStatus::Failed);
    }

    #[test]
    fn test_two_normal_samples_merge_into_one_window() {
        let values = vec![100.0; 14];
        let series = series(values);
        // runs at 4-5 and 8-9 separated by exactly 2 normal samples
        let outcome = AnomalyWindowCollector::collect(&series, &labels_at(14, &[4, 5, 8, 9]));
        assert_eq!(outcome.windows.len(), 1);
        assert_eq!(outcome.windows[0].start, 40);
        assert_eq!(outcome.windows[0].end, 90);
    }

    #[test]
    fn test_four_normal_samples_split_windows() {
        let values = vec![100.0; 16];
        let series = series(values);
        // runs at 3-4 and 9-10 separated by 4 normal samples
        let outcome = AnomalyWindowCollector::collect(&series, &labels_at(16, &[3, 4, 9, 10]));
        assert_eq!(outcome.windows.len(), 2);
        assert_eq!(outcome.checks.len(), 2);
        assert!(outcome.checks.iter().all(CheckResult::is_failed));
    }

    #[test]
    fn test_decrease_direction_uses_minimum() {
        let mut values = vec![100.0; 10];
        values[5] = 20.0;
        values[6] = 10.0;
        let series = series(values);
        let outcome = AnomalyWindowCollector::collect(&series, &labels_at(10, &[5, 6]));
        let window = &outcome.windows[0];
        assert_eq!(window.direction, Direction::Decrease);
        assert_eq!(window.significant_value, 10.0);
    }

    #[test]
    fn test_window_open_at_stream_end_closes() {
        let mut values = vec![100.0; 8];
        values[7] = 400.0;
        let series = series(values);
        let outcome = AnomalyWindowCollector::collect(&series, &labels_at(8, &[7]));
        assert_eq!(outcome.windows.len(), 1);
        assert_eq!(outcome.windows[0].start, 70);
        assert_eq!(outcome.windows[0].end, 70);
    }

    #[test]
    fn test_first_sample_window_uses_own_value_as_baseline() {
        let mut values = vec![100.0; 8];
        values[0] = 500.0;
        let series = series(values);
        let outcome = AnomalyWindowCollector::collect(&series, &labels_at(8, &[0]));
        let window = &outcome.windows[0];
        assert_eq!(window.baseline, 500.0);
        // max == baseline, so the close rule falls to the minimum side
        assert_eq!(window.direction, Direction::Decrease);
    }

    #[test]
    fn test_methods_union_across_run() {
        let mut labels = LabelColumn::new(10);
        labels.mark(4, DetectorMethod::IsolationForest);
        labels.mark(5, DetectorMethod::ZScore);
        let series = series(vec![100.0; 10]);
        let outcome = AnomalyWindowCollector::collect(&series, &labels);
        let window = &outcome.windows[0];
        assert!(window.methods.contains(&DetectorMethod::IsolationForest));
        assert!(window.methods.contains(&DetectorMethod::ZScore));
        assert_eq!(outcome.checks[0].method, "isolation_forest, z_score");
    }
}
