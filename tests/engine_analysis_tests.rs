// End-to-end analysis behavior through the public engine API:
// period classification, detector boundary rules, debounced window
// merging, saturation search, and run-level determinism.

use std::collections::BTreeMap;

use veredicto::check::CheckStatus;
use veredicto::config::EngineConfig;
use veredicto::engine::AnalysisEngine;
use veredicto::frame::MetricFrame;
use veredicto::period::PeriodKind;

const STEP_SECONDS: i64 = 5;

fn frame_from(columns: BTreeMap<String, Vec<f64>>) -> MetricFrame {
    let n = columns.values().next().expect("at least one column").len();
    MetricFrame::new(
        (0..n as i64).map(|i| i * STEP_SECONDS).collect(),
        columns,
    )
    .unwrap()
}

/// Users ramp 1 -> 100 over `ramp` samples, then hold for `flat` samples
fn ramp_profile(ramp: usize, flat: usize) -> Vec<f64> {
    (0..ramp + flat)
        .map(|i| {
            if i < ramp {
                1.0 + i as f64 * 99.0 / (ramp - 1) as f64
            } else {
                100.0
            }
        })
        .collect()
}

fn deterministic_noise(len: usize, amplitude: f64, seed: u64) -> Vec<f64> {
    let mut state = seed;
    (0..len)
        .map(|_| {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            ((state >> 11) as f64 / (1u64 << 53) as f64 - 0.5) * amplitude
        })
        .collect()
}

// ============================================================================
// Period classification
// ============================================================================

#[test]
fn test_120_sample_run_with_75_percent_flat_is_fixed_load() {
    let mut columns = BTreeMap::new();
    columns.insert("overalUsers".to_string(), ramp_profile(30, 90));
    columns.insert("overalThroughput".to_string(), vec![950.0; 120]);
    let frame = frame_from(columns);

    let engine = AnalysisEngine::new(EngineConfig::default()).unwrap();
    let report = engine.analyze(&frame).unwrap();
    assert_eq!(report.period, PeriodKind::FixedLoad);
}

#[test]
fn test_mostly_ramping_run_is_ramp_up() {
    // 55 of 100 samples flat: below the 60% fixed-load threshold
    let mut columns = BTreeMap::new();
    columns.insert("overalUsers".to_string(), ramp_profile(45, 55));
    columns.insert(
        "overalThroughput".to_string(),
        (0..100).map(|i| (i + 1) as f64 * 9.0).collect(),
    );
    let frame = frame_from(columns);

    let engine = AnalysisEngine::new(EngineConfig::default()).unwrap();
    let report = engine.analyze(&frame).unwrap();
    assert_eq!(report.period, PeriodKind::RampUp);
}

// ============================================================================
// Clean fixed-load run: everything passes
// ============================================================================

#[test]
fn test_noise_free_flat_throughput_passes_all_checks() {
    let mut columns = BTreeMap::new();
    columns.insert("overalUsers".to_string(), ramp_profile(30, 90));
    columns.insert("overalThroughput".to_string(), vec![950.0; 120]);
    let frame = frame_from(columns);

    let engine = AnalysisEngine::new(EngineConfig::default()).unwrap();
    let report = engine.analyze(&frame).unwrap();

    assert!(report.summary.performance_status);
    assert!(report.windows.is_empty());
    assert!(report
        .checks
        .iter()
        .all(|c| c.status == CheckStatus::Passed));
    assert!(report.metrics[0]
        .data
        .iter()
        .all(|p| p.anomaly == "Normal"));
}

// ============================================================================
// Fixed-load anomaly windows
// ============================================================================

fn spike_frame(spikes: &[(usize, usize)]) -> MetricFrame {
    // 30-sample ramp, 170 flat samples with mild noise and planted spikes
    let flat = 170;
    let mut throughput: Vec<f64> = deterministic_noise(30 + flat, 6.0, 0x1234_5678)
        .iter()
        .enumerate()
        .map(|(i, n)| {
            if i < 30 {
                (i + 1) as f64 * 950.0 / 30.0
            } else {
                950.0 + n
            }
        })
        .collect();
    // spike offsets are relative to the start of the fixed-load period
    for &(offset, len) in spikes {
        for v in throughput.iter_mut().skip(30 + offset).take(len) {
            *v = 1500.0;
        }
    }

    let mut columns = BTreeMap::new();
    columns.insert("overalUsers".to_string(), ramp_profile(30, flat));
    columns.insert("overalThroughput".to_string(), throughput);
    frame_from(columns)
}

#[test]
fn test_spike_produces_failed_window_with_direction() {
    let frame = spike_frame(&[(80, 3)]);
    let engine = AnalysisEngine::new(EngineConfig::default()).unwrap();
    let report = engine.analyze(&frame).unwrap();

    assert!(!report.summary.performance_status);
    assert_eq!(report.windows.len(), 1);
    let window = &report.windows[0];
    assert_eq!(window.metric, "overalThroughput");
    assert_eq!(window.significant_value, 1500.0);
    assert!(window.baseline < 1000.0);
    assert_eq!(report.summary.anomalies_per_metric["overalThroughput"], 1);
}

#[test]
fn test_runs_two_normals_apart_merge_into_one_window() {
    // two spike runs separated by exactly 2 normal samples
    let frame = spike_frame(&[(80, 3), (85, 3)]);
    let engine = AnalysisEngine::new(EngineConfig::default()).unwrap();
    let report = engine.analyze(&frame).unwrap();
    assert_eq!(report.windows.len(), 1);
}

#[test]
fn test_runs_far_apart_stay_separate_windows() {
    // separated by far more than the 3-sample debounce buffer
    let frame = spike_frame(&[(60, 3), (120, 3)]);
    let engine = AnalysisEngine::new(EngineConfig::default()).unwrap();
    let report = engine.analyze(&frame).unwrap();
    assert_eq!(report.windows.len(), 2);
}

// ============================================================================
// Boundary rule: point detectors never flag the edges
// ============================================================================

#[test]
fn test_point_detectors_leave_bounds_normal() {
    // plant extremes at the very edges of the fixed-load period
    let flat = 120;
    let mut throughput: Vec<f64> = deterministic_noise(30 + flat, 6.0, 0xFACE_FEED)
        .iter()
        .enumerate()
        .map(|(i, n)| {
            if i < 30 {
                (i + 1) as f64 * 950.0 / 30.0
            } else {
                950.0 + n
            }
        })
        .collect();
    throughput[30] = 4000.0;
    throughput[30 + flat - 1] = 4000.0;

    let mut columns = BTreeMap::new();
    columns.insert("overalUsers".to_string(), ramp_profile(30, flat));
    columns.insert("overalThroughput".to_string(), throughput);
    let frame = frame_from(columns);

    let engine = AnalysisEngine::new(EngineConfig::default()).unwrap();
    let report = engine.analyze(&frame).unwrap();

    let data = &report.metrics[0].data;
    assert_eq!(data.first().unwrap().anomaly, "Normal");
    assert_eq!(data.last().unwrap().anomaly, "Normal");
}

// ============================================================================
// Ramp-up saturation
// ============================================================================

#[test]
fn test_saturating_throughput_fails_ramp_up_check() {
    let n = 60;
    let mut columns = BTreeMap::new();
    columns.insert(
        "overalUsers".to_string(),
        (1..=n).map(|i| i as f64).collect(),
    );
    // tracks load for 30 samples, then flatlines with a ripple
    columns.insert(
        "overalThroughput".to_string(),
        (0..n)
            .map(|i| {
                if i < 30 {
                    (i + 1) as f64 * 12.0
                } else {
                    360.0 + if i % 2 == 0 { 2.0 } else { -2.0 }
                }
            })
            .collect(),
    );
    let frame = frame_from(columns);

    let engine = AnalysisEngine::new(EngineConfig::default()).unwrap();
    let report = engine.analyze(&frame).unwrap();

    assert_eq!(report.period, PeriodKind::RampUp);
    assert!(!report.summary.performance_status);
    assert_eq!(report.saturation_points.len(), 1);
    let sp = &report.saturation_points[0];
    // the tipping point sits near the scaling break at sample 30
    assert!((28.0..=36.0).contains(&sp.load), "load was {}", sp.load);
    // windows are a fixed-load artifact; saturation stays standalone
    assert!(report.windows.is_empty());
    assert!(report.metrics[0]
        .data
        .iter()
        .any(|p| p.anomaly == "Potential saturation point"));
}

// ============================================================================
// Determinism
// ============================================================================

#[test]
fn test_identical_input_yields_identical_reports() {
    let frame = spike_frame(&[(70, 4)]);
    let engine = AnalysisEngine::new(EngineConfig::default()).unwrap();

    let a = engine.analyze(&frame).unwrap();
    let b = engine.analyze(&frame).unwrap();

    assert_eq!(a.checks, b.checks);
    assert_eq!(a.windows, b.windows);
    assert_eq!(
        serde_json::to_string(&a).unwrap(),
        serde_json::to_string(&b).unwrap()
    );
}

// ============================================================================
// Stability verdicts through the engine
// ============================================================================

#[test]
fn test_climbing_latency_fails_with_trend_issue() {
    // response time climbs steadily through the fixed-load period
    let flat = 120;
    let latency: Vec<f64> = deterministic_noise(30 + flat, 2.0, 0xDEAD_BEEF)
        .iter()
        .enumerate()
        .map(|(i, n)| {
            if i < 30 {
                200.0 + n
            } else {
                200.0 + ((i - 30) as f64) * 3.0 + n
            }
        })
        .collect();

    let mut columns = BTreeMap::new();
    columns.insert("overalUsers".to_string(), ramp_profile(30, flat));
    columns.insert("latency_p95".to_string(), latency);
    let frame = frame_from(columns);

    let engine = AnalysisEngine::new(EngineConfig::default()).unwrap();
    let report = engine.analyze(&frame).unwrap();

    assert!(!report.summary.performance_status);
    assert!(!report.summary.trend_issues.is_empty());
    assert!(report
        .checks
        .iter()
        .any(|c| c.is_failed() && c.method == "trend_stability"));
}
