//! Ramp-up linear-scaling check via rolling correlation
//!
//! While load ramps, a healthy metric tracks it: the rolling Pearson
//! correlation between the metric and the load stays high. A sustained run
//! of low-correlation samples marks the load level where scaling broke
//! down — the potential saturation point. One brief dip is noise; the run
//! length requirement filters it.

use anyhow::Result;

use crate::check::{CheckResult, DetectorMethod, SaturationPoint};
use crate::config::EngineConfig;
use crate::frame::MetricSeries;
use crate::stats;

/// Consecutive breaches required to confirm a tipping point
pub const BREACH_CONFIRMATION_RUN: usize = 5;

/// Outcome of the ramp-up check for one metric
#[derive(Debug, Clone)]
pub struct RampUpOutcome {
    pub check: CheckResult,
    /// Present only when a tipping point was confirmed. Reported as a
    /// standalone single-point category, never merged into anomaly windows.
    pub saturation: Option<SaturationPoint>,
}

pub struct RampUpCorrelationDetector;

impl RampUpCorrelationDetector {
    /// Search the ramp-up period for the point where `series` stops
    /// scaling with `load_series`.
    ///
    /// A breach is a rolling-correlation sample below the configured
    /// threshold; [`BREACH_CONFIRMATION_RUN`] consecutive breaches confirm
    /// the tipping point at the sample immediately preceding the first
    /// breach of the run.
    pub fn assess(
        series: &MetricSeries,
        load_series: &MetricSeries,
        config: &EngineConfig,
    ) -> Result<RampUpOutcome> {
        let metric = series.metric();
        if series.len() != load_series.len() {
            anyhow::bail!(
                "metric '{}' and load '{}' cover different sample counts ({} vs {})",
                metric,
                load_series.metric(),
                series.len(),
                load_series.len()
            );
        }

        let correlations =
            stats::rolling_pearson(series.values(), load_series.values(), config.rolling_window);

        let mut run_start: Option<usize> = None;
        let mut run_len = 0usize;
        let mut tipping: Option<usize> = None;
        for (i, corr) in correlations.iter().enumerate() {
            let breached = match corr {
                Some(c) => *c < config.rolling_correlation_threshold,
                // warm-up samples cannot breach
                None => false,
            };
            if breached {
                if run_start.is_none() {
                    run_start = Some(i);
                }
                run_len += 1;
                if run_len >= BREACH_CONFIRMATION_RUN {
                    // the sample immediately preceding the first breach
                    tipping = Some(run_start.unwrap_or(i).saturating_sub(1));
                    break;
                }
            } else {
                run_start = None;
                run_len = 0;
            }
        }

        let outcome = match tipping {
            Some(index) => {
                let sample = series.sample(index);
                let load = load_series.values()[index];
                tracing::debug!(
                    "{} stopped scaling with {} at {} (load {:.1})",
                    metric,
                    load_series.metric(),
                    sample.timestamp,
                    load
                );
                RampUpOutcome {
                    check: CheckResult::failed(
                        DetectorMethod::RampUpCorrelation.as_str(),
                        metric,
                        format!(
                            "{metric} has a potential saturation point at load {load:.1} \
                             (timestamp {})",
                            sample.timestamp
                        ),
                        Some(load),
                    ),
                    saturation: Some(SaturationPoint {
                        metric: metric.to_string(),
                        timestamp: sample.timestamp,
                        value: sample.value,
                        load,
                    }),
                }
            }
            None => RampUpOutcome {
                check: CheckResult::passed(
                    DetectorMethod::RampUpCorrelation.as_str(),
                    metric,
                    format!("{metric} scaled linearly with load during ramp-up"),
                    None,
                ),
                saturation: None,
            },
        };
        Ok(outcome)
    }
}
