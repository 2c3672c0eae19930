//! The anomaly detection engine
//!
//! One `analyze` call processes one test's merged metric frame: segment the
//! run by the load metric, dispatch the detector set matching the active
//! period over every other metric, merge fixed-load point labels into
//! debounced windows, and summarize everything into the run verdict. Pure
//! computation: no I/O, no retries, deterministic for a given frame and
//! config.

use anyhow::{Context, Result};
use serde::Serialize;

use crate::check::{AnomalyWindow, CheckResult, SaturationPoint};
use crate::config::EngineConfig;
use crate::detect::{
    detectors_for, DetectorKind, IsolationForestDetector, LabelColumn, MetricStabilityDetector,
    RampUpCorrelationDetector, ZScoreDetector,
};
use crate::frame::{MetricFrame, MetricSeries};
use crate::period::{self, PeriodKind};
use crate::summary::{ResultSummarizer, ResultSummary};

/// One labeled sample in a metric report
#[derive(Debug, Clone, Serialize)]
pub struct LabeledPoint {
    pub timestamp: i64,
    pub value: f64,
    /// `"Normal"`, `"Anomaly: <methods>"`, or the saturation marker
    pub anomaly: String,
}

/// Per-metric output for downstream collaborators
#[derive(Debug, Clone, Serialize)]
pub struct MetricReport {
    pub name: String,
    pub data: Vec<LabeledPoint>,
}

/// Everything one `analyze` invocation returns
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    /// Which detector set ran
    pub period: PeriodKind,
    pub metrics: Vec<MetricReport>,
    pub checks: Vec<CheckResult>,
    pub windows: Vec<AnomalyWindow>,
    pub saturation_points: Vec<SaturationPoint>,
    pub summary: ResultSummary,
}

/// Anomaly detection engine for one test's metric set
pub struct AnalysisEngine {
    config: EngineConfig,
}

impl AnalysisEngine {
    /// Build an engine; rejects an invalid config up front
    pub fn new(config: EngineConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("invalid engine config: {e}"))?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Analyze one merged frame.
    ///
    /// Metrics are processed in sorted name order and detectors in their
    /// registry order, so identical input yields identical output.
    pub fn analyze(&self, frame: &MetricFrame) -> Result<AnalysisReport> {
        let split = period::segment(frame, &self.config.load_metric)
            .context("failed to segment the run by the load metric")?;
        let active = split.active_period(self.config.fixed_load_percentage);
        tracing::info!(
            "analyzing {} samples: {} fixed-load, active period {:?}",
            split.total(),
            split.fixed_count(),
            active
        );

        match active {
            PeriodKind::FixedLoad => self.analyze_fixed_load(frame, split.fixed_range()),
            PeriodKind::RampUp => self.analyze_ramp_up(frame, split.ramp_indices()),
        }
    }

    fn analyze_fixed_load(
        &self,
        frame: &MetricFrame,
        fixed_range: std::ops::Range<usize>,
    ) -> Result<AnalysisReport> {
        let fixed = frame.slice(fixed_range);

        let mut metrics = Vec::new();
        let mut checks = Vec::new();
        let mut windows = Vec::new();

        let names: Vec<String> = fixed
            .metric_names()
            .filter(|name| *name != self.config.load_metric)
            .map(str::to_string)
            .collect();

        for name in &names {
            let series = fixed.series(name)?;
            let companion = self.companion_series(&fixed, name)?;

            let mut labels = LabelColumn::new(series.len());
            for detector in detectors_for(PeriodKind::FixedLoad) {
                match detector {
                    DetectorKind::IsolationForest => {
                        IsolationForestDetector::label(
                            &series,
                            companion.as_ref(),
                            &self.config,
                            &mut labels,
                        )
                        .with_context(|| format!("isolation forest failed on '{name}'"))?;
                    }
                    DetectorKind::ZScore => {
                        ZScoreDetector::label(&series, &self.config, &mut labels);
                    }
                    DetectorKind::Stability => {
                        let outcome = MetricStabilityDetector::assess(&series, &self.config)
                            .with_context(|| format!("stability check failed on '{name}'"))?;
                        checks.push(outcome.check);
                    }
                    DetectorKind::RampUpCorrelation => unreachable!("wrong period affinity"),
                }
            }

            let collected = crate::window::AnomalyWindowCollector::collect(&series, &labels);
            checks.extend(collected.checks);
            windows.extend(collected.windows);

            metrics.push(MetricReport {
                name: name.clone(),
                data: (0..series.len())
                    .map(|i| {
                        let sample = series.sample(i);
                        LabeledPoint {
                            timestamp: sample.timestamp,
                            value: sample.value,
                            anomaly: labels.render(i),
                        }
                    })
                    .collect(),
            });
        }

        let summary = ResultSummarizer::summarize(&checks, &windows, &[]);
        Ok(AnalysisReport {
            period: PeriodKind::FixedLoad,
            metrics,
            checks,
            windows,
            saturation_points: Vec::new(),
            summary,
        })
    }

    fn analyze_ramp_up(&self, frame: &MetricFrame, ramp_indices: &[usize]) -> Result<AnalysisReport> {
        let load_full = frame.series(&self.config.load_metric)?;
        let load = load_full.gather(ramp_indices);

        let mut metrics = Vec::new();
        let mut checks = Vec::new();
        let mut saturation_points = Vec::new();

        let names: Vec<String> = frame
            .metric_names()
            .filter(|name| *name != self.config.load_metric)
            .map(str::to_string)
            .collect();

        for name in &names {
            let series = frame.series(name)?.gather(ramp_indices);
            let outcome = RampUpCorrelationDetector::assess(&series, &load, &self.config)
                .with_context(|| format!("ramp-up correlation failed on '{name}'"))?;

            let saturation_ts = outcome.saturation.as_ref().map(|sp| sp.timestamp);
            metrics.push(MetricReport {
                name: name.clone(),
                data: (0..series.len())
                    .map(|i| {
                        let sample = series.sample(i);
                        let anomaly = if Some(sample.timestamp) == saturation_ts {
                            "Potential saturation point".to_string()
                        } else {
                            "Normal".to_string()
                        };
                        LabeledPoint {
                            timestamp: sample.timestamp,
                            value: sample.value,
                            anomaly,
                        }
                    })
                    .collect(),
            });

            checks.push(outcome.check);
            saturation_points.extend(outcome.saturation);
        }

        let summary = ResultSummarizer::summarize(&checks, &[], &saturation_points);
        Ok(AnalysisReport {
            period: PeriodKind::RampUp,
            metrics,
            checks,
            windows: Vec::new(),
            saturation_points,
            summary,
        })
    }

    /// The configured companion series for the isolation forest, when it
    /// exists in the frame and differs from the analyzed metric
    fn companion_series(
        &self,
        fixed: &MetricFrame,
        analyzed: &str,
    ) -> Result<Option<MetricSeries>> {
        let companion = &self.config.isf_feature_metric;
        if companion == analyzed || !fixed.has_metric(companion) {
            return Ok(None);
        }
        Ok(Some(fixed.series(companion)?))
    }
}
