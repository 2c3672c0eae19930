//! Isolation-forest point detector for fixed-load metrics
//!
//! Builds a rolling-statistics feature matrix for the analyzed metric
//! (optionally extended with a companion metric's statistics), fits a seeded
//! isolation forest on it, and marks samples whose decision score falls
//! below the configured cutoff.

use anyhow::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::check::DetectorMethod;
use crate::config::EngineConfig;
use crate::detect::LabelColumn;
use crate::frame::MetricSeries;
use crate::isolation_forest::IsolationForest;
use crate::stats;

/// Fixed fit seed: determinism is a contract of the engine, not a tunable
const FOREST_SEED: u64 = 0x5eed_f0e5;

pub struct IsolationForestDetector;

impl IsolationForestDetector {
    /// Label anomalous samples of `series`.
    ///
    /// The warm-up prefix (first `rolling_window - 1` samples) has no
    /// rolling statistics: it is excluded from the fit and stays Normal.
    /// The first and last eligible sample are forced Normal as well.
    pub fn label(
        series: &MetricSeries,
        feature_series: Option<&MetricSeries>,
        config: &EngineConfig,
        labels: &mut LabelColumn,
    ) -> Result<()> {
        let window = config.rolling_window;
        let n = series.len();
        if n < window + 2 {
            tracing::debug!(
                "{}: {} samples is too few past the rolling window; skipping isolation forest",
                series.metric(),
                n
            );
            return Ok(());
        }

        let eligible: Vec<usize> = ((window - 1)..n).collect();
        let mut columns = feature_columns(series.values(), window, &eligible);
        if let Some(companion) = feature_series {
            if companion.len() == n {
                columns.extend(feature_columns(companion.values(), window, &eligible));
            } else {
                tracing::warn!(
                    "companion metric '{}' length differs from '{}'; fitting univariate features",
                    companion.metric(),
                    series.metric()
                );
            }
        }
        for column in &mut columns {
            stats::standardize(column);
        }

        // row-major samples for the forest
        let rows: Vec<Vec<f64>> = (0..eligible.len())
            .map(|r| columns.iter().map(|c| c[r]).collect())
            .collect();

        let mut forest = IsolationForest::default();
        forest.fit(&rows, &mut StdRng::seed_from_u64(FOREST_SEED));
        let scores = forest.decision_scores(&rows, config.contamination)?;

        // skip the first and last eligible sample
        for (r, &index) in eligible.iter().enumerate().take(eligible.len() - 1).skip(1) {
            if scores[r] < config.isf_threshold {
                labels.mark(index, DetectorMethod::IsolationForest);
            }
        }
        Ok(())
    }
}

/// Columns {value, rolling mean, rolling std} restricted to eligible rows
fn feature_columns(values: &[f64], window: usize, eligible: &[usize]) -> Vec<Vec<f64>> {
    let rolled = stats::rolling_mean_std(values, window);
    let mut value_col = Vec::with_capacity(eligible.len());
    let mut mean_col = Vec::with_capacity(eligible.len());
    let mut std_col = Vec::with_capacity(eligible.len());
    for &i in eligible {
        // eligible indices all lie past the warm-up prefix
        let (mean, std) = rolled[i].unwrap_or((values[i], 0.0));
        value_col.push(values[i]);
        mean_col.push(mean);
        std_col.push(std);
    }
    vec![value_col, mean_col, std_col]
}
