//! Z-score point detector for fixed-load metrics

use crate::check::DetectorMethod;
use crate::config::EngineConfig;
use crate::detect::LabelColumn;
use crate::frame::MetricSeries;
use crate::stats;

/// Flags samples whose distance from the series mean exceeds the configured
/// number of standard deviations.
///
/// The first and last sample are always left Normal: edge samples have no
/// neighborhood to corroborate an excursion and routinely catch test
/// start/stop artifacts.
pub struct ZScoreDetector;

impl ZScoreDetector {
    pub fn label(series: &MetricSeries, config: &EngineConfig, labels: &mut LabelColumn) {
        let values = series.values();
        let n = values.len();
        if n < 3 {
            return;
        }

        let mean = stats::mean(values);
        let stddev = stats::stddev(values);
        // identical samples: any deviation would be infinite sigmas away,
        // flag nothing
        if stddev <= f64::EPSILON {
            return;
        }

        for (i, &value) in values.iter().enumerate().take(n - 1).skip(1) {
            let z = (value - mean) / stddev;
            if z.abs() > config.z_score_threshold {
                labels.mark(i, DetectorMethod::ZScore);
            }
        }
    }
}
