//! Engine configuration and the cross-request settings cache
//!
//! One [`EngineConfig`] is built per run from the `ml_analysis` settings
//! category and stays immutable for the duration of one `analyze` call.
//! Unknown keys are logged and ignored so older engines tolerate newer
//! settings; out-of-range values fall back to the documented defaults.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

/// Settings category the engine reads its parameters from
pub const SETTINGS_CATEGORY: &str = "ml_analysis";

/// Tuning parameters for one engine invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Load metric column name; segmentation and ramp-up correlation key off it
    pub load_metric: String,

    /// Expected share of outliers the isolation forest centers its decision
    /// offset on. Range (0, 0.5].
    pub contamination: f64,

    /// Decision-score cutoff: a sample is anomalous iff its decision score
    /// falls below this. Zero means "exactly the contamination quantile";
    /// negative values demand scores deeper into the outlier tail.
    /// Range [-1, 1].
    pub isf_threshold: f64,

    /// Companion metric whose rolling statistics extend the isolation-forest
    /// feature set (skipped when absent from the frame or equal to the
    /// analyzed metric)
    pub isf_feature_metric: String,

    /// |z| cutoff for the z-score detector. Must be positive.
    pub z_score_threshold: f64,

    /// Window length for rolling statistics and rolling correlation.
    /// Minimum 2.
    pub rolling_window: usize,

    /// A rolling-correlation sample below this is a breach during ramp-up.
    /// Range [-1, 1].
    pub rolling_correlation_threshold: f64,

    /// Minimum stable share of the run for fixed-load analysis. Range (0, 1].
    pub fixed_load_percentage: f64,

    /// |OLS slope| above this fails the stability check. Must be positive.
    pub slope_threshold: f64,

    /// Stationarity p-value must be below this to pass. Range (0, 1).
    pub p_value_threshold: f64,

    /// Population variance below this short-circuits the stability check to
    /// "constant". Must be non-negative.
    pub numpy_var_threshold: f64,

    /// Reserved severity cutoff; parsed and validated, not consumed by the
    /// detection passes. Range (0, 1].
    pub anomaly_severity_threshold: f64,

    /// Reserved gap for merging adjacent windows across collector runs;
    /// parsed and validated, not consumed by the detection passes.
    pub merge_gap_seconds: i64,

    /// Whether the surrounding service re-invokes the engine per transaction
    pub per_transaction_analysis: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            load_metric: "overalUsers".to_string(),
            contamination: 0.05,
            isf_threshold: -0.05,
            isf_feature_metric: "overalThroughput".to_string(),
            z_score_threshold: 3.0,
            rolling_window: 5,
            rolling_correlation_threshold: 0.4,
            fixed_load_percentage: 0.6,
            slope_threshold: 0.05,
            p_value_threshold: 0.05,
            numpy_var_threshold: 0.001,
            anomaly_severity_threshold: 0.7,
            merge_gap_seconds: 60,
            per_transaction_analysis: false,
        }
    }
}

impl EngineConfig {
    /// Build a config from one settings category.
    ///
    /// Unknown keys are logged and ignored (forward compatibility); values
    /// that fail to parse or fall outside their valid range are logged and
    /// replaced with the default.
    pub fn from_settings(settings: &BTreeMap<String, serde_json::Value>) -> Self {
        let defaults = Self::default();
        let mut config = defaults.clone();

        for (key, value) in settings {
            match key.as_str() {
                "load_metric" => {
                    config.load_metric = string_setting(key, value, &defaults.load_metric)
                }
                "contamination" => {
                    config.contamination =
                        f64_setting(key, value, defaults.contamination, 0.0..=0.5, false)
                }
                "isf_threshold" => {
                    config.isf_threshold =
                        f64_setting(key, value, defaults.isf_threshold, -1.0..=1.0, true)
                }
                "isf_feature_metric" => {
                    config.isf_feature_metric =
                        string_setting(key, value, &defaults.isf_feature_metric)
                }
                "z_score_threshold" => {
                    config.z_score_threshold =
                        f64_setting(key, value, defaults.z_score_threshold, 0.0..=f64::MAX, false)
                }
                "rolling_window" => {
                    config.rolling_window = usize_setting(key, value, defaults.rolling_window, 2)
                }
                "rolling_correlation_threshold" => {
                    config.rolling_correlation_threshold = f64_setting(
                        key,
                        value,
                        defaults.rolling_correlation_threshold,
                        -1.0..=1.0,
                        true,
                    )
                }
                "fixed_load_percentage" => {
                    config.fixed_load_percentage =
                        f64_setting(key, value, defaults.fixed_load_percentage, 0.0..=1.0, false)
                }
                "slope_threshold" => {
                    config.slope_threshold =
                        f64_setting(key, value, defaults.slope_threshold, 0.0..=f64::MAX, false)
                }
                "p_value_threshold" => {
                    let parsed =
                        f64_setting(key, value, defaults.p_value_threshold, 0.0..=1.0, false);
                    // the range check is inclusive; the upper edge is not valid here
                    config.p_value_threshold = if parsed >= 1.0 {
                        tracing::warn!(
                            "setting 'p_value_threshold'={parsed} must be below 1; using default {}",
                            defaults.p_value_threshold
                        );
                        defaults.p_value_threshold
                    } else {
                        parsed
                    };
                }
                "numpy_var_threshold" => {
                    config.numpy_var_threshold =
                        f64_setting(key, value, defaults.numpy_var_threshold, 0.0..=f64::MAX, true)
                }
                "anomaly_severity_threshold" => {
                    config.anomaly_severity_threshold = f64_setting(
                        key,
                        value,
                        defaults.anomaly_severity_threshold,
                        0.0..=1.0,
                        false,
                    )
                }
                "merge_gap_seconds" => {
                    config.merge_gap_seconds =
                        i64_setting(key, value, defaults.merge_gap_seconds)
                }
                "per_transaction_analysis" => {
                    config.per_transaction_analysis =
                        bool_setting(key, value, defaults.per_transaction_analysis)
                }
                _ => {
                    tracing::warn!("ignoring unknown ml_analysis setting '{key}'");
                }
            }
        }
        config
    }

    /// Validate ranges; `from_settings` output always passes
    pub fn validate(&self) -> Result<(), String> {
        if !(self.contamination > 0.0 && self.contamination <= 0.5) {
            return Err(format!(
                "contamination must be in (0, 0.5], got {}",
                self.contamination
            ));
        }
        if !(-1.0..=1.0).contains(&self.isf_threshold) {
            return Err(format!(
                "isf_threshold must be in [-1, 1], got {}",
                self.isf_threshold
            ));
        }
        if self.z_score_threshold <= 0.0 {
            return Err(format!(
                "z_score_threshold must be positive, got {}",
                self.z_score_threshold
            ));
        }
        if self.rolling_window < 2 {
            return Err(format!(
                "rolling_window must be at least 2, got {}",
                self.rolling_window
            ));
        }
        if !(-1.0..=1.0).contains(&self.rolling_correlation_threshold) {
            return Err(format!(
                "rolling_correlation_threshold must be in [-1, 1], got {}",
                self.rolling_correlation_threshold
            ));
        }
        if !(self.fixed_load_percentage > 0.0 && self.fixed_load_percentage <= 1.0) {
            return Err(format!(
                "fixed_load_percentage must be in (0, 1], got {}",
                self.fixed_load_percentage
            ));
        }
        if self.slope_threshold <= 0.0 {
            return Err(format!(
                "slope_threshold must be positive, got {}",
                self.slope_threshold
            ));
        }
        if !(self.p_value_threshold > 0.0 && self.p_value_threshold < 1.0) {
            return Err(format!(
                "p_value_threshold must be in (0, 1), got {}",
                self.p_value_threshold
            ));
        }
        if self.numpy_var_threshold < 0.0 {
            return Err(format!(
                "numpy_var_threshold must be non-negative, got {}",
                self.numpy_var_threshold
            ));
        }
        Ok(())
    }
}

fn parse_f64(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        // settings stores render numbers as strings
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn f64_setting(
    key: &str,
    value: &serde_json::Value,
    default: f64,
    range: std::ops::RangeInclusive<f64>,
    allow_low_edge: bool,
) -> f64 {
    let Some(parsed) = parse_f64(value) else {
        tracing::warn!("setting '{key}' is not numeric ({value}); using default {default}");
        return default;
    };
    let above_low = if allow_low_edge {
        parsed >= *range.start()
    } else {
        parsed > *range.start()
    };
    if !above_low || parsed > *range.end() || !parsed.is_finite() {
        tracing::warn!(
            "setting '{key}'={parsed} outside [{}, {}]; using default {default}",
            range.start(),
            range.end()
        );
        return default;
    }
    parsed
}

fn usize_setting(key: &str, value: &serde_json::Value, default: usize, min: usize) -> usize {
    match parse_f64(value) {
        Some(parsed) if parsed.fract() == 0.0 && parsed >= min as f64 => parsed as usize,
        Some(parsed) => {
            tracing::warn!("setting '{key}'={parsed} below minimum {min}; using default {default}");
            default
        }
        None => {
            tracing::warn!("setting '{key}' is not numeric ({value}); using default {default}");
            default
        }
    }
}

fn i64_setting(key: &str, value: &serde_json::Value, default: i64) -> i64 {
    match parse_f64(value) {
        Some(parsed) if parsed.fract() == 0.0 && parsed >= 0.0 => parsed as i64,
        Some(parsed) => {
            tracing::warn!("setting '{key}'={parsed} must be a non-negative integer; using default {default}");
            default
        }
        None => {
            tracing::warn!("setting '{key}' is not numeric ({value}); using default {default}");
            default
        }
    }
}

fn bool_setting(key: &str, value: &serde_json::Value, default: bool) -> bool {
    match value {
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => true,
            "false" | "0" | "no" => false,
            _ => {
                tracing::warn!("setting '{key}' is not boolean ({value}); using default {default}");
                default
            }
        },
        _ => {
            tracing::warn!("setting '{key}' is not boolean ({value}); using default {default}");
            default
        }
    }
}

fn string_setting(key: &str, value: &serde_json::Value, default: &str) -> String {
    match value.as_str() {
        Some(s) if !s.trim().is_empty() => s.trim().to_string(),
        _ => {
            tracing::warn!(
                "setting '{key}' is not a usable string ({value}); using default '{default}'"
            );
            default.to_string()
        }
    }
}

/// Explicit cross-request cache for per-category engine configs.
///
/// Lifetime: one cache per service process. Entries expire after `ttl` and
/// can be dropped eagerly via [`SettingsCache::invalidate`] (e.g. after a
/// settings update) or [`SettingsCache::clear`]. The engine itself never
/// touches this; it is for callers that rebuild configs per request.
#[derive(Debug)]
pub struct SettingsCache {
    entries: HashMap<String, CacheEntry>,
    ttl: Duration,
}

#[derive(Debug)]
struct CacheEntry {
    config: EngineConfig,
    loaded_at: Instant,
}

impl SettingsCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
        }
    }

    /// Cached config for a category, if present and fresh
    pub fn get(&self, category: &str) -> Option<&EngineConfig> {
        self.entries
            .get(category)
            .filter(|entry| entry.loaded_at.elapsed() < self.ttl)
            .map(|entry| &entry.config)
    }

    pub fn insert(&mut self, category: impl Into<String>, config: EngineConfig) {
        self.entries.insert(
            category.into(),
            CacheEntry {
                config,
                loaded_at: Instant::now(),
            },
        );
    }

    /// Drop one category's entry (call after a settings write)
    pub fn invalidate(&mut self, category: &str) {
        self.entries.remove(category);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.load_metric, "overalUsers");
        assert_eq!(config.isf_feature_metric, "overalThroughput");
        assert_eq!(config.rolling_window, 5);
        assert_eq!(config.fixed_load_percentage, 0.6);
    }

    #[test]
    fn test_from_settings_applies_known_keys() {
        let mut settings = BTreeMap::new();
        settings.insert("z_score_threshold".to_string(), json!(2.5));
        settings.insert("rolling_window".to_string(), json!(7));
        settings.insert("per_transaction_analysis".to_string(), json!(true));

        let config = EngineConfig::from_settings(&settings);
        assert_eq!(config.z_score_threshold, 2.5);
        assert_eq!(config.rolling_window, 7);
        assert!(config.per_transaction_analysis);
        // untouched keys keep defaults
        assert_eq!(config.contamination, 0.05);
    }

    #[test]
    fn test_from_settings_parses_string_numbers() {
        let mut settings = BTreeMap::new();
        settings.insert("contamination".to_string(), json!("0.1"));
        settings.insert("per_transaction_analysis".to_string(), json!("true"));

        let config = EngineConfig::from_settings(&settings);
        assert_eq!(config.contamination, 0.1);
        assert!(config.per_transaction_analysis);
    }

    #[test]
    fn test_from_settings_ignores_unknown_keys() {
        let mut settings = BTreeMap::new();
        settings.insert("future_knob".to_string(), json!(12));
        let config = EngineConfig::from_settings(&settings);
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_from_settings_out_of_range_falls_back() {
        let mut settings = BTreeMap::new();
        settings.insert("contamination".to_string(), json!(0.9));
        settings.insert("rolling_window".to_string(), json!(1));
        settings.insert("p_value_threshold".to_string(), json!(-0.5));

        let config = EngineConfig::from_settings(&settings);
        assert_eq!(config.contamination, 0.05);
        assert_eq!(config.rolling_window, 5);
        assert_eq!(config.p_value_threshold, 0.05);
        assert!(config.validate().is_ok());
    }

    #[test]
    #[allow(clippy::field_reassign_with_default)]
    fn test_validate_rejects_bad_values() {
        let mut config = EngineConfig::default();
        config.rolling_window = 1;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.contamination = 0.0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.isf_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_settings_cache_roundtrip_and_invalidation() {
        let mut cache = SettingsCache::new(Duration::from_secs(60));
        assert!(cache.get(SETTINGS_CATEGORY).is_none());

        cache.insert(SETTINGS_CATEGORY, EngineConfig::default());
        assert!(cache.get(SETTINGS_CATEGORY).is_some());

        cache.invalidate(SETTINGS_CATEGORY);
        assert!(cache.get(SETTINGS_CATEGORY).is_none());
    }

    #[test]
    fn test_settings_cache_expires() {
        let mut cache = SettingsCache::new(Duration::from_secs(0));
        cache.insert(SETTINGS_CATEGORY, EngineConfig::default());
        assert!(cache.get(SETTINGS_CATEGORY).is_none());
    }
}
