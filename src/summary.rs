//! Aggregation of check results into the run verdict
//!
//! Produces the failed/passed tally, per-metric anomaly counts, the trend
//! issue list and the overall `performance_status`, rendered equivalently
//! as plain text and as a small self-contained HTML fragment for the
//! reporting collaborators.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::check::{AnomalyWindow, CheckResult, DetectorMethod, SaturationPoint};

/// Aggregated verdict for one engine invocation
#[derive(Debug, Clone, Serialize)]
pub struct ResultSummary {
    pub passed: usize,
    pub failed: usize,
    /// True iff no check failed
    pub performance_status: bool,
    /// Anomaly windows per metric
    pub anomalies_per_metric: BTreeMap<String, usize>,
    /// Descriptions of failed trend-stability checks
    pub trend_issues: Vec<String>,
    /// Confirmed ramp-up saturation points
    pub saturation_points: Vec<SaturationPoint>,
}

pub struct ResultSummarizer;

impl ResultSummarizer {
    pub fn summarize(
        checks: &[CheckResult],
        windows: &[AnomalyWindow],
        saturation_points: &[SaturationPoint],
    ) -> ResultSummary {
        let failed = checks.iter().filter(|c| c.is_failed()).count();
        let passed = checks.len() - failed;

        let mut anomalies_per_metric = BTreeMap::new();
        for window in windows {
            *anomalies_per_metric
                .entry(window.metric.clone())
                .or_insert(0) += 1;
        }

        let trend_issues = checks
            .iter()
            .filter(|c| {
                c.is_failed() && c.method == DetectorMethod::TrendStability.as_str()
            })
            .map(|c| c.description.clone())
            .collect();

        ResultSummary {
            passed,
            failed,
            performance_status: failed == 0,
            anomalies_per_metric,
            trend_issues,
            saturation_points: saturation_points.to_vec(),
        }
    }
}

impl ResultSummary {
    /// Plain-text rendering
    pub fn to_text(&self) -> String {
        let mut report = String::new();

        if self.performance_status {
            report.push_str("PERFORMANCE STATUS: OK\n\n");
        } else {
            report.push_str("PERFORMANCE STATUS: DEGRADED\n\n");
        }
        report.push_str(&format!(
            "Checks: {} passed, {} failed\n",
            self.passed, self.failed
        ));

        if !self.anomalies_per_metric.is_empty() {
            report.push_str("\nAnomalies per metric:\n");
            for (metric, count) in &self.anomalies_per_metric {
                report.push_str(&format!("  {metric}: {count}\n"));
            }
        }

        if !self.trend_issues.is_empty() {
            report.push_str("\nTrend issues:\n");
            for issue in &self.trend_issues {
                report.push_str(&format!("  - {issue}\n"));
            }
        }

        if !self.saturation_points.is_empty() {
            report.push_str("\nPotential saturation points:\n");
            for sp in &self.saturation_points {
                report.push_str(&format!(
                    "  - {} at load {:.1} (timestamp {})\n",
                    sp.metric, sp.load, sp.timestamp
                ));
            }
        }

        report
    }

    /// HTML rendering with the same content as [`ResultSummary::to_text`]
    pub fn to_html(&self) -> String {
        let mut html = String::new();
        html.push_str("<style>\n");
        html.push_str(HTML_STYLES);
        html.push_str("</style>\n");

        let (status_class, status_text) = if self.performance_status {
            ("status-ok", "OK")
        } else {
            ("status-degraded", "DEGRADED")
        };
        html.push_str(&format!(
            "<h2>Performance status: <span class=\"{status_class}\">{status_text}</span></h2>\n"
        ));
        html.push_str(&format!(
            "<p>Checks: {} passed, {} failed</p>\n",
            self.passed, self.failed
        ));

        if !self.anomalies_per_metric.is_empty() {
            html.push_str("<h3>Anomalies per metric</h3>\n<table>\n");
            html.push_str("<tr><th>Metric</th><th>Windows</th></tr>\n");
            for (metric, count) in &self.anomalies_per_metric {
                html.push_str(&format!(
                    "<tr><td>{}</td><td>{count}</td></tr>\n",
                    escape_html(metric)
                ));
            }
            html.push_str("</table>\n");
        }

        if !self.trend_issues.is_empty() {
            html.push_str("<h3>Trend issues</h3>\n<ul>\n");
            for issue in &self.trend_issues {
                html.push_str(&format!("<li>{}</li>\n", escape_html(issue)));
            }
            html.push_str("</ul>\n");
        }

        if !self.saturation_points.is_empty() {
            html.push_str("<h3>Potential saturation points</h3>\n<ul>\n");
            for sp in &self.saturation_points {
                html.push_str(&format!(
                    "<li>{} at load {:.1} (timestamp {})</li>\n",
                    escape_html(&sp.metric),
                    sp.load,
                    sp.timestamp
                ));
            }
            html.push_str("</ul>\n");
        }

        html
    }
}

/// Escape HTML special characters; metric names come from user-defined
/// test plans
fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

const HTML_STYLES: &str = "\
table { border-collapse: collapse; }
th, td { border: 1px solid #ddd; padding: 6px 10px; text-align: left; }
th { background-color: #4a90d9; color: white; }
.status-ok { color: #2e7d32; }
.status-degraded { color: #cc0000; }
";
