//! Period segmentation from the load metric's trend
//!
//! A performance test is split into a Ramp-Up period (load increasing or
//! decreasing) and a Fixed-Load period (load held steady) by classifying
//! each sample from the load metric's first difference. The fixed-load
//! share of the run decides which detector set the engine dispatches.

use serde::Serialize;
use std::ops::Range;

use crate::frame::{FrameError, MetricFrame};

/// Which period a detector set targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PeriodKind {
    RampUp,
    FixedLoad,
}

/// Per-sample load trend classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    /// Load rising (positive first difference); also forced for sample 0
    RampUp,
    /// Load falling
    RampDown,
    /// Load unchanged
    Stable,
}

/// One run's period split
#[derive(Debug, Clone)]
pub struct PeriodSplit {
    phases: Vec<LoadPhase>,
    /// Maximal contiguous run of stable samples (empty range when none)
    fixed_range: Range<usize>,
    /// Indices of all ramp-up/ramp-down samples, ascending
    ramp_indices: Vec<usize>,
}

impl PeriodSplit {
    pub fn phases(&self) -> &[LoadPhase] {
        &self.phases
    }

    pub fn fixed_range(&self) -> Range<usize> {
        self.fixed_range.clone()
    }

    pub fn fixed_count(&self) -> usize {
        self.fixed_range.len()
    }

    pub fn ramp_indices(&self) -> &[usize] {
        &self.ramp_indices
    }

    pub fn total(&self) -> usize {
        self.phases.len()
    }

    /// The period whose detector set the engine runs
    pub fn active_period(&self, fixed_load_percentage: f64) -> PeriodKind {
        if is_fixed_load(self.total(), self.fixed_count(), fixed_load_percentage) {
            PeriodKind::FixedLoad
        } else {
            PeriodKind::RampUp
        }
    }
}

/// True iff the stable share of the run reaches the configured percentage
pub fn is_fixed_load(total: usize, fixed_count: usize, fixed_load_percentage: f64) -> bool {
    if total == 0 {
        return false;
    }
    fixed_count as f64 / total as f64 >= fixed_load_percentage
}

/// Segment a frame by the named load metric.
///
/// Classification is by first difference: positive → RampUp, negative →
/// RampDown, zero → Stable; the first sample is always RampUp by
/// convention. The Fixed-Load period is the maximal contiguous stable run
/// (the earliest one on ties); an all-ramp series yields an empty
/// fixed-load range.
pub fn segment(frame: &MetricFrame, load_metric: &str) -> Result<PeriodSplit, FrameError> {
    let load = frame.column(load_metric)?;

    let mut phases = Vec::with_capacity(load.len());
    phases.push(LoadPhase::RampUp);
    for w in load.windows(2) {
        let diff = w[1] - w[0];
        phases.push(if diff > 0.0 {
            LoadPhase::RampUp
        } else if diff < 0.0 {
            LoadPhase::RampDown
        } else {
            LoadPhase::Stable
        });
    }

    let fixed_range = longest_stable_run(&phases);
    let ramp_indices = phases
        .iter()
        .enumerate()
        .filter(|(_, p)| !matches!(p, LoadPhase::Stable))
        .map(|(i, _)| i)
        .collect();

    Ok(PeriodSplit {
        phases,
        fixed_range,
        ramp_indices,
    })
}

fn longest_stable_run(phases: &[LoadPhase]) -> Range<usize> {
    let mut best = 0..0;
    let mut current_start = None;
    for (i, phase) in phases.iter().enumerate() {
        match (phase, current_start) {
            (LoadPhase::Stable, None) => current_start = Some(i),
            (LoadPhase::Stable, Some(_)) => {}
            (_, Some(start)) => {
                if i - start > best.len() {
                    best = start..i;
                }
                current_start = None;
            }
            (_, None) => {}
        }
    }
    if let Some(start) = current_start {
        if phases.len() - start > best.len() {
            best = start..phases.len();
        }
    }
    best
}
