//! Change-point detection via binary segmentation
//!
//! Finds mean-shift break points by recursively splitting a series at the
//! index that maximizes the drop in within-segment squared error, accepting
//! a split only when the gain clears a penalty. The stability pass computes
//! these break points for future baseline work; its verdict does not read
//! them.
//!
//! # References
//!
//! Scott, A. J., & Knott, M. (1974). A cluster analysis method for grouping
//! means in the analysis of variance. Biometrics, 30(3).

/// Minimum samples on each side of a candidate split
const MIN_SEGMENT: usize = 5;

/// Break-point indices (ascending) for a mean-shift model.
///
/// `penalty` is the absolute squared-error gain a split must exceed; pass
/// something scaled to the series' noise, e.g. `2 ln(n) * variance`.
pub fn binary_segmentation(values: &[f64], penalty: f64) -> Vec<usize> {
    let mut breaks = Vec::new();
    split(values, 0, values.len(), penalty, &mut breaks);
    breaks.sort_unstable();
    breaks
}

fn split(values: &[f64], lo: usize, hi: usize, penalty: f64, breaks: &mut Vec<usize>) {
    if hi - lo < 2 * MIN_SEGMENT {
        return;
    }
    let segment = &values[lo..hi];
    let total = sse(segment);

    let mut best_gain = 0.0;
    let mut best_at = None;
    for cut in MIN_SEGMENT..=(segment.len() - MIN_SEGMENT) {
        let gain = total - sse(&segment[..cut]) - sse(&segment[cut..]);
        if gain > best_gain {
            best_gain = gain;
            best_at = Some(cut);
        }
    }

    if let Some(cut) = best_at {
        if best_gain > penalty {
            breaks.push(lo + cut);
            split(values, lo, lo + cut, penalty, breaks);
            split(values, lo + cut, hi, penalty, breaks);
        }
    }
}

/// Sum of squared deviations from the segment mean
fn sse(segment: &[f64]) -> f64 {
    if segment.is_empty() {
        return 0.0;
    }
    let mean = segment.iter().sum::<f64>() / segment.len() as f64;
    segment.iter().map(|v| (v - mean) * (v - mean)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_breaks_in_flat_series() {
        let values = vec![10.0; 40];
        assert!(binary_segmentation(&values, 1.0).is_empty());
    }

    #[test]
    fn test_single_level_shift() {
        let mut values = vec![10.0; 20];
        values.extend(vec![50.0; 20]);
        let breaks = binary_segmentation(&values, 10.0);
        assert_eq!(breaks, vec![20]);
    }

    #[test]
    fn test_two_level_shifts() {
        let mut values = vec![10.0; 20];
        values.extend(vec![50.0; 20]);
        values.extend(vec![10.0; 20]);
        let breaks = binary_segmentation(&values, 10.0);
        assert_eq!(breaks, vec![20, 40]);
    }

    #[test]
    fn test_penalty_suppresses_small_shift() {
        let mut values = vec![10.0; 20];
        values.extend(vec![10.2; 20]);
        // Gain of the 0.2 shift is 0.4; a larger penalty rejects the split
        assert!(binary_segmentation(&values, 5.0).is_empty());
    }

    #[test]
    fn test_short_series_never_splits() {
        let values = vec![1.0, 100.0, 1.0, 100.0];
        assert!(binary_segmentation(&values, 0.1).is_empty());
    }
}
