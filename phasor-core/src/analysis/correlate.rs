//! Windowed Pearson correlation between two signals at an integer offset.

/// Computes the normalized correlation coefficient between `reference` and
/// `target` over their overlapping window at `offset_samples`.
///
/// The window is `reference[max(0, offset)..]` against
/// `target[max(0, -offset)..]`, truncated to the shorter remainder. A
/// positive offset therefore means the target leads the reference (it would
/// have to be shifted later to line up); a target that is a delayed copy of
/// the reference peaks at a negative offset.
///
/// Returns `None` when the offset leaves no overlapping window at all.
/// Zero-variance windows (silence, constant signal) are defined as a
/// neutral `Some(0.0)` rather than NaN. Every returned value is finite and
/// clamped into [-1, 1].
pub fn correlate(reference: &[f32], target: &[f32], offset_samples: i64) -> Option<f64> {
    let ref_start = if offset_samples > 0 {
        offset_samples as usize
    } else {
        0
    };
    let target_start = if offset_samples < 0 {
        offset_samples.unsigned_abs() as usize
    } else {
        0
    };
    if ref_start >= reference.len() || target_start >= target.len() {
        return None;
    }
    let len = (reference.len() - ref_start).min(target.len() - target_start);

    let ref_window = &reference[ref_start..ref_start + len];
    let target_window = &target[target_start..target_start + len];

    // Single pass, accumulated in f64: f32 running sums lose too much
    // precision over windows of typical capture length.
    let mut sum_r = 0.0f64;
    let mut sum_t = 0.0f64;
    let mut sum_rt = 0.0f64;
    let mut sum_rr = 0.0f64;
    let mut sum_tt = 0.0f64;
    for (&r, &t) in ref_window.iter().zip(target_window) {
        let r = r as f64;
        let t = t as f64;
        sum_r += r;
        sum_t += t;
        sum_rt += r * t;
        sum_rr += r * r;
        sum_tt += t * t;
    }

    let n = len as f64;
    let mean_r = sum_r / n;
    let mean_t = sum_t / n;
    let covariance = sum_rt / n - mean_r * mean_t;
    // Rounding can push a constant window's variance a hair below zero.
    let var_r = (sum_rr / n - mean_r * mean_r).max(0.0);
    let var_t = (sum_tt / n - mean_t * mean_t).max(0.0);

    let denominator = (var_r * var_t).sqrt();
    if denominator > 0.0 {
        Some((covariance / denominator).clamp(-1.0, 1.0))
    } else {
        Some(0.0)
    }
}
