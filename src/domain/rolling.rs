//! Shared rolling-window statistics.

/// Arithmetic mean. Returns 0.0 for an empty slice; callers gate on window
/// length before calling.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1 denominator). `None` for fewer than two
/// observations.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>()
        / (values.len() - 1) as f64;
    Some(variance.sqrt())
}

/// Linearly interpolated quantile over an ascending-sorted slice, q in [0, 1].
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    if sorted.len() == 1 {
        return sorted[0];
    }
    let h = (sorted.len() - 1) as f64 * q;
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(sorted.len() - 1);
    sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn mean_basic() {
        assert_relative_eq!(mean(&[1.0, 2.0, 3.0]), 2.0);
    }

    #[test]
    fn sample_std_known_values() {
        // Sample std of [2,4,4,4,5,5,7,9] is sqrt(32/7).
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_relative_eq!(
            sample_std(&values).unwrap(),
            (32.0_f64 / 7.0).sqrt(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn sample_std_constant_series_is_zero() {
        assert_relative_eq!(sample_std(&[5.0, 5.0, 5.0]).unwrap(), 0.0);
    }

    #[test]
    fn sample_std_single_observation_is_undefined() {
        assert!(sample_std(&[5.0]).is_none());
        assert!(sample_std(&[]).is_none());
    }

    #[test]
    fn quantile_interpolates() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_relative_eq!(quantile(&sorted, 0.0), 1.0);
        assert_relative_eq!(quantile(&sorted, 1.0), 4.0);
        assert_relative_eq!(quantile(&sorted, 0.5), 2.5);
        assert_relative_eq!(quantile(&sorted, 1.0 / 3.0), 2.0);
    }

    #[test]
    fn quantile_single_element() {
        assert_relative_eq!(quantile(&[7.0], 0.5), 7.0);
    }
}
