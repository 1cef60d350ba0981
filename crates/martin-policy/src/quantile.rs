//! Sample quantile with linear interpolation.

/// Quantile `q` of `samples` (unsorted), or `None` when empty.
pub fn quantile(samples: &[f64], q: f64) -> Option<f64> {
    if samples.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }
    let mut sorted: Vec<f64> = samples.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    if sorted.len() == 1 {
        return Some(sorted[0]);
    }

    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    if lower == upper {
        return Some(sorted[lower]);
    }
    let weight = position - lower as f64;
    Some(sorted[lower] * (1.0 - weight) + sorted[upper] * weight)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_and_bad_q() {
        assert_eq!(quantile(&[], 0.5), None);
        assert_eq!(quantile(&[1.0], 1.5), None);
        assert_eq!(quantile(&[1.0], -0.1), None);
    }

    #[test]
    fn test_single_sample() {
        assert_eq!(quantile(&[42.0], 0.1), Some(42.0));
        assert_eq!(quantile(&[42.0], 0.9), Some(42.0));
    }

    #[test]
    fn test_median_interpolation() {
        assert_eq!(quantile(&[10.0, 20.0], 0.5), Some(15.0));
        assert_eq!(quantile(&[30.0, 10.0, 20.0], 0.5), Some(20.0));
    }

    #[test]
    fn test_extremes() {
        let samples = [5.0, 1.0, 3.0];
        assert_eq!(quantile(&samples, 0.0), Some(1.0));
        assert_eq!(quantile(&samples, 1.0), Some(5.0));
    }

    #[test]
    fn test_p75() {
        let samples = [30.0, 40.0, 50.0, 60.0];
        // position = 0.75 * 3 = 2.25 -> 50 + 0.25*(60-50) = 52.5
        assert_eq!(quantile(&samples, 0.75), Some(52.5));
    }
}
