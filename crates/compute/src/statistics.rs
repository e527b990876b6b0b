use foundation::precision::sort_finite;

pub struct Statistics;

impl Statistics {
    /// Mean over finite values; `None` when there are none.
    pub fn mean(values: &[f64]) -> Option<f64> {
        let mut sum = 0.0;
        let mut n = 0usize;
        for &v in values {
            if v.is_finite() {
                sum += v;
                n += 1;
            }
        }
        if n == 0 {
            return None;
        }
        Some(sum / n as f64)
    }

    pub fn min_max(values: impl IntoIterator<Item = f64>) -> Option<(f64, f64)> {
        let mut it = values.into_iter().filter(|v| v.is_finite());
        let first = it.next()?;
        let mut min = first;
        let mut max = first;
        for v in it {
            min = min.min(v);
            max = max.max(v);
        }
        Some((min, max))
    }

    /// Nearest-rank percentile of an ascending sample: index `floor(p * n)`
    /// clamped to `n - 1`.
    pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
        if sorted.is_empty() {
            return None;
        }
        let n = sorted.len();
        let idx = (p.clamp(0.0, 1.0) * n as f64).floor() as usize;
        Some(sorted[idx.min(n - 1)])
    }

    /// Sorts a copy of `values` (non-finite dropped) and returns the
    /// `(low, high)` percentiles.
    pub fn percentile_band(values: Vec<f64>, low: f64, high: f64) -> Option<(f64, f64)> {
        let mut sorted = values;
        sort_finite(&mut sorted);
        Some((
            Self::percentile(&sorted, low)?,
            Self::percentile(&sorted, high)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::Statistics;

    #[test]
    fn mean_skips_missing_values() {
        let m = Statistics::mean(&[1.0, f64::NAN, 3.0]).unwrap();
        assert!((m - 2.0).abs() < 1e-9);
        assert_eq!(Statistics::mean(&[f64::NAN]), None);
        assert_eq!(Statistics::mean(&[]), None);
    }

    #[test]
    fn percentile_uses_floor_index() {
        let sorted: Vec<f64> = (0..10).map(f64::from).collect();
        assert_eq!(Statistics::percentile(&sorted, 0.10), Some(1.0));
        assert_eq!(Statistics::percentile(&sorted, 0.90), Some(9.0));
        assert_eq!(Statistics::percentile(&sorted, 1.0), Some(9.0));
        assert_eq!(Statistics::percentile(&[5.0], 0.9), Some(5.0));
        assert_eq!(Statistics::percentile(&[], 0.5), None);
    }

    #[test]
    fn percentile_band_ignores_outlier_tails() {
        let mut values: Vec<f64> = (1..=18).map(f64::from).collect();
        values.push(-1_000.0);
        values.push(1_000_000.0);
        values.push(f64::NAN);
        let (lo, hi) = Statistics::percentile_band(values, 0.10, 0.90).unwrap();
        assert_eq!((lo, hi), (2.0, 18.0));
    }

    #[test]
    fn min_max_skips_non_finite() {
        assert_eq!(
            Statistics::min_max([3.0, f64::NAN, -2.0, f64::INFINITY]),
            Some((-2.0, 3.0))
        );
        assert_eq!(Statistics::min_max([f64::NAN]), None);
    }
}
