use serde::Serialize;

/// Per-feature forecast time series.
///
/// All arrays are aligned by index to `years`. Missing observations are
/// stored as `NaN`, so consumers must check `is_finite()` before using a value.
/// The `p10 <= p50 <= p90` ordering is trusted input and not enforced here.
/// Missing values serialize as `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ForecastSeries {
    pub years: Vec<i32>,
    pub p10: Vec<f64>,
    pub p50: Vec<f64>,
    pub p90: Vec<f64>,
    pub median: Vec<f64>,
    /// Observed values for the pre-forecast range.
    pub historical: Vec<f64>,
}

impl ForecastSeries {
    pub fn len(&self) -> usize {
        self.years.len()
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }

    /// Finite values a chart draws as lines for this feature (median + history).
    pub fn own_line_values(&self) -> impl Iterator<Item = f64> + '_ {
        self.median
            .iter()
            .chain(self.historical.iter())
            .copied()
            .filter(|v| v.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::ForecastSeries;

    #[test]
    fn own_line_values_skip_missing() {
        let s = ForecastSeries {
            years: vec![2023, 2024],
            median: vec![f64::NAN, 3.0],
            historical: vec![1.0, f64::NAN],
            ..ForecastSeries::default()
        };
        let got: Vec<f64> = s.own_line_values().collect();
        assert_eq!(got, vec![3.0, 1.0]);
    }
}
