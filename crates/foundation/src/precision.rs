//! Deterministic float ordering for sorting samples and keys.

use core::cmp::Ordering;

/// Canonicalize a floating-point value for deterministic ordering.
///
/// Rules:
/// - `-0.0` becomes `0.0`
/// - all NaNs become a single canonical NaN
pub fn canonical_f64(v: f64) -> f64 {
    if v == 0.0 {
        0.0
    } else if v.is_nan() {
        f64::NAN
    } else {
        v
    }
}

/// Deterministic total ordering for floats.
///
/// Prefer this any time you sort floats.
pub fn stable_total_cmp_f64(a: f64, b: f64) -> Ordering {
    canonical_f64(a).total_cmp(&canonical_f64(b))
}

/// Sorts `values` in place after dropping non-finite entries.
pub fn sort_finite(values: &mut Vec<f64>) {
    values.retain(|v| v.is_finite());
    values.sort_by(|a, b| stable_total_cmp_f64(*a, *b));
}

#[cfg(test)]
mod tests {
    use super::{canonical_f64, sort_finite, stable_total_cmp_f64};
    use core::cmp::Ordering;

    #[test]
    fn canonicalizes_negative_zero() {
        assert_eq!(canonical_f64(-0.0), 0.0);
        assert_eq!(stable_total_cmp_f64(-0.0, 0.0), Ordering::Equal);
        assert_eq!(stable_total_cmp_f64(f64::NAN, f64::NAN), Ordering::Equal);
    }

    #[test]
    fn sort_finite_drops_nan_and_infinity() {
        let mut v = vec![3.0, f64::NAN, -1.0, f64::INFINITY, 2.0];
        sort_finite(&mut v);
        assert_eq!(v, vec![-1.0, 2.0, 3.0]);
    }
}
