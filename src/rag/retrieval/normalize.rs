//! Min-max rescaling of raw similarity scores.

/// Rescale scores to `[0, 1]` with `(score - min) / (max - min)`.
///
/// When every score is equal (including a single score) each output is `1.0`.
/// Inputs are expected to be finite; callers drop non-finite scores first.
#[must_use]
pub fn normalize_scores(raw: &[f64]) -> Vec<f64> {
    let Some(first) = raw.first() else {
        return Vec::new();
    };

    let (min, max) = raw
        .iter()
        .fold((*first, *first), |(lo, hi), &s| (lo.min(s), hi.max(s)));
    let range = max - min;

    raw.iter()
        .map(|&score| {
            if range > 0.0 {
                ((score - min) / range).clamp(0.0, 1.0)
            } else {
                1.0
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-12, "{actual:?} != {expected:?}");
        }
    }

    #[test]
    fn test_empty() {
        assert!(normalize_scores(&[]).is_empty());
    }

    #[test]
    fn test_single_value() {
        assert_close(&normalize_scores(&[5.0]), &[1.0]);
    }

    #[test]
    fn test_all_equal() {
        assert_close(&normalize_scores(&[1.0, 1.0, 1.0]), &[1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_spread() {
        assert_close(&normalize_scores(&[1.0, 3.0, 5.0]), &[0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_negative_and_unordered() {
        assert_close(&normalize_scores(&[0.0, -2.0, 2.0]), &[0.5, 0.0, 1.0]);
    }
}
