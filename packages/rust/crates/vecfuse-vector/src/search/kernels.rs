//! Score kernels shared by the modality adapter and the backends.

/// Backend distance to a bounded similarity: `clamp(1 - distance, 0, 1)`.
///
/// `NaN` maps to `0.0` so a broken distance can never outrank a real hit.
#[inline]
#[must_use]
pub fn distance_to_score(distance: f64) -> f64 {
    if distance.is_nan() {
        return 0.0;
    }
    (1.0 - distance).clamp(0.0, 1.0)
}

/// Unbounded relevance (e.g. BM25) to a distance in `(0, 1]`: `1 / (1 + relevance)`.
#[inline]
#[must_use]
pub fn relevance_to_distance(relevance: f64) -> f64 {
    1.0 / (1.0 + relevance.max(0.0))
}

#[cfg(test)]
mod tests {
    use super::{distance_to_score, relevance_to_distance};

    #[test]
    fn test_distance_to_score_bounds() {
        assert!((distance_to_score(0.0) - 1.0).abs() < 1e-12);
        assert!((distance_to_score(0.25) - 0.75).abs() < 1e-12);
        assert!(distance_to_score(1.0).abs() < 1e-12);
        assert!(distance_to_score(1.7).abs() < 1e-12);
        assert!((distance_to_score(-0.5) - 1.0).abs() < 1e-12);
        assert!(distance_to_score(f64::NAN).abs() < 1e-12);
        assert!(distance_to_score(f64::INFINITY).abs() < 1e-12);
    }

    #[test]
    fn test_relevance_to_distance() {
        assert!((relevance_to_distance(0.0) - 1.0).abs() < 1e-12);
        assert!((relevance_to_distance(1.0) - 0.5).abs() < 1e-12);
        assert!((relevance_to_distance(-3.0) - 1.0).abs() < 1e-12);
    }
}
