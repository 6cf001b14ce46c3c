//! Confidence pooling functions for [`Record::total_confidence_with`](crate::Record::total_confidence_with).
//!
//! Each function folds the confidences of a record's non-empty fields into a
//! single score, or returns `None` when there is nothing to pool.

/// Folds field confidences into one score.
pub type PoolingFn = fn(&[f64]) -> Option<f64>;

/// The lowest confidence. This is the default pooling.
pub fn min_value(confidences: &[f64]) -> Option<f64> {
    confidences.iter().copied().reduce(f64::min)
}

/// The highest confidence.
pub fn max_value(confidences: &[f64]) -> Option<f64> {
    confidences.iter().copied().reduce(f64::max)
}

/// The arithmetic mean.
pub fn mean_value(confidences: &[f64]) -> Option<f64> {
    if confidences.is_empty() {
        return None;
    }
    Some(confidences.iter().sum::<f64>() / confidences.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pooling_empty_is_none() {
        assert_eq!(min_value(&[]), None);
        assert_eq!(max_value(&[]), None);
        assert_eq!(mean_value(&[]), None);
    }

    #[test]
    fn test_pooling_values() {
        let values = [0.9, 0.5, 0.7];
        assert_eq!(min_value(&values), Some(0.5));
        assert_eq!(max_value(&values), Some(0.9));
        let mean = mean_value(&values).unwrap();
        assert!((mean - 0.7).abs() < 1e-9);
    }
}
