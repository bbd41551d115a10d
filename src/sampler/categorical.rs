//! Log-space helpers and categorical draws shared by every sampling move.

/// Largest value, `-inf` for an empty slice.
pub fn find_log_max(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

/// `ln Σ exp(v)`, computed relative to the maximum.
pub fn sum_logs(values: &[f64]) -> f64 {
    let max = find_log_max(values);
    if max == f64::NEG_INFINITY || max.is_nan() {
        return max;
    }
    let sum: f64 = values.iter().map(|&v| (v - max).exp()).sum();
    max + sum.ln()
}

/// Probabilities proportional to `exp(values)`.
///
/// When every entry is `-inf` the result is uniform.
pub fn normalize_log(values: &[f64]) -> Vec<f64> {
    let max = find_log_max(values);
    if !max.is_finite() {
        let n = values.len().max(1) as f64;
        return vec![1.0 / n; values.len()];
    }
    let weights: Vec<f64> = values.iter().map(|&v| (v - max).exp()).collect();
    let total: f64 = weights.iter().sum();
    weights.into_iter().map(|w| w / total).collect()
}

/// First index whose cumulative probability exceeds `u`.
///
/// `u` must lie in (0, 1). Rounding leftovers land on the last index.
pub fn sample_index_from_log_distribution(log_posteriors: &[f64], u: f64) -> usize {
    pick(&normalize_log(log_posteriors), u)
}

/// Same draw for unnormalised linear weights.
pub fn sample_index_from_distribution(weights: &[f64], u: f64) -> usize {
    let total: f64 = weights.iter().sum();
    if total <= 0.0 || !total.is_finite() {
        let n = weights.len().max(1) as f64;
        return pick(&vec![1.0 / n; weights.len()], u);
    }
    let probs: Vec<f64> = weights.iter().map(|w| w / total).collect();
    pick(&probs, u)
}

fn pick(probs: &[f64], u: f64) -> usize {
    let mut cumulative = 0.0;
    for (i, p) in probs.iter().enumerate() {
        cumulative += p;
        if u < cumulative {
            return i;
        }
    }
    probs.len().saturating_sub(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sum_logs_matches_direct_sum() {
        let values = [0.1f64.ln(), 0.2f64.ln(), 0.7f64.ln()];
        assert!(sum_logs(&values).abs() < 1e-12);
    }

    #[test]
    fn sum_logs_survives_huge_magnitudes() {
        let values = [-1000.0, -1000.0];
        assert!((sum_logs(&values) - (-1000.0 + 2.0f64.ln())).abs() < 1e-9);
        assert!((sum_logs(&[800.0, 800.0]) - (800.0 + 2.0f64.ln())).abs() < 1e-9);
    }

    #[test]
    fn sum_logs_of_impossible_entries_is_neg_inf() {
        assert_eq!(sum_logs(&[f64::NEG_INFINITY; 3]), f64::NEG_INFINITY);
    }

    #[test]
    fn picks_zero_iff_draw_is_below_first_mass() {
        let log_p = [0.3f64.ln(), 0.7f64.ln()];
        let p0 = normalize_log(&log_p)[0];

        for u in [0.01, 0.1, 0.29, 0.2999] {
            assert!(u < p0);
            assert_eq!(sample_index_from_log_distribution(&log_p, u), 0, "u = {}", u);
        }
        for u in [0.3001, 0.5, 0.99] {
            assert!(u > p0);
            assert_eq!(sample_index_from_log_distribution(&log_p, u), 1, "u = {}", u);
        }
    }

    #[test]
    fn unnormalised_log_scores_are_softmaxed() {
        // softmax(10, 10 + ln 3) = (0.25, 0.75)
        let log_p = [10.0, 10.0 + 3.0f64.ln()];
        assert_eq!(sample_index_from_log_distribution(&log_p, 0.24), 0);
        assert_eq!(sample_index_from_log_distribution(&log_p, 0.26), 1);
    }

    #[test]
    fn impossible_hypothesis_is_never_picked() {
        let log_p = [f64::NEG_INFINITY, -5.0];
        assert_eq!(sample_index_from_log_distribution(&log_p, 1e-9), 1);
    }

    #[test]
    fn all_impossible_falls_back_to_uniform() {
        let log_p = [f64::NEG_INFINITY; 4];
        assert_eq!(sample_index_from_log_distribution(&log_p, 0.1), 0);
        assert_eq!(sample_index_from_log_distribution(&log_p, 0.9), 3);
    }

    #[test]
    fn linear_weights_draw() {
        let weights = [0.5, 0.5];
        assert_eq!(sample_index_from_distribution(&weights, 0.49), 0);
        assert_eq!(sample_index_from_distribution(&weights, 0.51), 1);
        // Zero weight on the first entry always selects the second.
        assert_eq!(sample_index_from_distribution(&[0.0, 1.0], 1e-6), 1);
    }

    #[test]
    fn rounding_leftover_goes_to_last_index() {
        assert_eq!(sample_index_from_distribution(&[1.0, 1.0, 1.0], 0.999_999_999_999), 2);
    }
}
