//! Score normalization and weighted fusion of the two retrieval signals

/// Min-max normalize to [0, 1]
///
/// When every value is equal there is no spread to normalize and the result
/// is all zeros.
pub fn min_max_normalize(values: &[f32]) -> Vec<f32> {
    let (min, max) = values
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });

    let range = max - min;
    if values.is_empty() || range <= 0.0 || !range.is_finite() {
        return vec![0.0; values.len()];
    }

    values
        .iter()
        .map(|&v| ((v - min) / range).clamp(0.0, 1.0))
        .collect()
}

/// Weighted fusion of vector distances and lexical scores
///
/// Both arrays must be aligned with the same candidate list. Each is
/// normalized over the candidates, distances are flipped so higher is
/// better, then `alpha * (1 - dist) + (1 - alpha) * lex`.
pub fn fuse_scores(distances: &[f32], lexical: &[f32], alpha: f32) -> Vec<f32> {
    debug_assert_eq!(distances.len(), lexical.len());

    let norm_dist = min_max_normalize(distances);
    let norm_lex = min_max_normalize(lexical);

    norm_dist
        .iter()
        .zip(norm_lex.iter())
        .map(|(d, l)| alpha * (1.0 - d) + (1.0 - alpha) * l)
        .collect()
}

/// Candidate positions ordered by score, highest first
///
/// The sort is stable: equal scores keep their candidate order.
pub fn rank_descending(scores: &[f32]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_bounds() {
        let normalized = min_max_normalize(&[3.0, -1.0, 7.5, 0.25]);
        assert_eq!(normalized.len(), 4);
        assert!(normalized.iter().all(|v| (0.0..=1.0).contains(v)));
        assert_eq!(normalized[1], 0.0);
        assert_eq!(normalized[2], 1.0);
    }

    #[test]
    fn test_normalize_all_equal_is_zero() {
        assert_eq!(min_max_normalize(&[0.4, 0.4, 0.4]), vec![0.0, 0.0, 0.0]);
        assert_eq!(min_max_normalize(&[5.0]), vec![0.0]);
        assert!(min_max_normalize(&[]).is_empty());
    }

    #[test]
    fn test_fusion_weights() {
        // Candidate 0 is closest, candidate 1 is the lexical match
        let distances = [0.1, 0.9];
        let lexical = [0.0, 2.0];

        let semantic_heavy = fuse_scores(&distances, &lexical, 0.6);
        assert!((semantic_heavy[0] - 0.6).abs() < 1e-6);
        assert!((semantic_heavy[1] - 0.4).abs() < 1e-6);

        let lexical_only = fuse_scores(&distances, &lexical, 0.0);
        assert_eq!(lexical_only, vec![0.0, 1.0]);
    }

    #[test]
    fn test_fusion_monotonic_in_lexical_score() {
        let distances = [0.5, 0.5, 0.5];
        let lexical = [1.0, 2.0, 3.0];
        let fused = fuse_scores(&distances, &lexical, 0.6);
        assert!(fused[0] < fused[1] && fused[1] < fused[2]);
    }

    #[test]
    fn test_fusion_monotonic_in_distance() {
        let lexical = [1.0, 2.0, 0.5];
        let mut previous = f32::INFINITY;

        // Candidate 0 moves from nearest to farthest, past the old maximum
        for d0 in [0.2, 0.3, 0.5, 0.9, 1.2, 2.0] {
            let fused = fuse_scores(&[d0, 0.4, 0.9], &lexical, 0.6);
            assert!(
                fused[0] <= previous + 1e-6,
                "fused score rose to {} at distance {}",
                fused[0],
                d0
            );
            previous = fused[0];
        }

        // As the farthest candidate only its lexical share remains
        let lexical_share = 0.4 * (0.5 / 1.5);
        assert!((previous - lexical_share).abs() < 1e-6);
    }

    #[test]
    fn test_fusion_all_equal_signals() {
        // No spread in either signal: everything collapses to alpha
        let fused = fuse_scores(&[0.3, 0.3], &[0.0, 0.0], 0.6);
        assert_eq!(fused, vec![0.6, 0.6]);
    }

    #[test]
    fn test_rank_is_stable() {
        let order = rank_descending(&[0.5, 0.9, 0.5, 0.9, 0.1]);
        assert_eq!(order, vec![1, 3, 0, 2, 4]);
    }
}
