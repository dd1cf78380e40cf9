//! Maximal marginal relevance over a fetched candidate set.

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    dot / (mag_a * mag_b)
}

/// Select up to `k` candidate indices by maximal marginal relevance.
///
/// Iteratively picks the candidate maximising
/// `lambda * sim(query, e_i) - (1 - lambda) * max_{j in selected} sim(e_i, e_j)`
/// with cosine similarity. `lambda = 1.0` is pure relevance, `0.0` maximum
/// diversity. Ties go to the smaller original index. The result has length
/// `min(k, candidates.len())` and every index is distinct.
pub fn maximal_marginal_relevance(
    query: &[f32],
    candidates: &[Vec<f32>],
    lambda: f32,
    k: usize,
) -> Vec<usize> {
    let target = k.min(candidates.len());
    let mut selected: Vec<usize> = Vec::with_capacity(target);
    let mut remaining: Vec<usize> = (0..candidates.len()).collect();

    // Query similarities are reused on every round.
    let query_sims: Vec<f32> = candidates
        .iter()
        .map(|e| cosine_similarity(query, e))
        .collect();

    while selected.len() < target {
        let mut best_pos = 0;
        let mut best_score = f32::NEG_INFINITY;

        for (pos, &idx) in remaining.iter().enumerate() {
            let max_sim_to_selected = selected
                .iter()
                .map(|&s| cosine_similarity(&candidates[s], &candidates[idx]))
                .fold(f32::NEG_INFINITY, f32::max);
            let redundancy = if selected.is_empty() {
                0.0
            } else {
                max_sim_to_selected
            };

            let score = lambda * query_sims[idx] - (1.0 - lambda) * redundancy;
            // Strict comparison keeps the smallest index on ties, since
            // `remaining` is iterated in ascending index order.
            if score > best_score {
                best_score = score;
                best_pos = pos;
            }
        }

        selected.push(remaining.remove(best_pos));
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = vec![0.6, 0.8];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_of_orthogonal_vectors_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn cosine_handles_mismatched_and_zero_vectors() {
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn result_length_is_min_of_k_and_candidates() {
        let query = vec![1.0, 0.0];
        let candidates = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        assert_eq!(
            maximal_marginal_relevance(&query, &candidates, 0.5, 5).len(),
            2
        );
        assert_eq!(
            maximal_marginal_relevance(&query, &candidates, 0.5, 1).len(),
            1
        );
        assert!(maximal_marginal_relevance(&query, &[], 0.5, 3).is_empty());
    }

    #[test]
    fn indices_are_distinct_and_in_range() {
        let query = vec![1.0, 1.0];
        let candidates = vec![
            vec![1.0, 1.0],
            vec![1.0, 0.9],
            vec![-1.0, 0.0],
            vec![0.0, 1.0],
        ];
        let picked = maximal_marginal_relevance(&query, &candidates, 0.7, 4);
        let mut sorted = picked.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), picked.len());
        assert!(picked.iter().all(|&i| i < candidates.len()));
    }

    #[test]
    fn first_pick_is_most_relevant() {
        let query = vec![1.0, 0.0];
        let candidates = vec![vec![0.0, 1.0], vec![1.0, 0.0], vec![0.7, 0.7]];
        let picked = maximal_marginal_relevance(&query, &candidates, 0.7, 2);
        assert_eq!(picked[0], 1);
    }

    #[test]
    fn low_lambda_prefers_diversity() {
        let query = vec![1.0, 0.0];
        // Candidate 1 is a near-duplicate of candidate 0; candidate 2 is
        // orthogonal. With a diversity-heavy lambda the orthogonal vector
        // must be picked second.
        let candidates = vec![vec![1.0, 0.0], vec![0.99, 0.01], vec![0.0, 1.0]];
        let picked = maximal_marginal_relevance(&query, &candidates, 0.1, 2);
        assert_eq!(picked, vec![0, 2]);
    }

    #[test]
    fn ties_break_to_smaller_index() {
        let query = vec![1.0, 0.0];
        let candidates = vec![vec![1.0, 0.0], vec![1.0, 0.0]];
        let picked = maximal_marginal_relevance(&query, &candidates, 1.0, 1);
        assert_eq!(picked, vec![0]);
    }
}
