//! Clustering agreement metrics.
//!
//! Compare cluster assignments against reference labels, e.g. to check a
//! fit on synthetic data with known groups.
//!
//! | Metric | Range | Best | Properties |
//! |--------|-------|------|------------|
//! | [`adjusted_rand_index`] | [-1, 1] | 1 | Adjusted for chance |
//! | [`purity`] | [0, 1] | 1 | Simple, biased toward many clusters |
//!
//! Both ignore the numbering of clusters, so a permuted labelling scores
//! the same as the original.
//!
//! ```rust
//! use partita::metrics::{adjusted_rand_index, purity};
//!
//! let pred = [1, 1, 0, 0];
//! let truth = [0, 0, 1, 1];
//! assert!((adjusted_rand_index(&pred, &truth) - 1.0).abs() < 1e-12);
//! assert!((purity(&pred, &truth) - 1.0).abs() < 1e-12);
//! ```
//!
//! # References
//!
//! - Hubert & Arabie (1985). "Comparing partitions" (ARI)

use std::collections::HashMap;

/// Adjusted Rand Index between two labellings.
///
/// 0 for chance-level agreement, 1 for identical partitions. Returns 0 when
/// the inputs differ in length or are empty.
pub fn adjusted_rand_index(pred: &[usize], truth: &[usize]) -> f64 {
    if pred.len() != truth.len() || pred.is_empty() {
        return 0.0;
    }

    let table = Contingency::new(pred, truth);

    let sum_comb_ij: f64 = table.cells.values().map(|&c| comb2(c)).sum();
    let sum_comb_a: f64 = table.row_sums().values().map(|&a| comb2(a)).sum();
    let sum_comb_b: f64 = table.col_sums().values().map(|&b| comb2(b)).sum();
    let comb_n = comb2(table.n);
    if comb_n == 0.0 {
        return 1.0;
    }

    // ARI = (index - expected) / (max - expected)
    let expected = sum_comb_a * sum_comb_b / comb_n;
    let max_index = (sum_comb_a + sum_comb_b) / 2.0;

    let denom = max_index - expected;
    if denom.abs() < 1e-10 {
        return 1.0;
    }
    (sum_comb_ij - expected) / denom
}

/// Fraction of records whose cluster's majority label matches their own.
///
/// Purity is 1.0 when every record is its own cluster, so compare it only
/// between clusterings with the same k.
pub fn purity(pred: &[usize], truth: &[usize]) -> f64 {
    if pred.len() != truth.len() || pred.is_empty() {
        return 0.0;
    }

    let table = Contingency::new(pred, truth);
    let mut cluster_maxes: HashMap<usize, usize> = HashMap::new();
    for (&(p, _), &count) in &table.cells {
        let current = cluster_maxes.entry(p).or_insert(0);
        *current = (*current).max(count);
    }

    let correct: usize = cluster_maxes.values().sum();
    correct as f64 / table.n as f64
}

struct Contingency {
    cells: HashMap<(usize, usize), usize>,
    n: usize,
}

impl Contingency {
    fn new(pred: &[usize], truth: &[usize]) -> Self {
        let mut cells = HashMap::new();
        for (&p, &t) in pred.iter().zip(truth) {
            *cells.entry((p, t)).or_insert(0) += 1;
        }
        Self { cells, n: pred.len() }
    }

    fn row_sums(&self) -> HashMap<usize, usize> {
        let mut sums = HashMap::new();
        for (&(p, _), &count) in &self.cells {
            *sums.entry(p).or_insert(0) += count;
        }
        sums
    }

    fn col_sums(&self) -> HashMap<usize, usize> {
        let mut sums = HashMap::new();
        for (&(_, t), &count) in &self.cells {
            *sums.entry(t).or_insert(0) += count;
        }
        sums
    }
}

fn comb2(n: usize) -> f64 {
    if n < 2 {
        0.0
    } else {
        (n * (n - 1) / 2) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ari_perfect() {
        let pred = [0, 0, 1, 1];
        let truth = [0, 0, 1, 1];
        assert!((adjusted_rand_index(&pred, &truth) - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_ari_permuted() {
        // Same clustering, different labels
        let pred = [1, 1, 0, 0, 2, 2];
        let truth = [0, 0, 1, 1, 2, 2];
        assert!((adjusted_rand_index(&pred, &truth) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_ari_known_value() {
        // Pair counts: index 1, expected 2 * 3 / 6 = 1, max 2.5
        let pred = [0, 0, 1, 1];
        let truth = [0, 0, 0, 1];
        assert!(adjusted_rand_index(&pred, &truth).abs() < 1e-12);
    }

    #[test]
    fn test_ari_mismatched_lengths() {
        assert_eq!(adjusted_rand_index(&[0, 1], &[0]), 0.0);
        assert_eq!(adjusted_rand_index(&[], &[]), 0.0);
    }

    #[test]
    fn test_purity_perfect() {
        let pred = [0, 0, 1, 1];
        let truth = [0, 0, 1, 1];
        assert!((purity(&pred, &truth) - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_purity_overclustering() {
        // Each point is its own cluster
        let pred = [0, 1, 2, 3];
        let truth = [0, 0, 1, 1];
        assert!((purity(&pred, &truth) - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_purity_mixed() {
        let pred = [0, 0, 0, 1];
        let truth = [0, 0, 1, 1];
        assert!((purity(&pred, &truth) - 0.75).abs() < 1e-12);
    }
}
