//! SC3 stability index (Kiselev et al., 2017).
//!
//! For a cluster `c` and every resolution `r'`, let `L` be the clusters at
//! `r'` that share samples with `c`:
//!
//! ```text
//! s(c) = 1/M Σ_r' Σ_{l ∈ L} |c ∩ l| / (|l| · |L|²)
//! ```
//!
//! A cluster that keeps its samples together at every resolution scores 1.

use std::collections::BTreeMap;

use crate::domain::builder::Partition;

/// Stability for every cluster of every partition, in partition order.
pub(crate) fn sc3_stability(partitions: &[Partition]) -> Vec<Vec<f64>> {
    let m = partitions.len() as f64;
    partitions
        .iter()
        .map(|partition| {
            partition
                .members
                .iter()
                .map(|members| {
                    let total: f64 = partitions
                        .iter()
                        .map(|other| overlap_score(members, other))
                        .sum();
                    total / m
                })
                .collect()
        })
        .collect()
}

fn overlap_score(members: &[usize], other: &Partition) -> f64 {
    let mut overlaps: BTreeMap<usize, usize> = BTreeMap::new();
    for &sample in members {
        if let Some(cluster) = other.assignment[sample] {
            *overlaps.entry(cluster).or_default() += 1;
        }
    }
    let n = overlaps.len() as f64;
    if n == 0.0 {
        return 0.0;
    }
    overlaps
        .iter()
        .map(|(&cluster, &shared)| {
            shared as f64 / (other.members[cluster].len() as f64 * n * n)
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::Label;

    fn partition(labels: &[Option<i64>]) -> Partition {
        Partition::from_labels("test", labels.iter().map(|l| l.map(Label::Int)).collect())
    }

    #[test]
    fn given_one_split_when_scoring_then_every_node_scores_three_quarters() {
        let partitions = vec![
            partition(&[Some(1); 6]),
            partition(&[Some(1), Some(1), Some(1), Some(2), Some(2), Some(2)]),
        ];

        let scores = sc3_stability(&partitions);

        assert_eq!(scores, vec![vec![0.75], vec![0.75, 0.75]]);
    }

    #[test]
    fn given_identical_partitions_when_scoring_then_all_stable() {
        let labels = [Some(1), Some(1), Some(2), Some(2)];
        let partitions = vec![partition(&labels), partition(&labels), partition(&labels)];

        let scores = sc3_stability(&partitions);

        for row in scores {
            for s in row {
                assert!((s - 1.0).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn given_samples_missing_elsewhere_when_scoring_then_ignores_them() {
        let partitions = vec![
            partition(&[Some(1), Some(1)]),
            partition(&[None, None]),
        ];

        let scores = sc3_stability(&partitions);

        assert_eq!(scores[0], vec![0.5]);
        assert!(scores[1].is_empty());
    }
}
