use rayon::prelude::*;

use spikesort_core::SortConfig;

use crate::algorithms::density::{self, squared_euclidean};
use crate::pipeline::segments::Segment;

/// A group of events within one segment believed to come from one unit.
/// Ephemeral: consumed by the cross-segment linker.
#[derive(Debug, Clone)]
pub struct CandidateCluster {
    /// Index of the owning segment.
    pub segment: usize,
    /// Ascending global event indices.
    pub members: Vec<usize>,
    /// Mean feature vector of the members.
    pub centroid: Vec<f64>,
    /// RMS feature distance of members to the centroid.
    pub dispersion: f64,
}

/// Quantile of the per-row k-th neighbor distance used as the density
/// radius baseline. High enough that a uniform-density cluster stays
/// connected where sampling happens to thin out (a smaller radius cuts
/// an elongated drift smear into fragments no later stage can rejoin);
/// grouping strictness comes from the similarity threshold scaling it.
const KDIST_QUANTILE: f64 = 0.9;

/// Group each segment's feature vectors into candidate clusters.
///
/// Segments are independent, so they are processed in parallel; output
/// order follows segment order regardless of scheduling. A segment with
/// fewer than `min_unit_size` events produces no candidates (all its
/// events stay in the noise pseudo-cluster) — that is expected data, not
/// an error.
pub fn assign_all(
    segments: &[Segment],
    features: &[Vec<f64>],
    config: &SortConfig,
) -> Vec<Vec<CandidateCluster>> {
    segments
        .par_iter()
        .enumerate()
        .map(|(seg_idx, segment)| assign_segment(seg_idx, segment, features, config))
        .collect()
}

/// Density grouping of one segment, with deterministic boundary handling:
/// after expansion every grouped event is re-assigned to its nearest
/// candidate centroid, so near-equidistant boundary events do not depend
/// on expansion order.
fn assign_segment(
    seg_idx: usize,
    segment: &Segment,
    features: &[Vec<f64>],
    config: &SortConfig,
) -> Vec<CandidateCluster> {
    if segment.events.len() < config.min_unit_size {
        return Vec::new();
    }

    let rows: Vec<Vec<f64>> = segment
        .events
        .iter()
        .map(|&i| features[i].clone())
        .collect();

    let eps = neighborhood_radius(&rows, config);
    let grouping = density::density_group(&rows, eps, config.min_unit_size);
    if grouping.group_count == 0 {
        return Vec::new();
    }

    // Initial centroids from the density pass.
    let mut centroids = group_centroids(&rows, &grouping.labels, grouping.group_count);

    // Nearest-centroid re-assignment for grouped rows (noise stays noise).
    let reassigned: Vec<Option<usize>> = grouping
        .labels
        .iter()
        .enumerate()
        .map(|(i, label)| label.map(|_| nearest_centroid(&rows[i], &centroids)))
        .collect();
    centroids = group_centroids(&rows, &reassigned, grouping.group_count);

    (0..grouping.group_count)
        .filter_map(|g| {
            let members: Vec<usize> = reassigned
                .iter()
                .enumerate()
                .filter(|(_, l)| **l == Some(g))
                .map(|(local, _)| segment.events[local])
                .collect();
            if members.is_empty() {
                return None;
            }

            let centroid = centroids[g].clone();
            let sum_sq: f64 = reassigned
                .iter()
                .enumerate()
                .filter(|(_, l)| **l == Some(g))
                .map(|(local, _)| squared_euclidean(&rows[local], &centroid))
                .sum();
            let dispersion = (sum_sq / members.len() as f64).sqrt();

            Some(CandidateCluster {
                segment: seg_idx,
                members,
                centroid,
                dispersion,
            })
        })
        .collect()
}

/// Density radius for one segment: the configured similarity threshold
/// times a high quantile of the k-th neighbor distance. Dimensionless
/// threshold, data-relative scale.
fn neighborhood_radius(rows: &[Vec<f64>], config: &SortConfig) -> f64 {
    let kdist = density::kth_neighbor_distances(rows, config.min_unit_size);
    let scale = quantile(&kdist, KDIST_QUANTILE);
    if scale > 0.0 {
        config.cluster_similarity_threshold * scale
    } else {
        // Zero-variance rows (identical waveforms): any positive radius
        // groups them.
        1e-9
    }
}

fn group_centroids(
    rows: &[Vec<f64>],
    labels: &[Option<usize>],
    group_count: usize,
) -> Vec<Vec<f64>> {
    let dim = rows.first().map(Vec::len).unwrap_or(0);
    let mut sums = vec![vec![0.0; dim]; group_count];
    let mut counts = vec![0usize; group_count];
    for (row, label) in rows.iter().zip(labels.iter()) {
        if let Some(g) = label {
            counts[*g] += 1;
            for (s, &x) in sums[*g].iter_mut().zip(row.iter()) {
                *s += x;
            }
        }
    }
    for (sum, &count) in sums.iter_mut().zip(counts.iter()) {
        if count > 0 {
            for s in sum.iter_mut() {
                *s /= count as f64;
            }
        }
    }
    sums
}

/// Index of the nearest centroid; ties resolve to the lowest index.
fn nearest_centroid(row: &[f64], centroids: &[Vec<f64>]) -> usize {
    let mut best_idx = 0;
    let mut best_dist = f64::MAX;
    for (i, centroid) in centroids.iter().enumerate() {
        let dist = squared_euclidean(row, centroid);
        if dist < best_dist {
            best_dist = dist;
            best_idx = i;
        }
    }
    best_idx
}

/// Value at quantile `q` of `values` (interpolation-free, index rounding).
fn quantile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let idx = ((sorted.len() - 1) as f64 * q).round() as usize;
    sorted[idx]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment_of(events: Vec<usize>) -> Segment {
        Segment {
            start: 0.0,
            end: 1.0,
            events,
        }
    }

    fn config() -> SortConfig {
        SortConfig {
            min_unit_size: 3,
            ..SortConfig::default()
        }
    }

    #[test]
    fn thin_segment_yields_no_candidates() {
        let features = vec![vec![0.0, 0.0], vec![1.0, 1.0]];
        let segments = vec![segment_of(vec![0, 1])];
        let out = assign_all(&segments, &features, &config());
        assert!(out[0].is_empty());
    }

    #[test]
    fn two_tight_clusters_become_two_candidates() {
        let mut features = Vec::new();
        for i in 0..6 {
            features.push(vec![i as f64 * 0.01, 0.0]);
        }
        for i in 0..6 {
            features.push(vec![10.0 + i as f64 * 0.01, 0.0]);
        }
        let segments = vec![segment_of((0..12).collect())];
        let out = assign_all(&segments, &features, &config());

        assert_eq!(out[0].len(), 2);
        let sizes: Vec<usize> = out[0].iter().map(|c| c.members.len()).collect();
        assert_eq!(sizes, vec![6, 6]);
        // Members must not mix the generating clusters.
        assert!(out[0][0].members.iter().all(|&i| i < 6));
        assert!(out[0][1].members.iter().all(|&i| i >= 6));
    }

    #[test]
    fn identical_features_form_one_candidate() {
        let features = vec![vec![2.0, 2.0]; 8];
        let segments = vec![segment_of((0..8).collect())];
        let out = assign_all(&segments, &features, &config());

        assert_eq!(out[0].len(), 1);
        assert_eq!(out[0][0].members.len(), 8);
        assert!(out[0][0].dispersion < 1e-9);
    }

    #[test]
    fn elongated_smear_stays_one_candidate() {
        // A drifting unit leaves a uniform smear along one feature axis
        // inside a window; it must come out as a single candidate, not a
        // chain of fragments.
        let features: Vec<Vec<f64>> = (0..60)
            .map(|i| vec![i as f64 * 0.01, (i % 5) as f64 * 0.002])
            .collect();
        let segments = vec![segment_of((0..60).collect())];
        let cfg = SortConfig {
            min_unit_size: 8,
            ..SortConfig::default()
        };
        let out = assign_all(&segments, &features, &cfg);

        assert_eq!(out[0].len(), 1, "smear fragmented: {:?}",
            out[0].iter().map(|c| c.members.len()).collect::<Vec<_>>());
        assert_eq!(out[0][0].members.len(), 60);
    }

    #[test]
    fn far_outlier_left_unassigned() {
        let mut features: Vec<Vec<f64>> = (0..8).map(|i| vec![i as f64 * 0.01]).collect();
        features.push(vec![1000.0]);
        let segments = vec![segment_of((0..9).collect())];
        let out = assign_all(&segments, &features, &config());

        assert_eq!(out[0].len(), 1);
        assert!(!out[0][0].members.contains(&8));
    }

    #[test]
    fn candidates_are_deterministic() {
        let features: Vec<Vec<f64>> = (0..30)
            .map(|i| vec![(i as f64 * 0.7).sin(), (i as f64 * 0.3).cos()])
            .collect();
        let segments = vec![segment_of((0..30).collect())];
        let a = assign_all(&segments, &features, &config());
        let b = assign_all(&segments, &features, &config());

        assert_eq!(a[0].len(), b[0].len());
        for (x, y) in a[0].iter().zip(b[0].iter()) {
            assert_eq!(x.members, y.members);
            assert_eq!(x.centroid, y.centroid);
        }
    }

    #[test]
    fn segment_order_preserved_under_parallelism() {
        let features: Vec<Vec<f64>> = (0..20).map(|i| vec![(i % 2) as f64 * 10.0]).collect();
        let segments: Vec<Segment> = (0..4)
            .map(|s| segment_of((s * 5..(s + 1) * 5).collect()))
            .collect();
        let out = assign_all(&segments, &features, &config());

        assert_eq!(out.len(), 4);
        for (seg_idx, candidates) in out.iter().enumerate() {
            for c in candidates {
                assert_eq!(c.segment, seg_idx);
            }
        }
    }
}
