use std::collections::VecDeque;

/// Result of density grouping over one set of feature rows.
#[derive(Debug, Clone)]
pub struct DensityResult {
    /// Per-row group id, `None` for noise rows.
    pub labels: Vec<Option<usize>>,
    /// Number of groups found.
    pub group_count: usize,
}

/// Density-based grouping (DBSCAN family) over feature rows.
///
/// A row with at least `min_pts` neighbors (itself included) within `eps`
/// is a core row and seeds or extends a group; rows reachable from a core
/// row join its group; everything else is noise. No group count is
/// pre-specified. Iteration order is the row order, so the grouping is
/// stable on repeated runs with identical input.
pub fn density_group(rows: &[Vec<f64>], eps: f64, min_pts: usize) -> DensityResult {
    let n = rows.len();
    if n == 0 {
        return DensityResult {
            labels: Vec::new(),
            group_count: 0,
        };
    }

    let eps_sq = eps * eps;

    // Pre-compute neighbor lists to avoid redundant distance calculations.
    let neighbors: Vec<Vec<usize>> = (0..n)
        .map(|i| {
            (0..n)
                .filter(|&j| squared_euclidean(&rows[i], &rows[j]) <= eps_sq)
                .collect()
        })
        .collect();

    let mut labels: Vec<Option<usize>> = vec![None; n];
    let mut visited = vec![false; n];
    let mut current_group = 0usize;

    for i in 0..n {
        if visited[i] {
            continue;
        }
        visited[i] = true;

        if neighbors[i].len() < min_pts {
            // Not a core row; tentatively noise (may be claimed later).
            continue;
        }

        labels[i] = Some(current_group);

        let mut queue: VecDeque<usize> =
            neighbors[i].iter().copied().filter(|&j| j != i).collect();

        while let Some(j) = queue.pop_front() {
            if labels[j].is_none() {
                labels[j] = Some(current_group);
            }

            if visited[j] {
                continue;
            }
            visited[j] = true;

            if neighbors[j].len() >= min_pts {
                for &nb in &neighbors[j] {
                    if labels[nb].is_none() {
                        queue.push_back(nb);
                    }
                }
            }
        }

        current_group += 1;
    }

    DensityResult {
        labels,
        group_count: current_group,
    }
}

/// Distance from each row to its `k`-th nearest other row. Used to derive
/// a data-relative neighborhood radius: the local density scale of a set
/// of rows without assuming absolute feature units.
pub fn kth_neighbor_distances(rows: &[Vec<f64>], k: usize) -> Vec<f64> {
    let n = rows.len();
    if n < 2 {
        return vec![0.0; n];
    }
    let k = k.min(n - 1);

    (0..n)
        .map(|i| {
            let mut dists: Vec<f64> = (0..n)
                .filter(|&j| j != i)
                .map(|j| squared_euclidean(&rows[i], &rows[j]))
                .collect();
            dists.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            dists[k - 1].sqrt()
        })
        .collect()
}

/// Squared Euclidean distance between two vectors.
#[inline]
pub fn squared_euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
