use spikesort_core::SortConfig;

use crate::algorithms::bisect::{self, separation_between};

/// Outcome of the merge/split fixed-point pass.
#[derive(Debug, Clone)]
pub struct Refinement {
    /// Surviving unit member lists (ascending indices each).
    pub units: Vec<Vec<usize>>,
    /// Passes actually executed.
    pub passes: usize,
    /// False when the pass cap was hit with changes still pending; the
    /// best-converged state reached is returned regardless.
    pub converged: bool,
}

/// One applicable change, scored so the strongest is applied first.
/// Strengths are normalized to (0, 1] on both sides so merges and
/// splits compete on a common scale.
enum Change {
    /// Merge units at these positions; strength grows as their
    /// separation falls below the merge tolerance.
    Merge { strength: f64, a: usize, b: usize },
    /// Split the unit at this position into the two given member lists;
    /// strength grows as the bisection silhouette exceeds the split
    /// tolerance.
    Split {
        strength: f64,
        unit: usize,
        left: Vec<usize>,
        right: Vec<usize>,
    },
}

impl Change {
    fn strength(&self) -> f64 {
        match self {
            Change::Merge { strength, .. } | Change::Split { strength, .. } => *strength,
        }
    }

    /// Deterministic tie-break for equal strengths: merges before splits,
    /// lowest unit positions first.
    fn key(&self) -> (u8, usize, usize) {
        match self {
            Change::Merge { a, b, .. } => (0, *a, *b),
            Change::Split { unit, .. } => (1, *unit, 0),
        }
    }
}

/// Globally revisit the provisional units, merging statistically
/// indistinguishable pairs and splitting multimodal ones, independent of
/// segment boundaries.
///
/// Runs to a fixed point: each pass scores every merge and split
/// candidate on the current unit set, applies the strongest, and then
/// applies every further candidate that touches only units unmodified in
/// that pass; everything is re-scored between passes. Disjoint changes
/// scored on the same snapshot cannot invalidate each other, so a pass
/// is equivalent to applying its changes one at a time in rank order —
/// the explicit strongest-first rule keeps the fixed point independent
/// of evaluation order, and batching keeps the pass count proportional
/// to the refinement depth rather than the number of units. The pass cap
/// bounds pathological inputs; hitting it with changes still pending
/// returns the current state with `converged = false`.
///
/// Units that end below `min_unit_size` are demoted to noise, which also
/// keeps re-refining a converged result a no-op.
pub fn refine(units: Vec<Vec<usize>>, features: &[Vec<f64>], config: &SortConfig) -> Refinement {
    let mut units = units;
    let mut passes = 0;
    let mut converged = false;

    loop {
        let changes = ranked_changes(&units, features, config);
        if changes.is_empty() {
            converged = true;
            break;
        }
        if passes == config.max_refine_passes {
            break;
        }
        passes += 1;
        apply_pass(&mut units, changes);
    }

    units.retain(|u| u.len() >= config.min_unit_size);

    Refinement {
        units,
        passes,
        converged,
    }
}

/// Score every merge and split candidate, strongest first. Ties resolve
/// to merges ahead of splits, then lowest unit positions.
fn ranked_changes(
    units: &[Vec<usize>],
    features: &[Vec<f64>],
    config: &SortConfig,
) -> Vec<Change> {
    let rows: Vec<Vec<&[f64]>> = units
        .iter()
        .map(|members| members.iter().map(|&e| features[e].as_slice()).collect())
        .collect();

    let mut changes = Vec::new();

    for a in 0..units.len() {
        for b in (a + 1)..units.len() {
            let separation = separation_between(&rows[a], &rows[b]);
            if separation < config.merge_tolerance {
                changes.push(Change::Merge {
                    strength: (config.merge_tolerance - separation) / config.merge_tolerance,
                    a,
                    b,
                });
            }
        }
    }

    for (u, members) in units.iter().enumerate() {
        // A split can only produce two viable halves from this size up.
        if members.len() < 2 * config.min_unit_size {
            continue;
        }
        let Some(bisection) = bisect::bisect(&rows[u]) else {
            continue;
        };
        if bisection.silhouette <= config.split_tolerance
            || bisection.left.len() < config.min_unit_size
            || bisection.right.len() < config.min_unit_size
        {
            continue;
        }
        let mut left: Vec<usize> = bisection.left.iter().map(|&p| members[p]).collect();
        let mut right: Vec<usize> = bisection.right.iter().map(|&p| members[p]).collect();
        left.sort_unstable();
        right.sort_unstable();
        changes.push(Change::Split {
            strength: (bisection.silhouette - config.split_tolerance)
                / (1.0 - config.split_tolerance),
            unit: u,
            left,
            right,
        });
    }

    changes.sort_by(|x, y| {
        y.strength()
            .partial_cmp(&x.strength())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| x.key().cmp(&y.key()))
    });
    changes
}

/// Apply the ranked changes in order, skipping any that touches a unit
/// already modified in this pass. Merged-away units are dropped and split
/// halves appended, preserving position order for the survivors.
fn apply_pass(units: &mut Vec<Vec<usize>>, changes: Vec<Change>) {
    let mut touched = vec![false; units.len()];
    let mut removed = vec![false; units.len()];
    let mut born: Vec<Vec<usize>> = Vec::new();

    for change in changes {
        match change {
            Change::Merge { a, b, .. } => {
                if touched[a] || touched[b] {
                    continue;
                }
                touched[a] = true;
                touched[b] = true;
                let absorbed = std::mem::take(&mut units[b]);
                units[a].extend(absorbed);
                units[a].sort_unstable();
                removed[b] = true;
            }
            Change::Split {
                unit, left, right, ..
            } => {
                if touched[unit] {
                    continue;
                }
                touched[unit] = true;
                units[unit] = left;
                born.push(right);
            }
        }
    }

    let mut kept: Vec<Vec<usize>> = Vec::with_capacity(units.len() + born.len());
    for (i, unit) in units.drain(..).enumerate() {
        if !removed[i] {
            kept.push(unit);
        }
    }
    kept.extend(born);
    *units = kept;
}
