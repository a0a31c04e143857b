use std::collections::HashSet;

use spikesort_core::SortConfig;

use crate::algorithms::density::squared_euclidean;
use crate::pipeline::local::CandidateCluster;
use crate::pipeline::segments::Segment;

/// Dispersion multiplier for the linking distance tolerance. A candidate
/// continues a unit when their centroids sit within this many dispersion
/// radii, which is what gradual drift looks like between adjacent
/// windows. Permissive on purpose: an over-eager link is undone by the
/// refiner, a missed one fragments the unit for good.
const LINK_RADIUS_FACTOR: f64 = 4.0;

/// A unit identity growing forward through the segment sequence.
struct ActiveUnit {
    /// Owned global event indices accumulated so far.
    members: Vec<usize>,
    /// Full membership of the most recent continuing candidate, used for
    /// shared-event matching in the overlap region.
    last_members: Vec<usize>,
    /// Centroid of the most recent continuing candidate. Tracks drift:
    /// matching is always against where the unit was last seen, not
    /// where it started.
    last_centroid: Vec<f64>,
    last_dispersion: f64,
    /// Segment index of the most recent continuing candidate.
    last_segment: usize,
}

/// Link candidate clusters across adjacent segments into provisional
/// global units.
///
/// Matching is explicit greedy best-match-first: all eligible
/// (active unit, candidate) pairs for a segment are ranked by centroid
/// distance (index tie-breaks) and consumed in order, one match per unit
/// and per candidate. Eligibility is centroid distance within the
/// similarity tolerance, or shared membership in the overlap region.
/// Unmatched candidates are births; units with no continuation simply
/// stop growing (death) — both are expected, not errors.
///
/// Each event is owned by exactly one segment (the one whose center is
/// nearest its timestamp), so events in overlap regions are counted
/// once. Returns per-unit owned member lists in birth order; events in
/// no returned unit belong to the noise pseudo-unit.
pub fn link(
    candidates: &[Vec<CandidateCluster>],
    segments: &[Segment],
    times: &[f64],
    config: &SortConfig,
) -> Vec<Vec<usize>> {
    let owner = segment_owners(segments, times);
    let mut units: Vec<ActiveUnit> = Vec::new();

    for (seg_idx, segment_candidates) in candidates.iter().enumerate() {
        let mut matched_units: HashSet<usize> = HashSet::new();
        let mut matched_candidates: HashSet<usize> = HashSet::new();

        // Rank every eligible pairing, best first.
        let mut pairs: Vec<(f64, usize, usize)> = Vec::new();
        for (u_idx, unit) in units.iter().enumerate() {
            if seg_idx == 0 || unit.last_segment != seg_idx - 1 {
                continue;
            }
            for (c_idx, cand) in segment_candidates.iter().enumerate() {
                let dist =
                    squared_euclidean(&unit.last_centroid, &cand.centroid).sqrt();
                let tolerance = config.cluster_similarity_threshold
                    * LINK_RADIUS_FACTOR
                    * unit.last_dispersion.max(cand.dispersion).max(1e-9);
                if dist <= tolerance || shares_members(&unit.last_members, &cand.members) {
                    pairs.push((dist, u_idx, c_idx));
                }
            }
        }
        pairs.sort_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.1.cmp(&b.1))
                .then(a.2.cmp(&b.2))
        });

        for (_, u_idx, c_idx) in pairs {
            if matched_units.contains(&u_idx) || matched_candidates.contains(&c_idx) {
                continue;
            }
            matched_units.insert(u_idx);
            matched_candidates.insert(c_idx);

            let cand = &segment_candidates[c_idx];
            let unit = &mut units[u_idx];
            unit.members
                .extend(owned_events(cand, seg_idx, &owner));
            unit.last_members = cand.members.clone();
            unit.last_centroid = cand.centroid.clone();
            unit.last_dispersion = cand.dispersion;
            unit.last_segment = seg_idx;
        }

        // Remaining candidates start new units (births).
        for (c_idx, cand) in segment_candidates.iter().enumerate() {
            if matched_candidates.contains(&c_idx) {
                continue;
            }
            units.push(ActiveUnit {
                members: owned_events(cand, seg_idx, &owner),
                last_members: cand.members.clone(),
                last_centroid: cand.centroid.clone(),
                last_dispersion: cand.dispersion,
                last_segment: seg_idx,
            });
        }
    }

    units
        .into_iter()
        .filter(|u| !u.members.is_empty())
        .map(|mut u| {
            u.members.sort_unstable();
            u.members
        })
        .collect()
}

/// For each event, the index of the segment whose center is nearest its
/// timestamp (lowest segment index on ties). Events outside every
/// segment cannot occur given full coverage.
fn segment_owners(segments: &[Segment], times: &[f64]) -> Vec<usize> {
    let mut owner = vec![0usize; times.len()];
    let mut best = vec![f64::MAX; times.len()];
    for (seg_idx, segment) in segments.iter().enumerate() {
        let center = segment.center();
        for &event in &segment.events {
            let dist = (times[event] - center).abs();
            if dist < best[event] {
                best[event] = dist;
                owner[event] = seg_idx;
            }
        }
    }
    owner
}

/// Candidate members owned by the given segment.
fn owned_events(cand: &CandidateCluster, seg_idx: usize, owner: &[usize]) -> Vec<usize> {
    cand.members
        .iter()
        .copied()
        .filter(|&e| owner[e] == seg_idx)
        .collect()
}

/// Whether two sorted member lists share any event (overlap-region
/// correspondence evidence).
fn shares_members(a: &[usize], b: &[usize]) -> bool {
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => return true,
        }
    }
    false
}
