use spikesort_core::{Dataset, UnitLabel, UnitSummary, Waveform, NOISE_LABEL};

use crate::algorithms::bisect::mean_of;
use crate::algorithms::density::squared_euclidean;

/// Build the final labeling and per-unit summaries from the refined
/// member lists.
///
/// Units are relabeled `1..` by first appearance (earliest member
/// timestamp, input order on ties) so label assignment is independent of
/// how linking and refinement happened to order them. Every event gets a
/// label; events in no unit carry [`NOISE_LABEL`], and a noise summary is
/// emitted whenever the noise pseudo-unit has members. Summaries are
/// recomputed from final membership, not carried over from earlier
/// stages.
pub fn assemble(
    units: Vec<Vec<usize>>,
    dataset: &Dataset,
    features: &[Vec<f64>],
) -> (Vec<UnitLabel>, Vec<UnitSummary>) {
    let n = dataset.len();

    // Member lists are sorted and times are non-decreasing, so the first
    // member is the earliest.
    let mut order: Vec<usize> = (0..units.len()).collect();
    order.sort_by(|&a, &b| {
        let ta = dataset.times[units[a][0]];
        let tb = dataset.times[units[b][0]];
        ta.partial_cmp(&tb)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(&b))
    });

    let mut labels: Vec<UnitLabel> = vec![NOISE_LABEL; n];
    for (rank, &u) in order.iter().enumerate() {
        let label = (rank + 1) as UnitLabel;
        for &event in &units[u] {
            labels[event] = label;
        }
    }

    let centroids: Vec<Vec<f64>> = order
        .iter()
        .map(|&u| {
            let rows: Vec<&[f64]> = units[u].iter().map(|&e| features[e].as_slice()).collect();
            mean_of(&rows, rows[0].len())
        })
        .collect();

    let mut summaries = Vec::with_capacity(order.len() + 1);

    let noise: Vec<usize> = (0..n).filter(|&e| labels[e] == NOISE_LABEL).collect();
    if !noise.is_empty() {
        summaries.push(UnitSummary {
            label: NOISE_LABEL,
            event_count: noise.len(),
            template: mean_waveform(dataset, &noise),
            isolation: 0.0,
            first_seen: dataset.times[noise[0]],
        });
    }

    for (rank, &u) in order.iter().enumerate() {
        summaries.push(UnitSummary {
            label: (rank + 1) as UnitLabel,
            event_count: units[u].len(),
            template: mean_waveform(dataset, &units[u]),
            isolation: isolation(rank, &units[u], features, &centroids),
            first_seen: dataset.times[units[u][0]],
        });
    }

    (labels, summaries)
}

/// Channel-wise mean of the members' raw waveforms.
fn mean_waveform(dataset: &Dataset, members: &[usize]) -> Waveform {
    let shape = &dataset.waveforms[members[0]];
    let mut channels: Vec<Vec<f64>> =
        vec![vec![0.0; shape.samples_per_channel()]; shape.channel_count()];

    for &event in members {
        for (acc, src) in channels.iter_mut().zip(dataset.waveforms[event].channels.iter()) {
            for (a, &s) in acc.iter_mut().zip(src.iter()) {
                *a += s;
            }
        }
    }
    let count = members.len() as f64;
    for channel in &mut channels {
        for sample in channel {
            *sample /= count;
        }
    }
    Waveform { channels }
}

/// Nearest-other-unit centroid distance over the unit's own mean
/// within-unit distance. Infinite when the unit has no rival or no
/// internal spread.
fn isolation(rank: usize, members: &[usize], features: &[Vec<f64>], centroids: &[Vec<f64>]) -> f64 {
    let own = &centroids[rank];

    let nearest_other = centroids
        .iter()
        .enumerate()
        .filter(|(other, _)| *other != rank)
        .map(|(_, c)| squared_euclidean(own, c).sqrt())
        .fold(f64::INFINITY, f64::min);
    if nearest_other.is_infinite() {
        return f64::INFINITY;
    }

    let within = members
        .iter()
        .map(|&e| squared_euclidean(&features[e], own).sqrt())
        .sum::<f64>()
        / members.len() as f64;
    if within <= 1e-12 {
        return f64::INFINITY;
    }
    nearest_other / within
}
