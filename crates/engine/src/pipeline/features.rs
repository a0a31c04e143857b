use rayon::prelude::*;

use spikesort_core::{Dataset, SortConfig};

use crate::algorithms::pca::PcaBasis;

/// Reduce every waveform to a compact feature vector on one shared
/// principal-component basis.
///
/// With `normalize_amplitude` on (the default), each waveform is scaled
/// to unit peak before projection and its relative amplitude (peak over
/// the recording's mean peak) is appended as one retained feature, so
/// shape and size contribute separately to downstream distances. With it
/// off, amplitude flows through the projection itself.
///
/// Empty input produces an empty result, never an error.
pub fn extract(dataset: &Dataset, config: &SortConfig) -> Vec<Vec<f64>> {
    if dataset.is_empty() {
        return Vec::new();
    }

    let flat: Vec<Vec<f64>> = dataset
        .waveforms
        .iter()
        .map(|wf| wf.flat_samples().collect())
        .collect();

    if !config.normalize_amplitude {
        let basis = PcaBasis::fit(&flat, config.feature_dim);
        return flat.par_iter().map(|row| basis.project(row)).collect();
    }

    let amplitudes: Vec<f64> = dataset
        .waveforms
        .iter()
        .map(|wf| wf.peak_amplitude())
        .collect();
    let mean_amplitude = amplitudes.iter().sum::<f64>() / amplitudes.len() as f64;

    let shapes: Vec<Vec<f64>> = flat
        .iter()
        .zip(amplitudes.iter())
        .map(|(row, &amp)| {
            if amp > 1e-12 {
                row.iter().map(|x| x / amp).collect()
            } else {
                row.clone()
            }
        })
        .collect();

    let basis = PcaBasis::fit(&shapes, config.feature_dim);

    shapes
        .par_iter()
        .zip(amplitudes.par_iter())
        .map(|(row, &amp)| {
            let mut fv = basis.project(row);
            let relative = if mean_amplitude > 1e-12 {
                amp / mean_amplitude
            } else {
                0.0
            };
            fv.push(relative);
            fv
        })
        .collect()
}
