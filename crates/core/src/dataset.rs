use serde::{Deserialize, Serialize};

use crate::error::SortError;

/// One fixed-shape waveform snippet: a sample sequence per channel, all
/// channels the same length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waveform {
    pub channels: Vec<Vec<f64>>,
}

impl Waveform {
    pub fn single_channel(samples: Vec<f64>) -> Self {
        Self {
            channels: vec![samples],
        }
    }

    /// Number of channels.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Samples per channel (0 for an empty waveform).
    pub fn samples_per_channel(&self) -> usize {
        self.channels.first().map(Vec::len).unwrap_or(0)
    }

    /// All samples in channel order as a single flat sequence.
    pub fn flat_samples(&self) -> impl Iterator<Item = f64> + '_ {
        self.channels.iter().flatten().copied()
    }

    /// Largest absolute sample value across all channels.
    pub fn peak_amplitude(&self) -> f64 {
        self.flat_samples().fold(0.0, |acc, s| acc.max(s.abs()))
    }
}

/// A complete recording: two aligned ordered sequences of equal length.
/// `times` is sorted non-decreasing; `waveforms[i]` belongs to `times[i]`.
///
/// Events are read-only for the whole sorting run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    pub times: Vec<f64>,
    pub waveforms: Vec<Waveform>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Enforce the boundary precondition: aligned lengths and one fixed
    /// waveform shape across every event. Violations are fatal, not
    /// recoverable (the upstream extractor produced garbage).
    pub fn validate(&self) -> Result<(), SortError> {
        if self.times.len() != self.waveforms.len() {
            return Err(SortError::MisalignedInput {
                times: self.times.len(),
                waveforms: self.waveforms.len(),
            });
        }

        let Some(first) = self.waveforms.first() else {
            return Ok(());
        };
        let channels = first.channel_count();
        let samples = first.samples_per_channel();

        for (index, wf) in self.waveforms.iter().enumerate() {
            let got_channels = wf.channel_count();
            let consistent = got_channels == channels
                && wf.channels.iter().all(|c| c.len() == samples);
            if !consistent {
                let got_samples = wf
                    .channels
                    .iter()
                    .map(Vec::len)
                    .find(|&l| l != samples)
                    .unwrap_or(samples);
                return Err(SortError::MalformedWaveform {
                    index,
                    expected_channels: channels,
                    expected_samples: samples,
                    got_channels,
                    got_samples,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wf(samples: &[f64]) -> Waveform {
        Waveform::single_channel(samples.to_vec())
    }

    #[test]
    fn empty_dataset_is_valid() {
        assert!(Dataset::default().validate().is_ok());
    }

    #[test]
    fn aligned_dataset_is_valid() {
        let ds = Dataset {
            times: vec![0.0, 1.0],
            waveforms: vec![wf(&[1.0, 2.0]), wf(&[3.0, 4.0])],
        };
        assert!(ds.validate().is_ok());
    }

    #[test]
    fn misaligned_lengths_rejected() {
        let ds = Dataset {
            times: vec![0.0, 1.0, 2.0],
            waveforms: vec![wf(&[1.0])],
        };
        match ds.validate() {
            Err(SortError::MisalignedInput { times: 3, waveforms: 1 }) => {}
            other => panic!("expected MisalignedInput, got {:?}", other),
        }
    }

    #[test]
    fn inconsistent_sample_count_rejected() {
        let ds = Dataset {
            times: vec![0.0, 1.0],
            waveforms: vec![wf(&[1.0, 2.0]), wf(&[1.0, 2.0, 3.0])],
        };
        match ds.validate() {
            Err(SortError::MalformedWaveform { index: 1, .. }) => {}
            other => panic!("expected MalformedWaveform, got {:?}", other),
        }
    }

    #[test]
    fn inconsistent_channel_count_rejected() {
        let ds = Dataset {
            times: vec![0.0, 1.0],
            waveforms: vec![
                wf(&[1.0, 2.0]),
                Waveform {
                    channels: vec![vec![1.0, 2.0], vec![3.0, 4.0]],
                },
            ],
        };
        assert!(ds.validate().is_err());
    }

    #[test]
    fn peak_amplitude_takes_absolute_max() {
        let w = Waveform {
            channels: vec![vec![1.0, -3.0], vec![2.0, 0.5]],
        };
        assert!((w.peak_amplitude() - 3.0).abs() < 1e-12);
    }
}
